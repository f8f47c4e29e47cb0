//! Payment API handlers

use super::bill_handler::parse_bill_id;
use super::dto::{ApiResponse, PayBillRequest};
use super::error::ApiError;
use super::extract::AuthenticatedCaller;
use super::metrics_handler::record_payment;
use super::state::AppState;
use crate::domain::payment::{Payment, PaymentReceipt};
use crate::domain::query::PaymentListRequest;
use crate::domain::shared::CustomerId;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

/// Settle a Due bill
pub async fn pay_bill(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    payload: Result<Json<PayBillRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ApiError> {
    let Json(req) = payload?;
    info!("API: Paying bill {} for customer {}", req.bill_id, req.customer_id);

    let customer_id = CustomerId::parse(&req.customer_id)?;
    let bill_id = parse_bill_id(&req.bill_id)?;
    let receipt = state.payments.pay(&caller, customer_id, bill_id).await?;

    record_payment(receipt.payment.method.as_str());
    info!(
        "API: Recorded {} payment {} for bill {}",
        receipt.payment.method, receipt.payment.id, bill_id
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}

/// Filtered payment listing
pub async fn list_payments(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    query: Result<Query<PaymentListRequest>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ApiError> {
    let Query(request) = query?;
    info!("API: Listing payments ({:?})", request);

    let payments = state.payments.list(&caller, &request).await?;
    Ok(Json(ApiResponse::success(payments)))
}

/// Most recent payment of a customer
pub async fn last_payment(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<ApiResponse<PaymentReceipt>>, ApiError> {
    info!("API: Getting last payment for customer {}", customer_id);

    let receipt = state.payments.last_payment(&customer_id).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

/// Printable payment receipt
pub async fn export_receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    info!("API: Exporting receipt for payment {}", id);

    let (receipt, customer) = state.payments.receipt(&id).await?;
    let document = state.exporter.render_receipt(&receipt, &customer)?;
    Ok(([(header::CONTENT_TYPE, state.exporter.content_type())], document).into_response())
}
