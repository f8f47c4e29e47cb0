//! Bill API handlers

use super::dto::{ApiResponse, CreateBillRequest, DeleteBillRequest, UpdateBillRequest};
use super::error::ApiError;
use super::extract::AuthenticatedCaller;
use super::metrics_handler::{record_bill_created, record_bill_deleted};
use super::state::AppState;
use crate::domain::bill::{whole_units, Bill, CustomerBills};
use crate::domain::query::BillListRequest;
use crate::domain::shared::{BillId, CustomerId, DomainError};
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

/// Bill numbers that do not parse cannot name an existing bill
pub(super) fn parse_bill_id(raw: &str) -> Result<BillId, DomainError> {
    BillId::parse(raw).map_err(|_| DomainError::NotFound(format!("bill '{}' doesn't exist", raw)))
}

/// Issue this month's bill
pub async fn create_bill(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    payload: Result<Json<CreateBillRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Bill>>), ApiError> {
    let Json(req) = payload?;
    info!("API: Creating bill for customer {}", req.customer_id);

    let customer_id = CustomerId::parse(&req.customer_id)?;
    let units = whole_units(req.units)?;
    let bill = state.bills.create(&caller, customer_id, units).await?;

    record_bill_created();
    info!("API: Created bill {} (amount: {})", bill.id, bill.amount);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(bill))))
}

/// Re-price a Due bill
pub async fn update_bill(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    payload: Result<Json<UpdateBillRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    let Json(req) = payload?;
    info!("API: Updating bill {}", req.bill_id);

    let customer_id = CustomerId::parse(&req.customer_id)?;
    let bill_id = parse_bill_id(&req.bill_id)?;
    let units = whole_units(req.units)?;
    let bill = state.bills.update(&caller, customer_id, bill_id, units).await?;

    info!("API: Updated bill {} (amount: {})", bill.id, bill.amount);
    Ok(Json(ApiResponse::success(bill)))
}

/// Delete a Due bill
pub async fn delete_bill(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    payload: Result<Json<DeleteBillRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    let Json(req) = payload?;
    info!("API: Deleting bill {}", req.bill_id);

    let customer_id = CustomerId::parse(&req.customer_id)?;
    let bill_id = parse_bill_id(&req.bill_id)?;
    let bill = state.bills.delete(&caller, customer_id, bill_id).await?;

    record_bill_deleted();
    info!("API: Deleted bill {}", bill.id);
    Ok(Json(ApiResponse::success(bill)))
}

/// Filtered bill listing
pub async fn list_bills(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    query: Result<Query<BillListRequest>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Bill>>>, ApiError> {
    let Query(request) = query?;
    info!("API: Listing bills ({:?})", request);

    let bills = state.bills.list(&caller, &request).await?;
    Ok(Json(ApiResponse::success(bills)))
}

/// Get bill by id
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    info!("API: Getting bill ID: {}", id);

    let bill = state.bills.get_by_id(&id).await?;
    Ok(Json(ApiResponse::success(bill)))
}

/// All bills of a customer, by id or email
pub async fn get_customer_bills(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CustomerBills>>, ApiError> {
    info!("API: Getting bills for customer {}", id);

    let bills = state.bills.get_by_customer(&id).await?;
    Ok(Json(ApiResponse::success(bills)))
}

/// Printable bill document
pub async fn export_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    info!("API: Exporting bill {}", id);

    let (bill, customer) = state.bills.with_customer(&id).await?;
    let document = state.exporter.render_bill(&bill, &customer)?;
    Ok(([(header::CONTENT_TYPE, state.exporter.content_type())], document).into_response())
}
