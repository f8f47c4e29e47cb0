//! Customer API handlers

use super::dto::{ApiResponse, HealthResponse};
use super::error::ApiError;
use super::extract::AuthenticatedCaller;
use super::state::AppState;
use crate::domain::customer::{Customer, NewCustomer};
use crate::domain::shared::DomainError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// Liveness probe
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Register a customer
pub async fn register_customer(
    State(state): State<AppState>,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>), ApiError> {
    let Json(req) = payload?;
    info!("API: Registering customer {}", req.email);

    let customer = state.customers.register(req).await?;
    info!("API: Registered customer {} (ID: {})", customer.email, customer.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(customer))))
}

/// Look a customer up by id
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Customer>>, ApiError> {
    info!("API: Getting customer ID: {}", id);

    let customer = state.customers.get(&id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

/// List all customers; administrators only
pub async fn list_customers(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<ApiResponse<Vec<Customer>>>, ApiError> {
    info!("API: Listing customers for {}", caller.customer_id);

    if !caller.is_admin {
        return Err(DomainError::Forbidden("only administrators can list customers".to_string()).into());
    }

    let customers = state.customers.list().await?;
    Ok(Json(ApiResponse::success(customers)))
}
