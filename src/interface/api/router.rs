//! API Router configuration

use super::bill_handler::{
    create_bill, delete_bill, export_bill, get_bill, get_customer_bills, list_bills, update_bill,
};
use super::customer_handler::{get_customer, health_check, list_customers, register_customer};
use super::metrics_handler::{metrics_handler, track_http};
use super::payment_handler::{export_receipt, last_payment, list_payments, pay_bill};
use super::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    // Health check route (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    let customer_routes = Router::new()
        .route("/customers", post(register_customer).get(list_customers))
        .route("/customers/:id", get(get_customer));

    let bill_routes = Router::new()
        .route(
            "/bills",
            get(list_bills)
                .post(create_bill)
                .patch(update_bill)
                .delete(delete_bill),
        )
        .route("/bills/:id", get(get_bill))
        .route("/bills/:id/document", get(export_bill))
        .route("/bills/user/:id", get(get_customer_bills));

    let payment_routes = Router::new()
        .route("/payments", get(list_payments).post(pay_bill))
        .route("/payments/:customer_id", get(last_payment))
        .route("/payments/receipt/:id", get(export_receipt));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .merge(health_routes)
        .merge(customer_routes)
        .merge(bill_routes)
        .merge(payment_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(middleware::from_fn(track_http))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
