//! REST API over the billing services

pub mod bill_handler;
pub mod customer_handler;
pub mod dto;
pub mod error;
pub mod extract;
pub mod metrics_handler;
pub mod payment_handler;
pub mod router;
pub mod state;

pub use dto::ApiResponse;
pub use error::ApiError;
pub use extract::{AuthenticatedCaller, AUTH_HEADER};
pub use metrics_handler::init_metrics;
pub use router::build_router;
pub use state::{AppState, Repositories};
