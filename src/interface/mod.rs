//! Interface layer - External interfaces
//!
//! This layer handles:
//! - REST API endpoints
//! - Caller authentication
//! - Request/response formatting

pub mod api;
