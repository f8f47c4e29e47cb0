//! Powerbill - electricity billing and payment reconciliation
//!
//! A Domain-Driven Design (DDD) service that issues monthly bills from
//! metered units, settles them with payments and answers filtered queries
//! over both.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
