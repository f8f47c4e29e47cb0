//! Domain layer - billing rules and the ports they depend on
//!
//! This layer contains:
//! - Entities: customers, bills, payments
//! - Value Objects: identifiers, connection types, tariffs
//! - Domain Services: billing, payment and query-filter logic
//! - Repository Interfaces: ports for persistence

pub mod auth;
pub mod bill;
pub mod customer;
pub mod export;
pub mod payment;
pub mod query;
pub mod shared;
pub mod tariff;

// Re-export commonly used types
pub use shared::{DomainError, Result};
