//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Repository implementations (in-memory and PostgreSQL)
//! - Connection pooling and migrations

pub mod persistence;
