//! Persistence implementations

pub mod memory;
#[cfg(feature = "postgres")]
pub mod bill_repository;
#[cfg(feature = "postgres")]
pub mod customer_repository;
#[cfg(feature = "postgres")]
pub mod database;
#[cfg(feature = "postgres")]
pub mod payment_repository;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use bill_repository::PgBillRepository;
#[cfg(feature = "postgres")]
pub use customer_repository::PgCustomerRepository;
#[cfg(feature = "postgres")]
pub use database::{create_pool, run_migrations};
#[cfg(feature = "postgres")]
pub use payment_repository::PgPaymentRepository;
