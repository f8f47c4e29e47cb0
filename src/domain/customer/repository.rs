//! Customer repository interface

use super::entity::{ConnectionType, Customer};
use crate::domain::shared::{CustomerId, Result};
use async_trait::async_trait;

/// Identity store consumed by the billing core
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Persist a new customer; fails with `Conflict` when the email is taken
    async fn create(&self, customer: &Customer) -> Result<()>;

    /// Find customer by ID
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Find customer by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// All customers on the given connection type
    async fn find_all_by_connection_type(
        &self,
        connection_type: &ConnectionType,
    ) -> Result<Vec<Customer>>;

    /// List all customers
    async fn list(&self) -> Result<Vec<Customer>>;
}
