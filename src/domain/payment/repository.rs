//! Payment repository interface

use super::entity::Payment;
use crate::domain::query::PaymentFilter;
use crate::domain::shared::{BillId, CustomerId, PaymentId, Result};
use async_trait::async_trait;

/// Payment store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Record `payment` and move its bill from Due to Paid as one atomic step.
    ///
    /// Fails with `NotFound` when the bill does not exist for the payment's
    /// customer and with `Conflict` when the bill is not Due or already has a
    /// payment. On failure nothing is written.
    async fn settle(&self, payment: &Payment) -> Result<()>;

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn find_by_bill(&self, bill_id: BillId) -> Result<Option<Payment>>;

    /// Most recently created payment of a customer
    async fn latest_for_customer(&self, customer_id: CustomerId) -> Result<Option<Payment>>;

    /// Payments matching every criterion of `filter`
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>>;
}
