//! Bill repository interface

use super::entity::{Bill, MonthWindow};
use crate::domain::query::BillFilter;
use crate::domain::shared::{BillId, CustomerId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Bill store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillRepository: Send + Sync {
    /// Insert `bill` unless its customer already has a bill created inside
    /// `window`. The check and the insert are atomic; a clash is a `Conflict`.
    async fn create_monthly(&self, bill: &Bill, window: &MonthWindow) -> Result<()>;

    /// Find bill by ID
    async fn find_by_id(&self, id: BillId) -> Result<Option<Bill>>;

    /// Find a bill only if it belongs to `customer_id`
    async fn find_for_customer(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
    ) -> Result<Option<Bill>>;

    /// The customer's bill created inside `window`, if any
    async fn find_in_window(
        &self,
        customer_id: CustomerId,
        window: &MonthWindow,
    ) -> Result<Option<Bill>>;

    /// All bills of a customer ordered by issue date, newest first
    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Bill>>;

    /// Overwrite units and amount of a bill that is still Due.
    /// Returns `None` when no Due bill matched.
    async fn update_due(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
        units: u32,
        amount: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Bill>>;

    /// Remove a bill that is still Due. Returns `None` when no Due bill matched.
    async fn delete_due(&self, customer_id: CustomerId, bill_id: BillId) -> Result<Option<Bill>>;

    /// Bills matching every criterion of `filter`
    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>>;
}
