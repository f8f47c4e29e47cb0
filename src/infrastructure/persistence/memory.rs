//! In-memory store
//!
//! All three collections sit behind a single lock, so every guarded write
//! (monthly uniqueness, Due-only update/delete, settlement) is atomic.

use crate::domain::bill::{Bill, BillRepository, BillStatus, MonthWindow};
use crate::domain::customer::{ConnectionType, Customer, CustomerRepository};
use crate::domain::payment::{Payment, PaymentRepository};
use crate::domain::query::{BillFilter, PaymentFilter};
use crate::domain::shared::{BillId, CustomerId, DomainError, PaymentId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    bills: HashMap<BillId, Bill>,
    payments: HashMap<PaymentId, Payment>,
}

impl State {
    fn bill_in_window(&self, customer_id: CustomerId, window: &MonthWindow) -> Option<&Bill> {
        self.bills
            .values()
            .find(|b| b.customer_id == customer_id && window.contains(b.created_at))
    }

    fn due_bill_mut(&mut self, customer_id: CustomerId, bill_id: BillId) -> Option<&mut Bill> {
        self.bills
            .get_mut(&bill_id)
            .filter(|b| b.customer_id == customer_id && b.status == BillStatus::Due)
    }
}

/// Customers, bills and payments held in process memory
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn create(&self, customer: &Customer) -> Result<()> {
        let mut state = self.state.write().await;
        if state.customers.values().any(|c| c.email == customer.email) {
            return Err(DomainError::Conflict(format!(
                "customer with email {} already exists",
                customer.email
            )));
        }
        state.customers.insert(customer.id, customer.clone());
        debug!("Stored customer {}", customer.id);
        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state.customers.values().find(|c| c.email == email).cloned())
    }

    async fn find_all_by_connection_type(
        &self,
        connection_type: &ConnectionType,
    ) -> Result<Vec<Customer>> {
        let state = self.state.read().await;
        Ok(state
            .customers
            .values()
            .filter(|c| &c.connection_type == connection_type)
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Customer>> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state.customers.values().cloned().collect();
        customers.sort_by_key(|c| c.created_at);
        Ok(customers)
    }
}

#[async_trait]
impl BillRepository for InMemoryStore {
    async fn create_monthly(&self, bill: &Bill, window: &MonthWindow) -> Result<()> {
        let mut state = self.state.write().await;
        if state.bill_in_window(bill.customer_id, window).is_some() {
            return Err(DomainError::Conflict(format!(
                "Bill already exists for the month of {}",
                window.month_name()
            )));
        }
        state.bills.insert(bill.id, bill.clone());
        debug!("Stored bill {}", bill.id);
        Ok(())
    }

    async fn find_by_id(&self, id: BillId) -> Result<Option<Bill>> {
        Ok(self.state.read().await.bills.get(&id).cloned())
    }

    async fn find_for_customer(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
    ) -> Result<Option<Bill>> {
        let state = self.state.read().await;
        Ok(state
            .bills
            .get(&bill_id)
            .filter(|b| b.customer_id == customer_id)
            .cloned())
    }

    async fn find_in_window(
        &self,
        customer_id: CustomerId,
        window: &MonthWindow,
    ) -> Result<Option<Bill>> {
        let state = self.state.read().await;
        Ok(state.bill_in_window(customer_id, window).cloned())
    }

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Bill>> {
        let state = self.state.read().await;
        let mut bills: Vec<Bill> = state
            .bills
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect();
        bills.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(bills)
    }

    async fn update_due(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
        units: u32,
        amount: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Bill>> {
        let mut state = self.state.write().await;
        Ok(state.due_bill_mut(customer_id, bill_id).map(|bill| {
            bill.units = units;
            bill.amount = amount;
            bill.updated_at = updated_at;
            bill.clone()
        }))
    }

    async fn delete_due(&self, customer_id: CustomerId, bill_id: BillId) -> Result<Option<Bill>> {
        let mut state = self.state.write().await;
        if state.due_bill_mut(customer_id, bill_id).is_none() {
            return Ok(None);
        }
        Ok(state.bills.remove(&bill_id))
    }

    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        let state = self.state.read().await;
        let mut bills: Vec<Bill> = state
            .bills
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        if filter.sort.is_empty() {
            bills.sort_by_key(|b| b.created_at);
        } else {
            filter.sort(&mut bills);
        }
        Ok(bills)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn settle(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.write().await;

        if state.payments.values().any(|p| p.bill_id == payment.bill_id) {
            return Err(DomainError::Conflict(format!(
                "bill {} already has a payment",
                payment.bill_id
            )));
        }

        let bill = state
            .bills
            .get_mut(&payment.bill_id)
            .filter(|b| b.customer_id == payment.customer_id)
            .ok_or_else(|| DomainError::NotFound(format!("bill {} doesn't exist", payment.bill_id)))?;

        if bill.status != BillStatus::Due {
            return Err(DomainError::Conflict(format!(
                "bill {} is already paid",
                payment.bill_id
            )));
        }

        bill.status = BillStatus::Paid;
        bill.updated_at = payment.created_at;
        state.payments.insert(payment.id, payment.clone());
        debug!("Settled bill {} with payment {}", payment.bill_id, payment.id);
        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn find_by_bill(&self, bill_id: BillId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.bill_id == bill_id)
            .cloned())
    }

    async fn latest_for_customer(&self, customer_id: CustomerId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| {
                let units = state.bills.get(&p.bill_id).map(|b| b.units);
                filter.matches(p, units)
            })
            .cloned()
            .collect();
        if filter.sort.is_empty() {
            payments.sort_by_key(|p| p.created_at);
        } else {
            filter.sort(&mut payments);
        }
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::NewCustomer;
    use crate::domain::payment::PaymentMethod;
    use crate::domain::tariff::TariffTable;
    use chrono::TimeZone;

    async fn seeded() -> (InMemoryStore, Customer) {
        let store = InMemoryStore::new();
        let customer =
            Customer::register(NewCustomer::new("Ila", "ila@example.com"), Utc::now()).unwrap();
        CustomerRepository::create(&store, &customer).await.unwrap();
        (store, customer)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, customer) = seeded().await;
        let mut twin = customer.clone();
        twin.id = CustomerId::new();
        let err = CustomerRepository::create(&store, &twin).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn test_create_monthly_is_unique_per_month() {
        let (store, customer) = seeded().await;
        let tariff = TariffTable::default();
        let march = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let window = MonthWindow::containing(march);

        store
            .create_monthly(&Bill::issue(&customer, 1, &tariff, march), &window)
            .await
            .unwrap();
        let err = store
            .create_monthly(&Bill::issue(&customer, 2, &tariff, march), &window)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let april = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        store
            .create_monthly(
                &Bill::issue(&customer, 3, &tariff, april),
                &MonthWindow::containing(april),
            )
            .await
            .unwrap();
        assert_eq!(store.list_by_customer(customer.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settle_is_single_shot() {
        let (store, customer) = seeded().await;
        let now = Utc::now();
        let bill = Bill::issue(&customer, 10, &TariffTable::default(), now);
        store
            .create_monthly(&bill, &MonthWindow::containing(now))
            .await
            .unwrap();

        let first = Payment::settling(&bill, PaymentMethod::Online, now);
        store.settle(&first).await.unwrap();

        let second = Payment::settling(&bill, PaymentMethod::Offline, now);
        assert_eq!(store.settle(&second).await.unwrap_err().kind(), "conflict");

        let stored = BillRepository::find_by_id(&store, bill.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BillStatus::Paid);
        assert_eq!(store.find_by_bill(bill.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_guarded_writes_skip_paid_bills() {
        let (store, customer) = seeded().await;
        let now = Utc::now();
        let bill = Bill::issue(&customer, 10, &TariffTable::default(), now);
        store
            .create_monthly(&bill, &MonthWindow::containing(now))
            .await
            .unwrap();
        store
            .settle(&Payment::settling(&bill, PaymentMethod::Online, now))
            .await
            .unwrap();

        assert!(store
            .update_due(customer.id, bill.id, 99, 792.0, now)
            .await
            .unwrap()
            .is_none());
        assert!(store.delete_due(customer.id, bill.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settle_rejects_foreign_bill() {
        let (store, customer) = seeded().await;
        let now = Utc::now();
        let bill = Bill::issue(&customer, 10, &TariffTable::default(), now);
        store
            .create_monthly(&bill, &MonthWindow::containing(now))
            .await
            .unwrap();

        let mut payment = Payment::settling(&bill, PaymentMethod::Online, now);
        payment.customer_id = CustomerId::new();
        assert_eq!(store.settle(&payment).await.unwrap_err().kind(), "not_found");
    }
}
