//! Bill lifecycle manager
//!
//! Owns creation (one bill per customer per calendar month), re-pricing while a
//! bill is Due, and deletion of Due bills. Paid bills are immutable.

use super::entity::{Bill, CustomerBills, MonthWindow};
use super::repository::BillRepository;
use crate::domain::auth::Caller;
use crate::domain::customer::{Customer, CustomerService};
use crate::domain::query::{BillListRequest, QueryFilterBuilder};
use crate::domain::shared::{BillId, Clock, CustomerId, DomainError, Result};
use crate::domain::tariff::TariffTable;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct BillService {
    bills: Arc<dyn BillRepository>,
    customers: CustomerService,
    filters: QueryFilterBuilder,
    tariff: TariffTable,
    clock: Arc<dyn Clock>,
}

impl BillService {
    pub fn new(
        bills: Arc<dyn BillRepository>,
        customers: CustomerService,
        filters: QueryFilterBuilder,
        tariff: TariffTable,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bills,
            customers,
            filters,
            tariff,
            clock,
        }
    }

    /// Issue this month's bill for a customer
    pub async fn create(&self, caller: &Caller, customer_id: CustomerId, units: u32) -> Result<Bill> {
        caller.authorize(customer_id)?;
        let customer = self.customers.require(customer_id).await?;

        let now = self.clock.now();
        let window = MonthWindow::containing(now);

        if let Some(existing) = self.bills.find_in_window(customer_id, &window).await? {
            debug!("Customer {} already billed this month: {}", customer_id, existing.id);
            return Err(month_conflict(&window));
        }

        let bill = Bill::issue(&customer, units, &self.tariff, now);
        self.bills.create_monthly(&bill, &window).await?;

        info!(
            "Created bill {} for customer {} ({} units, amount {})",
            bill.id, customer_id, bill.units, bill.amount
        );
        Ok(bill)
    }

    /// Re-price a Due bill from a new unit reading and the customer's current
    /// connection type
    pub async fn update(
        &self,
        caller: &Caller,
        customer_id: CustomerId,
        bill_id: BillId,
        units: u32,
    ) -> Result<Bill> {
        caller.authorize(customer_id)?;
        let customer = self.customers.require(customer_id).await?;

        let bill = self.require_for_customer(customer_id, bill_id).await?;
        if bill.is_paid() {
            return Err(DomainError::Conflict(format!(
                "bill {} is paid and can't be modified",
                bill_id
            )));
        }

        let amount = self.tariff.rate(f64::from(units), &customer.connection_type);
        let updated = self
            .bills
            .update_due(customer_id, bill_id, units, amount, self.clock.now())
            .await?
            .ok_or_else(|| {
                warn!("Bill {} stopped being due during update", bill_id);
                DomainError::Conflict(format!("bill {} is no longer due", bill_id))
            })?;

        info!("Updated bill {}: {} units, amount {}", bill_id, units, amount);
        Ok(updated)
    }

    /// Delete a bill that has not been paid
    pub async fn delete(&self, caller: &Caller, customer_id: CustomerId, bill_id: BillId) -> Result<Bill> {
        caller.authorize(customer_id)?;
        self.customers.require(customer_id).await?;

        let bill = self.require_for_customer(customer_id, bill_id).await?;
        if bill.is_paid() {
            return Err(DomainError::Conflict(
                "can't delete, transaction found for the bill".to_string(),
            ));
        }

        let deleted = self
            .bills
            .delete_due(customer_id, bill_id)
            .await?
            .ok_or_else(|| {
                DomainError::Conflict("can't delete, transaction found for the bill".to_string())
            })?;

        info!("Deleted bill {} of customer {}", bill_id, customer_id);
        Ok(deleted)
    }

    /// List bills visible to `caller`
    pub async fn list(&self, caller: &Caller, request: &BillListRequest) -> Result<Vec<Bill>> {
        let filter = self.filters.bill_filter(caller, request).await?;
        debug!("Listing bills with filter: {:?}", filter);
        self.bills.list(&filter).await
    }

    /// Fetch a bill; a malformed id is simply not found
    pub async fn get_by_id(&self, raw_id: &str) -> Result<Bill> {
        let id = BillId::parse(raw_id)
            .map_err(|_| DomainError::NotFound(format!("bill not found, invalid bill no '{}'", raw_id)))?;

        self.bills
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("bill {} not found", id)))
    }

    /// All bills of a customer given by id or email, newest first
    pub async fn get_by_customer(&self, id_or_email: &str) -> Result<CustomerBills> {
        let customer = self
            .customers
            .resolve(id_or_email)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("customer '{}' not found", id_or_email)))?;

        let bills = self.bills.list_by_customer(customer.id).await?;
        Ok(CustomerBills { customer, bills })
    }

    /// A bill together with its owner, for document export
    pub async fn with_customer(&self, raw_id: &str) -> Result<(Bill, Customer)> {
        let bill = self.get_by_id(raw_id).await?;
        let customer = self.customers.require(bill.customer_id).await?;
        Ok((bill, customer))
    }

    async fn require_for_customer(&self, customer_id: CustomerId, bill_id: BillId) -> Result<Bill> {
        self.bills
            .find_for_customer(customer_id, bill_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("bill {} doesn't exist", bill_id)))
    }
}

fn month_conflict(window: &MonthWindow) -> DomainError {
    DomainError::Conflict(format!(
        "Bill already exists for the month of {}",
        window.month_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bill::repository::MockBillRepository;
    use crate::domain::bill::BillStatus;
    use crate::domain::customer::repository::MockCustomerRepository;
    use crate::domain::customer::{ConnectionType, NewCustomer};
    use crate::domain::query::FilterDefaults;
    use crate::domain::shared::FixedClock;
    use chrono::{TimeZone, Utc};

    fn customer(ct: ConnectionType) -> Customer {
        Customer::register(
            NewCustomer::new("Nila", "nila@example.com").with_connection_type(ct),
            Utc::now(),
        )
        .unwrap()
    }

    fn service(bills: MockBillRepository, customers: MockCustomerRepository) -> BillService {
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()));
        let customers = CustomerService::new(Arc::new(customers), clock.clone());
        let filters = QueryFilterBuilder::new(customers.clone(), FilterDefaults::default(), clock.clone());
        BillService::new(Arc::new(bills), customers, filters, TariffTable::default(), clock)
    }

    fn customers_with(customer: Customer) -> MockCustomerRepository {
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(customer.clone())));
        repo
    }

    #[tokio::test]
    async fn test_create_conflict_names_month() {
        let c = customer(ConnectionType::Domestic);
        let existing = Bill::issue(&c, 5, &TariffTable::default(), Utc::now());
        let mut bills = MockBillRepository::new();
        bills
            .expect_find_in_window()
            .returning(move |_, _| Ok(Some(existing.clone())));
        bills.expect_create_monthly().never();

        let err = service(bills, customers_with(c.clone()))
            .create(&Caller::customer(c.id), c.id, 10)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::Conflict("Bill already exists for the month of March".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_unknown_customer() {
        let mut customers = MockCustomerRepository::new();
        customers.expect_find_by_id().returning(|_| Ok(None));

        let id = CustomerId::new();
        let err = service(MockBillRepository::new(), customers)
            .create(&Caller::admin(CustomerId::new()), id, 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_create_for_someone_else_is_forbidden() {
        let err = service(MockBillRepository::new(), MockCustomerRepository::new())
            .create(&Caller::customer(CustomerId::new()), CustomerId::new(), 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn test_update_uses_current_connection_type() {
        let mut c = customer(ConnectionType::Domestic);
        let bill = Bill::issue(&c, 10, &TariffTable::default(), Utc::now());
        c.connection_type = ConnectionType::Workshop;

        let found = bill.clone();
        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(found.clone())));
        bills
            .expect_update_due()
            .withf(|_, _, units, amount, _| *units == 20 && *amount == 220.0)
            .returning(move |_, _, units, amount, at| {
                let mut updated = bill.clone();
                updated.units = units;
                updated.amount = amount;
                updated.updated_at = at;
                Ok(Some(updated))
            });

        let updated = service(bills, customers_with(c.clone()))
            .update(&Caller::customer(c.id), c.id, BillId::new(), 20)
            .await
            .unwrap();
        assert_eq!(updated.amount, 220.0);
        assert_eq!(updated.status, BillStatus::Due);
    }

    #[tokio::test]
    async fn test_update_paid_bill_conflicts() {
        let c = customer(ConnectionType::Domestic);
        let mut paid = Bill::issue(&c, 10, &TariffTable::default(), Utc::now());
        paid.status = BillStatus::Paid;

        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(paid.clone())));
        bills.expect_update_due().never();

        let err = service(bills, customers_with(c.clone()))
            .update(&Caller::admin(c.id), c.id, BillId::new(), 20)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn test_update_missing_bill_is_not_found() {
        let c = customer(ConnectionType::Domestic);
        let mut bills = MockBillRepository::new();
        bills.expect_find_for_customer().returning(|_, _| Ok(None));

        let err = service(bills, customers_with(c.clone()))
            .update(&Caller::customer(c.id), c.id, BillId::new(), 20)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_delete_lost_race_is_conflict() {
        let c = customer(ConnectionType::Domestic);
        let due = Bill::issue(&c, 10, &TariffTable::default(), Utc::now());
        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(due.clone())));
        bills.expect_delete_due().returning(|_, _| Ok(None));

        let err = service(bills, customers_with(c.clone()))
            .delete(&Caller::customer(c.id), c.id, BillId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn test_get_by_id_malformed_is_not_found() {
        let err = service(MockBillRepository::new(), MockCustomerRepository::new())
            .get_by_id("65f1c0ffee")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
