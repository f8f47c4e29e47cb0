//! Payment processor

use super::entity::{Payment, PaymentMethod, PaymentReceipt};
use super::repository::PaymentRepository;
use crate::domain::auth::Caller;
use crate::domain::bill::BillRepository;
use crate::domain::customer::{Customer, CustomerService};
use crate::domain::query::{PaymentListRequest, QueryFilterBuilder};
use crate::domain::shared::{BillId, Clock, CustomerId, DomainError, PaymentId, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    bills: Arc<dyn BillRepository>,
    customers: CustomerService,
    filters: QueryFilterBuilder,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        bills: Arc<dyn BillRepository>,
        customers: CustomerService,
        filters: QueryFilterBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payments,
            bills,
            customers,
            filters,
            clock,
        }
    }

    /// Settle a Due bill in full.
    ///
    /// The bill must belong to `customer_id`. Administrators record offline
    /// payments; customers paying for themselves pay online.
    pub async fn pay(&self, caller: &Caller, customer_id: CustomerId, bill_id: BillId) -> Result<PaymentReceipt> {
        caller.authorize(customer_id)?;
        let customer = self.customers.require(customer_id).await?;

        let bill = self
            .bills
            .find_for_customer(customer_id, bill_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("bill {} doesn't exist", bill_id)))?;

        if bill.is_paid() {
            return Err(match self.payments.find_by_bill(bill_id).await? {
                Some(existing) => DomainError::Conflict(format!(
                    "bill {} is already paid by payment {}",
                    bill_id, existing.id
                )),
                None => DomainError::Conflict(format!("bill {} is already paid", bill_id)),
            });
        }

        let method = PaymentMethod::for_caller(caller.is_admin);
        let payment = Payment::settling(&bill, method, self.clock.now());
        self.payments.settle(&payment).await?;

        info!(
            "Recorded {} payment {} of {} for bill {}",
            method, payment.id, payment.amount, bill_id
        );
        Ok(PaymentReceipt::new(payment, &customer, bill.units))
    }

    /// The customer's most recent payment
    pub async fn last_payment(&self, raw_customer_id: &str) -> Result<PaymentReceipt> {
        let customer = self.customers.get(raw_customer_id).await?;

        let payment = self
            .payments
            .latest_for_customer(customer.id)
            .await?
            .ok_or_else(|| DomainError::NotFound("no payment record found".to_string()))?;

        self.enrich(payment, &customer).await
    }

    /// A payment receipt together with the paying customer, for export
    pub async fn receipt(&self, raw_id: &str) -> Result<(PaymentReceipt, Customer)> {
        let id = PaymentId::parse(raw_id)
            .map_err(|_| DomainError::NotFound(format!("payment '{}' not found", raw_id)))?;

        let payment = self
            .payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("payment {} not found", id)))?;
        let customer = self.customers.require(payment.customer_id).await?;
        let receipt = self.enrich(payment, &customer).await?;
        Ok((receipt, customer))
    }

    /// List payments visible to `caller`
    pub async fn list(&self, caller: &Caller, request: &PaymentListRequest) -> Result<Vec<Payment>> {
        let filter = self.filters.payment_filter(caller, request).await?;
        debug!("Listing payments with filter: {:?}", filter);
        self.payments.list(&filter).await
    }

    async fn enrich(&self, payment: Payment, customer: &Customer) -> Result<PaymentReceipt> {
        let bill = self.bills.find_by_id(payment.bill_id).await?.ok_or_else(|| {
            DomainError::NotFound(format!(
                "bill {} referenced by payment {} not found",
                payment.bill_id, payment.id
            ))
        })?;
        Ok(PaymentReceipt::new(payment, customer, bill.units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bill::repository::MockBillRepository;
    use crate::domain::bill::{Bill, BillStatus};
    use crate::domain::customer::repository::MockCustomerRepository;
    use crate::domain::customer::NewCustomer;
    use crate::domain::payment::repository::MockPaymentRepository;
    use crate::domain::query::FilterDefaults;
    use crate::domain::shared::SystemClock;
    use crate::domain::tariff::TariffTable;
    use chrono::Utc;

    fn customer() -> Customer {
        Customer::register(NewCustomer::new("Arun", "arun@example.com"), Utc::now()).unwrap()
    }

    fn service(
        payments: MockPaymentRepository,
        bills: MockBillRepository,
        customer: Option<Customer>,
    ) -> PaymentService {
        let mut customers = MockCustomerRepository::new();
        customers
            .expect_find_by_id()
            .returning(move |_| Ok(customer.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let customers = CustomerService::new(Arc::new(customers), clock.clone());
        let filters = QueryFilterBuilder::new(customers.clone(), FilterDefaults::default(), clock.clone());
        PaymentService::new(Arc::new(payments), Arc::new(bills), customers, filters, clock)
    }

    #[tokio::test]
    async fn test_pay_copies_amount_and_sets_method() {
        let c = customer();
        let bill = Bill::issue(&c, 15, &TariffTable::default(), Utc::now());
        let bill_id = bill.id;

        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(bill.clone())));
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_settle()
            .withf(move |p| p.bill_id == bill_id && p.amount == 120.0 && p.method == PaymentMethod::Offline)
            .times(1)
            .returning(|_| Ok(()));

        let receipt = service(payments, bills, Some(c.clone()))
            .pay(&Caller::admin(CustomerId::new()), c.id, bill_id)
            .await
            .unwrap();
        assert_eq!(receipt.payment.method, PaymentMethod::Offline);
        assert_eq!(receipt.customer_name, "Arun");
        assert_eq!(receipt.units, 15);
    }

    #[tokio::test]
    async fn test_pay_other_customers_bill_is_not_found() {
        let c = customer();
        let mut bills = MockBillRepository::new();
        bills.expect_find_for_customer().returning(|_, _| Ok(None));
        let mut payments = MockPaymentRepository::new();
        payments.expect_settle().never();

        let err = service(payments, bills, Some(c.clone()))
            .pay(&Caller::customer(c.id), c.id, BillId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_pay_paid_bill_conflicts() {
        let c = customer();
        let mut bill = Bill::issue(&c, 15, &TariffTable::default(), Utc::now());
        let first = Payment::settling(&bill, PaymentMethod::Online, Utc::now());
        let first_id = first.id;
        bill.status = BillStatus::Paid;
        let bill_id = bill.id;
        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(bill.clone())));
        let mut payments = MockPaymentRepository::new();
        payments.expect_settle().never();
        payments
            .expect_find_by_bill()
            .withf(move |id| *id == bill_id)
            .returning(move |_| Ok(Some(first.clone())));

        let err = service(payments, bills, Some(c.clone()))
            .pay(&Caller::customer(c.id), c.id, bill_id)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::Conflict(format!("bill {} is already paid by payment {}", bill_id, first_id))
        );
    }

    #[tokio::test]
    async fn test_settle_failure_is_surfaced() {
        let c = customer();
        let bill = Bill::issue(&c, 15, &TariffTable::default(), Utc::now());
        let mut bills = MockBillRepository::new();
        bills
            .expect_find_for_customer()
            .returning(move |_, _| Ok(Some(bill.clone())));
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_settle()
            .returning(|_| Err(DomainError::StoreFailure("transaction aborted".to_string())));

        let err = service(payments, bills, Some(c.clone()))
            .pay(&Caller::customer(c.id), c.id, BillId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store_failure");
    }

    #[tokio::test]
    async fn test_last_payment_errors() {
        let svc = service(MockPaymentRepository::new(), MockBillRepository::new(), None);
        assert_eq!(
            svc.last_payment("abc").await.unwrap_err().kind(),
            "invalid_identity"
        );
        assert_eq!(
            svc.last_payment(&CustomerId::new().to_string())
                .await
                .unwrap_err()
                .kind(),
            "not_found"
        );

        let mut payments = MockPaymentRepository::new();
        payments.expect_latest_for_customer().returning(|_| Ok(None));
        let svc = service(payments, MockBillRepository::new(), Some(customer()));
        let err = svc
            .last_payment(&CustomerId::new().to_string())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("no payment record found".to_string()));
    }
}
