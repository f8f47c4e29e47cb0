//! Shared handler state

use crate::domain::auth::Authenticator;
use crate::domain::bill::{BillRepository, BillService};
use crate::domain::customer::{CustomerRepository, CustomerService};
use crate::domain::export::{DocumentExporter, HtmlDocumentExporter};
use crate::domain::payment::{PaymentRepository, PaymentService};
use crate::domain::query::{FilterDefaults, QueryFilterBuilder};
use crate::domain::shared::Clock;
use crate::domain::tariff::TariffTable;
use std::sync::Arc;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub customers: CustomerService,
    pub bills: BillService,
    pub payments: PaymentService,
    pub authenticator: Arc<dyn Authenticator>,
    pub exporter: Arc<dyn DocumentExporter>,
}

/// Storage ports the services are wired against
pub struct Repositories {
    pub customers: Arc<dyn CustomerRepository>,
    pub bills: Arc<dyn BillRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

impl AppState {
    /// Wire the services over a set of repositories
    pub fn new(
        repositories: Repositories,
        authenticator: Arc<dyn Authenticator>,
        tariff: TariffTable,
        filter_defaults: FilterDefaults,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let customers = CustomerService::new(repositories.customers, clock.clone());
        let filters = QueryFilterBuilder::new(customers.clone(), filter_defaults, clock.clone());
        let bills = BillService::new(
            repositories.bills.clone(),
            customers.clone(),
            filters.clone(),
            tariff,
            clock.clone(),
        );
        let payments = PaymentService::new(
            repositories.payments,
            repositories.bills,
            customers.clone(),
            filters,
            clock,
        );

        Self {
            customers,
            bills,
            payments,
            authenticator,
            exporter: Arc::new(HtmlDocumentExporter),
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn DocumentExporter>) -> Self {
        self.exporter = exporter;
        self
    }
}
