//! Customer lookups shared by the billing services

use super::entity::{normalize_email, Customer, NewCustomer};
use super::repository::CustomerRepository;
use crate::domain::shared::{Clock, CustomerId, DomainError, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CustomerService {
    repository: Arc<dyn CustomerRepository>,
    clock: Arc<dyn Clock>,
}

impl CustomerService {
    pub fn new(repository: Arc<dyn CustomerRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Register a new account; the email must not be in use
    pub async fn register(&self, data: NewCustomer) -> Result<Customer> {
        let customer = Customer::register(data, self.clock.now())?;

        if self.repository.find_by_email(&customer.email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "customer with email {} already exists",
                customer.email
            )));
        }

        self.repository.create(&customer).await?;
        info!("Registered customer {} ({})", customer.id, customer.email);
        Ok(customer)
    }

    /// Look up a customer by a textual identity
    pub async fn get(&self, raw_id: &str) -> Result<Customer> {
        let id = CustomerId::parse(raw_id)?;
        self.require(id).await
    }

    /// Load a customer that must exist
    pub async fn require(&self, id: CustomerId) -> Result<Customer> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("customer {} doesn't exist", id)))
    }

    /// Resolve a search term: anything with an `@` is an email, the rest an id.
    /// A malformed id resolves to nothing rather than an error.
    pub async fn resolve(&self, term: &str) -> Result<Option<Customer>> {
        let term = term.trim();
        if term.contains('@') {
            debug!("Resolving customer by email {}", term);
            return self.repository.find_by_email(&normalize_email(term)).await;
        }

        match CustomerId::parse(term) {
            Ok(id) => self.repository.find_by_id(id).await,
            Err(_) => {
                debug!("Search term '{}' is not a customer id", term);
                Ok(None)
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Customer>> {
        self.repository.list().await
    }

    pub(crate) fn repository(&self) -> &Arc<dyn CustomerRepository> {
        &self.repository
    }
}
