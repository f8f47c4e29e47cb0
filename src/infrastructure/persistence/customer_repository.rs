//! PostgreSQL implementation of CustomerRepository

use super::database::is_unique_violation;
use crate::domain::customer::{Address, ConnectionType, Customer, CustomerRepository};
use crate::domain::shared::{CustomerId, DomainError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str = "id, customer_name, email, phone_no, house_no, street, city, \
     district, country, pincode, connection_type, is_admin, created_at, updated_at";

#[derive(FromRow)]
struct CustomerRow {
    id: Uuid,
    customer_name: String,
    email: String,
    phone_no: Option<String>,
    house_no: Option<String>,
    street: Option<String>,
    city: Option<String>,
    district: Option<String>,
    country: Option<String>,
    pincode: Option<String>,
    connection_type: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(r.id),
            customer_name: r.customer_name,
            email: r.email,
            phone_no: r.phone_no,
            address: Address {
                house_no: r.house_no,
                street: r.street,
                city: r.city,
                district: r.district,
                country: r.country,
                pincode: r.pincode,
            },
            connection_type: ConnectionType::parse(&r.connection_type),
            is_admin: r.is_admin,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn create(&self, customer: &Customer) -> Result<()> {
        debug!("Creating customer: {}", customer.email);

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, customer_name, email, phone_no,
                house_no, street, city, district, country, pincode,
                connection_type, is_admin, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.customer_name)
        .bind(&customer.email)
        .bind(&customer.phone_no)
        .bind(&customer.address.house_no)
        .bind(&customer.address.street)
        .bind(&customer.address.city)
        .bind(&customer.address.district)
        .bind(&customer.address.country)
        .bind(&customer.address.pincode)
        .bind(customer.connection_type.as_str())
        .bind(customer.is_admin)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "customers_email_key") {
                return DomainError::Conflict(format!(
                    "customer with email {} already exists",
                    customer.email
                ));
            }
            error!("Failed to create customer: {}", e);
            DomainError::store(e)
        })?;

        debug!("Customer created successfully: {}", customer.id);
        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        debug!("Getting customer by id: {}", id);

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get customer: {}", e);
            DomainError::store(e)
        })?;

        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>> {
        debug!("Getting customer by email: {}", email);

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE email = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get customer by email: {}", e);
            DomainError::store(e)
        })?;

        Ok(row.map(Into::into))
    }

    async fn find_all_by_connection_type(
        &self,
        connection_type: &ConnectionType,
    ) -> Result<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE connection_type = $1 ORDER BY created_at",
            CUSTOMER_COLUMNS
        ))
        .bind(connection_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list customers by connection type: {}", e);
            DomainError::store(e)
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers ORDER BY created_at",
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list customers: {}", e);
            DomainError::store(e)
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
