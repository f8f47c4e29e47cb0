//! PostgreSQL implementation of BillRepository

use super::database::is_unique_violation;
use crate::domain::bill::{Bill, BillRepository, BillStatus, MonthWindow};
use crate::domain::query::{BillFilter, SortDirection};
use crate::domain::shared::{BillId, CustomerId, DomainError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};
use uuid::Uuid;

const BILL_COLUMNS: &str =
    "id, customer_id, issue_date, units, amount, status, created_at, updated_at";

#[derive(FromRow)]
struct BillRow {
    id: Uuid,
    customer_id: Uuid,
    issue_date: NaiveDate,
    units: i64,
    amount: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = DomainError;

    fn try_from(r: BillRow) -> Result<Self> {
        let status = r.status.parse::<BillStatus>().map_err(|_| {
            DomainError::StoreFailure(format!("bill {} has unknown status '{}'", r.id, r.status))
        })?;
        let units = u32::try_from(r.units).map_err(|_| {
            DomainError::StoreFailure(format!("bill {} has out-of-range units {}", r.id, r.units))
        })?;

        Ok(Bill {
            id: BillId::from_uuid(r.id),
            customer_id: CustomerId::from_uuid(r.customer_id),
            date: r.issue_date,
            units,
            amount: r.amount,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_bills(rows: Vec<BillRow>) -> Result<Vec<Bill>> {
    rows.into_iter().map(Bill::try_from).collect()
}

pub struct PgBillRepository {
    pool: PgPool,
}

impl PgBillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillRepository for PgBillRepository {
    async fn create_monthly(&self, bill: &Bill, window: &MonthWindow) -> Result<()> {
        debug!("Creating bill {} for customer {}", bill.id, bill.customer_id);

        sqlx::query(
            r#"
            INSERT INTO bills (
                id, customer_id, issue_date, billing_month,
                units, amount, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(bill.id.as_uuid())
        .bind(bill.customer_id.as_uuid())
        .bind(bill.date)
        .bind(window.first_day())
        .bind(i64::from(bill.units))
        .bind(bill.amount)
        .bind(bill.status.as_str())
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "bills_one_per_month") {
                return DomainError::Conflict(format!(
                    "Bill already exists for the month of {}",
                    window.month_name()
                ));
            }
            error!("Failed to create bill: {}", e);
            DomainError::store(e)
        })?;

        debug!("Bill created successfully: {}", bill.id);
        Ok(())
    }

    async fn find_by_id(&self, id: BillId) -> Result<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE id = $1",
            BILL_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get bill: {}", e);
            DomainError::store(e)
        })?;

        row.map(Bill::try_from).transpose()
    }

    async fn find_for_customer(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
    ) -> Result<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE id = $1 AND customer_id = $2",
            BILL_COLUMNS
        ))
        .bind(bill_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get bill for customer: {}", e);
            DomainError::store(e)
        })?;

        row.map(Bill::try_from).transpose()
    }

    async fn find_in_window(
        &self,
        customer_id: CustomerId,
        window: &MonthWindow,
    ) -> Result<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE customer_id = $1 AND created_at >= $2 AND created_at < $3 LIMIT 1",
            BILL_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to look up monthly bill: {}", e);
            DomainError::store(e)
        })?;

        row.map(Bill::try_from).transpose()
    }

    async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE customer_id = $1 ORDER BY issue_date DESC, created_at DESC",
            BILL_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list customer bills: {}", e);
            DomainError::store(e)
        })?;

        into_bills(rows)
    }

    async fn update_due(
        &self,
        customer_id: CustomerId,
        bill_id: BillId,
        units: u32,
        amount: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Bill>> {
        debug!("Updating bill: {}", bill_id);

        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills
            SET units = $3, amount = $4, updated_at = $5
            WHERE id = $1 AND customer_id = $2 AND status = 'Due'
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(bill_id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(i64::from(units))
        .bind(amount)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update bill: {}", e);
            DomainError::store(e)
        })?;

        row.map(Bill::try_from).transpose()
    }

    async fn delete_due(&self, customer_id: CustomerId, bill_id: BillId) -> Result<Option<Bill>> {
        debug!("Deleting bill: {}", bill_id);

        let row = sqlx::query_as::<_, BillRow>(&format!(
            "DELETE FROM bills WHERE id = $1 AND customer_id = $2 AND status = 'Due' RETURNING {}",
            BILL_COLUMNS
        ))
        .bind(bill_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to delete bill: {}", e);
            DomainError::store(e)
        })?;

        row.map(Bill::try_from).transpose()
    }

    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        debug!("Listing bills with filter: {:?}", filter);

        if filter.customer_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bills WHERE TRUE", BILL_COLUMNS));

        if let Some(ids) = &filter.customer_ids {
            let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
            query.push(" AND customer_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(range) = filter.date_range {
            query
                .push(" AND issue_date BETWEEN ")
                .push_bind(range.min)
                .push(" AND ")
                .push_bind(range.max);
        }
        if let Some(range) = filter.amount_range {
            query
                .push(" AND amount BETWEEN ")
                .push_bind(range.min)
                .push(" AND ")
                .push_bind(range.max);
        }
        if let Some(range) = filter.unit_range {
            query
                .push(" AND units BETWEEN ")
                .push_bind(i64::from(range.min))
                .push(" AND ")
                .push_bind(i64::from(range.max));
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }

        query.push(" ORDER BY ");
        for key in &filter.sort {
            query.push(key.field.column()).push(match key.direction {
                SortDirection::Ascending => " ASC, ",
                SortDirection::Descending => " DESC, ",
            });
        }
        query.push("created_at ASC");

        let rows = query
            .build_query_as::<BillRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to list bills: {}", e);
                DomainError::store(e)
            })?;

        into_bills(rows)
    }
}
