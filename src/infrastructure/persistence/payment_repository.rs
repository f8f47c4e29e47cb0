//! PostgreSQL implementation of PaymentRepository

use super::database::is_unique_violation;
use crate::domain::payment::{Payment, PaymentMethod, PaymentRepository};
use crate::domain::query::{PaymentFilter, SortDirection};
use crate::domain::shared::{BillId, CustomerId, DomainError, PaymentId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, error, warn};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, customer_id, bill_id, amount, method, created_at";

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    customer_id: Uuid,
    bill_id: Uuid,
    amount: f64,
    method: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(r: PaymentRow) -> Result<Self> {
        let method = r.method.parse::<PaymentMethod>().map_err(|_| {
            DomainError::StoreFailure(format!("payment {} has unknown method '{}'", r.id, r.method))
        })?;

        Ok(Payment {
            id: PaymentId::from_uuid(r.id),
            customer_id: CustomerId::from_uuid(r.customer_id),
            bill_id: BillId::from_uuid(r.bill_id),
            amount: r.amount,
            method,
            created_at: r.created_at,
        })
    }
}

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn settle(&self, payment: &Payment) -> Result<()> {
        debug!("Settling bill {} with payment {}", payment.bill_id, payment.id);

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to open settlement transaction: {}", e);
            DomainError::store(e)
        })?;

        let flipped = sqlx::query(
            r#"
            UPDATE bills
            SET status = 'Paid', updated_at = $3
            WHERE id = $1 AND customer_id = $2 AND status = 'Due'
            "#,
        )
        .bind(payment.bill_id.as_uuid())
        .bind(payment.customer_id.as_uuid())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to mark bill paid: {}", e);
            DomainError::store(e)
        })?;

        if flipped.rows_affected() == 0 {
            let existing = sqlx::query("SELECT status FROM bills WHERE id = $1 AND customer_id = $2")
                .bind(payment.bill_id.as_uuid())
                .bind(payment.customer_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(DomainError::store)?;

            return Err(match existing {
                Some(row) => {
                    let status: String = row.get("status");
                    warn!("Bill {} not settled, status is {}", payment.bill_id, status);
                    DomainError::Conflict(format!("bill {} is already paid", payment.bill_id))
                }
                None => DomainError::NotFound(format!("bill {} doesn't exist", payment.bill_id)),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, customer_id, bill_id, amount, method, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.customer_id.as_uuid())
        .bind(payment.bill_id.as_uuid())
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "payments_one_per_bill") {
                return DomainError::Conflict(format!(
                    "bill {} already has a payment",
                    payment.bill_id
                ));
            }
            error!("Failed to record payment: {}", e);
            DomainError::store(e)
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit settlement: {}", e);
            DomainError::store(e)
        })?;

        debug!("Payment recorded successfully: {}", payment.id);
        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get payment: {}", e);
            DomainError::store(e)
        })?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_bill(&self, bill_id: BillId) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE bill_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(bill_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get payment by bill: {}", e);
            DomainError::store(e)
        })?;

        row.map(Payment::try_from).transpose()
    }

    async fn latest_for_customer(&self, customer_id: CustomerId) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE customer_id = $1 ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get latest payment: {}", e);
            DomainError::store(e)
        })?;

        row.map(Payment::try_from).transpose()
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        debug!("Listing payments with filter: {:?}", filter);

        if filter.customer_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT p.id, p.customer_id, p.bill_id, p.amount, p.method, p.created_at \
             FROM payments p LEFT JOIN bills b ON b.id = p.bill_id WHERE TRUE",
        );

        if let Some(ids) = &filter.customer_ids {
            let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
            query.push(" AND p.customer_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(from) = filter.created_from {
            query.push(" AND p.created_at >= ").push_bind(from);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND p.created_at < ").push_bind(before);
        }
        if let Some(range) = filter.amount_range {
            query
                .push(" AND p.amount BETWEEN ")
                .push_bind(range.min)
                .push(" AND ")
                .push_bind(range.max);
        }
        if let Some(range) = filter.unit_range {
            query
                .push(" AND b.units BETWEEN ")
                .push_bind(i64::from(range.min))
                .push(" AND ")
                .push_bind(i64::from(range.max));
        }
        if let Some(method) = filter.method {
            query.push(" AND p.method = ").push_bind(method.as_str());
        }

        query.push(" ORDER BY ");
        for key in &filter.sort {
            query
                .push("p.")
                .push(key.field.column())
                .push(match key.direction {
                    SortDirection::Ascending => " ASC, ",
                    SortDirection::Descending => " DESC, ",
                });
        }
        query.push("p.created_at ASC");

        let rows = query
            .build_query_as::<PaymentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to list payments: {}", e);
                DomainError::store(e)
            })?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
