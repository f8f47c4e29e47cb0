//! Bill entity and the billing-month window

use crate::domain::customer::Customer;
use crate::domain::shared::{BillId, CustomerId, DomainError, Result};
use crate::domain::tariff::TariffTable;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Settlement state of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillStatus {
    Due,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Due => "Due",
            BillStatus::Paid => "Paid",
        }
    }

}

impl FromStr for BillStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Due" => Ok(BillStatus::Due),
            "Paid" => Ok(BillStatus::Paid),
            _ => Err(DomainError::ValidationError(format!("unknown payment status '{}'", s))),
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monthly charge for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: BillId,
    pub customer_id: CustomerId,
    /// Issue date, serialized as `YYYY-MM-DD`
    pub date: NaiveDate,
    pub units: u32,
    pub amount: f64,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Issue a new Due bill priced from the customer's connection type
    pub fn issue(customer: &Customer, units: u32, tariff: &TariffTable, now: DateTime<Utc>) -> Self {
        Self {
            id: BillId::new(),
            customer_id: customer.id,
            date: now.date_naive(),
            units,
            amount: tariff.rate(f64::from(units), &customer.connection_type),
            status: BillStatus::Due,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }
}

/// All bills of one customer, newest issue date first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBills {
    pub customer: Customer,
    pub bills: Vec<Bill>,
}

/// Half-open calendar month `[start, end)` in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// The calendar month containing `instant`
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let (year, month) = (instant.year(), instant.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        Self {
            start: first_of_month(year, month),
            end: first_of_month(next_year, next_month),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// First day of the month, used as the per-customer uniqueness key
    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Full month name, e.g. "March"
    pub fn month_name(&self) -> String {
        self.start.format("%B").to_string()
    }
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert a caller-supplied unit reading to a whole, non-negative count
pub fn whole_units(raw: f64) -> Result<u32> {
    if !raw.is_finite() || raw < 0.0 {
        return Err(DomainError::ValidationError(format!(
            "units must be a non-negative number, got {}",
            raw
        )));
    }

    let truncated = raw.trunc();
    if truncated > f64::from(u32::MAX) {
        return Err(DomainError::ValidationError(format!(
            "units {} out of range",
            raw
        )));
    }

    Ok(truncated as u32)
}
