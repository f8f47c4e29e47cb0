//! Payment entity

use crate::domain::bill::Bill;
use crate::domain::customer::Customer;
use crate::domain::shared::{BillId, CustomerId, DomainError, PaymentId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a payment was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Paid by the customer themselves
    Online,
    /// Recorded by an administrator at a counter
    Offline,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "Online",
            PaymentMethod::Offline => "Offline",
        }
    }

    /// Administrators record offline payments, everyone else pays online
    pub fn for_caller(is_admin: bool) -> Self {
        if is_admin {
            PaymentMethod::Offline
        } else {
            PaymentMethod::Online
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Online" => Ok(PaymentMethod::Online),
            "Offline" => Ok(PaymentMethod::Offline),
            _ => Err(DomainError::ValidationError(format!("unknown payment method '{}'", s))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement of exactly one bill. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub customer_id: CustomerId,
    pub bill_id: BillId,
    pub amount: f64,
    pub method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// A payment for the full amount of `bill`
    pub fn settling(bill: &Bill, method: PaymentMethod, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            customer_id: bill.customer_id,
            bill_id: bill.id,
            amount: bill.amount,
            method,
            created_at: now,
        }
    }
}

/// Payment enriched for display; not persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    #[serde(flatten)]
    pub payment: Payment,
    pub customer_name: String,
    pub units: u32,
}

impl PaymentReceipt {
    pub fn new(payment: Payment, customer: &Customer, units: u32) -> Self {
        Self {
            payment,
            customer_name: customer.customer_name.clone(),
            units,
        }
    }
}
