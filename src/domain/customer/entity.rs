//! Customer account entity

use crate::domain::shared::{CustomerId, DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tariff class of a customer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionType {
    Domestic,
    Workshop,
    Industrial,
    /// A class the tariff table does not know; billed at zero
    Other(String),
}

impl ConnectionType {
    /// Case-insensitive parse; unrecognised names are kept as `Other`
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "domestic" => ConnectionType::Domestic,
            "workshop" => ConnectionType::Workshop,
            "industrial" => ConnectionType::Industrial,
            _ => ConnectionType::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectionType::Domestic => "domestic",
            ConnectionType::Workshop => "workshop",
            ConnectionType::Industrial => "industrial",
            ConnectionType::Other(name) => name,
        }
    }
}

impl Default for ConnectionType {
    fn default() -> Self {
        ConnectionType::Domestic
    }
}

impl From<String> for ConnectionType {
    fn from(raw: String) -> Self {
        ConnectionType::parse(&raw)
    }
}

impl From<ConnectionType> for String {
    fn from(ct: ConnectionType) -> Self {
        ct.as_str().to_string()
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Postal address; every part is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Address {
    pub house_no: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
}

/// Customer account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub customer_name: String,
    pub email: String,
    pub phone_no: Option<String>,
    pub address: Address,
    pub connection_type: ConnectionType,
    /// Informational account flag; request privileges come from the credential registry
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer registration data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCustomer {
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub connection_type: Option<ConnectionType>,
    /// Only settable in-process; a registration body naming it is rejected
    #[serde(skip_deserializing)]
    pub is_admin: bool,
}

impl NewCustomer {
    pub fn new(customer_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            email: email.into(),
            phone_no: None,
            address: None,
            connection_type: None,
            is_admin: false,
        }
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = Some(connection_type);
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

impl Customer {
    /// Validate registration data and build a fresh account
    pub fn register(data: NewCustomer, now: DateTime<Utc>) -> Result<Self> {
        let customer_name = data.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(DomainError::ValidationError(
                "customer name must not be empty".to_string(),
            ));
        }

        let email = normalize_email(&data.email);
        if !email.contains('@') {
            return Err(DomainError::ValidationError(format!(
                "'{}' is not a valid email address",
                data.email
            )));
        }

        Ok(Self {
            id: CustomerId::new(),
            customer_name,
            email,
            phone_no: data.phone_no,
            address: data.address.unwrap_or_default(),
            connection_type: data.connection_type.unwrap_or_default(),
            is_admin: data.is_admin,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Emails are compared trimmed and lowercased
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_parse_is_case_insensitive() {
        assert_eq!(ConnectionType::parse("Domestic"), ConnectionType::Domestic);
        assert_eq!(ConnectionType::parse(" WORKSHOP "), ConnectionType::Workshop);
        assert_eq!(ConnectionType::parse("industrial"), ConnectionType::Industrial);
        assert_eq!(
            ConnectionType::parse("Agricultural"),
            ConnectionType::Other("agricultural".to_string())
        );
    }

    #[test]
    fn test_connection_type_serde() {
        let json = serde_json::to_string(&ConnectionType::Workshop).unwrap();
        assert_eq!(json, "\"workshop\"");
        let parsed: ConnectionType = serde_json::from_str("\"Industrial\"").unwrap();
        assert_eq!(parsed, ConnectionType::Industrial);
    }

    #[test]
    fn test_register_defaults() {
        let customer = Customer::register(
            NewCustomer::new("Asha Rao", "  Asha@Example.com "),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(customer.email, "asha@example.com");
        assert_eq!(customer.connection_type, ConnectionType::Domestic);
        assert_eq!(customer.address, Address::default());
        assert!(!customer.is_admin);
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let err = Customer::register(NewCustomer::new("  ", "a@b.c"), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = Customer::register(NewCustomer::new("Ravi", "ravi.example.com"), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_registration_body_cannot_grant_admin() {
        let result: std::result::Result<NewCustomer, _> = serde_json::from_str(
            r#"{"customerName":"Mallory","email":"mallory@example.com","isAdmin":true}"#,
        );
        assert!(result.is_err());

        let data: NewCustomer = serde_json::from_str(
            r#"{"customerName":"Ravi","email":"ravi@example.com","address":{"city":"Pune"}}"#,
        )
        .unwrap();
        assert!(!data.is_admin);
        assert_eq!(data.address.and_then(|a| a.city).as_deref(), Some("Pune"));
    }

    #[test]
    fn test_address_rejects_unknown_fields() {
        let result: std::result::Result<Address, _> =
            serde_json::from_str(r#"{"city":"Pune","landmark":"near the tank"}"#);
        assert!(result.is_err());

        let address: Address = serde_json::from_str(r#"{"houseNo":"12B","city":"Pune"}"#).unwrap();
        assert_eq!(address.house_no.as_deref(), Some("12B"));
        assert_eq!(address.city.as_deref(), Some("Pune"));
    }
}
