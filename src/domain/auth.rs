//! Caller identity
//!
//! Token issuance and verification live outside the billing core; the core only
//! sees who is calling and whether they are an administrator.

use crate::domain::shared::{CustomerId, DomainError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub customer_id: CustomerId,
    pub is_admin: bool,
}

impl Caller {
    pub fn customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            is_admin: false,
        }
    }

    pub fn admin(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            is_admin: true,
        }
    }

    /// Administrators act on any account, everyone else only on their own
    pub fn authorize(&self, customer_id: CustomerId) -> Result<()> {
        if self.is_admin || self.customer_id == customer_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "caller {} may not act on customer {}",
                self.customer_id, customer_id
            )))
        }
    }
}

/// Resolves request credentials to a caller
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the token is unknown
    async fn authenticate(&self, token: &str) -> Result<Option<Caller>>;
}

/// Registered API key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub is_admin: bool,
}

/// Static API key registry
#[derive(Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: Arc<Mutex<HashMap<String, Caller>>>,
}

impl ApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        let auth = Self::new();
        for entry in entries {
            auth.register(
                entry.key.clone(),
                Caller {
                    customer_id: entry.customer_id,
                    is_admin: entry.is_admin,
                },
            );
        }
        auth
    }

    pub fn register(&self, key: String, caller: Caller) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(key, caller);
        }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Option<Caller>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| DomainError::StoreFailure("api key registry poisoned".to_string()))?;
        let caller = keys.get(token.trim()).copied();
        if caller.is_none() {
            debug!("Rejected unknown API key");
        }
        Ok(caller)
    }
}
