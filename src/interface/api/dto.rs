//! API DTOs (Data Transfer Objects)

use crate::domain::shared::DomainError;
use serde::{Deserialize, Serialize};

/// Generic API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Machine-checkable error kind, present on failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &DomainError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind().to_string()),
        }
    }
}

/// Create bill request; units may be fractional and are truncated
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBillRequest {
    #[serde(rename = "_id", alias = "customerId")]
    pub customer_id: String,
    pub units: f64,
}

/// Update bill request
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBillRequest {
    #[serde(rename = "_id", alias = "customerId")]
    pub customer_id: String,
    #[serde(rename = "billNo", alias = "billId")]
    pub bill_id: String,
    pub units: f64,
}

/// Delete bill request
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteBillRequest {
    #[serde(rename = "_id", alias = "customerId")]
    pub customer_id: String,
    #[serde(rename = "billNo", alias = "billId")]
    pub bill_id: String,
}

/// Pay bill request
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayBillRequest {
    #[serde(rename = "userID", alias = "customerId")]
    pub customer_id: String,
    #[serde(rename = "billNo", alias = "billId")]
    pub bill_id: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_kind() {
        let response = ApiResponse::<()>::failure(&DomainError::Conflict("paid".to_string()));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "conflict");
        assert_eq!(json["error"], "Conflict: paid");
    }

    #[test]
    fn test_success_omits_kind() {
        let json = serde_json::to_value(ApiResponse::success(7)).unwrap();
        assert_eq!(json["data"], 7);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_request_field_names() {
        let req: UpdateBillRequest =
            serde_json::from_str(r#"{"_id":"c","billNo":"b","units":12.7}"#).unwrap();
        assert_eq!(req.customer_id, "c");
        assert_eq!(req.bill_id, "b");

        let pay: PayBillRequest =
            serde_json::from_str(r#"{"userID":"c","billNo":"b"}"#).unwrap();
        assert_eq!(pay.customer_id, "c");

        assert!(serde_json::from_str::<DeleteBillRequest>(
            r#"{"_id":"c","billNo":"b","status":"Paid"}"#
        )
        .is_err());
    }
}
