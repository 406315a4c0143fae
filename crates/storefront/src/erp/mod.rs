//! ERPNext REST client.
//!
//! # Architecture
//!
//! - ERPNext is the source of truth - NO local copy, direct API calls
//! - Resource API (`/api/resource/<Doctype>`) for document reads and writes
//! - Whitelisted methods (`/api/method/<dotted.path>`) for login, prices and
//!   registration; responses are wrapped in `message`
//! - In-memory caching via `moka` for catalogue data and price lists
//!
//! # Authentication
//!
//! Server-to-server calls send `Authorization: token <key>:<secret>`. Calls
//! made on behalf of a logged-in browser user send that user's `sid` cookie
//! instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use sudimport_storefront::erp::{ErpClient, Filter, ListQuery};
//!
//! let client = ErpClient::new(&config.erp)?;
//! let orders: Vec<SalesOrderRow> = client
//!     .list(
//!         &ListQuery::new("Sales Order")
//!             .fields(&["name", "grand_total"])
//!             .filter(Filter::eq("customer", "Pizzeria Roma"))
//!             .order_by("transaction_date desc"),
//!     )
//!     .await?;
//! ```

mod cache;
mod client;
pub mod query;
pub mod types;

pub use cache::GroupCount;
pub use client::{ErpClient, SID_COOKIE};
pub use query::{Filter, ListQuery};

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to ERPNext.
#[derive(Debug, Error)]
pub enum ErpError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ERPNext answered with a non-success status.
    #[error("ERP returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Login succeeded but no `sid` cookie came back.
    #[error("ERP login response carried no sid cookie")]
    MissingSid,

    /// The configured base URL cannot carry a path.
    #[error("Invalid ERP URL: {0}")]
    InvalidUrl(String),
}

impl ErpError {
    /// HTTP status returned by the ERP, if it answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the ERP reported the document as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Message the ERP attached to a failed call.
    #[must_use]
    pub fn erp_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Extract a human readable message from an ERPNext error body.
///
/// Looks at `message`, then `_server_messages`, then `exception`. Frappe
/// encodes `_server_messages` as a JSON string holding an array of JSON
/// strings, each an object with a `message` field; that nesting is unwrapped.
#[must_use]
pub fn error_message(body: &Value) -> Option<String> {
    let raw = ["message", "_server_messages", "exception"]
        .iter()
        .find_map(|key| body.get(*key).filter(|v| !v.is_null()))?;

    match raw {
        Value::String(s) => Some(unwrap_server_messages(s).unwrap_or_else(|| s.clone())),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        other => Some(other.to_string()),
    }
}

fn unwrap_server_messages(raw: &str) -> Option<String> {
    if !raw.starts_with('[') || !raw.contains("message") {
        return None;
    }
    let outer: Vec<String> = serde_json::from_str(raw).ok()?;
    let first: Value = serde_json::from_str(outer.first()?).ok()?;
    first
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_message_plain() {
        let body = json!({"message": "Incorrect password"});
        assert_eq!(error_message(&body).as_deref(), Some("Incorrect password"));
    }

    #[test]
    fn test_error_message_nested_server_messages() {
        let inner = json!({"message": "E-Mail bereits registriert", "indicator": "red"}).to_string();
        let outer = serde_json::to_string(&vec![inner]).unwrap_or_default();
        let body = json!({"exc_type": "ValidationError", "_server_messages": outer});
        assert_eq!(
            error_message(&body).as_deref(),
            Some("E-Mail bereits registriert")
        );
    }

    #[test]
    fn test_error_message_exception_fallback() {
        let body = json!({"exception": "frappe.exceptions.DoesNotExistError"});
        assert_eq!(
            error_message(&body).as_deref(),
            Some("frappe.exceptions.DoesNotExistError")
        );
        assert_eq!(error_message(&json!({})), None);
    }

    #[test]
    fn test_erp_error_status_helpers() {
        let err = ErpError::Status {
            status: 404,
            message: "Address ADDR-1 not found".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.erp_message(), Some("Address ADDR-1 not found"));
        assert_eq!(ErpError::MissingSid.status(), None);
    }
}
