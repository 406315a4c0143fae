//! Document status values shared by ERP sales documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frappe `docstatus` lifecycle of a submittable document.
///
/// Serialized as the ERP's integer (`0`, `1`, `2`) so clients receive the
/// same value the ERP returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum DocStatus {
    /// Saved but not submitted (`0`).
    #[default]
    Draft,
    /// Submitted and binding (`1`).
    Submitted,
    /// Cancelled after submission (`2`).
    Cancelled,
}

impl DocStatus {
    /// Whether the document is submitted.
    #[must_use]
    pub const fn is_submitted(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl TryFrom<u8> for DocStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Draft),
            1 => Ok(Self::Submitted),
            2 => Ok(Self::Cancelled),
            other => Err(format!("invalid docstatus: {other}")),
        }
    }
}

impl From<DocStatus> for u8 {
    fn from(status: DocStatus) -> Self {
        match status {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }
}

/// Frappe `Check` field (`0`/`1`, sometimes `true`/`false` or `"1"`).
///
/// ```
/// use sudimport_core::flag_is_set;
/// use serde_json::json;
///
/// assert!(flag_is_set(Some(&json!(1))));
/// assert!(!flag_is_set(Some(&json!(0))));
/// assert!(!flag_is_set(None));
/// ```
#[must_use]
pub fn flag_is_set(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => s == "1",
        _ => false,
    }
}
