//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Errors are rendered as `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use sudimport_core::{AddressError, EmailError, NameError};

use crate::erp::ErpError;
use crate::services::AccessError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// ERP call failed.
    #[error("ERP error: {0}")]
    Erp(#[from] ErpError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Address update rejected by validation.
    #[error("{0}")]
    Address(#[from] AddressError),

    /// Document access denied or document missing.
    #[error("{0}")]
    Access(#[from] AccessError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller may not access the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EmailError> for AppError {
    fn from(_: EmailError) -> Self {
        Self::BadRequest("Ungültige E-Mail-Adresse".to_string())
    }
}

impl From<NameError> for AppError {
    fn from(err: NameError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Erp(err) | Self::Access(AccessError::Erp(err)) => erp_status(err),
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Address(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Access(AccessError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Access(AccessError::NotOwner(_)) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

/// ERP 404 stays 404 and rejected ERP credentials become 401; anything
/// else is an upstream failure.
const fn erp_status(err: &ErpError) -> StatusCode {
    match err.status() {
        Some(404) => StatusCode::NOT_FOUND,
        Some(401 | 403) => StatusCode::UNAUTHORIZED,
        Some(_) | None => match err {
            ErpError::MissingSid | ErpError::InvalidUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Erp(_) | Self::Access(AccessError::Erp(_)) => match status {
                StatusCode::NOT_FOUND => "Not found".to_string(),
                StatusCode::UNAUTHORIZED => "Unauthorized".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
                _ => "External service error".to_string(),
            },
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after login.
pub fn set_sentry_user(email: &str, customer: Option<&str>) {
    sentry::configure_scope(|scope| {
        let mut user = sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        };
        if let Some(customer) = customer {
            user.other
                .insert("customer".to_string(), serde_json::Value::String(customer.to_string()));
        }
        scope.set_user(Some(user));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("item", "GEG-00003")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
