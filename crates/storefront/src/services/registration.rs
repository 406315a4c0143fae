//! New customer registration.
//!
//! The shop form is forwarded to a guest-allowed ERP method which creates a
//! pending customer. Staff approve it in the ERP; the storefront only relays
//! the outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use sudimport_core::Email;

use crate::erp::{ErpClient, ErpError, error_message};

/// Fallback message when the ERP gives no reason.
const REGISTRATION_FAILED: &str = "Registrierung fehlgeschlagen.";

/// Country used when the form leaves it empty.
const DEFAULT_COUNTRY: &str = "Germany";

/// Registration form as posted by the shop.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub vorname: String,
    #[serde(default)]
    pub nachname: String,
    #[serde(default)]
    pub firma: Option<String>,
    #[serde(default)]
    pub telefon: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub adresse: Option<String>,
    #[serde(default)]
    pub plz: Option<String>,
    #[serde(default)]
    pub ort: Option<String>,
    #[serde(default)]
    pub land: Option<String>,
}

/// Body of the ERP registration method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPayload {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub cap: String,
    pub citta: String,
    pub country: String,
}

impl RegistrationPayload {
    fn new(form: RegistrationForm, email: Email) -> Self {
        let or_empty = |v: Option<String>| v.unwrap_or_default();
        Self {
            first_name: form.vorname,
            last_name: form.nachname,
            company: or_empty(form.firma),
            phone: or_empty(form.telefon),
            email: email.into_inner(),
            address: or_empty(form.adresse),
            cap: or_empty(form.plz),
            citta: or_empty(form.ort),
            country: form
                .land
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        }
    }
}

/// Errors that can occur during registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The form or the ERP refused the registration; the text is shown to
    /// the user.
    #[error("{0}")]
    Rejected(String),

    /// The ERP could not be reached.
    #[error(transparent)]
    Erp(ErpError),
}

/// Forward a registration to the ERP.
///
/// # Errors
///
/// Returns `RegistrationError::Rejected` for an invalid e-mail or when the
/// ERP refuses the registration (non-2xx, or an `exc_type`/`exception` in a
/// 200 body).
#[instrument(skip(erp, form), fields(email = %form.email))]
pub async fn register(erp: &ErpClient, form: RegistrationForm) -> Result<(), RegistrationError> {
    let email = Email::parse(&form.email)
        .map_err(|_| RegistrationError::Rejected("Ungültige E-Mail-Adresse".to_string()))?;
    let payload = RegistrationPayload::new(form, email);

    let body = match erp.post_guest(&erp.config().register_method, &payload).await {
        Ok(body) => body,
        Err(ErpError::Status { message, .. }) => {
            return Err(RegistrationError::Rejected(if message.is_empty() {
                REGISTRATION_FAILED.to_string()
            } else {
                message
            }));
        }
        Err(e) => return Err(RegistrationError::Erp(e)),
    };

    if reports_failure(&body) {
        return Err(RegistrationError::Rejected(
            error_message(&body).unwrap_or_else(|| REGISTRATION_FAILED.to_string()),
        ));
    }

    info!("Registration forwarded");
    Ok(())
}

fn reports_failure(body: &Value) -> bool {
    ["exc_type", "exception"]
        .iter()
        .any(|key| body.get(*key).is_some_and(|v| !v.is_null()))
}
