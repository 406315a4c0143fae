//! Authentication route handlers.
//!
//! Login and logout are delegated to the ERP; the storefront keeps the ERP
//! `sid` in a cookie and the resolved identity in its own session.
//! Registration and access confirmation act on the ERP's customer records.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tower_sessions::cookie::Cookie;
use tracing::{info, instrument, warn};

use sudimport_core::{CustomerName, Email};

use crate::erp::{ErpError, SID_COOKIE};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::{customer_cookie, login_cookies, removal_cookies, request_cookie};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::registration::{self, RegistrationError, RegistrationForm};
use crate::state::AppState;

const LOGIN_FAILED: &str = "Login fehlgeschlagen.";

// =============================================================================
// Request / Response Types
// =============================================================================

/// Login body, named like the ERP's login form.
#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub usr: String,
    #[serde(default)]
    pub pwd: String,
}

/// Successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: Email,
    pub customer: Option<CustomerName>,
}

/// Access confirmation body.
#[derive(Debug, Deserialize)]
pub struct ConfirmAccessBody {
    #[serde(default)]
    pub email: String,
}

/// Successful access confirmation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmAccessResponse {
    pub success: bool,
    pub linked_customer: CustomerName,
    pub message: &'static str,
}

fn set_cookie_headers(cookies: Vec<Cookie<'static>>) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(
        cookies
            .into_iter()
            .map(|cookie| (SET_COOKIE, cookie.to_string()))
            .collect(),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Log in with ERP credentials.
///
/// The e-mail is the user the ERP reports for the new session, falling back
/// to the submitted login name.
#[instrument(skip(state, session, body), fields(usr = %body.usr))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginBody>,
) -> Result<Response> {
    if body.usr.trim().is_empty() || body.pwd.is_empty() {
        return Err(AppError::BadRequest(
            "E-Mail und Passwort sind erforderlich".to_string(),
        ));
    }

    let sid = match state.erp().login(body.usr.trim(), &body.pwd).await {
        Ok(sid) => sid,
        Err(ErpError::Status { status, message }) => {
            warn!(status, "ERP rejected login");
            return Err(AppError::Unauthorized(if message.is_empty() {
                LOGIN_FAILED.to_string()
            } else {
                message
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let logged_user = match state.erp().logged_user(&sid).await {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Could not read logged user, using login name");
            None
        }
    };
    let email = Email::from_identity(logged_user.as_deref())
        .or_else(|| Email::from_identity(Some(&body.usr)))
        .ok_or_else(|| AppError::Unauthorized(LOGIN_FAILED.to_string()))?;

    let resolution = state.customers().resolve(&email).await;
    let customer = resolution.customer;

    set_current_user(
        &session,
        &CurrentUser {
            email: email.clone(),
            customer: customer.clone(),
        },
    )
    .await?;
    set_sentry_user(email.as_str(), customer.as_ref().map(CustomerName::as_str));
    info!(customer = ?customer, source = ?resolution.source, "User logged in");

    let cookies = login_cookies(&sid, &email, customer.as_ref(), state.config().is_secure());
    Ok((
        set_cookie_headers(cookies),
        Json(LoginResponse {
            message: "Login erfolgreich",
            user: email,
            customer,
        }),
    )
        .into_response())
}

/// Log out locally and at the ERP.
///
/// The ERP logout is best effort; its failure never keeps the user logged in.
#[instrument(skip(state, session, headers))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    if let Some(sid) = request_cookie(&headers, SID_COOKIE) {
        state.erp().forget_session(&sid).await;
        if let Err(e) = state.erp().logout(&sid).await {
            warn!(error = %e, "ERP logout failed, clearing local session anyway");
        }
    }

    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok((
        set_cookie_headers(removal_cookies(state.config().is_secure())),
        Json(json!({ "success": true, "message": "Logout erfolgreich" })),
    )
        .into_response())
}

/// Forward a customer registration to the ERP.
///
/// Answers `{"message": ...}` in both outcomes, which the registration form
/// shows as is.
#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<Response> {
    match registration::register(state.erp(), form).await {
        Ok(()) => Ok(Json(json!({
            "message": "Registrierung erfolgreich. Wir prüfen Ihre Daten und geben den Zugang frei."
        }))
        .into_response()),
        Err(RegistrationError::Rejected(message)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": message })),
        )
            .into_response()),
        Err(RegistrationError::Erp(e)) => Err(e.into()),
    }
}

/// Link the user with this e-mail to the customer carrying the same e-mail.
#[instrument(skip(state, session, body))]
pub async fn confirm_access(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ConfirmAccessBody>,
) -> Result<Response> {
    let email = Email::parse(&body.email)?;

    let Some(customer) = state.customers().link_by_email(&email).await? else {
        return Err(AppError::NotFound(
            "Kein Kunde mit dieser E-Mail-Adresse gefunden. Bitte kontaktieren Sie den Support."
                .to_string(),
        ));
    };

    // Keep a logged-in session of the same user in step
    if let Ok(Some(mut current)) = session.get::<CurrentUser>(session_keys::CURRENT_USER).await {
        if current.email == email {
            current.customer = Some(customer.clone());
            session.insert(session_keys::CURRENT_USER, &current).await?;
        }
    }

    let cookie = customer_cookie(&customer, state.config().is_secure());
    Ok((
        set_cookie_headers(vec![cookie]),
        Json(ConfirmAccessResponse {
            success: true,
            linked_customer: customer,
            message: "Kunde erfolgreich verknüpft",
        }),
    )
        .into_response())
}
