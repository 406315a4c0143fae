//! Authentication extractors and identity cookies.
//!
//! The caller's e-mail is taken, in order, from:
//!
//! 1. the server-side session (written at login)
//! 2. the `x-user` header, only when `STOREFRONT_TRUST_USER_HEADER` is set
//!    (an edge proxy that authenticates users itself)
//! 3. the `user_email` (or legacy `user`) cookie, only next to an ERP `sid`
//!    cookie that the ERP confirms belongs to the same user
//!
//! Values that are not an e-mail address are ignored.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::COOKIE, request::Parts},
};
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use tracing::{debug, warn};

use sudimport_core::{CustomerName, Email};

use crate::erp::SID_COOKIE;
use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Header carrying the caller's e-mail from a trusted proxy.
pub const USER_HEADER: &str = "x-user";

/// Readable cookie holding the logged-in e-mail.
pub const USER_EMAIL_COOKIE: &str = "user_email";

/// Older name of [`USER_EMAIL_COOKIE`].
pub const LEGACY_USER_COOKIE: &str = "user";

/// Cookie holding the linked ERP customer.
pub const CUSTOMER_COOKIE: &str = "customer";

/// Lifetime of the customer cookie set by access confirmation.
const CUSTOMER_COOKIE_DAYS: i64 = 7;

// =============================================================================
// Identity
// =============================================================================

/// Where the caller's identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Session,
    Header,
    Cookie,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: Email,
    pub source: IdentitySource,
}

/// Determine the caller from the request.
async fn identify(parts: &Parts, state: &AppState) -> Option<Identity> {
    if let Some(session) = parts.extensions.get::<Session>() {
        if let Some(user) = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
        {
            return Some(Identity {
                email: user.email,
                source: IdentitySource::Session,
            });
        }
    }

    if state.config().trust_user_header {
        let header = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Some(email) = Email::from_identity(header) {
            return Some(Identity {
                email,
                source: IdentitySource::Header,
            });
        }
    }

    let sid = request_cookie(&parts.headers, SID_COOKIE)?;
    let cookie = request_cookie(&parts.headers, USER_EMAIL_COOKIE)
        .or_else(|| request_cookie(&parts.headers, LEGACY_USER_COOKIE));
    let email = Email::from_identity(cookie.as_deref())?;
    verify_sid(state, &sid, email).await
}

/// Accept the e-mail cookie only when the ERP session behind `sid` belongs to
/// the same user.
async fn verify_sid(state: &AppState, sid: &str, email: Email) -> Option<Identity> {
    let session_user = match state.erp().session_user(sid).await {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "ERP did not confirm sid cookie");
            return None;
        }
    };

    // Expired sessions report `Guest`
    let Some(erp_user) = Email::from_identity(Some(&*session_user)) else {
        debug!("sid cookie has no logged-in ERP user");
        return None;
    };
    if erp_user != email {
        warn!(cookie = %email, "E-mail cookie does not match the ERP session");
        return None;
    }

    Some(Identity {
        email,
        source: IdentitySource::Cookie,
    })
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor that requires an identified caller.
///
/// Rejects with 401 JSON when no identity is present.
///
/// # Example
///
/// ```rust,ignore
/// async fn orders(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Orders of {}", user.email)
/// }
/// ```
pub struct RequireUser(pub Identity);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        identify(parts, state)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Nicht angemeldet".to_string()))
    }
}

/// Extractor that optionally gets the caller.
///
/// Unlike `RequireUser`, this never rejects; anonymous callers get `None`.
pub struct OptionalUser(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(identify(parts, state).await))
    }
}

/// Store the logged-in user in the session.
///
/// The session ID is cycled first so a pre-login session cannot be fixed.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the logged-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

// =============================================================================
// Cookies
// =============================================================================

/// Value of a request cookie, if present and non-empty.
#[must_use]
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

fn base_cookie(name: &'static str, value: String, http_only: bool, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Customer names carry spaces and punctuation; cookie values may not.
fn cookie_value(customer: &CustomerName) -> String {
    urlencoding::encode(customer.as_str()).into_owned()
}

/// Cookies issued at login: the ERP `sid` (script-hidden), the readable
/// e-mail and, when resolved, the customer.
#[must_use]
pub fn login_cookies(
    sid: &str,
    email: &Email,
    customer: Option<&CustomerName>,
    secure: bool,
) -> Vec<Cookie<'static>> {
    let mut cookies = vec![
        base_cookie(SID_COOKIE, sid.to_string(), true, secure),
        base_cookie(USER_EMAIL_COOKIE, email.to_string(), false, secure),
    ];
    if let Some(customer) = customer {
        cookies.push(base_cookie(CUSTOMER_COOKIE, cookie_value(customer), false, secure));
    }
    cookies
}

/// Customer cookie issued when access is confirmed.
#[must_use]
pub fn customer_cookie(customer: &CustomerName, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(CUSTOMER_COOKIE, cookie_value(customer), true, secure);
    cookie.set_max_age(Duration::days(CUSTOMER_COOKIE_DAYS));
    cookie
}

/// Expired copies of every identity cookie.
#[must_use]
pub fn removal_cookies(secure: bool) -> Vec<Cookie<'static>> {
    [SID_COOKIE, USER_EMAIL_COOKIE, CUSTOMER_COOKIE, LEGACY_USER_COOKIE]
        .into_iter()
        .map(|name| {
            let mut cookie = base_cookie(name, String::new(), name == SID_COOKIE, secure);
            cookie.make_removal();
            cookie
        })
        .collect()
}
