//! ERPNext REST client implementation.
//!
//! Uses `reqwest` for HTTP and `url` for path/query encoding. Price lists and
//! item group counts are cached using `moka` (TTL from configuration).

use std::collections::HashMap;
use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, SET_COOKIE};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_sessions::cookie::Cookie;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ErpConfig;

use super::cache::{CacheKey, CacheValue, GroupCount};
use super::query::ListQuery;
use super::types::{
    DataEnvelope, ItemGroupRow, MessageEnvelope, PriceListMessage,
};
use super::{ErpError, error_message};

/// Page size used when scanning a whole doctype.
const SCAN_PAGE_LENGTH: usize = 500;

/// Name of the Frappe session cookie.
pub const SID_COOKIE: &str = "sid";

/// User Frappe reports for a session nobody is logged into.
const GUEST_USER: &str = "Guest";

// =============================================================================
// ErpClient
// =============================================================================

/// Client for the ERPNext REST API.
///
/// Cheap to clone; all clones share the connection pool and cache.
#[derive(Clone)]
pub struct ErpClient {
    inner: Arc<ErpClientInner>,
}

struct ErpClientInner {
    client: reqwest::Client,
    config: ErpConfig,
    token: SecretString,
    cache: Cache<CacheKey, CacheValue>,
}

impl ErpClient {
    /// Create a new ERP client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ErpConfig) -> Result<Self, ErpError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ErpClientInner {
                client,
                config: config.clone(),
                token: config.token_header(),
                cache,
            }),
        })
    }

    /// The ERP configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &ErpConfig {
        &self.inner.config
    }

    /// Build `<ERP_URL>/<segments...>` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, ErpError> {
        let mut url = self.inner.config.url.clone();
        url.path_segments_mut()
            .map_err(|()| ErpError::InvalidUrl(self.inner.config.url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn resource_url(&self, doctype: &str, name: Option<&str>) -> Result<Url, ErpError> {
        match name {
            Some(name) => self.url(&["api", "resource", doctype, name]),
            None => self.url(&["api", "resource", doctype]),
        }
    }

    fn method_url(&self, method: &str) -> Result<Url, ErpError> {
        self.url(&["api", "method", method])
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.inner
            .client
            .get(url)
            .header(AUTHORIZATION, self.inner.token.expose_secret())
    }

    // =========================================================================
    // Resource API
    // =========================================================================

    /// List documents of a doctype.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the ERP rejects it.
    #[instrument(skip(self, query), fields(doctype = %query.doctype()))]
    pub async fn list<T: DeserializeOwned>(&self, query: &ListQuery) -> Result<Vec<T>, ErpError> {
        let mut url = self.resource_url(query.doctype(), None)?;
        query.apply(&mut url);

        let response = self.get(url).send().await?;
        let envelope: DataEnvelope<Vec<T>> = read_json(response).await?;
        debug!(rows = envelope.data.len(), "ERP list");
        Ok(envelope.data)
    }

    /// Fetch every row of a query, `SCAN_PAGE_LENGTH` at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails.
    pub async fn list_all<T: DeserializeOwned>(&self, query: ListQuery) -> Result<Vec<T>, ErpError> {
        let mut rows = Vec::new();
        let mut start = 0;
        loop {
            let page: Vec<T> = self
                .list(&query.clone().start(start).limit(SCAN_PAGE_LENGTH))
                .await?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < SCAN_PAGE_LENGTH {
                return Ok(rows);
            }
            start += SCAN_PAGE_LENGTH;
        }
    }

    /// Fetch a single document with its child tables.
    ///
    /// # Errors
    ///
    /// Returns `ErpError::Status` with status 404 if the document does not exist.
    #[instrument(skip(self))]
    pub async fn get_doc<T: DeserializeOwned>(&self, doctype: &str, name: &str) -> Result<T, ErpError> {
        let mut url = self.resource_url(doctype, Some(name))?;
        url.query_pairs_mut().append_pair("expand", "1");

        let response = self.get(url).send().await?;
        let envelope: DataEnvelope<T> = read_json(response).await?;
        Ok(envelope.data)
    }

    /// Update fields of a document and return the saved document.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP rejects the update.
    #[instrument(skip(self, body))]
    pub async fn update_doc<B, T>(&self, doctype: &str, name: &str, body: &B) -> Result<T, ErpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resource_url(doctype, Some(name))?;
        let response = self
            .inner
            .client
            .put(url)
            .header(AUTHORIZATION, self.inner.token.expose_secret())
            .json(body)
            .send()
            .await?;
        let envelope: DataEnvelope<T> = read_json(response).await?;
        Ok(envelope.data)
    }

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP rejects the deletion.
    #[instrument(skip(self))]
    pub async fn delete_doc(&self, doctype: &str, name: &str) -> Result<(), ErpError> {
        let url = self.resource_url(doctype, Some(name))?;
        let response = self
            .inner
            .client
            .delete(url)
            .header(AUTHORIZATION, self.inner.token.expose_secret())
            .send()
            .await?;
        let _: Value = read_json(response).await?;
        Ok(())
    }

    // =========================================================================
    // Whitelisted methods
    // =========================================================================

    /// Call a whitelisted method with query parameters and unwrap `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the ERP rejects it.
    #[instrument(skip(self, params))]
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ErpError> {
        let response = self.method_get(method, params).await?;
        let envelope: MessageEnvelope<T> = read_json(response).await?;
        Ok(envelope.message)
    }

    /// Call a whitelisted method and return the whole response body.
    ///
    /// For methods that do not reliably wrap their result in `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the ERP rejects it.
    #[instrument(skip(self, params))]
    pub async fn call_raw(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, ErpError> {
        let response = self.method_get(method, params).await?;
        read_json(response).await
    }

    async fn method_get(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, ErpError> {
        let mut url = self.method_url(method)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(self.get(url).send().await?)
    }

    /// POST to a guest-allowed method without credentials.
    ///
    /// Returns the whole response body: guest methods may report failures
    /// inside a 200 response (`exc_type`).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the ERP answers non-2xx.
    #[instrument(skip(self, body))]
    pub async fn post_guest<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<Value, ErpError> {
        let url = self.method_url(method)?;
        let response = self.inner.client.post(url).json(body).send().await?;
        read_json(response).await
    }

    /// Download the PDF print of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP cannot render the document.
    #[instrument(skip(self))]
    pub async fn download_pdf(&self, doctype: &str, name: &str) -> Result<Vec<u8>, ErpError> {
        let mut url = self.method_url("frappe.utils.print_format.download_pdf")?;
        url.query_pairs_mut()
            .append_pair("doctype", doctype)
            .append_pair("name", name)
            .append_pair("format", "Standard")
            .append_pair("no_letterhead", "0")
            .append_pair("_lang", &self.inner.config.print_language);

        let response = self.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &response.text().await?));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Browser link to the ERP print view of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL cannot carry a path.
    pub fn print_view_url(&self, doctype: &str, name: &str) -> Result<Url, ErpError> {
        let mut url = self.url(&["printview"])?;
        url.query_pairs_mut()
            .append_pair("doctype", doctype)
            .append_pair("name", name)
            .append_pair("format", "Standard")
            .append_pair("no_letterhead", "0")
            .append_pair("_lang", &self.inner.config.print_language);
        Ok(url)
    }

    // =========================================================================
    // User session
    // =========================================================================

    /// Log a user in with their ERP credentials and return the new `sid`.
    ///
    /// # Errors
    ///
    /// Returns `ErpError::Status` for rejected credentials and
    /// `ErpError::MissingSid` when the ERP did not open a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, user: &str, password: &str) -> Result<String, ErpError> {
        let url = self.method_url("login")?;
        let response = self
            .inner
            .client
            .post(url)
            .form(&[("usr", user), ("pwd", password)])
            .send()
            .await?;

        let sid = sid_from_headers(response.headers());
        let _: Value = read_json(response).await?;
        sid.ok_or(ErpError::MissingSid)
    }

    /// Ask the ERP which user a `sid` belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown to the ERP.
    #[instrument(skip(self, sid))]
    pub async fn logged_user(&self, sid: &str) -> Result<String, ErpError> {
        let url = self.method_url("frappe.auth.get_logged_user")?;
        let response = self
            .inner
            .client
            .get(url)
            .header(COOKIE, format!("{SID_COOKIE}={sid}"))
            .send()
            .await?;
        let envelope: MessageEnvelope<String> = read_json(response).await?;
        Ok(envelope.message)
    }

    /// User behind `sid`, remembered for the cache TTL.
    ///
    /// Frappe answers `Guest` for an unknown or expired `sid`; that answer is
    /// returned but not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP could not be reached or refused.
    #[instrument(skip(self, sid))]
    pub async fn session_user(&self, sid: &str) -> Result<Arc<str>, ErpError> {
        let cache_key = CacheKey::SessionUser(sid.to_string());
        if let Some(CacheValue::SessionUser(user)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for session user");
            return Ok(user);
        }

        let user: Arc<str> = Arc::from(self.logged_user(sid).await?);
        if &*user != GUEST_USER {
            self.inner
                .cache
                .insert(cache_key, CacheValue::SessionUser(Arc::clone(&user)))
                .await;
        }
        Ok(user)
    }

    /// Drop the remembered user of `sid` (logout).
    pub async fn forget_session(&self, sid: &str) {
        self.inner
            .cache
            .invalidate(&CacheKey::SessionUser(sid.to_string()))
            .await;
    }

    /// End a user's ERP session.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP could not be reached or refused.
    #[instrument(skip(self, sid))]
    pub async fn logout(&self, sid: &str) -> Result<(), ErpError> {
        let url = self.method_url("logout")?;
        let response = self
            .inner
            .client
            .get(url)
            .header(COOKIE, format!("{SID_COOKIE}={sid}"))
            .send()
            .await?;
        let _: Value = read_json(response).await?;
        Ok(())
    }

    // =========================================================================
    // Cached reads
    // =========================================================================

    /// Personalized prices (item code → rate) of the user with `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the price method fails.
    #[instrument(skip(self))]
    pub async fn personalized_prices(
        &self,
        email: &str,
    ) -> Result<Arc<HashMap<String, Decimal>>, ErpError> {
        let cache_key = CacheKey::PriceList(email.to_string());
        if let Some(CacheValue::PriceList(prices)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for price list");
            return Ok(prices);
        }

        let message: PriceListMessage = self
            .call(&self.inner.config.price_method, &[("email", email)])
            .await?;
        let prices: Arc<HashMap<String, Decimal>> = Arc::new(
            message
                .prezzi
                .into_iter()
                .map(|row| (row.item_code, row.price_list_rate))
                .collect(),
        );

        self.inner
            .cache
            .insert(cache_key, CacheValue::PriceList(Arc::clone(&prices)))
            .await;
        Ok(prices)
    }

    /// Item count per item group, sorted by group name.
    ///
    /// # Errors
    ///
    /// Returns an error if any page of the item scan fails.
    #[instrument(skip(self))]
    pub async fn item_group_counts(&self) -> Result<Arc<Vec<GroupCount>>, ErpError> {
        if let Some(CacheValue::ItemGroups(groups)) =
            self.inner.cache.get(&CacheKey::ItemGroups).await
        {
            debug!("Cache hit for item groups");
            return Ok(groups);
        }

        let rows: Vec<ItemGroupRow> = self
            .list_all(ListQuery::new("Item").fields(&["item_group"]))
            .await?;
        let groups = Arc::new(count_groups(rows.into_iter().filter_map(|r| r.item_group)));

        self.inner
            .cache
            .insert(CacheKey::ItemGroups, CacheValue::ItemGroups(Arc::clone(&groups)))
            .await;
        Ok(groups)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Read a response body as JSON, mapping non-2xx to `ErpError::Status`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ErpError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(status_error(status, &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse ERP response"
        );
        ErpError::Parse(e.to_string())
    })
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ErpError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    tracing::warn!(status = %status, message = %message, "ERP returned non-success status");
    ErpError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Find the `sid` among `Set-Cookie` headers. Frappe sends `sid=Guest` for
/// anonymous sessions; that is not a login.
fn sid_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| Cookie::parse(raw.to_string()).ok())
        .find(|cookie| cookie.name() == SID_COOKIE && cookie.value() != GUEST_USER)
        .map(|cookie| cookie.value().to_string())
}

fn count_groups(groups: impl Iterator<Item = String>) -> Vec<GroupCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for group in groups {
        *counts.entry(group).or_insert(0) += 1;
    }

    let mut result: Vec<GroupCount> = counts
        .into_iter()
        .map(|(name, count)| GroupCount { name, count })
        .collect();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    result
}
