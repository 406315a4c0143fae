//! Customer resolution.
//!
//! Maps a logged-in e-mail address to the ERP customer it buys for. The
//! lookup order is fixed:
//!
//! 1. `User.linked_customer`
//! 2. `Contact Email` rows → parent `Contact` → first `Customer` link
//! 3. `Customer.email_id` (accounts created before contacts were linked)
//!
//! A failing step is logged and skipped, so resolution itself never fails.
//! Callers that find nothing are anonymous and see catalogue prices only.

use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use sudimport_core::{CustomerName, Email};

use crate::erp::types::{ContactEmailRow, ContactLinks, NameRow, UserRecord};
use crate::erp::{ErpClient, ErpError, Filter, ListQuery};

/// Maximum number of contacts inspected for one e-mail.
const MAX_CONTACTS: usize = 20;

/// Which lookup step produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    LinkedCustomer,
    ContactLink,
    CustomerEmail,
    Anonymous,
}

/// Outcome of resolving an e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub customer: Option<CustomerName>,
    pub source: ResolutionSource,
}

impl Resolution {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            customer: None,
            source: ResolutionSource::Anonymous,
        }
    }

    fn found(customer: String, source: ResolutionSource) -> Self {
        Self {
            customer: Some(CustomerName::new_unchecked(customer)),
            source,
        }
    }

    #[must_use]
    pub const fn customer(&self) -> Option<&CustomerName> {
        self.customer.as_ref()
    }

    #[must_use]
    pub const fn has_customer(&self) -> bool {
        self.customer.is_some()
    }
}

/// Resolves e-mails to ERP customers and remembers the answer.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct CustomerResolver {
    erp: ErpClient,
    cache: Cache<Email, Resolution>,
}

impl CustomerResolver {
    #[must_use]
    pub fn new(erp: ErpClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { erp, cache }
    }

    /// Resolve `email`, serving repeated lookups from the cache.
    ///
    /// Results produced while a step was failing are not cached, so a
    /// transient ERP outage does not pin a customer to anonymous.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resolve(&self, email: &Email) -> Resolution {
        if let Some(hit) = self.cache.get(email).await {
            debug!(source = ?hit.source, "Cache hit for customer resolution");
            return hit;
        }

        let (resolution, clean) = self.lookup(email).await;
        debug!(source = ?resolution.source, customer = ?resolution.customer, "Resolved customer");

        if clean || resolution.has_customer() {
            self.cache.insert(email.clone(), resolution.clone()).await;
        }
        resolution
    }

    /// Drop a cached resolution, e.g. after the user was linked to a customer.
    pub async fn forget(&self, email: &Email) {
        self.cache.invalidate(email).await;
    }

    /// Link the user `email` to the customer whose `email_id` matches.
    ///
    /// Writes `User.linked_customer` and drops the cached resolution.
    /// Returns `None` when no customer carries this e-mail.
    ///
    /// # Errors
    ///
    /// Returns an error if the customer search or the user update fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn link_by_email(&self, email: &Email) -> Result<Option<CustomerName>, ErpError> {
        let Some(customer) = self.customer_by_email(email).await? else {
            return Ok(None);
        };

        let _: serde_json::Value = self
            .erp
            .update_doc(
                "User",
                email.as_str(),
                &serde_json::json!({ "linked_customer": customer }),
            )
            .await?;
        self.forget(email).await;

        info!(customer = %customer, "Linked user to customer");
        Ok(Some(CustomerName::new_unchecked(customer)))
    }

    async fn lookup(&self, email: &Email) -> (Resolution, bool) {
        let mut clean = true;

        let steps = [
            ResolutionSource::LinkedCustomer,
            ResolutionSource::ContactLink,
            ResolutionSource::CustomerEmail,
        ];
        for step in steps {
            let result = match step {
                ResolutionSource::LinkedCustomer => self.linked_customer(email).await,
                ResolutionSource::ContactLink => self.contact_customer(email).await,
                ResolutionSource::CustomerEmail => self.customer_by_email(email).await,
                ResolutionSource::Anonymous => Ok(None),
            };
            match result {
                Ok(Some(customer)) => return (Resolution::found(customer, step), true),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, step = ?step, "Customer lookup step failed");
                    clean = false;
                }
            }
        }

        (Resolution::anonymous(), clean)
    }

    async fn linked_customer(&self, email: &Email) -> Result<Option<String>, ErpError> {
        match self.erp.get_doc::<UserRecord>("User", email.as_str()).await {
            Ok(user) => Ok(user.linked_customer.filter(|c| !c.trim().is_empty())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn contact_customer(&self, email: &Email) -> Result<Option<String>, ErpError> {
        let rows: Vec<ContactEmailRow> = self
            .erp
            .list(
                &ListQuery::new("Contact Email")
                    .fields(&["parent"])
                    .filter(Filter::eq("email_id", email.as_str()))
                    .limit(MAX_CONTACTS),
            )
            .await?;

        for row in rows {
            let contact: ContactLinks = match self.erp.get_doc("Contact", &row.parent).await {
                Ok(contact) => contact,
                Err(e) => {
                    warn!(error = %e, contact = %row.parent, "Skipping unreadable contact");
                    continue;
                }
            };
            if let Some(link) = contact
                .links
                .into_iter()
                .find(|l| l.link_doctype == "Customer")
            {
                return Ok(Some(link.link_name));
            }
        }
        Ok(None)
    }

    async fn customer_by_email(&self, email: &Email) -> Result<Option<String>, ErpError> {
        let rows: Vec<NameRow> = self
            .erp
            .list(
                &ListQuery::new("Customer")
                    .fields(&["name"])
                    .filter(Filter::eq("email_id", email.as_str()))
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| r.name))
    }
}
