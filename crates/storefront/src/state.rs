//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::erp::{ErpClient, ErpError};
use crate::services::CustomerResolver;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// ERP client, the customer resolver and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    erp: ErpClient,
    customers: CustomerResolver,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ErpError> {
        let erp = ErpClient::new(&config.erp)?;
        let customers = CustomerResolver::new(erp.clone(), config.erp.cache_ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                erp,
                customers,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the ERPNext client.
    #[must_use]
    pub fn erp(&self) -> &ErpClient {
        &self.inner.erp
    }

    /// Get a reference to the customer resolver.
    #[must_use]
    pub fn customers(&self) -> &CustomerResolver {
        &self.inner.customers
    }
}
