//! Cache types for ERP responses.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

/// Cache key for ERP reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Personalized prices of the user with this e-mail.
    PriceList(String),
    /// Item count per item group.
    ItemGroups,
    /// User behind an ERP `sid`.
    SessionUser(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    PriceList(Arc<HashMap<String, Decimal>>),
    ItemGroups(Arc<Vec<GroupCount>>),
    SessionUser(Arc<str>),
}

/// Number of items in one item group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: usize,
}
