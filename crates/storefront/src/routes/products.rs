//! Catalogue route handlers.
//!
//! Listings are public. When the caller is identified, prices are decorated
//! with the caller's personalized rates.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use sudimport_core::CustomerName;

use crate::erp::GroupCount;
use crate::erp::types::ItemRow;
use crate::error::{AppError, Result};
use crate::middleware::OptionalUser;
use crate::services::catalogue::{
    CatalogueService, ProductDetail, ProductFilter, Suggestions, decorate_documents,
};
use crate::services::pricing::{PriceMap, PricedItem, PricingService, decorate};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 200;
const MAX_PAGE: usize = 10_000;
const DEFAULT_OFFER_LIMIT: usize = 8;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Query string of the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub categoria: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ProductsQuery {
    fn into_filter(self) -> ProductFilter {
        let non_empty = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        ProductFilter {
            categoria: non_empty(self.categoria),
            search: non_empty(self.search),
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Product listing page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsResponse {
    pub items: Vec<PricedItem<ItemRow>>,
    pub total: usize,
    pub is_logged_in: bool,
    pub customer: Option<CustomerName>,
    pub search_term: Option<String>,
    pub categoria: Option<String>,
    pub page: usize,
    pub limit: usize,
}

/// Query string of the offers listing.
#[derive(Debug, Deserialize)]
pub struct OffersQuery {
    pub limit: Option<usize>,
}

/// Items with their price quote.
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T: Serialize> {
    pub items: Vec<PricedItem<T>>,
}

/// Query string of the search dropdown.
#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub term: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Personalized prices of the caller and whether a customer is linked.
async fn caller_prices(state: &AppState, user: &OptionalUser) -> (PriceMap, Option<CustomerName>) {
    let Some(identity) = &user.0 else {
        return (PriceMap::default(), None);
    };
    let pricing = PricingService::new(state.erp());
    let (prices, resolution) = tokio::join!(
        pricing.personalized_for(Some(&identity.email)),
        state.customers().resolve(&identity.email),
    );
    (prices, resolution.customer)
}

// =============================================================================
// Handlers
// =============================================================================

/// List products, filtered by category or name and paginated.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<ProductsResponse>> {
    let filter = query.into_filter();
    let page = CatalogueService::new(state.erp())
        .list_products(&filter)
        .await?;
    let (prices, customer) = caller_prices(&state, &user).await;

    Ok(Json(ProductsResponse {
        items: decorate(page.items, &prices, customer.is_some()),
        total: page.total,
        is_logged_in: user.0.is_some(),
        customer,
        search_term: filter.search,
        categoria: filter.categoria,
        page: filter.page,
        limit: filter.limit,
    }))
}

/// Product detail by item code or `item_url` slug.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let Some(doc) = CatalogueService::new(state.erp()).find_item(&slug).await? else {
        return Err(AppError::NotFound("Item not found".to_string()));
    };

    let email = user.0.as_ref().map(|identity| &identity.email);
    let prices = PricingService::new(state.erp())
        .personalized_for(email)
        .await;
    let personalized = prices.get(&doc.name).copied();

    Ok(Json(ProductDetail::from_document(doc, personalized)))
}

/// Items flagged as offers.
#[instrument(skip(state, user))]
pub async fn offers(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<OffersQuery>,
) -> Result<Json<ItemsResponse<ItemRow>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_OFFER_LIMIT)
        .clamp(1, MAX_PAGE_SIZE);
    let items = CatalogueService::new(state.erp()).offer_items(limit).await?;
    let (prices, customer) = caller_prices(&state, &user).await;

    Ok(Json(ItemsResponse {
        items: decorate(items, &prices, customer.is_some()),
    }))
}

/// Recently added items.
#[instrument(skip(state, user))]
pub async fn new_arrivals(
    State(state): State<AppState>,
    user: OptionalUser,
) -> Result<Json<ItemsResponse<Map<String, Value>>>> {
    let items = CatalogueService::new(state.erp()).new_arrivals().await?;
    let (prices, customer) = caller_prices(&state, &user).await;

    Ok(Json(ItemsResponse {
        items: decorate_documents(items, &prices, customer.is_some()),
    }))
}

/// Item groups with their item count, alphabetical.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Arc<Vec<GroupCount>>>> {
    Ok(Json(CatalogueService::new(state.erp()).categories().await?))
}

/// Search dropdown suggestions.
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Json<Suggestions> {
    Json(CatalogueService::new(state.erp()).suggest(&query.term).await)
}
