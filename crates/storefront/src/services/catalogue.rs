//! Catalogue reads: listings, product detail, offers, new arrivals,
//! categories and search suggestions.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use sudimport_core::{PriceInfo, round_money};

use crate::erp::types::{ItemDocument, ItemRow, NameRow};
use crate::erp::{ErpClient, ErpError, Filter, GroupCount, ListQuery};

use super::pricing::{PriceMap, PricedItem};

/// Item codes look like `GEG-00003`; anything else is an `item_url` slug.
static ITEM_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}-\d{5}$").expect("Invalid regex"));

/// VAT rate inside a tax template name (`"7% - S"`).
static VAT_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*%").expect("Invalid regex"));

/// Page length used to count every match of a listing.
const COUNT_PAGE_LENGTH: usize = 999_999;

const SUGGEST_MIN_TERM: usize = 2;
const SUGGEST_PRODUCTS: usize = 8;
const SUGGEST_CATEGORIES: usize = 5;

const LISTING_FIELDS: [&str; 6] = [
    "name",
    "item_name",
    "item_group",
    "image",
    "description",
    "standard_rate",
];

const SUGGEST_FIELDS: [&str; 5] = ["name", "item_name", "image", "item_group", "standard_rate"];

// =============================================================================
// Types
// =============================================================================

/// Listing filter from the query string.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub categoria: Option<String>,
    pub search: Option<String>,
    /// 1-based page.
    pub page: usize,
    pub limit: usize,
}

impl ProductFilter {
    fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(categoria) = &self.categoria {
            filters.push(Filter::eq("item_group", categoria.as_str()));
        }
        if let Some(search) = &self.search {
            filters.push(Filter::contains("item_name", search));
        }
        filters
    }

    const fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// One page of a listing together with the total number of matches.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<ItemRow>,
    pub total: usize,
}

/// Alternative sales unit of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternativeUom {
    pub uom: String,
    pub conversion_factor: Decimal,
}

/// Product detail page data. Money values are rendered with two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    pub name: String,
    pub item_url: Option<String>,
    pub item_name: Option<String>,
    pub description: String,
    pub image: Option<String>,
    /// Net price.
    pub price: String,
    pub vat_percent: String,
    pub iva_amount: String,
    /// Gross price.
    pub price_lordo: String,
    pub stock_uom: String,
    pub weight_per_unit: Option<String>,
    pub minimum_order_qty: Decimal,
    pub shelf_life: Option<Value>,
    pub origin: Option<Value>,
    pub alternative_uoms: Vec<AlternativeUom>,
}

impl ProductDetail {
    /// Build the detail view of `doc`.
    ///
    /// The net price is the personalized rate, else `prezzo_vendita`, else
    /// `standard_rate`, else zero. VAT comes from the first tax template.
    #[must_use]
    pub fn from_document(doc: ItemDocument, personalized: Option<Decimal>) -> Self {
        let net = personalized
            .or(doc.prezzo_vendita)
            .or(doc.standard_rate)
            .unwrap_or_default();
        let vat_percent = doc
            .taxes
            .first()
            .and_then(|t| t.item_tax_template.as_deref())
            .map_or(0, vat_percent_of);
        let vat = round_money(net * Decimal::from(vat_percent) / Decimal::ONE_HUNDRED);
        let gross = round_money(net + vat);

        let weight_per_unit = match (doc.weight_per_unit, doc.weight_uom.as_deref()) {
            (Some(w), Some(uom)) if !w.is_zero() && !uom.is_empty() => {
                Some(format!("{} {uom}", w.normalize()))
            }
            _ => None,
        };

        let alternative_uoms = doc
            .uoms
            .into_iter()
            .filter_map(|row| match (row.uom, row.conversion_factor) {
                (Some(uom), Some(factor)) if !uom.is_empty() && !factor.is_zero() => {
                    Some(AlternativeUom {
                        uom,
                        conversion_factor: factor,
                    })
                }
                _ => None,
            })
            .collect();

        Self {
            name: doc.name,
            item_url: doc.item_url,
            item_name: doc.item_name,
            description: doc.description.unwrap_or_default(),
            image: doc.image,
            price: money(net),
            vat_percent: money(Decimal::from(vat_percent)),
            iva_amount: money(vat),
            price_lordo: money(gross),
            stock_uom: doc
                .stock_uom
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "Stk".to_string()),
            weight_per_unit,
            minimum_order_qty: doc
                .min_order_qty
                .filter(|q| !q.is_zero())
                .unwrap_or(Decimal::ONE),
            shelf_life: doc.shelf_life.filter(|v| !v.is_null()),
            origin: doc.origin.filter(|v| !v.is_null()),
            alternative_uoms,
        }
    }
}

/// A product suggestion in the search dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSuggestion {
    pub name: String,
    pub item_name: Option<String>,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    pub item_group: Option<String>,
}

impl From<ItemRow> for ProductSuggestion {
    fn from(item: ItemRow) -> Self {
        Self {
            name: item.name,
            item_name: item.item_name,
            image: item.image,
            price: item.standard_rate,
            item_group: item.item_group,
        }
    }
}

/// A category suggestion in the search dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySuggestion {
    pub name: String,
    pub label: String,
}

/// Search dropdown content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub produkte: Vec<ProductSuggestion>,
    pub kategorien: Vec<CategorySuggestion>,
}

// =============================================================================
// CatalogueService
// =============================================================================

/// Catalogue reads against the ERP.
pub struct CatalogueService<'a> {
    erp: &'a ErpClient,
}

impl<'a> CatalogueService<'a> {
    #[must_use]
    pub const fn new(erp: &'a ErpClient) -> Self {
        Self { erp }
    }

    /// One page of items plus the number of all matches.
    ///
    /// # Errors
    ///
    /// Returns an error if either ERP read fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ErpError> {
        let all: Vec<NameRow> = self
            .erp
            .list(
                &ListQuery::new("Item")
                    .fields(&["name"])
                    .filters(filter.filters())
                    .limit(COUNT_PAGE_LENGTH),
            )
            .await?;

        let items: Vec<ItemRow> = self
            .erp
            .list(
                &ListQuery::new("Item")
                    .fields(&LISTING_FIELDS)
                    .filters(filter.filters())
                    .start(filter.offset())
                    .limit(filter.limit),
            )
            .await?;

        Ok(ProductPage {
            items,
            total: all.len(),
        })
    }

    /// Find an item by code or by `item_url` slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP fails for a reason other than a missing
    /// document.
    #[instrument(skip(self))]
    pub async fn find_item(&self, slug: &str) -> Result<Option<ItemDocument>, ErpError> {
        if ITEM_CODE_RE.is_match(slug) {
            if let Some(doc) = self.item_document(slug).await? {
                return Ok(Some(doc));
            }
        }

        let rows: Vec<NameRow> = self
            .erp
            .list(
                &ListQuery::new("Item")
                    .fields(&["name"])
                    .filter(Filter::eq("item_url", slug))
                    .limit(1),
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => self.item_document(&row.name).await,
            None => Ok(None),
        }
    }

    async fn item_document(&self, code: &str) -> Result<Option<ItemDocument>, ErpError> {
        match self.erp.get_doc::<ItemDocument>("Item", code).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Items flagged as offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP read fails.
    #[instrument(skip(self))]
    pub async fn offer_items(&self, limit: usize) -> Result<Vec<ItemRow>, ErpError> {
        self.erp
            .list(
                &ListQuery::new("Item")
                    .fields(&["name", "item_name", "image", "standard_rate"])
                    .filter(Filter::eq("is_offer_item", 1))
                    .limit(limit),
            )
            .await
    }

    /// Items returned by the new arrivals method, kept as raw documents.
    ///
    /// The method answers with `message` or `data` depending on the ERP
    /// version; non-object entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the method call fails.
    #[instrument(skip(self))]
    pub async fn new_arrivals(&self) -> Result<Vec<Map<String, Value>>, ErpError> {
        let body = self
            .erp
            .call_raw(&self.erp.config().new_arrivals_method, &[])
            .await?;
        let list = match body {
            Value::Object(mut map) => map
                .remove("message")
                .filter(Value::is_array)
                .or_else(|| map.remove("data"))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
        let Value::Array(entries) = list else {
            return Ok(Vec::new());
        };
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    /// Item count per item group, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns an error if the item scan fails.
    pub async fn categories(&self) -> Result<Arc<Vec<GroupCount>>, ErpError> {
        self.erp.item_group_counts().await
    }

    /// Search dropdown suggestions. Never fails; ERP errors yield empty lists.
    #[instrument(skip(self))]
    pub async fn suggest(&self, term: &str) -> Suggestions {
        let term = term.trim();
        if term.chars().count() < SUGGEST_MIN_TERM {
            return Suggestions::default();
        }

        let mut produkte = self.suggest_items("item_name", term).await;
        let kategorien = match self
            .erp
            .list::<NameRow>(
                &ListQuery::new("Item Group")
                    .fields(&["name"])
                    .filter(Filter::contains("name", term))
                    .order_by("name")
                    .limit(SUGGEST_CATEGORIES),
            )
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|r| CategorySuggestion {
                    label: r.name.clone(),
                    name: r.name,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Category suggestions unavailable");
                Vec::new()
            }
        };

        if produkte.is_empty() {
            produkte = self.suggest_items("name", term).await;
        }

        Suggestions {
            produkte,
            kategorien,
        }
    }

    async fn suggest_items(&self, field: &str, term: &str) -> Vec<ProductSuggestion> {
        let query = ListQuery::new("Item")
            .fields(&SUGGEST_FIELDS)
            .filters([Filter::contains(field, term), Filter::eq("disabled", 0)])
            .order_by(field)
            .limit(SUGGEST_PRODUCTS);
        match self.erp.list::<ItemRow>(&query).await {
            Ok(rows) => rows.into_iter().map(ProductSuggestion::from).collect(),
            Err(e) => {
                warn!(error = %e, field, "Product suggestions unavailable");
                Vec::new()
            }
        }
    }
}

/// Decorate raw new-arrival documents with the caller's prices.
///
/// The standard price is read from `standard_rate` when present.
#[must_use]
pub fn decorate_documents(
    items: Vec<Map<String, Value>>,
    prices: &PriceMap,
    has_customer: bool,
) -> Vec<PricedItem<Map<String, Value>>> {
    items
        .into_iter()
        .map(|item| {
            let standard = item
                .get("standard_rate")
                .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok());
            let personalized = item
                .get("name")
                .and_then(Value::as_str)
                .and_then(|name| prices.get(name).copied());
            PricedItem {
                quote: PriceInfo::new(standard, personalized).quote(has_customer),
                item,
            }
        })
        .collect()
}

fn vat_percent_of(template: &str) -> u32 {
    VAT_PERCENT_RE
        .captures(template)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}
