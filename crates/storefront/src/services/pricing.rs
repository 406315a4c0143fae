//! Personalized prices.
//!
//! Two sources exist in the ERP:
//!
//! - the price method (`ERP_PRICE_METHOD?email=`), returning every item the
//!   user has a special rate for; used to decorate catalogue listings
//! - the customer's default price list, read row by row from `Item Price`;
//!   used for the "my prices" page, which only lists real discounts

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use sudimport_core::{CustomerName, Email, PriceInfo, PriceQuote};

use crate::erp::types::{CustomerRecord, ItemPriceRow, ItemRow};
use crate::erp::{ErpClient, ErpError, Filter, ListQuery};

/// Upper bound on price rows read for one price list.
const PRICE_ROW_LIMIT: usize = 1000;

/// Item code → personalized rate.
pub type PriceMap = Arc<HashMap<String, Decimal>>;

/// A listing row merged with its price quote.
#[derive(Debug, Clone, Serialize)]
pub struct PricedItem<T: Serialize> {
    #[serde(flatten)]
    pub item: T,
    #[serde(flatten)]
    pub quote: PriceQuote,
}

/// An entry of the customer's price list that beats the public price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountedItem {
    pub name: String,
    pub item_name: Option<String>,
    pub item_group: Option<String>,
    pub image: Option<String>,
    /// Customer rate.
    pub price: Decimal,
    /// Public rate.
    pub public_price: Decimal,
    pub is_discounted: bool,
}

/// Price lookups against the ERP.
pub struct PricingService<'a> {
    erp: &'a ErpClient,
}

impl<'a> PricingService<'a> {
    #[must_use]
    pub const fn new(erp: &'a ErpClient) -> Self {
        Self { erp }
    }

    /// Personalized prices of the caller, empty for anonymous callers.
    ///
    /// A failing price method degrades to no personalized prices.
    #[instrument(skip(self))]
    pub async fn personalized_for(&self, email: Option<&Email>) -> PriceMap {
        let Some(email) = email else {
            return PriceMap::default();
        };
        match self.erp.personalized_prices(email.as_str()).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "Personalized prices unavailable");
                PriceMap::default()
            }
        }
    }

    /// Discounted entries of the customer's default price list.
    ///
    /// Customers without a default price list, or whose list holds no
    /// customer-specific rows, get an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if any ERP read fails.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn customer_price_list(
        &self,
        customer: &CustomerName,
    ) -> Result<Vec<DiscountedItem>, ErpError> {
        let record: CustomerRecord = self.erp.get_doc("Customer", customer.as_str()).await?;
        let Some(price_list) = record.default_price_list.filter(|p| !p.is_empty()) else {
            return Ok(Vec::new());
        };

        let personal: Vec<ItemPriceRow> = self
            .erp
            .list(
                &ListQuery::new("Item Price")
                    .fields(&["item_code", "price_list_rate"])
                    .filters([
                        Filter::eq("price_list", price_list.as_str()),
                        Filter::eq("customer", customer.as_str()),
                        Filter::eq("selling", 1),
                    ])
                    .limit(PRICE_ROW_LIMIT),
            )
            .await?;
        if personal.is_empty() {
            return Ok(Vec::new());
        }

        let codes: Vec<&str> = personal.iter().map(|r| r.item_code.as_str()).collect();

        let standard: Vec<ItemPriceRow> = self
            .erp
            .list(
                &ListQuery::new("Item Price")
                    .fields(&["item_code", "price_list_rate"])
                    .filters([
                        Filter::eq("price_list", price_list.as_str()),
                        Filter::not_set("customer"),
                        Filter::eq("selling", 1),
                        Filter::one_of("item_code", codes.iter().copied()),
                    ])
                    .limit(PRICE_ROW_LIMIT),
            )
            .await?;

        let items: Vec<ItemRow> = self
            .erp
            .list(
                &ListQuery::new("Item")
                    .fields(&["name", "item_name", "item_group", "image", "prezzo_vendita"])
                    .filter(Filter::one_of("name", codes.iter().copied()))
                    .limit(PRICE_ROW_LIMIT),
            )
            .await?;

        Ok(discounted_items(personal, &standard, items))
    }
}

/// Decorate listing rows with the caller's prices.
///
/// The standard price of a row is its `standard_rate`, falling back to
/// `prezzo_vendita`.
#[must_use]
pub fn decorate(items: Vec<ItemRow>, prices: &PriceMap, has_customer: bool) -> Vec<PricedItem<ItemRow>> {
    items
        .into_iter()
        .map(|item| {
            let info = PriceInfo::new(
                item.standard_rate.or(item.prezzo_vendita),
                prices.get(&item.name).copied(),
            );
            PricedItem {
                quote: info.quote(has_customer),
                item,
            }
        })
        .collect()
}

/// Keep the personal rows that undercut the public price, in list order.
///
/// The public price is the standard `Item Price` row of the same list,
/// falling back to the item's `prezzo_vendita`.
fn discounted_items(
    personal: Vec<ItemPriceRow>,
    standard: &[ItemPriceRow],
    items: Vec<ItemRow>,
) -> Vec<DiscountedItem> {
    let standard: HashMap<&str, Decimal> = standard
        .iter()
        .map(|r| (r.item_code.as_str(), r.price_list_rate))
        .collect();
    let mut items: HashMap<String, ItemRow> =
        items.into_iter().map(|i| (i.name.clone(), i)).collect();

    personal
        .into_iter()
        .filter_map(|row| {
            let item = items.remove(&row.item_code)?;
            let public_price = standard
                .get(row.item_code.as_str())
                .copied()
                .or(item.prezzo_vendita)?;
            (row.price_list_rate < public_price).then(|| DiscountedItem {
                name: row.item_code,
                item_name: item.item_name,
                item_group: item.item_group,
                image: item.image,
                price: row.price_list_rate,
                public_price,
                is_discounted: true,
            })
        })
        .collect()
}
