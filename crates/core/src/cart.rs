//! Session shopping cart.
//!
//! A cart is an insertion-ordered list of lines keyed by ERP item code. All
//! operations are total: adding an existing code bumps its quantity, setting
//! a quantity of zero or less removes the line, and removing an unknown code
//! is a no-op. The storefront persists the whole cart into the session after
//! every mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ItemCode, deserialize_unit_price, percent_of, round_money};

/// German standard VAT rate applied to the cart summary.
pub const VAT_RATE_PERCENT: u32 = 19;

/// Net order value from which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Flat shipping charge below the threshold (29.99).
pub const SHIPPING_FLAT_RATE: Decimal = Decimal::from_parts(2999, 0, 0, false, 2);

/// Unit-of-measure metadata shown next to B2B prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UomInfo {
    /// Sales unit, e.g. `"kg"`, `"lt"`, `"Stk"`, `"Karton"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    /// Human readable content, e.g. `"6 kg ca."`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_per_unit: Option<String>,
    /// Packaging, e.g. `"Confezione da 12"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_size: Option<String>,
    /// Minimum order quantity as configured in the ERP (display only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_order_qty: Option<u32>,
    /// Unit price label, e.g. `"€/kg"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_uom: Option<String>,
}

/// An item as submitted by "add to cart" (everything but the quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartLine {
    /// ERP item code.
    pub name: ItemCode,
    /// Display name.
    pub item_name: String,
    /// Unit net price, never negative.
    #[serde(deserialize_with = "deserialize_unit_price")]
    pub price: Decimal,
    /// Image path or URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Unit-of-measure metadata.
    #[serde(flatten)]
    pub uom: UomInfo,
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: ItemCode,
    pub item_name: String,
    pub price: Decimal,
    /// Always at least 1 while the line exists.
    pub qty: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub uom: UomInfo,
}

impl CartLine {
    fn from_new(item: NewCartLine, qty: u32) -> Self {
        Self {
            name: item.name,
            item_name: item.item_name,
            price: item.price,
            qty,
            image: item.image,
            uom: item.uom,
        }
    }

    /// `price × qty`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

/// B2B order summary shown on the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub net_total: Decimal,
    pub vat_percent: u32,
    pub vat_amount: Decimal,
    pub gross_total: Decimal,
    pub shipping: Decimal,
    pub free_shipping: bool,
    pub final_total: Decimal,
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.items
    }

    /// Look up a line by item code.
    #[must_use]
    pub fn get(&self, code: &ItemCode) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.name == code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Add one unit: bumps an existing line or inserts a new one at qty 1.
    ///
    /// The stored display data of an existing line is kept as is. Returns the
    /// line's resulting quantity.
    pub fn add(&mut self, item: NewCartLine) -> u32 {
        self.add_quantity(item, 1)
    }

    /// Add `qty` units (at least one) of an item.
    pub fn add_quantity(&mut self, item: NewCartLine, qty: u32) -> u32 {
        let qty = qty.max(1);
        if let Some(line) = self.items.iter_mut().find(|line| line.name == item.name) {
            line.qty = line.qty.saturating_add(qty);
            return line.qty;
        }
        self.items.push(CartLine::from_new(item, qty));
        qty
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, code: &ItemCode) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.name != code);
        self.items.len() != before
    }

    /// Overwrite a line's quantity; zero or negative removes it.
    ///
    /// Unknown codes are ignored. Returns the resulting quantity, `None`
    /// when the line no longer exists.
    pub fn set_quantity(&mut self, code: &ItemCode, qty: i64) -> Option<u32> {
        if qty <= 0 {
            self.remove(code);
            return None;
        }
        let qty = u32::try_from(qty).unwrap_or(u32::MAX);
        let line = self.items.iter_mut().find(|line| &line.name == code)?;
        line.qty = qty;
        Some(qty)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.qty)).sum()
    }

    /// Sum of `price × qty`.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Net, VAT, shipping and final totals.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        let net_total = round_money(self.total_price());
        let vat_amount = percent_of(net_total, Decimal::from(VAT_RATE_PERCENT));
        let gross_total = net_total + vat_amount;
        let free_shipping = net_total >= FREE_SHIPPING_THRESHOLD;
        let shipping = if free_shipping {
            Decimal::ZERO
        } else {
            SHIPPING_FLAT_RATE
        };

        CartSummary {
            net_total,
            vat_percent: VAT_RATE_PERCENT,
            vat_amount,
            gross_total,
            shipping,
            free_shipping,
            final_total: gross_total + shipping,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn item(code: &str, cents: i64) -> NewCartLine {
        NewCartLine {
            name: ItemCode::new_unchecked(code),
            item_name: format!("Artikel {code}"),
            price: Decimal::new(cents, 2),
            image: None,
            uom: UomInfo::default(),
        }
    }

    #[test]
    fn test_add_same_code_twice_increments() {
        let mut cart = Cart::new();
        cart.add(item("ABC-001", 1000));
        assert_eq!(cart.total_items(), 1);
        assert_eq!(cart.total_price(), Decimal::new(1000, 2));

        cart.add(item("ABC-001", 1000));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].qty, 2);
        assert_eq!(cart.total_price(), Decimal::new(2000, 2));

        cart.set_quantity(&ItemCode::new_unchecked("ABC-001"), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_new_line_with_negative_price_is_rejected() {
        let line = serde_json::json!({"name": "ABC-001", "item_name": "Artikel", "price": "-5.00"});
        assert!(serde_json::from_value::<NewCartLine>(line).is_err());

        let line = serde_json::json!({"name": "ABC-001", "item_name": "Artikel", "price": 4.5, "uom": "kg"});
        let parsed: NewCartLine = serde_json::from_value(line).unwrap();
        assert_eq!(parsed.price, Decimal::new(45, 1));
        assert_eq!(parsed.uom.uom.as_deref(), Some("kg"));
    }

    #[test]
    fn test_add_keeps_existing_display_data() {
        let mut cart = Cart::new();
        cart.add(item("ABC-001", 1000));
        cart.add(item("ABC-001", 1500));
        assert_eq!(cart.lines()[0].price, Decimal::new(1000, 2));
    }

    #[test]
    fn test_set_quantity_negative_removes() {
        let mut cart = Cart::new();
        cart.add(item("A", 100));
        cart.add(item("B", 100));
        assert_eq!(cart.set_quantity(&ItemCode::new_unchecked("A"), -3), None);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].name.as_str(), "B");
    }

    #[test]
    fn test_set_quantity_unknown_code_is_noop() {
        let mut cart = Cart::new();
        cart.add(item("A", 100));
        assert_eq!(cart.set_quantity(&ItemCode::new_unchecked("Z"), 5), None);
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_total_price_is_sum_of_line_totals() {
        let mut cart = Cart::new();
        cart.add(item("A", 1010));
        cart.set_quantity(&ItemCode::new_unchecked("A"), 3);
        cart.add(item("B", 250));
        // 10.10 * 3 + 2.50
        assert_eq!(cart.total_price(), Decimal::new(3280, 2));
        assert_eq!(cart.total_items(), 4);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(item("A", 100));
        cart.add(item("B", 100));
        assert!(cart.remove(&ItemCode::new_unchecked("A")));
        assert!(!cart.remove(&ItemCode::new_unchecked("A")));
        cart.clear();
        assert!(cart.is_empty());
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_summary_below_free_shipping() {
        let mut cart = Cart::new();
        cart.add(item("A", 10_000));
        let summary = cart.summary();
        assert_eq!(summary.net_total, Decimal::new(10_000, 2));
        assert_eq!(summary.vat_amount, Decimal::new(1_900, 2));
        assert_eq!(summary.gross_total, Decimal::new(11_900, 2));
        assert_eq!(summary.shipping, SHIPPING_FLAT_RATE);
        assert!(!summary.free_shipping);
        assert_eq!(summary.final_total, Decimal::new(14_899, 2));
    }

    #[test]
    fn test_summary_free_shipping_at_threshold() {
        let mut cart = Cart::new();
        cart.add(item("A", 50_000));
        let summary = cart.summary();
        assert!(summary.free_shipping);
        assert_eq!(summary.shipping, Decimal::ZERO);
        assert_eq!(summary.final_total, Decimal::new(59_500, 2));
    }

    #[test]
    fn test_serde_keeps_uom_flat() {
        let json = serde_json::json!({
            "name": "KAS-00012",
            "item_name": "Parmigiano",
            "price": "18.90",
            "uom": "kg",
            "weight_per_unit": "6 kg ca."
        });
        let line: NewCartLine = serde_json::from_value(json).unwrap();
        assert_eq!(line.uom.uom.as_deref(), Some("kg"));
        assert_eq!(line.price, Decimal::new(1890, 2));

        let mut cart = Cart::new();
        cart.add(line);
        let out = serde_json::to_value(&cart).unwrap();
        assert_eq!(out[0]["qty"], 1);
        assert_eq!(out[0]["weight_per_unit"], "6 kg ca.");
    }
}
