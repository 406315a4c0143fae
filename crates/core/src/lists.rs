//! Wishlist and shopping list.
//!
//! Both lists share one shape: entries keyed by item code with a display
//! name, a unit price and a quantity. They are stored separately in the
//! session under [`WISHLIST_KEY`] and [`SHOPPING_LIST_KEY`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{NewCartLine, UomInfo};
use crate::types::{ItemCode, deserialize_unit_price};

/// Session key of the wishlist.
pub const WISHLIST_KEY: &str = "wishlist";

/// Session key of the shopping list.
pub const SHOPPING_LIST_KEY: &str = "shoppingList";

/// An entry in a saved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedListEntry {
    pub id: ItemCode,
    pub name: String,
    #[serde(deserialize_with = "deserialize_unit_price")]
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

impl SavedListEntry {
    /// Convert into an add-to-cart payload.
    #[must_use]
    pub fn to_cart_line(&self) -> NewCartLine {
        NewCartLine {
            name: self.id.clone(),
            item_name: self.name.clone(),
            price: self.price,
            image: None,
            uom: UomInfo::default(),
        }
    }
}

/// A wishlist or shopping list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedList {
    entries: Vec<SavedListEntry>,
}

impl SavedList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[SavedListEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, or add its quantity to an existing one.
    pub fn add(&mut self, entry: SavedListEntry) {
        let added = entry.quantity.max(1);
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(added),
            None => self.entries.push(SavedListEntry {
                quantity: added,
                ..entry
            }),
        }
    }

    /// Overwrite an entry's quantity; zero or negative removes it.
    pub fn set_quantity(&mut self, id: &ItemCode, quantity: i64) {
        if quantity <= 0 {
            self.remove(id);
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.id == id) {
            entry.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&mut self, id: &ItemCode) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Empty the list, returning what it held.
    pub fn drain(&mut self) -> Vec<SavedListEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cart::Cart;

    fn entry(id: &str, quantity: u32) -> SavedListEntry {
        SavedListEntry {
            id: ItemCode::new_unchecked(id),
            name: format!("Artikel {id}"),
            price: Decimal::new(499, 2),
            quantity,
        }
    }

    #[test]
    fn test_add_merges_quantities() {
        let mut list = SavedList::new();
        list.add(entry("OLI-00001", 2));
        list.add(entry("OLI-00001", 3));
        assert_eq!(list.entries().len(), 1);
        assert_eq!(list.entries()[0].quantity, 5);
    }

    #[test]
    fn test_add_zero_quantity_counts_as_one() {
        let mut list = SavedList::new();
        list.add(entry("OLI-00001", 0));
        assert_eq!(list.entries()[0].quantity, 1);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut list = SavedList::new();
        list.add(entry("A", 1));
        list.set_quantity(&ItemCode::new_unchecked("A"), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_drain_into_cart() {
        let mut list = SavedList::new();
        list.add(entry("A", 2));
        list.add(entry("B", 1));

        let mut cart = Cart::new();
        for e in list.drain() {
            cart.add_quantity(e.to_cart_line(), e.quantity);
        }
        assert!(list.is_empty());
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Decimal::new(1497, 2));
    }

    #[test]
    fn test_deserialize_missing_quantity_defaults_to_one() {
        let json = r#"[{"id":"A","name":"Olio","price":"4.99"}]"#;
        let list: SavedList = serde_json::from_str(json).unwrap();
        assert_eq!(list.entries()[0].quantity, 1);
    }
}
