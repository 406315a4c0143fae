//! Standard vs. personalized price decoration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prices known for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInfo {
    /// Public list price.
    pub standard: Option<Decimal>,
    /// Customer-specific price, if the customer has one.
    pub personalized: Option<Decimal>,
}

impl PriceInfo {
    #[must_use]
    pub const fn new(standard: Option<Decimal>, personalized: Option<Decimal>) -> Self {
        Self {
            standard,
            personalized,
        }
    }

    /// Decorate for a caller. `has_customer` is whether the caller resolved
    /// to an ERP customer; anonymous callers never see personalized prices.
    #[must_use]
    pub fn quote(self, has_customer: bool) -> PriceQuote {
        let personalized = if has_customer { self.personalized } else { None };
        let show_personalized_price = personalized.is_some_and(|p| Some(p) != self.standard);
        let display_price = if show_personalized_price {
            personalized
        } else {
            self.standard
        };
        let is_discounted = match (personalized, self.standard) {
            (Some(p), Some(s)) => p < s,
            _ => false,
        };

        PriceQuote {
            price: self.standard,
            personalized_price: personalized,
            display_price,
            show_personalized_price,
            is_discounted,
        }
    }
}

/// The price fields merged into every product returned to the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Option<Decimal>,
    pub personalized_price: Option<Decimal>,
    pub display_price: Option<Decimal>,
    pub show_personalized_price: bool,
    pub is_discounted: bool,
}
