//! Money arithmetic on `rust_decimal::Decimal`.
//!
//! ERPNext returns rates as JSON floats; the storefront converts them to
//! `Decimal` at the boundary and does all arithmetic (line totals, VAT,
//! shipping) in decimal so `10.10 * 3` is `30.30`, not `30.299999`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, de::Error as _};

/// Round a monetary amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `percent` % of `amount`, rounded to cents.
#[must_use]
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

/// Deserialize a unit price submitted by the shop, refusing negative amounts.
///
/// # Errors
///
/// Returns a deserialization error for non-decimal input or a price below zero.
pub fn deserialize_unit_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let price = <Decimal as Deserialize>::deserialize(deserializer)?;
    if price < Decimal::ZERO {
        return Err(D::Error::custom("price must not be negative"));
    }
    Ok(price)
}
