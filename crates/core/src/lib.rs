//! Sudimport Core - Shared domain types for the B2B storefront.
//!
//! This crate provides the types used by the storefront service and its tests:
//! - `storefront` - JSON API in front of ERPNext
//! - `integration-tests` - End-to-end tests against a mocked ERP
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no session handling. ERPNext owns every persistent record; what
//! lives here is the state the storefront keeps per browser session (cart,
//! saved lists) and the rules it applies to ERP data (price decoration,
//! address update whitelist, invoice summaries).
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, ERP document names, money and statuses
//! - [`cart`] - Session shopping cart keyed by item code
//! - [`lists`] - Wishlist and shopping list entries
//! - [`pricing`] - Standard vs. personalized price decoration
//! - [`address`] - Whitelisted address updates
//! - [`invoice`] - Open/overdue invoice summary

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod invoice;
pub mod lists;
pub mod pricing;
pub mod types;

pub use address::{
    AddressBook, AddressError, AddressOwnership, AddressRecord, AddressUpdate, DynamicLink,
};
pub use cart::{Cart, CartLine, CartSummary, FREE_SHIPPING_THRESHOLD, NewCartLine, UomInfo};
pub use invoice::{InvoiceLine, InvoiceSummary, is_overdue};
pub use lists::{SHOPPING_LIST_KEY, SavedList, SavedListEntry, WISHLIST_KEY};
pub use pricing::{PriceInfo, PriceQuote};
pub use types::*;
