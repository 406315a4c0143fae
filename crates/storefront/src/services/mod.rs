//! Business logic services for storefront.
//!
//! # Services
//!
//! - `customer` - Email → ERP customer resolution (cached)
//! - `pricing` - Personalized price maps and the customer price list
//! - `catalogue` - Item listings, detail, offers, categories, suggestions
//! - `addresses` - Customer addresses and ownership checks
//! - `documents` - Sales orders and invoices of a customer
//! - `registration` - Guest registration forwarding
//!
//! Services borrow the [`ErpClient`](crate::erp::ErpClient) from the
//! application state and are created per request, except the customer
//! resolver which owns its cache and lives in the state.

pub mod addresses;
pub mod catalogue;
pub mod customer;
pub mod documents;
pub mod pricing;
pub mod registration;

pub use customer::{CustomerResolver, Resolution, ResolutionSource};

use thiserror::Error;

use crate::erp::ErpError;

/// Errors reading a document on behalf of a customer.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The document does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The document belongs to another customer.
    #[error("Not authorized to access this {0}")]
    NotOwner(&'static str),

    /// ERP call failed.
    #[error(transparent)]
    Erp(#[from] ErpError),
}
