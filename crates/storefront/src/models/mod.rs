//! Domain models for storefront.
//!
//! Only session-held state lives here; every other record is owned by the
//! ERP and modelled in [`crate::erp::types`] or `sudimport-core`.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
