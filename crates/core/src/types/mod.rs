//! Core types for the Sudimport storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod money;
pub mod name;
pub mod status;

pub use email::{Email, EmailError};
pub use money::{deserialize_unit_price, percent_of, round_money};
pub use name::*;
pub use status::{DocStatus, flag_is_set};
