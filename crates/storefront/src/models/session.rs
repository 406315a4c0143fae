//! Session-related types.
//!
//! Types stored in the server-side session: the logged-in identity and the
//! shopping state (cart, wishlist, shopping list).

use serde::{Deserialize, Serialize};

use sudimport_core::{CustomerName, Email};

/// Session-stored user identity.
///
/// Written at login, removed at logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Login e-mail of the ERP user.
    pub email: Email,
    /// Customer the user was resolved to at login.
    pub customer: Option<CustomerName>,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    pub use sudimport_core::{SHOPPING_LIST_KEY as SHOPPING_LIST, WISHLIST_KEY as WISHLIST};
}
