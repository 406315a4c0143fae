//! Wishlist and shopping list handlers.
//!
//! Both lists are stored in the session under their own key; the routes are
//! mounted once per key.

use axum::{Json, extract::Path};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use sudimport_core::{ItemCode, SHOPPING_LIST_KEY, SavedList, SavedListEntry};

use crate::error::Result;

use super::cart::{CartResponse, load_cart, save_cart};

/// A saved list as returned to the browser.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<SavedListEntry>,
}

impl From<&SavedList> for ListResponse {
    fn from(list: &SavedList) -> Self {
        Self {
            items: list.entries().to_vec(),
        }
    }
}

/// Set the quantity of an entry.
#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub id: ItemCode,
    /// Zero or less removes the entry.
    pub quantity: i64,
}

async fn load(session: &Session, key: &str) -> SavedList {
    session
        .get::<SavedList>(key)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

async fn save(session: &Session, key: &str, list: &SavedList) -> Result<Json<ListResponse>> {
    session.insert(key, list).await?;
    Ok(Json(ListResponse::from(list)))
}

/// Entries of the list.
#[instrument(skip(session))]
pub async fn show(session: Session, key: &'static str) -> Json<ListResponse> {
    Json(ListResponse::from(&load(&session, key).await))
}

/// Add an entry; adding a present entry adds its quantity.
#[instrument(skip(session, entry), fields(id = %entry.id))]
pub async fn add(
    session: Session,
    key: &'static str,
    Json(entry): Json<SavedListEntry>,
) -> Result<Json<ListResponse>> {
    let mut list = load(&session, key).await;
    list.add(entry);
    save(&session, key, &list).await
}

/// Set an entry's quantity; zero or less removes it.
#[instrument(skip(session, body), fields(id = %body.id, quantity = body.quantity))]
pub async fn update(
    session: Session,
    key: &'static str,
    Json(body): Json<QuantityUpdate>,
) -> Result<Json<ListResponse>> {
    let mut list = load(&session, key).await;
    list.set_quantity(&body.id, body.quantity);
    save(&session, key, &list).await
}

/// Remove an entry.
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    key: &'static str,
    Path(id): Path<String>,
) -> Result<Json<ListResponse>> {
    let id = ItemCode::parse(&id)?;
    let mut list = load(&session, key).await;
    list.remove(&id);
    save(&session, key, &list).await
}

/// Remove every entry.
#[instrument(skip(session))]
pub async fn clear(session: Session, key: &'static str) -> Result<Json<ListResponse>> {
    save(&session, key, &SavedList::new()).await
}

/// Move every shopping list entry into the cart, adding quantities.
#[instrument(skip(session))]
pub async fn to_cart(session: Session) -> Result<Json<CartResponse>> {
    let mut list = load(&session, SHOPPING_LIST_KEY).await;
    let mut cart = load_cart(&session).await;

    let entries = list.drain();
    for entry in &entries {
        cart.add_quantity(entry.to_cart_line(), entry.quantity);
    }

    save_cart(&session, &cart).await?;
    session.insert(SHOPPING_LIST_KEY, &list).await?;
    info!(moved = entries.len(), "Shopping list moved to cart");

    Ok(Json(CartResponse::from(&cart)))
}
