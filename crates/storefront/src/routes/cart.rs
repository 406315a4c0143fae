//! Cart route handlers.
//!
//! The cart lives in the server-side session and is written back after
//! every mutation. Prices are the ones the browser saw when adding; the ERP
//! re-prices when the order is placed.

use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use sudimport_core::{Cart, CartLine, CartSummary, ItemCode, NewCartLine};

use crate::error::{Result, add_breadcrumb};
use crate::models::session_keys;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Full cart view.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub total_items: u64,
    pub total_price: Decimal,
    pub summary: CartSummary,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().to_vec(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
            summary: cart.summary(),
        }
    }
}

/// Cart badge.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Set the quantity of a line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartBody {
    pub name: ItemCode,
    /// Zero or less removes the line.
    pub qty: i64,
}

/// Remove a line.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartBody {
    pub name: ItemCode,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session; a missing or unreadable cart is empty.
pub(crate) async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Write the cart back to the session.
pub(crate) async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Json<CartResponse> {
    Json(CartResponse::from(&load_cart(&session).await))
}

/// Add one unit of an item.
#[instrument(skip(session, item), fields(item = %item.name))]
pub async fn add(session: Session, Json(item): Json<NewCartLine>) -> Result<Json<CartResponse>> {
    let mut cart = load_cart(&session).await;
    let code = item.name.to_string();
    let qty = cart.add(item);
    save_cart(&session, &cart).await?;

    let qty = qty.to_string();
    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("item", code.as_str()), ("qty", qty.as_str())][..]),
    );
    Ok(Json(CartResponse::from(&cart)))
}

/// Set the quantity of a line; zero or less removes it.
#[instrument(skip(session, body), fields(item = %body.name, qty = body.qty))]
pub async fn update(
    session: Session,
    Json(body): Json<UpdateCartBody>,
) -> Result<Json<CartResponse>> {
    let mut cart = load_cart(&session).await;
    cart.set_quantity(&body.name, body.qty);
    save_cart(&session, &cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// Remove a line.
#[instrument(skip(session, body), fields(item = %body.name))]
pub async fn remove(
    session: Session,
    Json(body): Json<RemoveFromCartBody>,
) -> Result<Json<CartResponse>> {
    let mut cart = load_cart(&session).await;
    if cart.remove(&body.name) {
        save_cart(&session, &cart).await?;
    }
    Ok(Json(CartResponse::from(&cart)))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartResponse>> {
    let cart = Cart::new();
    save_cart(&session, &cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// Number of units in the cart.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Json<CountResponse> {
    Json(CountResponse {
        count: load_cart(&session).await.total_items(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use wiremock::MockServer;

    use crate::routes::test_support::TestApp;

    fn session_cookie(cookies: &[String]) -> String {
        cookies
            .iter()
            .find(|c| c.starts_with("sudimport_session="))
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_cart_survives_between_requests() {
        let server = MockServer::start().await;
        let app = TestApp::new(&server);

        let added = app
            .post(
                "/api/cart/add",
                &[],
                json!({"name": "GEG-00003", "item_name": "Guanciale", "price": "12.50", "uom": "kg"}),
            )
            .await;
        assert_eq!(added.status, StatusCode::OK);
        let cookie = session_cookie(&added.cookies());
        let headers = [("cookie", cookie.as_str())];

        let again = app
            .post(
                "/api/cart/add",
                &headers,
                json!({"name": "GEG-00003", "item_name": "Guanciale", "price": "12.50"}),
            )
            .await;
        assert_eq!(again.body["items"][0]["qty"], 2);
        assert_eq!(again.body["items"][0]["uom"], "kg");
        assert_eq!(again.body["total_price"], "25.00");

        let (_, count) = app.get("/api/cart/count", &headers).await;
        assert_eq!(count, json!({"count": 2}));

        let updated = app
            .post("/api/cart/update", &headers, json!({"name": "GEG-00003", "qty": 0}))
            .await;
        assert_eq!(updated.body["items"], json!([]));
        assert_eq!(updated.body["total_items"], 0);
    }

    #[tokio::test]
    async fn test_negative_price_is_refused() {
        let server = MockServer::start().await;
        let app = TestApp::new(&server);

        let refused = app
            .post(
                "/api/cart/add",
                &[],
                json!({"name": "GEG-00003", "item_name": "Guanciale", "price": "-12.50"}),
            )
            .await;
        assert_eq!(refused.status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, count) = app.get("/api/cart/count", &[]).await;
        assert_eq!(count, json!({"count": 0}));
    }

    #[tokio::test]
    async fn test_fresh_session_has_empty_cart() {
        let server = MockServer::start().await;
        let response = TestApp::new(&server)
            .send(Method::GET, "/api/cart", &[], None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["items"], json!([]));
        assert_eq!(response.body["summary"]["free_shipping"], false);
    }

    #[tokio::test]
    async fn test_clear_empties_cart() {
        let server = MockServer::start().await;
        let app = TestApp::new(&server);
        let added = app
            .post(
                "/api/cart/add",
                &[],
                json!({"name": "OLI-00001", "item_name": "Olio EVO 5 lt", "price": 39.9}),
            )
            .await;
        let cookie = session_cookie(&added.cookies());

        let cleared = app
            .post("/api/cart/clear", &[("cookie", cookie.as_str())], json!({}))
            .await;
        assert_eq!(cleared.body["total_items"], 0);
    }
}
