//! HTTP route handlers for storefront.
//!
//! Every route answers JSON under `/api`.
//!
//! # Route Structure
//!
//! ```text
//! # Session
//! POST   /api/login                   - ERP login, sets sid/user_email/customer cookies
//! POST   /api/logout                  - ERP logout, clears cookies
//! POST   /api/register                - Forward a customer registration
//! POST   /api/confirm-access          - Link the user to its customer
//! GET    /api/user                    - Current identity
//! GET    /api/user-details            - ERP user record of the caller
//!
//! # Catalogue (public, prices personalized when identified)
//! GET    /api/prodotti                - Product listing
//! GET    /api/prodotto/{slug}         - Product detail
//! GET    /api/prodotti-offerta        - Offer items
//! GET    /api/nuovi-arrivi            - New arrivals
//! GET    /api/categorie               - Item groups with counts
//! GET    /api/suche-suggest           - Search dropdown
//!
//! # Account (requires identity)
//! GET    /api/preise                  - Discounted entries of the customer's price list
//! GET    /api/prezzi                  - Personalized price of one item
//! GET    /api/bestellungen            - Sales orders
//! GET    /api/dokumente               - Sales invoices with open/overdue summary
//! GET    /api/pdf/sales-invoice/{name} - Invoice PDF
//! GET    /api/adresse                 - Billing/shipping/secondary address
//! GET    /api/adresse/{name}          - One address
//! PUT    /api/adresse/{name}          - Update whitelisted address fields
//! DELETE /api/adresse/{name}          - Delete an address
//!
//! # Cart (session)
//! GET    /api/cart                    - Lines, totals and order summary
//! POST   /api/cart/add                - Add one unit of an item
//! POST   /api/cart/update             - Set a quantity (<= 0 removes)
//! POST   /api/cart/remove             - Remove a line
//! POST   /api/cart/clear              - Empty the cart
//! GET    /api/cart/count              - Number of units
//!
//! # Saved lists (session), same for /api/shopping-list
//! GET    /api/wishlist                - Entries
//! POST   /api/wishlist                - Add an entry
//! POST   /api/wishlist/update         - Set a quantity (<= 0 removes)
//! DELETE /api/wishlist/{id}           - Remove an entry
//! DELETE /api/wishlist                - Clear the list
//! POST   /api/shopping-list/to-cart   - Move the shopping list into the cart
//! ```

pub mod account;
pub mod addresses;
pub mod auth;
pub mod cart;
pub mod lists;
pub mod products;

use axum::{
    Json, Router,
    extract::Path,
    routing::{delete, get, post},
};
use tower_sessions::Session;

use sudimport_core::{SHOPPING_LIST_KEY, SavedListEntry, WISHLIST_KEY};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the session routes that take credentials.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/confirm-access", post(auth::confirm_access))
}

/// Create the catalogue routes router.
pub fn catalogue_routes() -> Router<AppState> {
    Router::new()
        .route("/prodotti", get(products::index))
        .route("/prodotto/{slug}", get(products::show))
        .route("/prodotti-offerta", get(products::offers))
        .route("/nuovi-arrivi", get(products::new_arrivals))
        .route("/categorie", get(products::categories))
        .route("/suche-suggest", get(products::suggest))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/user", get(account::user))
        .route("/user-details", get(account::user_details))
        .route("/preise", get(account::price_list))
        .route("/prezzi", get(account::item_price))
        .route("/bestellungen", get(account::orders))
        .route("/dokumente", get(account::documents))
        .route("/pdf/sales-invoice/{name}", get(account::invoice_pdf))
        .route("/adresse", get(addresses::index))
        .route(
            "/adresse/{name}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the routes of one saved list stored under `key`.
pub fn saved_list_routes(key: &'static str) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(move |session: Session| lists::show(session, key))
                .post(move |session: Session, body: Json<SavedListEntry>| {
                    lists::add(session, key, body)
                })
                .delete(move |session: Session| lists::clear(session, key)),
        )
        .route(
            "/update",
            post(move |session: Session, body: Json<lists::QuantityUpdate>| {
                lists::update(session, key, body)
            }),
        )
        .route(
            "/{id}",
            delete(move |session: Session, id: Path<String>| lists::remove(session, key, id)),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalogue_routes())
        .merge(account_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", saved_list_routes(WISHLIST_KEY))
        .nest(
            "/shopping-list",
            saved_list_routes(SHOPPING_LIST_KEY).route("/to-cart", post(lists::to_cart)),
        )
        .layer(api_rate_limiter())
        .merge(auth_routes().layer(auth_rate_limiter()));

    Router::new().nest("/api", api)
}

/// Router test helpers shared by the handler tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::Body,
        http::{HeaderMap, Method, Request, StatusCode, header::SET_COOKIE},
    };
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{ErpConfig, StorefrontConfig};
    use crate::state::AppState;

    /// Caller address sent with every request so the rate limiter can key it.
    const CLIENT_IP: &str = "203.0.113.10";

    /// Identity header accepted by [`TestApp`].
    pub const USER: (&str, &str) = ("x-user", "kunde@example.de");

    /// A JSON response.
    pub struct TestResponse {
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: Value,
    }

    impl TestResponse {
        /// `name=value` pairs of every `Set-Cookie` header.
        pub fn cookies(&self) -> Vec<String> {
            self.headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .filter_map(|v| v.split(';').next())
                .map(ToString::to_string)
                .collect()
        }
    }

    /// The full application wired to a mock ERP, trusting `x-user`.
    pub struct TestApp {
        router: Router,
    }

    impl TestApp {
        pub fn new(server: &MockServer) -> Self {
            let erp = ErpConfig::new(
                Url::parse(&server.uri()).unwrap(),
                "key123",
                SecretString::from("7d1f0e9c2b4a8e3"),
            );
            let mut config = StorefrontConfig::for_erp(erp);
            config.trust_user_header = true;
            Self {
                router: crate::app(AppState::new(config).unwrap()),
            }
        }

        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            headers: &[(&str, &str)],
            body: Option<Value>,
        ) -> TestResponse {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header("x-forwarded-for", CLIENT_IP);
            for (name, value) in headers {
                builder = builder.header(*name, *value);
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            TestResponse {
                status,
                headers,
                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
            }
        }

        pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
            let response = self.send(Method::GET, uri, headers, None).await;
            (response.status, response.body)
        }

        pub async fn post(
            &self,
            uri: &str,
            headers: &[(&str, &str)],
            body: Value,
        ) -> TestResponse {
            self.send(Method::POST, uri, headers, Some(body)).await
        }
    }

    /// Answer `GET route` with `body`.
    pub async fn mount_get(server: &MockServer, route: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }
}
