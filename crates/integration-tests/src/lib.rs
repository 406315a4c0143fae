//! Integration tests for the Sudimport storefront.
//!
//! Every test starts the real router on a loopback port, wired to a
//! `wiremock` ERPNext, and talks to it over HTTP with a cookie-keeping
//! client, the way the shop front end does.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sudimport-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `storefront_session` - Login, logout and identity-bound routes
//! - `storefront_shop` - Catalogue prices, cart and saved lists

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;

use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sudimport_storefront::config::{ErpConfig, StorefrontConfig};
use sudimport_storefront::state::AppState;

/// E-mail of the customer user the mock ERP knows.
pub const CUSTOMER_EMAIL: &str = "kunde@example.de";

/// Customer linked to [`CUSTOMER_EMAIL`].
pub const CUSTOMER_NAME: &str = "Pizzeria Roma";

/// A storefront bound to a loopback port, backed by a mock ERP.
pub struct TestContext {
    pub erp: MockServer,
    pub client: Client,
    base_url: String,
}

impl TestContext {
    /// Start a mock ERP and a storefront in front of it.
    pub async fn new() -> Self {
        let erp = MockServer::start().await;
        let config = StorefrontConfig::for_erp(ErpConfig::new(
            Url::parse(&erp.uri()).unwrap(),
            "key123",
            SecretString::from("7d1f0e9c2b4a8e3"),
        ));
        let app = sudimport_storefront::app(AppState::new(config).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let client = Client::builder().cookie_store(true).build().unwrap();
        Self {
            erp,
            client,
            base_url: format!("http://{addr}"),
        }
    }

    /// Absolute URL of a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET` a path and decode the JSON body.
    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// `POST` JSON to a path and decode the JSON body.
    pub async fn post_json(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Make the mock ERP accept a login of [`CUSTOMER_EMAIL`], linked to
    /// [`CUSTOMER_NAME`].
    pub async fn mount_customer_login(&self) {
        Mock::given(method("POST"))
            .and(path("/api/method/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "sid=5b2e8c4d1f; Path=/; HttpOnly")
                    .set_body_json(json!({"message": "Logged In"})),
            )
            .mount(&self.erp)
            .await;
        self.mount_get(
            "/api/method/frappe.auth.get_logged_user",
            json!({"message": CUSTOMER_EMAIL}),
        )
        .await;
        self.mount_get(
            &format!("/api/resource/User/{CUSTOMER_EMAIL}"),
            json!({"data": {"linked_customer": CUSTOMER_NAME, "full_name": "Mario Rossi"}}),
        )
        .await;
    }

    /// Log in as [`CUSTOMER_EMAIL`]; the client keeps the cookies.
    pub async fn login(&self) -> Value {
        let (status, body) = self
            .post_json("/api/login", &json!({"usr": CUSTOMER_EMAIL, "pwd": "geheim"}))
            .await;
        assert_eq!(status, reqwest::StatusCode::OK, "login failed: {body}");
        body
    }

    /// Answer `GET route` on the mock ERP with `body`.
    pub async fn mount_get(&self, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.erp)
            .await;
    }
}
