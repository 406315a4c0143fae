//! Login, logout and the routes bound to the logged-in customer.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use sudimport_integration_tests::{CUSTOMER_EMAIL, CUSTOMER_NAME, TestContext};

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new().await;
    let response = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_account_routes_need_login() {
    let ctx = TestContext::new().await;
    for route in ["/api/bestellungen", "/api/dokumente", "/api/adresse", "/api/preise"] {
        let (status, body) = ctx.get_json(route).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{route}");
        assert_eq!(body, json!({"error": "Nicht angemeldet"}));
    }
}

#[tokio::test]
async fn test_untrusted_user_header_is_ignored() {
    let ctx = TestContext::new().await;
    let response = ctx
        .client
        .get(ctx.url("/api/bestellungen"))
        .header("x-user", CUSTOMER_EMAIL)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_identity_cookies_are_ignored() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/api/method/frappe.auth.get_logged_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Guest"})))
        .mount(&ctx.erp)
        .await;

    let response = ctx
        .client
        .get(ctx.url("/api/user-details"))
        .header("cookie", format!("sid=forged; user_email={CUSTOMER_EMAIL}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_then_logout() {
    let ctx = TestContext::new().await;
    ctx.mount_customer_login().await;
    ctx.mount_get("/api/method/logout", json!({})).await;

    let body = ctx.login().await;
    assert_eq!(
        body,
        json!({"message": "Login erfolgreich", "user": CUSTOMER_EMAIL, "customer": CUSTOMER_NAME})
    );

    let (status, user) = ctx.get_json("/api/user").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user, json!({"user": CUSTOMER_EMAIL, "customer": CUSTOMER_NAME}));

    let (status, details) = ctx.get_json("/api/user-details").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["fullName"], "Mario Rossi");
    assert_eq!(details["linkedCustomer"], CUSTOMER_NAME);

    let (status, body) = ctx.post_json("/api/logout", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Logout erfolgreich"}));

    let (_, user) = ctx.get_json("/api/user").await;
    assert_eq!(user, json!({"user": null, "customer": null}));
    let (status, _) = ctx.get_json("/api/bestellungen").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/api/method/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Incorrect password"})),
        )
        .mount(&ctx.erp)
        .await;

    let (status, body) = ctx
        .post_json("/api/login", &json!({"usr": CUSTOMER_EMAIL, "pwd": "falsch"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Incorrect password");

    let (_, user) = ctx.get_json("/api/user").await;
    assert_eq!(user["user"], json!(null));
}

#[tokio::test]
async fn test_address_update_keeps_to_editable_fields() {
    let ctx = TestContext::new().await;
    ctx.mount_customer_login().await;
    ctx.mount_get(
        "/api/resource/Address/Pizzeria%20Roma-Billing",
        json!({"data": {
            "name": "Pizzeria Roma-Billing",
            "address_line1": "Via Roma 1",
            "links": [{"link_doctype": "Customer", "link_name": CUSTOMER_NAME}]
        }}),
    )
    .await;
    ctx.mount_get(
        "/api/resource/Address/Trattoria-Billing",
        json!({"data": {
            "name": "Trattoria-Billing",
            "links": [{"link_doctype": "Customer", "link_name": "Trattoria Bella"}]
        }}),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/resource/Address/Pizzeria%20Roma-Billing"))
        .and(body_json(json!({"address_line1": "Via Garibaldi 7", "pincode": "39100"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"name": "Pizzeria Roma-Billing", "address_line1": "Via Garibaldi 7"}
        })))
        .expect(1)
        .mount(&ctx.erp)
        .await;
    ctx.login().await;

    let response = ctx
        .client
        .put(ctx.url("/api/adresse/Pizzeria%20Roma-Billing"))
        .json(&json!({
            "address_line1": "Via Garibaldi 7",
            "pincode": "39100",
            "links": [{"link_doctype": "Customer", "link_name": "Trattoria Bella"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["updated_fields"], json!(["address_line1", "pincode"]));

    let response = ctx
        .client
        .put(ctx.url("/api/adresse/Pizzeria%20Roma-Billing"))
        .json(&json!({"address_line1": "V"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .client
        .put(ctx.url("/api/adresse/Trattoria-Billing"))
        .json(&json!({"city": "Meran"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
