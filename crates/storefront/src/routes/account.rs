//! Account route handlers.
//!
//! Everything here acts on the caller's ERP customer. Routes that only make
//! sense for a linked customer answer with empty results when the caller has
//! none; document downloads refuse them.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sudimport_core::{CustomerName, Email, InvoiceLine, InvoiceSummary, SalesInvoiceName};

use crate::erp::types::UserRecord;
use crate::error::{AppError, Result};
use crate::middleware::{Identity, OptionalUser, RequireUser};
use crate::services::documents::{DocumentService, OrderLine};
use crate::services::pricing::{DiscountedItem, PricingService};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Who is calling.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Option<Email>,
    pub customer: Option<CustomerName>,
}

#[derive(Debug, Deserialize)]
pub struct UserDetailsQuery {
    pub email: Option<String>,
}

/// ERP user record of the caller.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailsResponse {
    pub linked_customer: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Email,
}

#[derive(Debug, Serialize)]
pub struct PriceListResponse {
    pub items: Vec<DiscountedItem>,
}

#[derive(Debug, Deserialize)]
pub struct ItemPriceQuery {
    pub item: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemPriceResponse {
    pub email: Email,
    pub item: String,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderLine>,
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub docs: Vec<InvoiceLine>,
    pub summary: InvoiceSummary,
}

async fn customer_of(state: &AppState, identity: &Identity) -> Option<CustomerName> {
    state.customers().resolve(&identity.email).await.customer
}

// =============================================================================
// Handlers
// =============================================================================

/// Current identity and its customer, both null when anonymous.
#[instrument(skip(state, user))]
pub async fn user(State(state): State<AppState>, user: OptionalUser) -> Json<UserResponse> {
    let Some(identity) = user.0 else {
        return Json(UserResponse {
            user: None,
            customer: None,
        });
    };
    let customer = customer_of(&state, &identity).await;
    Json(UserResponse {
        user: Some(identity.email),
        customer,
    })
}

/// ERP user record of the caller.
///
/// An `email` parameter naming somebody else is refused.
#[instrument(skip(state, identity))]
pub async fn user_details(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Query(query): Query<UserDetailsQuery>,
) -> Result<Json<UserDetailsResponse>> {
    if let Some(requested) = query.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if Email::parse(requested)? != identity.email {
            return Err(AppError::Forbidden("Not authorized".to_string()));
        }
    }

    let record: UserRecord = match state.erp().get_doc("User", identity.email.as_str()).await {
        Ok(record) => record,
        Err(e) if e.is_not_found() => return Err(AppError::NotFound("User not found".to_string())),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(UserDetailsResponse {
        linked_customer: record.linked_customer.filter(|c| !c.is_empty()),
        full_name: record
            .full_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| identity.email.local_part().to_string()),
        phone: record.phone.filter(|p| !p.trim().is_empty()),
        email: identity.email,
    }))
}

/// Discounted entries of the customer's price list.
#[instrument(skip(state, identity))]
pub async fn price_list(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
) -> Result<Json<PriceListResponse>> {
    let Some(customer) = customer_of(&state, &identity).await else {
        return Ok(Json(PriceListResponse { items: Vec::new() }));
    };
    let items = PricingService::new(state.erp())
        .customer_price_list(&customer)
        .await?;
    Ok(Json(PriceListResponse { items }))
}

/// Personalized price of one item.
#[instrument(skip(state, identity))]
pub async fn item_price(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Query(query): Query<ItemPriceQuery>,
) -> Result<Json<ItemPriceResponse>> {
    let Some(item) = query.item.filter(|i| !i.trim().is_empty()) else {
        return Err(AppError::BadRequest("Missing item".to_string()));
    };

    let prices = state
        .erp()
        .personalized_prices(identity.email.as_str())
        .await?;
    let Some(price) = prices.get(&item).copied() else {
        return Err(AppError::NotFound("Price not found".to_string()));
    };

    Ok(Json(ItemPriceResponse {
        email: identity.email,
        item,
        price,
    }))
}

/// Sales orders of the customer, newest first.
#[instrument(skip(state, identity))]
pub async fn orders(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
) -> Result<Json<OrdersResponse>> {
    let Some(customer) = customer_of(&state, &identity).await else {
        return Ok(Json(OrdersResponse { orders: Vec::new() }));
    };
    let orders = DocumentService::new(state.erp()).orders(&customer).await?;
    Ok(Json(OrdersResponse { orders }))
}

/// Submitted invoices of the customer with open and overdue totals.
#[instrument(skip(state, identity))]
pub async fn documents(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
) -> Result<Json<DocumentsResponse>> {
    let Some(customer) = customer_of(&state, &identity).await else {
        return Ok(Json(DocumentsResponse {
            docs: Vec::new(),
            summary: InvoiceSummary::default(),
        }));
    };

    let today = Local::now().date_naive();
    let (docs, summary) = DocumentService::new(state.erp())
        .invoices(&customer, today)
        .await?;
    Ok(Json(DocumentsResponse { docs, summary }))
}

/// PDF of an invoice owned by the customer.
#[instrument(skip(state, identity))]
pub async fn invoice_pdf(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Path(name): Path<String>,
) -> Result<Response> {
    let Some(customer) = customer_of(&state, &identity).await else {
        return Err(AppError::Forbidden("No linked customer found".to_string()));
    };
    let name = SalesInvoiceName::parse(&name)?;

    let pdf = DocumentService::new(state.erp())
        .invoice_pdf(&name, &customer)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{name}.pdf\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::routes::test_support::{TestApp, USER, mount_get};

    async fn mount_linked_user(server: &MockServer) {
        mount_get(
            server,
            "/api/resource/User/kunde@example.de",
            200,
            json!({"data": {
                "linked_customer": "Pizzeria Roma",
                "full_name": "Mario Rossi",
                "phone": ""
            }}),
        )
        .await;
    }

    #[tokio::test]
    async fn test_protected_routes_need_identity() {
        let server = MockServer::start().await;
        let app = TestApp::new(&server);
        for uri in ["/api/bestellungen", "/api/dokumente", "/api/preise", "/api/user-details"] {
            let (status, body) = app.get(uri, &[]).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Nicht angemeldet");
        }
    }

    #[tokio::test]
    async fn test_sid_is_required_for_cookie_identity() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/api/method/frappe.auth.get_logged_user",
            200,
            json!({"message": "kunde@example.de"}),
        )
        .await;
        let app = TestApp::new(&server);

        let (status, _) = app
            .get("/api/bestellungen", &[("cookie", "user_email=kunde@example.de")])
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .get(
                "/api/bestellungen",
                &[("cookie", "sid=3f9c1a7e; user_email=kunde@example.de")],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"orders": []}));
    }

    #[tokio::test]
    async fn test_forged_sid_cookie_is_401() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/api/method/frappe.auth.get_logged_user",
            403,
            json!({"exc_type": "PermissionError"}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Sales%20Order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "name": "SO-0001",
                "transaction_date": "2024-03-01",
                "grand_total": 120.0,
                "status": "To Deliver and Bill",
                "docstatus": 1
            }]})))
            .mount(&server)
            .await;

        let (status, body) = TestApp::new(&server)
            .get(
                "/api/bestellungen",
                &[("cookie", "sid=forged; user_email=opfer@example.de")],
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Nicht angemeldet");
    }

    #[tokio::test]
    async fn test_user_without_identity_is_null() {
        let server = MockServer::start().await;
        let (status, body) = TestApp::new(&server).get("/api/user", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"user": null, "customer": null}));
    }

    #[tokio::test]
    async fn test_user_details_of_caller() {
        let server = MockServer::start().await;
        mount_linked_user(&server).await;

        let (status, body) = TestApp::new(&server)
            .get("/api/user-details?email=kunde@example.de", &[USER])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "linkedCustomer": "Pizzeria Roma",
                "fullName": "Mario Rossi",
                "phone": null,
                "email": "kunde@example.de"
            })
        );
    }

    #[tokio::test]
    async fn test_user_details_ignore_email_case() {
        let server = MockServer::start().await;
        mount_linked_user(&server).await;

        let (status, body) = TestApp::new(&server)
            .get(
                "/api/user-details?email=Kunde@Example.DE",
                &[("x-user", "KUNDE@example.de")],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "kunde@example.de");
        assert_eq!(body["linkedCustomer"], "Pizzeria Roma");
    }

    #[tokio::test]
    async fn test_user_details_of_someone_else_is_forbidden() {
        let server = MockServer::start().await;
        let (status, _) = TestApp::new(&server)
            .get("/api/user-details?email=chef@example.de", &[USER])
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_orders_of_linked_customer() {
        let server = MockServer::start().await;
        mount_linked_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Sales%20Order"))
            .and(query_param("filters", r#"[["customer","=","Pizzeria Roma"]]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "name": "SAL-ORD-2024-00017",
                "transaction_date": "2024-03-02",
                "grand_total": 412.3,
                "status": "To Deliver and Bill",
                "docstatus": 1
            }]})))
            .mount(&server)
            .await;

        let (status, body) = TestApp::new(&server).get("/api/bestellungen", &[USER]).await;
        assert_eq!(status, StatusCode::OK);
        let order = &body["orders"][0];
        assert_eq!(order["name"], "SAL-ORD-2024-00017");
        assert_eq!(order["date"], "2024-03-02");
        assert_eq!(order["total"], "412.3");
        assert!(order["pdf_url"].as_str().unwrap().contains("printview"));
    }

    #[tokio::test]
    async fn test_documents_without_customer_are_empty() {
        let server = MockServer::start().await;
        let (status, body) = TestApp::new(&server).get("/api/dokumente", &[USER]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["docs"], json!([]));
        assert_eq!(body["summary"]["overdue_count"], 0);
    }

    #[tokio::test]
    async fn test_item_price_needs_item() {
        let server = MockServer::start().await;
        let (status, _) = TestApp::new(&server).get("/api/prezzi", &[USER]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_item_price_from_personal_list() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/api/method/nexterp_customizations.api.shop.get_prezzi_per_listino",
            200,
            json!({"message": {"prezzi": [{"item_code": "GEG-00003", "price_list_rate": 10.5}]}}),
        )
        .await;

        let app = TestApp::new(&server);
        let (status, body) = app.get("/api/prezzi?item=GEG-00003", &[USER]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"email": "kunde@example.de", "item": "GEG-00003", "price": "10.5"})
        );

        let (status, _) = app.get("/api/prezzi?item=OLI-00001", &[USER]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_foreign_invoice_pdf_is_forbidden() {
        let server = MockServer::start().await;
        mount_linked_user(&server).await;
        mount_get(
            &server,
            "/api/resource/Sales%20Invoice/ACC-SINV-2024-00003",
            200,
            json!({"data": {"customer": "Trattoria Bella", "docstatus": 1}}),
        )
        .await;

        let response = TestApp::new(&server)
            .send(
                Method::GET,
                "/api/pdf/sales-invoice/ACC-SINV-2024-00003",
                &[USER],
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_own_invoice_pdf_is_served_inline() {
        let server = MockServer::start().await;
        mount_linked_user(&server).await;
        mount_get(
            &server,
            "/api/resource/Sales%20Invoice/ACC-SINV-2024-00004",
            200,
            json!({"data": {"customer": "Pizzeria Roma", "docstatus": 1}}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/method/frappe.utils.print_format.download_pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let response = TestApp::new(&server)
            .send(
                Method::GET,
                "/api/pdf/sales-invoice/ACC-SINV-2024-00004",
                &[USER],
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["content-type"], "application/pdf");
        assert_eq!(
            response.headers["content-disposition"],
            "inline; filename=\"ACC-SINV-2024-00004.pdf\""
        );
    }
}
