//! Address route handlers.
//!
//! Single-address routes act only on addresses linked to the caller's
//! customer.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use sudimport_core::{AddressBook, AddressError, AddressName, AddressUpdate, CustomerName};

use crate::error::{AppError, Result};
use crate::middleware::{Identity, RequireUser};
use crate::services::addresses::AddressService;
use crate::state::AppState;

/// Successful address update.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub data: Value,
    pub updated_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

async fn linked_customer(state: &AppState, identity: &Identity) -> Result<CustomerName> {
    state
        .customers()
        .resolve(&identity.email)
        .await
        .customer
        .ok_or_else(|| AppError::Forbidden("No linked customer found".to_string()))
}

/// Billing, shipping and secondary address; all null without a customer.
#[instrument(skip(state, identity))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
) -> Json<AddressBook> {
    let Some(customer) = state.customers().resolve(&identity.email).await.customer else {
        return Json(AddressBook::default());
    };
    Json(AddressService::new(state.erp()).address_book(&customer).await)
}

/// One address of the caller's customer.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let customer = linked_customer(&state, &identity).await?;
    let name = AddressName::parse(&name)?;
    let doc = AddressService::new(state.erp()).owned(&name, &customer).await?;
    Ok(Json(doc))
}

/// Update the editable fields of an address; other fields are dropped.
#[instrument(skip(state, identity, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Path(name): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<UpdateResponse>> {
    if body.is_empty() {
        return Err(AddressError::EmptyBody.into());
    }
    let customer = linked_customer(&state, &identity).await?;
    let name = AddressName::parse(&name)?;

    let (update, blocked) = AddressUpdate::from_body(body)?;
    if !blocked.is_empty() {
        warn!(address = %name, blocked = ?blocked, "Dropped non-editable address fields");
    }

    let data = AddressService::new(state.erp())
        .update(&name, &customer, &update)
        .await?;
    let updated_fields = update.field_names();
    info!(address = %name, fields = ?updated_fields, "Address updated");

    Ok(Json(UpdateResponse {
        success: true,
        data,
        updated_fields,
    }))
}

/// Delete an address of the caller's customer.
#[instrument(skip(state, identity))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(identity): RequireUser,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let customer = linked_customer(&state, &identity).await?;
    let name = AddressName::parse(&name)?;
    AddressService::new(state.erp()).delete(&name, &customer).await?;
    info!(address = %name, "Address deleted");

    Ok(Json(DeleteResponse {
        success: true,
        message: "Address deleted",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::routes::test_support::{TestApp, USER, mount_get};

    async fn mount_customer(server: &MockServer) {
        mount_get(
            server,
            "/api/resource/User/kunde@example.de",
            200,
            json!({"data": {"linked_customer": "Pizzeria Roma"}}),
        )
        .await;
    }

    async fn mount_address(server: &MockServer, name: &str, owner: &str) {
        mount_get(
            server,
            &format!("/api/resource/Address/{name}"),
            200,
            json!({"data": {
                "name": name,
                "address_line1": "Via Roma 1",
                "city": "Bolzano",
                "links": [{"link_doctype": "Customer", "link_name": owner}]
            }}),
        )
        .await;
    }

    #[tokio::test]
    async fn test_update_forwards_only_editable_fields() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        mount_address(&server, "ADR-0001", "Pizzeria Roma").await;
        Mock::given(method("PUT"))
            .and(path("/api/resource/Address/ADR-0001"))
            .and(body_json(json!({"city": "Meran"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"name": "ADR-0001", "city": "Meran"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = TestApp::new(&server)
            .send(
                Method::PUT,
                "/api/adresse/ADR-0001",
                &[USER],
                Some(json!({"city": "Meran", "links": [], "owner": "x"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["success"], true);
        assert_eq!(response.body["updated_fields"], json!(["city"]));
        assert_eq!(response.body["data"]["city"], "Meran");
    }

    #[tokio::test]
    async fn test_update_without_editable_fields_is_400() {
        let server = MockServer::start().await;
        mount_customer(&server).await;

        let response = TestApp::new(&server)
            .send(
                Method::PUT,
                "/api/adresse/ADR-0001",
                &[USER],
                Some(json!({"owner": "x"})),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "No valid fields to update");
    }

    #[tokio::test]
    async fn test_empty_update_is_400() {
        let server = MockServer::start().await;
        let response = TestApp::new(&server)
            .send(Method::PUT, "/api/adresse/ADR-0001", &[USER], Some(json!({})))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "No data to update");
    }

    #[tokio::test]
    async fn test_short_city_is_400() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        let response = TestApp::new(&server)
            .send(
                Method::PUT,
                "/api/adresse/ADR-0001",
                &[USER],
                Some(json!({"city": "M"})),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "City name is too short");
    }

    #[tokio::test]
    async fn test_foreign_address_is_forbidden() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        mount_address(&server, "ADR-0002", "Trattoria Bella").await;

        let app = TestApp::new(&server);
        let (status, _) = app.get("/api/adresse/ADR-0002", &[USER]).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let response = app
            .send(Method::DELETE, "/api/adresse/ADR-0002", &[USER], None)
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body["error"], "Not authorized to access this address");
    }

    #[tokio::test]
    async fn test_address_routes_without_customer() {
        let server = MockServer::start().await;
        let app = TestApp::new(&server);

        let (status, body) = app.get("/api/adresse", &[USER]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"billing": null, "shipping": null, "secondary": null}));

        let (status, body) = app.get("/api/adresse/ADR-0001", &[USER]).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "No linked customer found");
    }

    #[tokio::test]
    async fn test_delete_own_address() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        mount_address(&server, "ADR-0001", "Pizzeria Roma").await;
        Mock::given(method("DELETE"))
            .and(path("/api/resource/Address/ADR-0001"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;

        let response = TestApp::new(&server)
            .send(Method::DELETE, "/api/adresse/ADR-0001", &[USER], None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            json!({"success": true, "message": "Address deleted"})
        );
    }
}
