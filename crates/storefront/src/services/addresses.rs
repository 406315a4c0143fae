//! Customer addresses.
//!
//! Addresses hang off customers through `Dynamic Link` rows. Every single
//! address read or write first checks that the address is linked to the
//! caller's customer.

use serde_json::Value;
use tracing::{instrument, warn};

use sudimport_core::{AddressBook, AddressName, AddressOwnership, AddressRecord, AddressUpdate, CustomerName};

use crate::erp::types::CustomerRecord;
use crate::erp::{ErpClient, ErpError, Filter, ListQuery};

use super::AccessError;

const ADDRESS_LIMIT: usize = 100;

const ADDRESS_FIELDS: [&str; 13] = [
    "name",
    "address_title",
    "address_line1",
    "address_line2",
    "city",
    "state",
    "country",
    "pincode",
    "phone",
    "email_id",
    "is_primary_address",
    "is_shipping_address",
    "address_type",
];

/// Address reads and writes for one customer.
pub struct AddressService<'a> {
    erp: &'a ErpClient,
}

impl<'a> AddressService<'a> {
    #[must_use]
    pub const fn new(erp: &'a ErpClient) -> Self {
        Self { erp }
    }

    /// Billing, shipping and secondary address of `customer`.
    ///
    /// Addresses are found via their customer link; customers whose
    /// addresses carry no link fall back to the primary and secondary
    /// address fields of the customer record. Read failures degrade to
    /// missing addresses.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn address_book(&self, customer: &CustomerName) -> AddressBook {
        let mut addresses = match self.linked_addresses(customer).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(error = %e, "Linked address lookup failed");
                Vec::new()
            }
        };

        if addresses.is_empty() {
            addresses = self.customer_addresses(customer).await;
        }

        AddressBook::pick(&addresses)
    }

    async fn linked_addresses(&self, customer: &CustomerName) -> Result<Vec<AddressRecord>, ErpError> {
        self.erp
            .list(
                &ListQuery::new("Address")
                    .fields(&ADDRESS_FIELDS)
                    .filters([
                        Filter::eq("link_doctype", "Customer"),
                        Filter::eq("link_name", customer.as_str()),
                    ])
                    .limit(ADDRESS_LIMIT),
            )
            .await
    }

    async fn customer_addresses(&self, customer: &CustomerName) -> Vec<AddressRecord> {
        let record: CustomerRecord = match self.erp.get_doc("Customer", customer.as_str()).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Customer record unavailable");
                return Vec::new();
            }
        };

        let mut addresses = Vec::new();
        for name in [record.customer_primary_address, record.customer_secondary_address]
            .into_iter()
            .flatten()
            .filter(|n| !n.is_empty())
        {
            match self.erp.get_doc::<AddressRecord>("Address", &name).await {
                Ok(address) => addresses.push(address),
                Err(e) => warn!(error = %e, address = %name, "Customer address unavailable"),
            }
        }
        addresses
    }

    /// The full address document, if `customer` owns it.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NotFound` for unknown addresses and
    /// `AccessError::NotOwner` for addresses of other customers.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn owned(&self, name: &AddressName, customer: &CustomerName) -> Result<Value, AccessError> {
        let doc: Value = match self.erp.get_doc("Address", name.as_str()).await {
            Ok(doc) => doc,
            Err(e) if e.is_not_found() => return Err(AccessError::NotFound("Address")),
            Err(e) => return Err(e.into()),
        };

        let ownership: AddressOwnership = serde_json::from_value(doc.clone()).unwrap_or_default();
        if !ownership.is_owned_by(customer.as_str()) {
            warn!(address = %name, "Address access denied");
            return Err(AccessError::NotOwner("address"));
        }
        Ok(doc)
    }

    /// Apply a validated update to an owned address.
    ///
    /// # Errors
    ///
    /// Returns the ownership errors of [`Self::owned`] or the ERP's
    /// rejection of the update.
    #[instrument(skip(self, update), fields(customer = %customer))]
    pub async fn update(
        &self,
        name: &AddressName,
        customer: &CustomerName,
        update: &AddressUpdate,
    ) -> Result<Value, AccessError> {
        self.owned(name, customer).await?;
        Ok(self.erp.update_doc("Address", name.as_str(), update).await?)
    }

    /// Delete an owned address.
    ///
    /// # Errors
    ///
    /// Returns the ownership errors of [`Self::owned`] or the ERP's
    /// rejection of the deletion.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn delete(&self, name: &AddressName, customer: &CustomerName) -> Result<(), AccessError> {
        self.owned(name, customer).await?;
        Ok(self.erp.delete_doc("Address", name.as_str()).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::{Map, json};
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ErpConfig;

    fn erp_for(server: &MockServer) -> ErpClient {
        let config = ErpConfig::new(
            Url::parse(&server.uri()).unwrap(),
            "key123",
            SecretString::from("7d1f0e9c2b4a8e3"),
        );
        ErpClient::new(&config).unwrap()
    }

    fn customer() -> CustomerName {
        CustomerName::new_unchecked("Pizzeria Roma")
    }

    async fn mount_address(server: &MockServer, owner: &str) {
        Mock::given(method("GET"))
            .and(path("/api/resource/Address/ADDR-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "name": "ADDR-1",
                    "city": "Berlin",
                    "links": [{"link_doctype": "Customer", "link_name": owner}]
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_foreign_address_is_forbidden() {
        let server = MockServer::start().await;
        mount_address(&server, "Bar Sole").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let erp = erp_for(&server);
        let (update, _) = AddressUpdate::from_body(
            json!({"city": "Hamburg"}).as_object().cloned().unwrap(),
        )
        .unwrap();
        let err = AddressService::new(&erp)
            .update(&AddressName::new_unchecked("ADDR-1"), &customer(), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotOwner("address")));
    }

    #[tokio::test]
    async fn test_update_forwards_only_whitelisted_fields() {
        let server = MockServer::start().await;
        mount_address(&server, "Pizzeria Roma").await;
        Mock::given(method("PUT"))
            .and(path("/api/resource/Address/ADDR-1"))
            .and(body_json(json!({"city": "Hamburg"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"name": "ADDR-1", "city": "Hamburg"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let erp = erp_for(&server);
        let body: Map<String, Value> = json!({"city": "Hamburg", "customer": "Bar Sole"})
            .as_object()
            .cloned()
            .unwrap();
        let (update, blocked) = AddressUpdate::from_body(body).unwrap();
        assert_eq!(blocked, vec!["customer".to_string()]);

        let saved = AddressService::new(&erp)
            .update(&AddressName::new_unchecked("ADDR-1"), &customer(), &update)
            .await
            .unwrap();
        assert_eq!(saved["city"], "Hamburg");
    }

    #[tokio::test]
    async fn test_missing_address_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Address/ADDR-9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
            .mount(&server)
            .await;

        let erp = erp_for(&server);
        let err = AddressService::new(&erp)
            .owned(&AddressName::new_unchecked("ADDR-9"), &customer())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound("Address")));
    }

    #[tokio::test]
    async fn test_address_book_falls_back_to_customer_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Address"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Customer/Pizzeria%20Roma"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"customer_primary_address": "ADDR-1", "customer_secondary_address": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Address/ADDR-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"name": "ADDR-1", "city": "Berlin", "is_primary_address": 1}
            })))
            .mount(&server)
            .await;

        let erp = erp_for(&server);
        let book = AddressService::new(&erp).address_book(&customer()).await;
        assert_eq!(book.billing.unwrap().name, "ADDR-1");
        assert_eq!(book.shipping.unwrap().name, "ADDR-1");
    }
}
