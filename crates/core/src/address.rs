//! Customer address updates and ownership.
//!
//! Browsers may only change a fixed set of address fields. Everything else in
//! a PUT body is dropped before the ERP sees it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::flag_is_set;

/// Address fields a customer may change.
pub const EDITABLE_FIELDS: [&str; 9] = [
    "address_title",
    "address_line1",
    "address_line2",
    "city",
    "state",
    "country",
    "pincode",
    "phone",
    "email_id",
];

/// Reasons an address update is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("No data to update")]
    EmptyBody,

    #[error("No valid fields to update")]
    NoValidFields,

    #[error("Field {0} must be a string")]
    NotAString(String),

    #[error("Address line 1 is too short")]
    AddressLineTooShort,

    #[error("City name is too short")]
    CityTooShort,

    #[error("Country is required")]
    CountryMissing,

    #[error("Invalid email format")]
    InvalidEmail,
}

/// A validated, whitelisted address update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressUpdate {
    fields: Map<String, Value>,
}

impl AddressUpdate {
    /// Filter a raw PUT body down to [`EDITABLE_FIELDS`] and validate it.
    ///
    /// Returns the update together with the names of dropped fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty, holds no editable field, or an
    /// editable field fails validation.
    pub fn from_body(body: Map<String, Value>) -> Result<(Self, Vec<String>), AddressError> {
        if body.is_empty() {
            return Err(AddressError::EmptyBody);
        }

        let mut fields = Map::new();
        let mut blocked = Vec::new();
        for (key, value) in body {
            if EDITABLE_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            } else {
                blocked.push(key);
            }
        }

        if fields.is_empty() {
            return Err(AddressError::NoValidFields);
        }

        let update = Self { fields };
        update.validate()?;
        Ok((update, blocked))
    }

    fn text(&self, field: &str) -> Result<Option<&str>, AddressError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(AddressError::NotAString(field.to_string())),
        }
    }

    fn validate(&self) -> Result<(), AddressError> {
        for field in self.fields.keys() {
            self.text(field)?;
        }

        let too_short = |value: Option<&str>, min: usize| {
            value.is_some_and(|v| !v.is_empty() && v.trim().chars().count() < min)
        };

        if too_short(self.text("address_line1")?, 3) {
            return Err(AddressError::AddressLineTooShort);
        }
        if too_short(self.text("city")?, 2) {
            return Err(AddressError::CityTooShort);
        }
        if too_short(self.text("country")?, 2) {
            return Err(AddressError::CountryMissing);
        }
        if self
            .text("email_id")?
            .is_some_and(|e| !e.is_empty() && !e.contains('@'))
        {
            return Err(AddressError::InvalidEmail);
        }
        Ok(())
    }

    /// Names of the fields that will be written.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// A Frappe dynamic link row (`Address.links`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicLink {
    pub link_doctype: String,
    pub link_name: String,
}

/// The parts of an Address that say who owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddressOwnership {
    #[serde(default)]
    pub links: Vec<DynamicLink>,
    /// Single-link field of older ERP versions.
    #[serde(default)]
    pub link_name: Option<String>,
}

impl AddressOwnership {
    /// Whether the address is linked to `customer`.
    #[must_use]
    pub fn is_owned_by(&self, customer: &str) -> bool {
        self.links
            .iter()
            .any(|l| l.link_doctype == "Customer" && l.link_name == customer)
            || self.link_name.as_deref() == Some(customer)
    }
}

/// An Address document as listed for a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub name: String,
    #[serde(default)]
    pub address_title: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub address_type: Option<String>,
    #[serde(default)]
    pub is_primary_address: Option<Value>,
    #[serde(default)]
    pub is_shipping_address: Option<Value>,
    #[serde(default)]
    pub is_secondary_address: Option<Value>,
}

impl AddressRecord {
    fn is_primary(&self) -> bool {
        flag_is_set(self.is_primary_address.as_ref())
    }

    fn is_shipping(&self) -> bool {
        flag_is_set(self.is_shipping_address.as_ref())
    }

    fn is_secondary(&self) -> bool {
        flag_is_set(self.is_secondary_address.as_ref())
    }
}

/// Billing, shipping and secondary address picked from a customer's list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressBook {
    pub billing: Option<AddressRecord>,
    pub shipping: Option<AddressRecord>,
    pub secondary: Option<AddressRecord>,
}

impl AddressBook {
    /// Pick addresses by their flags.
    ///
    /// Billing is the primary address, else the first one. Shipping is the
    /// flagged shipping address, else the first address without the flag.
    /// Secondary follows the shipping rule with its own flag.
    #[must_use]
    pub fn pick(addresses: &[AddressRecord]) -> Self {
        let billing = addresses
            .iter()
            .find(|a| a.is_primary())
            .or_else(|| addresses.first());
        let shipping = addresses
            .iter()
            .find(|a| a.is_shipping())
            .or_else(|| addresses.iter().find(|a| !a.is_shipping()));
        let secondary = addresses
            .iter()
            .find(|a| a.is_secondary())
            .or_else(|| addresses.iter().find(|a| !a.is_secondary()));

        Self {
            billing: billing.cloned(),
            shipping: shipping.cloned(),
            secondary: secondary.cloned(),
        }
    }
}
