//! Newtype wrappers for ERPNext document names.
//!
//! Every ERP document is addressed by its `name` field, a free-form string
//! (`"GEG-00003"`, `"Pizzeria Roma"`, `"SINV-2025-00042"`). Use the
//! `define_name!` macro to get a distinct type per doctype so a customer name
//! can never be passed where an item code is expected.

/// Errors that can occur when constructing a document name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty after trimming.
    #[error("document name cannot be empty")]
    Empty,
    /// The name contains a path separator and would escape the resource URL.
    #[error("document name cannot contain '/'")]
    Slash,
}

/// Macro to define a type-safe ERP document name.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()` (validating) and `new_unchecked()` (for ERP-provided values)
/// - `Display`, `AsRef<str>` and `FromStr`
///
/// # Example
///
/// ```rust
/// # use sudimport_core::define_name;
/// define_name!(SupplierName);
///
/// let supplier = SupplierName::parse("Molino Rossi").unwrap();
/// assert_eq!(supplier.as_str(), "Molino Rossi");
/// ```
#[macro_export]
macro_rules! define_name {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name supplied by a client.
            ///
            /// # Errors
            ///
            /// Returns an error if the trimmed name is empty or contains `/`.
            pub fn parse(value: &str) -> ::core::result::Result<Self, $crate::NameError> {
                let value = value.trim();
                if value.is_empty() {
                    return Err($crate::NameError::Empty);
                }
                if value.contains('/') {
                    return Err($crate::NameError::Slash);
                }
                Ok(Self(value.to_owned()))
            }

            /// Wrap a name that came from the ERP itself.
            #[must_use]
            pub fn new_unchecked(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::NameError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_name!(ItemCode);
define_name!(CustomerName);
define_name!(AddressName);
define_name!(PriceListName);
define_name!(ContactName);
define_name!(SalesOrderName);
define_name!(SalesInvoiceName);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let code = ItemCode::parse(" GEG-00003 ").unwrap();
        assert_eq!(code.as_str(), "GEG-00003");
    }

    #[test]
    fn test_parse_rejects_empty_and_slash() {
        assert_eq!(AddressName::parse("  "), Err(NameError::Empty));
        assert_eq!(
            AddressName::parse("../Customer/Other"),
            Err(NameError::Slash)
        );
    }

    #[test]
    fn test_names_with_spaces_are_valid() {
        let customer = CustomerName::parse("Pizzeria Da Mario").unwrap();
        assert_eq!(customer.to_string(), "Pizzeria Da Mario");
    }

    #[test]
    fn test_serde_transparent() {
        let code = ItemCode::new_unchecked("ABC-001");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABC-001\"");
        let back: ItemCode = serde_json::from_str("\"ABC-001\"").unwrap();
        assert_eq!(back, code);
    }
}
