//! E-mail address of a storefront user.
//!
//! The e-mail is the storefront's only notion of identity: it names the
//! ERPNext `User` document and is the key for customer and price resolution.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty after trimming.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain an @ symbol.
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty.
    #[error("email domain cannot be empty")]
    EmptyDomain,
}

/// An e-mail address identifying an ERP user.
///
/// Surrounding whitespace is trimmed and the address is lowercased, the
/// same way ERPNext names `User` documents, so comparisons and cache keys
/// ignore the case the user typed.
///
/// ## Examples
///
/// ```
/// use sudimport_core::Email;
///
/// assert!(Email::parse(" kunde@example.de ").is_ok());
/// assert!(Email::parse("kunde").is_err());
/// assert_eq!(Email::from_identity(Some("")), None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 254
    /// characters, has no @ symbol, or has an empty local part or domain.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::MissingAtSymbol)?;
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.is_empty() {
            return Err(EmailError::EmptyDomain);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Accept an identity value from a header or cookie, discarding anything
    /// that is not a usable address.
    #[must_use]
    pub fn from_identity(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| Self::parse(v).ok())
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the email (before the @).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("kunde@example.de").is_ok());
        assert!(Email::parse("einkauf.gastro+shop@example.de").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let email = Email::parse("  kunde@example.de\n").unwrap();
        assert_eq!(email.as_str(), "kunde@example.de");
    }

    #[test]
    fn test_parse_lowercases() {
        let email = Email::parse("Kunde@Example.DE").unwrap();
        assert_eq!(email.as_str(), "kunde@example.de");
        assert_eq!(email, Email::parse("kunde@example.de").unwrap());
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.de", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_login_name_without_at() {
        // ERP usernames are valid logins but not identities
        assert_eq!(Email::parse("administrator"), Err(EmailError::MissingAtSymbol));
    }

    #[test]
    fn test_parse_empty_parts() {
        assert_eq!(Email::parse("@example.de"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("kunde@"), Err(EmailError::EmptyDomain));
    }

    #[test]
    fn test_from_identity_discards_garbage() {
        assert!(Email::from_identity(None).is_none());
        assert!(Email::from_identity(Some("undefined")).is_none());
        assert_eq!(
            Email::from_identity(Some("kunde@example.de")).unwrap().as_str(),
            "kunde@example.de"
        );
    }

    #[test]
    fn test_parts() {
        let email = Email::parse("mario.rossi@example.de").unwrap();
        assert_eq!(email.local_part(), "mario.rossi");
        assert_eq!(email.domain(), "example.de");
    }

    #[test]
    fn test_deserialize_validates() {
        let parsed: Email = serde_json::from_str("\"kunde@example.de\"").unwrap();
        assert_eq!(parsed.to_string(), "kunde@example.de");
        assert!(serde_json::from_str::<Email>("\"kunde\"").is_err());
    }
}
