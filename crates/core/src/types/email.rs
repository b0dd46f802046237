//! Customer email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,
    #[error("email cannot contain spaces")]
    Whitespace,
    #[error("email must look like name@domain.tld")]
    Malformed,
}

/// A customer's email address, as used to sign in and register.
///
/// Parsing trims surrounding whitespace and lowercases the address, so the
/// same account typed as `Abena@Harvest.Market ` and `abena@harvest.market`
/// reaches the backend identically. The address needs a single `@`, a
/// non-empty name and a dotted domain.
///
/// ```
/// use harvest_market_core::Email;
///
/// let email = Email::parse(" Abena@Harvest.Market ").unwrap();
/// assert_eq!(email.as_str(), "abena@harvest.market");
/// assert!(Email::parse("abena@localhost").is_err());
/// ```
///
/// Addresses coming back from the backend are deserialized as sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Longest address accepted (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Normalize and check a typed-in address.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the trimmed input is empty, too long, contains
    /// whitespace, or is not of the form `name@domain.tld`.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EmailError::Empty);
        }
        if input.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (name, domain) = input.split_once('@').ok_or(EmailError::Malformed)?;
        let dotted = domain
            .split('.')
            .all(|label| !label.is_empty())
            && domain.contains('.');
        if name.is_empty() || domain.contains('@') || !dotted {
            return Err(EmailError::Malformed);
        }

        Ok(Self(input.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@`, used when a customer has no name on file.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
