//! Domain types with strong typing.
//!
//! Closed enums replace the string-typed tiers, transaction kinds, formats and
//! statuses that travel between the store, the providers and the HTTP layer.
//! Each enum keeps a canonical wire spelling (`as_str`) and parses it back
//! with `FromStr`, so the database columns stay plain strings.

pub mod content;
pub mod ledger;
pub mod tier;

pub use content::{ContentLength, ContentStatus, ImageSize, ImageStyle, OutputFormat, Tone};
pub use ledger::{TransactionType, next_reset_date};
pub use tier::SubscriptionTier;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user, owned by the hosted authentication provider.
///
/// The value is opaque to this service (Supabase issues UUID strings), so it
/// is only ever compared and stored, never parsed.
///
/// # Examples
///
/// ```rust
/// use repurposely::domain::UserId;
///
/// let id = UserId::new("8d6c0f5e-3a7b-4f59-9a55-3f2f54c1b0a1");
/// assert_eq!(id.as_str(), "8d6c0f5e-3a7b-4f59-9a55-3f2f54c1b0a1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Error returned when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_serializes_as_plain_string() {
        let id = UserId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");

        let back: UserId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_error_message() {
        let err = ParseEnumError::new("tier", "GOLD");
        assert_eq!(err.to_string(), "unknown tier: 'GOLD'");
    }
}
