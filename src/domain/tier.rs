use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

/// Subscription level controlling the monthly allowance and feature gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    pub const ALL: [Self; 3] = [Self::Free, Self::Pro, Self::Enterprise];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Image generation is a paid-plan feature.
    #[must_use]
    pub const fn can_generate_images(&self) -> bool {
        matches!(self, Self::Pro | Self::Enterprise)
    }

    #[must_use]
    pub const fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = ParseEnumError;

    /// Accepts any casing; the store and the billing metadata have used both.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(Self::Free),
            "PRO" => Ok(Self::Pro),
            "ENTERPRISE" => Ok(Self::Enterprise),
            _ => Err(ParseEnumError::new("subscription tier", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_case() {
        assert_eq!("pro".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Pro);
        assert_eq!(
            " Enterprise ".parse::<SubscriptionTier>().unwrap(),
            SubscriptionTier::Enterprise
        );
        assert!("gold".parse::<SubscriptionTier>().is_err());
    }

    #[test]
    fn only_paid_tiers_generate_images() {
        assert!(!SubscriptionTier::Free.can_generate_images());
        assert!(SubscriptionTier::Pro.can_generate_images());
        assert!(SubscriptionTier::Enterprise.can_generate_images());
    }

    #[test]
    fn serde_uses_upper_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionTier::Enterprise).unwrap(),
            "\"ENTERPRISE\""
        );
    }
}
