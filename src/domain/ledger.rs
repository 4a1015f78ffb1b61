use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

/// Kind of entry in the append-only token transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    ImageGeneration,
    ContentRepurpose,
    AccountInitialization,
    MonthlyReset,
    SubscriptionGrant,
    Refund,
    AdminAdjustment,
}

impl TransactionType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "IMAGE_GENERATION",
            Self::ContentRepurpose => "CONTENT_REPURPOSE",
            Self::AccountInitialization => "ACCOUNT_INITIALIZATION",
            Self::MonthlyReset => "MONTHLY_RESET",
            Self::SubscriptionGrant => "SUBSCRIPTION_GRANT",
            Self::Refund => "REFUND",
            Self::AdminAdjustment => "ADMIN_ADJUSTMENT",
        }
    }

    /// Whether this entry consumed credits (as opposed to granting them).
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::ImageGeneration | Self::ContentRepurpose)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMAGE_GENERATION" => Ok(Self::ImageGeneration),
            "CONTENT_REPURPOSE" => Ok(Self::ContentRepurpose),
            "ACCOUNT_INITIALIZATION" => Ok(Self::AccountInitialization),
            "MONTHLY_RESET" => Ok(Self::MonthlyReset),
            "SUBSCRIPTION_GRANT" => Ok(Self::SubscriptionGrant),
            "REFUND" => Ok(Self::Refund),
            "ADMIN_ADJUSTMENT" => Ok(Self::AdminAdjustment),
            _ => Err(ParseEnumError::new("transaction type", s)),
        }
    }
}

/// Midnight UTC on the first day of the month following `now`.
///
/// Balances roll over on calendar months, so a user who signs up on the 31st
/// gets their first refill the next day.
#[must_use]
pub fn next_reset_date(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
