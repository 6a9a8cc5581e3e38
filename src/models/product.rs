use crate::models::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a recorded price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Seed entry written when the product is first tracked
    Initial,
    Increase,
    Decrease,
    /// Strings differ but their numeric magnitudes are equal
    Same,
    /// Either price had no parsable magnitude
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChangeType {
    /// Convert to the persisted string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Initial => "initial",
            ChangeType::Increase => "increase",
            ChangeType::Decrease => "decrease",
            ChangeType::Same => "same",
            ChangeType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation in a product's price history. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub price: String,
    pub timestamp: String,
    #[serde(default)]
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<String>,
}

impl PriceHistoryEntry {
    /// Seed entry for a newly tracked product
    pub fn initial(price: String, timestamp: String) -> Self {
        Self {
            price,
            timestamp,
            change_type: ChangeType::Initial,
            previous_price: None,
        }
    }
}

/// Product model representing a tracked product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub original_url: String,
    pub clean_url: String,
    pub added_at: String,
    pub last_updated: String,
    pub current_price: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price_history: Vec<PriceHistoryEntry>,
    #[serde(default)]
    pub total_price_checks: u64,
    #[serde(default)]
    pub price_changes: u64,
}

impl Product {
    /// Parsed `added_at`, if the stored value is readable
    pub fn added_at_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.added_at)
    }

    /// Parsed `last_updated`, if the stored value is readable
    pub fn last_updated_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_updated)
    }

    /// Fraction of checks that observed a different price
    pub fn change_rate(&self) -> f64 {
        self.price_changes as f64 / self.total_price_checks.max(1) as f64
    }

    /// Name to show in listings and reports
    pub fn display_name(&self) -> &str {
        self.product_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown")
    }

    /// First recorded price, from the seed history entry
    pub fn first_price(&self) -> Option<&str> {
        self.price_history.first().map(|entry| entry.price.as_str())
    }
}
