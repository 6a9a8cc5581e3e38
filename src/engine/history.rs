use crate::engine::numeric::classify_change;
use crate::models::{format_timestamp, ChangeType, PriceHistoryEntry, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One extracted reading of a product page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub price: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

impl Observation {
    pub fn new(price: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            name: None,
            image_url: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Outcome of applying an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    PriceChanged,
    NoChange,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::PriceChanged => "price_changed",
            UpdateStatus::NoChange => "no_change",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single price check against a stored product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeResult {
    pub status: UpdateStatus,
    pub change_type: ChangeType,
    pub message: String,
    pub old_price: String,
    pub new_price: String,
}

impl ChangeResult {
    pub fn is_change(&self) -> bool {
        self.status == UpdateStatus::PriceChanged
    }
}

/// Build a newly tracked product seeded with an `initial` history entry
pub fn create_product(
    product_id: &str,
    original_url: &str,
    clean_url: &str,
    observation: Observation,
) -> Product {
    create_product_at(product_id, original_url, clean_url, observation, Utc::now())
}

/// [`create_product`] with an explicit clock
pub fn create_product_at(
    product_id: &str,
    original_url: &str,
    clean_url: &str,
    observation: Observation,
    now: DateTime<Utc>,
) -> Product {
    let timestamp = format_timestamp(now);

    Product {
        product_id: product_id.to_string(),
        original_url: original_url.to_string(),
        clean_url: clean_url.to_string(),
        added_at: timestamp.clone(),
        last_updated: timestamp.clone(),
        current_price: observation.price.clone(),
        product_name: observation.name.filter(|name| !name.is_empty()),
        image_url: observation.image_url.filter(|url| !url.is_empty()),
        price_history: vec![PriceHistoryEntry::initial(observation.price, timestamp)],
        total_price_checks: 1,
        price_changes: 0,
    }
}

/// Apply a fresh price reading to a stored product
pub fn apply_observation(product: &mut Product, observation: &Observation) -> ChangeResult {
    apply_observation_at(product, observation, Utc::now())
}

/// [`apply_observation`] with an explicit clock.
///
/// Every call counts as a check. Only a byte-different price string counts as
/// a change; the numeric comparison just labels it. History is append-only.
pub fn apply_observation_at(
    product: &mut Product,
    observation: &Observation,
    now: DateTime<Utc>,
) -> ChangeResult {
    let timestamp = format_timestamp(now);
    let old_price = product.current_price.clone();
    let new_price = observation.price.clone();

    product.last_updated = timestamp.clone();
    product.total_price_checks += 1;

    // Name and image are first-write-wins
    fill_if_unset(&mut product.product_name, observation.name.as_deref());
    fill_if_unset(&mut product.image_url, observation.image_url.as_deref());

    if old_price == new_price {
        return ChangeResult {
            status: UpdateStatus::NoChange,
            change_type: ChangeType::Same,
            message: format!("Price remains the same: {}", new_price),
            old_price,
            new_price,
        };
    }

    let change_type = classify_change(&old_price, &new_price);

    product.current_price = new_price.clone();
    product.price_changes += 1;
    product.price_history.push(PriceHistoryEntry {
        price: new_price.clone(),
        timestamp,
        change_type,
        previous_price: Some(old_price.clone()),
    });

    ChangeResult {
        status: UpdateStatus::PriceChanged,
        change_type,
        message: format!("Price changed from {} to {}", old_price, new_price),
        old_price,
        new_price,
    }
}

fn fill_if_unset(slot: &mut Option<String>, value: Option<&str>) {
    let unset = slot.as_deref().map_or(true, str::is_empty);
    match value {
        Some(value) if unset && !value.is_empty() => *slot = Some(value.to_string()),
        _ => {}
    }
}
