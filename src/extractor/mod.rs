//! Product page extraction.
//!
//! An [`Extractor`] turns a product URL into a [`ProductSnapshot`]. A missing
//! price is not an error: the snapshot carries [`PRICE_NOT_FOUND`] and callers
//! treat it as a soft failure. Errors are reserved for requests that could not
//! be completed at all.

pub mod http;
pub mod registry;
pub mod sites;

pub use http::PageFetcher;
pub use registry::ExtractorRegistry;
pub use sites::{HtmlExtractor, SiteRules};

use crate::engine::Observation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel price reported when a page was fetched but no price was found
pub const PRICE_NOT_FOUND: &str = "Price not found";

/// What an extractor read from a product page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub price: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

impl ProductSnapshot {
    /// Snapshot for a page that had no recognizable price
    pub fn not_found() -> Self {
        Self {
            price: PRICE_NOT_FOUND.to_string(),
            name: None,
            image_url: None,
        }
    }

    /// Whether the snapshot carries a usable price
    pub fn has_price(&self) -> bool {
        let price = self.price.trim();
        !price.is_empty() && price != PRICE_NOT_FOUND
    }
}

impl From<ProductSnapshot> for Observation {
    fn from(snapshot: ProductSnapshot) -> Self {
        Observation {
            price: snapshot.price,
            name: snapshot.name,
            image_url: snapshot.image_url,
        }
    }
}

/// Errors raised while fetching a product page
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Price not found at {0}")]
    PriceNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Capability to read the current price, name and image of a product page
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_not_a_price() {
        assert!(!ProductSnapshot::not_found().has_price());
        let snapshot = ProductSnapshot {
            price: "  ".into(),
            name: None,
            image_url: None,
        };
        assert!(!snapshot.has_price());
    }

    #[test]
    fn test_snapshot_into_observation() {
        let snapshot = ProductSnapshot {
            price: "₹499".into(),
            name: Some("Cable".into()),
            image_url: None,
        };
        assert!(snapshot.has_price());
        let observation: Observation = snapshot.into();
        assert_eq!(observation.price, "₹499");
        assert_eq!(observation.name.as_deref(), Some("Cable"));
    }
}
