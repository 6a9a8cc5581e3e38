use crate::models::Product;
use serde::{Deserialize, Serialize};

/// Flat price record from the pre-embedded history format.
///
/// New data never produces these; they are carried so old files round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPriceRecord {
    pub product_id: String,
    pub price: String,
    pub timestamp: String,
}

/// The whole persisted collection. Every mutation rewrites it entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceDocument {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub price_history: Vec<LegacyPriceRecord>,
}

impl PriceDocument {
    /// Find a product by its identifier
    pub fn find(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    /// Find a product by its identifier for in-place mutation
    pub fn find_mut(&mut self, product_id: &str) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.product_id == product_id)
    }

    /// Legacy records belonging to a product, in stored order
    pub fn legacy_history(&self, product_id: &str) -> Vec<LegacyPriceRecord> {
        self.price_history
            .iter()
            .filter(|record| record.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Remove a product together with its legacy records.
    ///
    /// Returns false when no product had that identifier.
    pub fn remove(&mut self, product_id: &str) -> bool {
        if self.find(product_id).is_none() {
            return false;
        }

        self.products.retain(|p| p.product_id != product_id);
        self.price_history.retain(|r| r.product_id != product_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_json() -> &'static str {
        r#"{
            "products": [{
                "product_id": "example.com_1a2b3c4d",
                "original_url": "https://example.com/item",
                "clean_url": "https://example.com/item",
                "added_at": "2024-01-01T00:00:00",
                "last_updated": "2024-01-02T00:00:00",
                "current_price": "$10",
                "product_name": null,
                "image_url": null,
                "price_history": [{"price": "$10", "timestamp": "2024-01-01T00:00:00", "change_type": "initial"}],
                "total_price_checks": 1,
                "price_changes": 0
            }],
            "price_history": [
                {"product_id": "example.com_1a2b3c4d", "price": "$12", "timestamp": "2023-12-01T00:00:00"},
                {"product_id": "other_1", "price": "$5", "timestamp": "2023-12-01T00:00:00"}
            ]
        }"#
    }

    #[test]
    fn test_empty_object_reads_as_empty_document() {
        let doc: PriceDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.products.is_empty());
        assert!(doc.price_history.is_empty());
    }

    #[test]
    fn test_legacy_records_survive_round_trip() {
        let doc: PriceDocument = serde_json::from_str(legacy_json()).unwrap();
        let text = serde_json::to_string(&doc).unwrap();
        let again: PriceDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(doc, again);
        assert_eq!(again.price_history.len(), 2);
    }

    #[test]
    fn test_remove_cascades_to_legacy_records() {
        let mut doc: PriceDocument = serde_json::from_str(legacy_json()).unwrap();
        assert_eq!(doc.legacy_history("example.com_1a2b3c4d").len(), 1);

        assert!(doc.remove("example.com_1a2b3c4d"));
        assert!(doc.find("example.com_1a2b3c4d").is_none());
        assert_eq!(doc.price_history.len(), 1);
        assert!(!doc.remove("example.com_1a2b3c4d"));
    }
}
