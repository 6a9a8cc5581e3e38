use crate::models::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Re-check cadence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    Regular,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Regular => "regular",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds that route products into the high-priority sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityPolicy {
    /// A product whose change rate exceeds this is volatile
    pub change_rate_threshold: f64,
    /// Products younger than this many whole days are still warming up
    pub new_product_days: i64,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            change_rate_threshold: 0.2,
            new_product_days: 7,
        }
    }
}

impl PriorityPolicy {
    /// Classify a product against the current time
    pub fn classify(&self, product: &Product) -> PriorityTier {
        self.classify_at(product, Utc::now())
    }

    /// Classify a product against an explicit clock
    pub fn classify_at(&self, product: &Product, now: DateTime<Utc>) -> PriorityTier {
        // An unreadable added_at counts as brand new
        let age = age_days(product, now).unwrap_or(0);

        if product.change_rate() > self.change_rate_threshold || age < self.new_product_days {
            PriorityTier::High
        } else {
            PriorityTier::Regular
        }
    }

    /// Products in a tier, in stored order
    pub fn select<'a>(
        &self,
        products: &'a [Product],
        tier: PriorityTier,
        now: DateTime<Utc>,
    ) -> Vec<&'a Product> {
        products
            .iter()
            .filter(|product| self.classify_at(product, now) == tier)
            .collect()
    }
}

/// Whole days since the product was first tracked
pub fn age_days(product: &Product, now: DateTime<Utc>) -> Option<i64> {
    product
        .added_at_time()
        .map(|added| now.signed_duration_since(added).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::history::{create_product_at, Observation};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn product_aged(days: i64, checks: u64, changes: u64) -> Product {
        let mut product = create_product_at(
            "example.com_00000000",
            "https://example.com/p",
            "https://example.com/p",
            Observation::new("$10"),
            now() - Duration::days(days),
        );
        product.total_price_checks = checks;
        product.price_changes = changes;
        product
    }

    #[test]
    fn test_new_products_are_high_priority() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify_at(&product_aged(6, 10, 0), now()), PriorityTier::High);
        assert_eq!(policy.classify_at(&product_aged(7, 10, 0), now()), PriorityTier::Regular);
    }

    #[test]
    fn test_volatile_products_are_high_priority() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify_at(&product_aged(30, 10, 3), now()), PriorityTier::High);
        // Exactly 20% is not above the threshold
        assert_eq!(policy.classify_at(&product_aged(30, 10, 2), now()), PriorityTier::Regular);
    }

    #[test]
    fn test_zero_checks_does_not_divide_by_zero() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify_at(&product_aged(30, 0, 0), now()), PriorityTier::Regular);
    }

    #[test]
    fn test_unreadable_added_at_is_high_priority() {
        let mut product = product_aged(30, 10, 0);
        product.added_at = "sometime".to_string();
        assert_eq!(PriorityPolicy::default().classify_at(&product, now()), PriorityTier::High);
    }

    #[test]
    fn test_select_partitions_products() {
        let policy = PriorityPolicy::default();
        let products = vec![product_aged(1, 1, 0), product_aged(30, 10, 0), product_aged(30, 10, 5)];
        assert_eq!(policy.select(&products, PriorityTier::High, now()).len(), 2);
        assert_eq!(policy.select(&products, PriorityTier::Regular, now()).len(), 1);
    }
}
