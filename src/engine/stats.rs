use crate::engine::numeric::price_magnitude;
use crate::models::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a product's price over its recorded history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Per-product statistics derived from the embedded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub product_id: String,
    pub total_checks: u64,
    pub price_changes: u64,
    pub current_price: String,
    pub first_price: Option<String>,
    pub lowest_price: Option<Decimal>,
    pub highest_price: Option<Decimal>,
    pub price_trend: PriceTrend,
}

/// Spread of a product's historical prices, for the weekly report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityEntry {
    pub product_id: String,
    pub product_name: String,
    /// `(max - min) / min` as a percentage, two decimal places
    pub volatility: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub current_price: Decimal,
}

/// Numeric magnitudes of every history entry that has one
pub fn numeric_history(product: &Product) -> Vec<Decimal> {
    product
        .price_history
        .iter()
        .filter_map(|entry| price_magnitude(&entry.price))
        .collect()
}

/// None when empty or when the sum leaves the Decimal range
fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(*value))?;
    sum.checked_div(Decimal::from(values.len()))
}

/// Compare the average of the last three prices with the first three
fn trend(prices: &[Decimal]) -> PriceTrend {
    if prices.len() < 2 {
        return PriceTrend::Stable;
    }

    let window = prices.len().min(3);
    let bounds = mean(&prices[..window]).and_then(|older| {
        let recent = mean(&prices[prices.len() - window..])?;
        let lower = older.checked_mul(Decimal::new(95, 2))?;
        let upper = older.checked_mul(Decimal::new(105, 2))?;
        Some((recent, lower, upper))
    });

    // Magnitudes too large to average read as stable
    match bounds {
        Some((recent, lower, _)) if recent < lower => PriceTrend::Decreasing,
        Some((recent, _, upper)) if recent > upper => PriceTrend::Increasing,
        _ => PriceTrend::Stable,
    }
}

/// Build the statistics view of a product
pub fn product_stats(product: &Product) -> ProductStats {
    let prices = numeric_history(product);

    ProductStats {
        product_id: product.product_id.clone(),
        total_checks: product.total_price_checks,
        price_changes: product.price_changes,
        current_price: product.current_price.clone(),
        first_price: product.first_price().map(str::to_string),
        lowest_price: prices.iter().min().copied(),
        highest_price: prices.iter().max().copied(),
        price_trend: trend(&prices),
    }
}

/// Volatility of a product, if it has at least two history entries and a
/// parsable price among them
pub fn volatility(product: &Product) -> Option<VolatilityEntry> {
    if product.price_history.len() < 2 {
        return None;
    }

    let prices = numeric_history(product);
    let min_price = prices.iter().min().copied()?;
    let max_price = prices.iter().max().copied()?;
    let current_price = prices.last().copied()?;

    // A spread outside the Decimal range leaves the product unranked
    let volatility = if min_price > Decimal::ZERO {
        (max_price - min_price)
            .checked_div(min_price)?
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp(2)
    } else {
        Decimal::ZERO
    };

    Some(VolatilityEntry {
        product_id: product.product_id.clone(),
        product_name: product.display_name().to_string(),
        volatility,
        min_price,
        max_price,
        current_price,
    })
}

/// The `limit` most volatile products, most volatile first
pub fn top_volatile(products: &[Product], limit: usize) -> Vec<VolatilityEntry> {
    let mut entries: Vec<VolatilityEntry> = products.iter().filter_map(volatility).collect();
    entries.sort_by(|a, b| b.volatility.cmp(&a.volatility));
    entries.truncate(limit);
    entries
}
