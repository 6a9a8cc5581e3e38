mod helpers;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use helpers::*;
use price_tracker::engine::{
    apply_observation_at, classify_change, product_stats, top_volatile, Observation, PriceTrend,
    PriorityPolicy, PriorityTier, UpdateStatus,
};
use price_tracker::extractor::{ProductSnapshot, PRICE_NOT_FOUND};
use price_tracker::identity::{canonicalize, detect_site, resolve_id, Site};
use price_tracker::models::{parse_timestamp, ChangeType, Product};
use price_tracker::services::notifier::change_metrics;
use price_tracker::services::{daily_summary, NotificationPolicy};
use price_tracker::AppConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

/// Apply a sequence of prices one hour apart
fn observe_all(product: &mut Product, prices: &[&str]) {
    for (i, price) in prices.iter().enumerate() {
        let at = base_time() + ChronoDuration::hours(i as i64 + 1);
        apply_observation_at(product, &Observation::new(*price), at);
    }
}

// ============================================================================
// History engine
// ============================================================================

#[test]
fn test_counters_track_every_observation() {
    let mut product = product_at("p", "https://shop.example.com/p", "$10", base_time());
    observe_all(&mut product, &["$10", "$12", "$12", "$9", "$9", "$10"]);

    assert_eq!(product.total_price_checks, 7);
    assert_eq!(product.price_changes, 3);
    assert_eq!(product.price_history.len(), 4);
    assert!(product.total_price_checks >= product.price_changes + 1);
    assert_eq!(product.current_price, product.price_history.last().unwrap().price);

    let kinds: Vec<_> = product.price_history.iter().map(|e| e.change_type).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeType::Initial,
            ChangeType::Increase,
            ChangeType::Decrease,
            ChangeType::Increase
        ]
    );
}

#[test]
fn test_same_price_only_touches_clock_and_counter() {
    let mut product = product_at("p", "https://shop.example.com/p", "₹499", base_time());
    let before = product.clone();
    let later = base_time() + ChronoDuration::minutes(30);

    let change = apply_observation_at(&mut product, &Observation::new("₹499"), later);
    assert_eq!(change.status, UpdateStatus::NoChange);
    assert_eq!(change.message, "Price remains the same: ₹499");
    assert_eq!(product.price_history, before.price_history);
    assert_eq!(product.price_changes, 0);
    assert_eq!(product.total_price_checks, 2);
    assert_ne!(product.last_updated, before.last_updated);
    assert_eq!(product.added_at, before.added_at);
}

#[test]
fn test_formatting_difference_is_a_change_labelled_same() {
    let mut product = product_at("p", "https://shop.example.com/p", "₹1,299", base_time());
    let change = apply_observation_at(&mut product, &Observation::new("₹1299"), base_time());

    assert_eq!(change.status, UpdateStatus::PriceChanged);
    assert_eq!(change.change_type, ChangeType::Same);
    assert_eq!(product.price_changes, 1);
}

#[test]
fn test_seed_entry_and_sticky_metadata() {
    let observation = Observation::new("$25").with_name("Desk Lamp");
    let mut product = price_tracker::engine::create_product_at(
        "lamp",
        "https://shop.example.com/lamp?utm=1",
        "https://shop.example.com/lamp",
        observation,
        base_time(),
    );

    assert_eq!(product.price_history.len(), 1);
    assert_eq!(product.price_history[0].change_type, ChangeType::Initial);
    assert_eq!(product.price_history[0].timestamp, product.added_at);
    assert_eq!(product.added_at, product.last_updated);
    assert!(product.image_url.is_none());

    let update = Observation::new("$22")
        .with_name("Another Name")
        .with_image("https://cdn.example.com/lamp.jpg");
    apply_observation_at(&mut product, &update, base_time() + ChronoDuration::hours(1));

    assert_eq!(product.product_name.as_deref(), Some("Desk Lamp"));
    assert_eq!(product.image_url.as_deref(), Some("https://cdn.example.com/lamp.jpg"));
}

#[test]
fn test_timestamps_are_readable() {
    let product = product_at("p", "https://shop.example.com/p", "$1", base_time());
    assert_eq!(parse_timestamp(&product.added_at), Some(base_time()));
    // Naive timestamps from older files read as UTC
    assert_eq!(parse_timestamp("2024-03-01T09:30:00"), Some(base_time()));
    assert_eq!(parse_timestamp("last tuesday"), None);
}

#[test]
fn test_classify_change_cases() {
    assert_eq!(classify_change("₹1,299", "₹999"), ChangeType::Decrease);
    assert_eq!(classify_change("$10", "$10.50"), ChangeType::Increase);
    assert_eq!(classify_change("Rs. 500", "₹500"), ChangeType::Same);
    assert_eq!(classify_change("Out of stock", "₹500"), ChangeType::Unknown);
}

// ============================================================================
// Priority and statistics
// ============================================================================

#[test]
fn test_priority_tiers() {
    let policy = PriorityPolicy::default();
    let now = base_time() + ChronoDuration::days(30);

    let young = product_at("young", "u", "$1", now - ChronoDuration::days(6));
    assert_eq!(policy.classify_at(&young, now), PriorityTier::High);

    let mut settled = product_at("settled", "u", "$1", now - ChronoDuration::days(8));
    assert_eq!(policy.classify_at(&settled, now), PriorityTier::Regular);

    // 2 changes over 5 checks is a 0.4 change rate
    settled.total_price_checks = 5;
    settled.price_changes = 2;
    assert_eq!(policy.classify_at(&settled, now), PriorityTier::High);

    let mut broken = product_at("broken", "u", "$1", now - ChronoDuration::days(60));
    broken.added_at = "not a date".into();
    assert_eq!(policy.classify_at(&broken, now), PriorityTier::High);
}

#[test]
fn test_stats_and_volatility() {
    let mut falling = product_at("falling", "u", "$100", base_time());
    observe_all(&mut falling, &["$90", "$80", "$70"]);

    let stats = product_stats(&falling);
    assert_eq!(stats.total_checks, 4);
    assert_eq!(stats.price_changes, 3);
    assert_eq!(stats.first_price.as_deref(), Some("$100"));
    assert_eq!(stats.lowest_price, Some(Decimal::from(70)));
    assert_eq!(stats.highest_price, Some(Decimal::from(100)));
    assert_eq!(stats.price_trend, PriceTrend::Decreasing);

    let mut wobbly = product_at("wobbly", "u", "$100", base_time());
    observe_all(&mut wobbly, &["$101"]);
    let flat = product_at("flat", "u", "$100", base_time());

    let ranked = top_volatile(&[wobbly, flat, falling], 5);
    let ids: Vec<_> = ranked.iter().map(|v| v.product_id.as_str()).collect();
    assert_eq!(ids, vec!["falling", "wobbly"]);
    // (100 - 70) / 70
    assert_eq!(ranked[0].volatility, Decimal::new(4286, 2));
}

#[test]
fn test_daily_summary_totals() {
    let now = base_time() + ChronoDuration::days(2);
    let mut active = product_at("a", "u", "$5", now - ChronoDuration::hours(30));
    apply_observation_at(&mut active, &Observation::new("$6"), now - ChronoDuration::hours(1));
    let idle = product_at("b", "u", "$5", now - ChronoDuration::hours(40));

    let summary = daily_summary(&[active, idle], now);
    assert_eq!(summary.total_products, 2);
    assert_eq!(summary.total_price_checks, 3);
    assert_eq!(summary.total_price_changes, 1);
    assert_eq!(summary.active_products, 1);
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_identity_is_stable_across_tracking_noise() {
    let noisy = "https://www.amazon.in/Echo-Dot/dp/b09b8yws5r/ref=sr_1_3?crid=ABC&keywords=echo";
    let clean = canonicalize(noisy);

    assert_eq!(resolve_id(noisy), "amazon_B09B8YWS5R");
    assert_eq!(resolve_id(&clean), resolve_id(noisy));
    assert_eq!(canonicalize(&clean), clean);
    assert_eq!(detect_site(noisy), Site::Amazon);
}

#[test]
fn test_fallback_ids_ignore_query_strings() {
    let a = resolve_id("https://shop.example.com/items/42?utm_source=mail");
    let b = resolve_id("https://shop.example.com/items/42#reviews");
    let other = resolve_id("https://shop.example.com/items/43");

    assert_eq!(a, b);
    assert_ne!(a, other);
    assert!(a.starts_with("shop.example.com_"));
    assert_eq!(detect_site("https://shop.example.com/items/42"), Site::Generic);
}

// ============================================================================
// Extraction results and notifications
// ============================================================================

#[test]
fn test_snapshot_sentinel() {
    assert!(!ProductSnapshot::not_found().has_price());
    assert_eq!(ProductSnapshot::not_found().price, PRICE_NOT_FOUND);

    let blank = ProductSnapshot {
        price: "  ".into(),
        name: None,
        image_url: None,
    };
    assert!(!blank.has_price());
}

#[test]
fn test_change_metrics_and_policy() {
    let (amount, percentage) = change_metrics("₹1,299", "₹999");
    assert_eq!(amount, Some(Decimal::from(-300)));
    assert_eq!(percentage, Some(Decimal::new(-2309, 2)));

    assert_eq!(change_metrics("₹0", "₹10").1, None);

    let mut product = product_at("p", "u", "$200", base_time());
    let policy = NotificationPolicy::default();

    let drop = apply_observation_at(&mut product, &Observation::new("$150"), base_time());
    assert!(policy.should_notify(&drop));

    let rise = apply_observation_at(&mut product, &Observation::new("$180"), base_time());
    assert!(!policy.should_notify(&rise));

    // Under the minimum percentage
    let nudge = apply_observation_at(&mut product, &Observation::new("$179"), base_time());
    assert!(!policy.should_notify(&nudge));
}

// ============================================================================
// Configuration
// ============================================================================

fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(&|key| vars.get(key).cloned())
}

#[test]
fn test_config_defaults_and_overrides() {
    let config = config_from(&[]).unwrap();
    assert_eq!(config.scheduler.stale_threshold_hours, 24);
    assert!(config.is_development());
    assert!(!config.json_logs());

    let config = config_from(&[
        ("HIGH_PRIORITY_INTERVAL_HOURS", "1"),
        ("ENABLE_WEEKLY_SCAN", "false"),
        ("LOG_FORMAT", "JSON"),
        ("ENVIRONMENT", "production"),
    ])
    .unwrap();
    assert_eq!(config.scheduler.high_priority_interval_hours, 1);
    assert!(!config.scheduler.enable_weekly_scan);
    assert!(config.json_logs());
    assert!(config.is_production());

    assert!(config_from(&[("LOG_LEVEL", "loud")]).is_err());
}

#[tokio::test]
async fn test_scripted_extractor_defaults_to_not_found_status() {
    use price_tracker::extractor::{ExtractionError, Extractor};

    let extractor = ScriptedExtractor::new();
    let err = extractor.fetch("https://unknown.example.com").await.unwrap_err();
    assert!(matches!(err, ExtractionError::HttpStatus { status: 404, .. }));
}
