//! Domain models for the price tracker.
//!
//! This module contains the persisted records: tracked products with their
//! embedded price history, and the document that holds them.

pub mod document;
pub mod product;
pub mod timestamp;

// Re-export all models for convenient access
pub use document::{LegacyPriceRecord, PriceDocument};
pub use product::{ChangeType, PriceHistoryEntry, Product};
pub use timestamp::{format_timestamp, parse_timestamp};
