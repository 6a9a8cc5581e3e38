//! Price history engine.
//!
//! Pure logic over [`Product`](crate::models::Product) records: applying
//! observations, classifying changes, tiering products for re-checks and
//! deriving statistics. Nothing here performs I/O.

pub mod history;
pub mod numeric;
pub mod priority;
pub mod stats;

pub use history::{
    apply_observation, apply_observation_at, create_product, create_product_at, ChangeResult,
    Observation, UpdateStatus,
};
pub use numeric::{classify_change, price_magnitude};
pub use priority::{age_days, PriorityPolicy, PriorityTier};
pub use stats::{product_stats, top_volatile, PriceTrend, ProductStats, VolatilityEntry};
