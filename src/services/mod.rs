pub mod batch_runner;
pub mod notifier;
pub mod reports;
pub mod scheduler;
pub mod tracker;

pub use batch_runner::{is_stale, select_stale, BatchReport, BatchRunner};
pub use notifier::{CompositeNotifier, LogNotifier, NotificationPolicy, Notifier, WebhookNotifier};
pub use reports::{daily_summary, weekly_report, write_weekly_report, DailySummary, WeeklyReport};
pub use scheduler::{JobContext, JobKind, JobOutcome, PriceScheduler, SchedulerStatus, Trigger};
pub use tracker::{
    BackgroundAck, ManualUpdateResult, PriceHistory, PriceHistoryResponse, ProductSummary, StaleProduct,
    StaleUpdateResult, TrackResult, TrackStatus, TrackerService,
};
