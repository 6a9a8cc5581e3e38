use crate::engine::PriorityPolicy;
use crate::services::notifier::NotificationPolicy;
use chrono::Weekday;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Reads one variable. `from_env` uses the process environment; tests pass a map.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn parsed<T: FromStr>(lookup: Lookup<'_>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn flag(lookup: Lookup<'_>, key: &str, default: bool) -> bool {
    match lookup(key).map(|s| s.trim().to_lowercase()) {
        Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => true,
        Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => false,
        _ => default,
    }
}

/// Wall-clock time of day, `HH:MM` in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("Invalid time '{}', expected HH:MM", s))?;
        let hour: u32 = hour.parse().map_err(|_| format!("Invalid hour in '{}'", s))?;
        let minute: u32 = minute.parse().map_err(|_| format!("Invalid minute in '{}'", s))?;

        if hour > 23 || minute > 59 {
            return Err(format!("Time '{}' is out of range", s));
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Where the product document and reports live
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_file: PathBuf,
    pub reports_dir: Option<PathBuf>,
}

impl StorageConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, String> {
        let data_file = lookup("DATA_FILE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "price_data.json".to_string());

        let reports_dir = lookup("REPORTS_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            data_file: PathBuf::from(data_file),
            reports_dir,
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("price_data.json"),
            reports_dir: None,
        }
    }
}

/// HTTP settings for page fetches
#[derive(Debug, Clone)]
pub struct ScrapingConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl ScrapingConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, String> {
        let request_timeout_secs = parsed(lookup, "REQUEST_TIMEOUT_SECS", 10u64);
        let user_agent = lookup("USER_AGENT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        if request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            request_timeout_secs,
            user_agent,
        })
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Job cadence and batch pacing
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub high_priority_interval_hours: u64,
    pub regular_interval_hours: u64,
    pub stale_threshold_hours: i64,
    pub scheduled_request_delay_secs: u64,
    pub manual_request_delay_secs: u64,
    pub daily_maintenance_time: TimeOfDay,
    pub weekly_scan_day: Weekday,
    pub weekly_scan_time: TimeOfDay,
    pub enable_high_priority: bool,
    pub enable_regular: bool,
    pub enable_daily_maintenance: bool,
    pub enable_weekly_scan: bool,
    pub volatility_top_n: usize,
    pub priority: PriorityPolicy,
}

impl SchedulerConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, String> {
        let defaults = Self::default();

        let high_priority_interval_hours = parsed(lookup, "HIGH_PRIORITY_INTERVAL_HOURS", defaults.high_priority_interval_hours);
        let regular_interval_hours = parsed(lookup, "REGULAR_INTERVAL_HOURS", defaults.regular_interval_hours);
        let stale_threshold_hours = parsed(lookup, "STALE_THRESHOLD_HOURS", defaults.stale_threshold_hours);

        let daily_maintenance_time = match lookup("DAILY_MAINTENANCE_TIME") {
            Some(value) => value.parse::<TimeOfDay>().map_err(|e| format!("DAILY_MAINTENANCE_TIME: {}", e))?,
            None => defaults.daily_maintenance_time,
        };
        let weekly_scan_day = match lookup("WEEKLY_SCAN_DAY") {
            Some(value) => value
                .trim()
                .parse::<Weekday>()
                .map_err(|_| format!("Invalid WEEKLY_SCAN_DAY: {}", value))?,
            None => defaults.weekly_scan_day,
        };
        let weekly_scan_time = match lookup("WEEKLY_SCAN_TIME") {
            Some(value) => value.parse::<TimeOfDay>().map_err(|e| format!("WEEKLY_SCAN_TIME: {}", e))?,
            None => defaults.weekly_scan_time,
        };

        // Validate configuration
        if high_priority_interval_hours == 0 {
            return Err("HIGH_PRIORITY_INTERVAL_HOURS must be greater than 0".to_string());
        }
        if regular_interval_hours <= high_priority_interval_hours {
            return Err(format!(
                "REGULAR_INTERVAL_HOURS ({}) must be greater than HIGH_PRIORITY_INTERVAL_HOURS ({})",
                regular_interval_hours, high_priority_interval_hours
            ));
        }
        if stale_threshold_hours <= 0 {
            return Err("STALE_THRESHOLD_HOURS must be greater than 0".to_string());
        }

        Ok(Self {
            high_priority_interval_hours,
            regular_interval_hours,
            stale_threshold_hours,
            scheduled_request_delay_secs: parsed(lookup, "SCHEDULED_REQUEST_DELAY_SECS", defaults.scheduled_request_delay_secs),
            manual_request_delay_secs: parsed(lookup, "MANUAL_REQUEST_DELAY_SECS", defaults.manual_request_delay_secs),
            daily_maintenance_time,
            weekly_scan_day,
            weekly_scan_time,
            enable_high_priority: flag(lookup, "ENABLE_HIGH_PRIORITY_TRACKING", true),
            enable_regular: flag(lookup, "ENABLE_REGULAR_TRACKING", true),
            enable_daily_maintenance: flag(lookup, "ENABLE_DAILY_MAINTENANCE", true),
            enable_weekly_scan: flag(lookup, "ENABLE_WEEKLY_SCAN", true),
            volatility_top_n: parsed(lookup, "VOLATILITY_TOP_N", defaults.volatility_top_n),
            priority: defaults.priority,
        })
    }

    pub fn high_priority_interval(&self) -> Duration {
        Duration::from_secs(self.high_priority_interval_hours * 3600)
    }

    pub fn regular_interval(&self) -> Duration {
        Duration::from_secs(self.regular_interval_hours * 3600)
    }

    pub fn scheduled_request_delay(&self) -> Duration {
        Duration::from_secs(self.scheduled_request_delay_secs)
    }

    pub fn manual_request_delay(&self) -> Duration {
        Duration::from_secs(self.manual_request_delay_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            high_priority_interval_hours: 2,
            regular_interval_hours: 6,
            stale_threshold_hours: 24,
            scheduled_request_delay_secs: 2,
            manual_request_delay_secs: 1,
            daily_maintenance_time: TimeOfDay { hour: 2, minute: 0 },
            weekly_scan_day: Weekday::Sun,
            weekly_scan_time: TimeOfDay { hour: 3, minute: 0 },
            enable_high_priority: true,
            enable_regular: true,
            enable_daily_maintenance: true,
            enable_weekly_scan: true,
            volatility_top_n: 5,
            priority: PriorityPolicy::default(),
        }
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub webhook_urls: Vec<String>,
    pub policy: NotificationPolicy,
}

impl NotificationConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, String> {
        let webhook_urls: Vec<String> = lookup("WEBHOOK_URLS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        for url in &webhook_urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Invalid webhook URL: {}", url));
            }
        }

        let defaults = NotificationPolicy::default();
        let min_change_percent = parsed(lookup, "MIN_CHANGE_PERCENT", defaults.min_change_percent);
        if min_change_percent < 0.0 {
            return Err("MIN_CHANGE_PERCENT must not be negative".to_string());
        }

        Ok(Self {
            webhook_urls,
            policy: NotificationPolicy {
                notify_on_decrease: flag(lookup, "NOTIFY_ON_DECREASE", defaults.notify_on_decrease),
                notify_on_increase: flag(lookup, "NOTIFY_ON_INCREASE", defaults.notify_on_increase),
                min_change_percent,
            },
        })
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_urls: Vec::new(),
            policy: NotificationPolicy::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub scraping: ScrapingConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
    pub log_level: String,
    pub log_format: String,
    pub environment: String,
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Create application config from an arbitrary variable source
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, String> {
        let storage = StorageConfig::from_lookup(lookup)?;
        let scraping = ScrapingConfig::from_lookup(lookup)?;
        let scheduler = SchedulerConfig::from_lookup(lookup)?;
        let notifications = NotificationConfig::from_lookup(lookup)?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_format = lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string());
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            storage,
            scraping,
            scheduler,
            notifications,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            scraping: ScrapingConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            environment: "development".to_string(),
        }
    }
}
