use crate::engine::{price_magnitude, ChangeResult};
use crate::models::{format_timestamp, ChangeType, Product};
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Receives classified price changes.
///
/// Called after the change has been persisted. Implementations must return
/// quickly; slow delivery belongs on a spawned task.
pub trait Notifier: Send + Sync {
    fn on_price_change(&self, product: &Product, change: &ChangeResult);
}

/// Absolute and percentage change between two raw prices
pub fn change_metrics(old_price: &str, new_price: &str) -> (Option<Decimal>, Option<Decimal>) {
    match (price_magnitude(old_price), price_magnitude(new_price)) {
        (Some(old), Some(new)) => {
            let amount = new - old;
            let percentage = if old > Decimal::ZERO {
                amount
                    .checked_div(old)
                    .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                    .map(|percentage| percentage.round_dp(2))
            } else {
                None
            };
            (Some(amount), percentage)
        }
        _ => (None, None),
    }
}

/// Which changes are worth telling anyone about
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotificationPolicy {
    pub notify_on_decrease: bool,
    pub notify_on_increase: bool,
    pub min_change_percent: f64,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            notify_on_decrease: true,
            notify_on_increase: false,
            min_change_percent: 1.0,
        }
    }
}

impl NotificationPolicy {
    pub fn should_notify(&self, change: &ChangeResult) -> bool {
        if !change.is_change() {
            return false;
        }

        let wanted = match change.change_type {
            ChangeType::Decrease => self.notify_on_decrease,
            ChangeType::Increase => self.notify_on_increase,
            _ => false,
        };
        if !wanted {
            return false;
        }

        // Percentage filter only applies when the percentage is computable
        match change_metrics(&change.old_price, &change.new_price).1 {
            Some(percentage) => percentage
                .abs()
                .to_f64()
                .map_or(true, |p| p >= self.min_change_percent),
            None => true,
        }
    }
}

/// Logs every price change
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_price_change(&self, product: &Product, change: &ChangeResult) {
        info!(
            product_id = %product.product_id,
            change_type = %change.change_type,
            "Price change for {}: {} -> {}",
            product.display_name(),
            change.old_price,
            change.new_price
        );
    }
}

/// Posts a JSON payload to each configured webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    urls: Arc<Vec<String>>,
    policy: NotificationPolicy,
}

impl WebhookNotifier {
    /// Create a new WebhookNotifier
    pub fn new(urls: Vec<String>, policy: NotificationPolicy, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            urls: Arc::new(urls),
            policy,
        })
    }

    /// JSON body sent to every webhook
    pub fn payload(product: &Product, change: &ChangeResult) -> Value {
        let (change_amount, change_percentage) = change_metrics(&change.old_price, &change.new_price);

        serde_json::json!({
            "type": "price_change",
            "timestamp": format_timestamp(Utc::now()),
            "product": {
                "id": product.product_id,
                "name": product.display_name(),
                "url": product.clean_url,
                "image_url": product.image_url,
            },
            "price_change": {
                "old_price": change.old_price,
                "new_price": change.new_price,
                "change_type": change.change_type,
                "change_amount": change_amount,
                "change_percentage": change_percentage,
            }
        })
    }
}

impl Notifier for WebhookNotifier {
    fn on_price_change(&self, product: &Product, change: &ChangeResult) {
        if self.urls.is_empty() || !self.policy.should_notify(change) {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, webhook notification dropped");
                return;
            }
        };

        let payload = Self::payload(product, change);
        let client = self.client.clone();
        let urls = self.urls.clone();
        let product_id = product.product_id.clone();

        handle.spawn(async move {
            for url in urls.iter() {
                match client.post(url).json(&payload).send().await {
                    Ok(response) if response.status().is_success() => {
                        info!("Webhook notification for {} sent to {}", product_id, url);
                    }
                    Ok(response) => {
                        warn!(
                            "Webhook notification to {} failed with status {}",
                            url,
                            response.status()
                        );
                    }
                    Err(e) => {
                        error!("Error sending webhook to {}: {}", url, e);
                    }
                }
            }
        });
    }
}

/// Fans a change out to several notifiers
#[derive(Clone, Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for CompositeNotifier {
    fn on_price_change(&self, product: &Product, change: &ChangeResult) {
        for notifier in &self.notifiers {
            notifier.on_price_change(product, change);
        }
    }
}
