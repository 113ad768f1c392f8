//! Abstractions for time, the booking site and side effects.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `CalendarSource`: Abstracting the booking site's calendar endpoint
//! - `Notifier`: Abstracting notification delivery

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::config::NotificationConfig;
use crate::error::FetchError;
use crate::notice::{SlotNotice, summarize};

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing, frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    utc_time: DateTime<Utc>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { utc_time: time }
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.utc_time
    }
}

// ==================== CalendarSource Trait ====================

/// Source of raw calendar widget markup, one venue-day at a time.
///
/// Implementations own session handling; a returned body is always usable
/// markup, never the site's "session expired" page.
pub trait CalendarSource {
    fn fetch_day(
        &mut self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

// ==================== Notifier Trait ====================

/// Trait for abstracting notification delivery.
pub trait Notifier: Send + Sync {
    /// Send a notification with the given title and body.
    fn notify(&self, title: &str, body: &str) -> Result<()>;

    /// Announce a batch of newly found slots.
    ///
    /// Text channels get the summary title and body; channels that carry
    /// structured data override this.
    fn notify_slots(&self, notices: &[SlotNotice]) -> Result<()> {
        let (title, body) = summarize(notices);
        self.notify(&title, &body)
    }
}

/// Prints notifications to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        println!("{}:", title);
        if !body.is_empty() {
            println!("{}", body);
        }
        Ok(())
    }
}

/// System notifier implementation using notify-rust.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone, Default)]
pub struct SystemNotifier;

#[cfg(feature = "desktop")]
impl Notifier for SystemNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .appname("Roketto Watch")
            .show()?;
        Ok(())
    }
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notifications as JSON to a webhook URL.
///
/// Delivery completes (or fails) before `notify` returns.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn post(&self, payload: serde_json::Value) -> Result<()> {
        let url = self.url.clone();

        // The blocking client owns a runtime of its own, so it cannot be
        // driven from inside an async task. Run it on a plain thread and wait.
        let delivery = std::thread::spawn(move || -> Result<(), reqwest::Error> {
            let client = reqwest::blocking::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()?;
            client.post(&url).json(&payload).send()?.error_for_status()?;
            Ok(())
        });

        delivery
            .join()
            .map_err(|_| anyhow::anyhow!("Webhook delivery thread panicked"))?
            .with_context(|| format!("Webhook delivery to {} failed", self.url))
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.post(serde_json::json!({
            "title": title,
            "body": body,
            "text": format!("{}\n{}", title, body),
        }))
    }

    fn notify_slots(&self, notices: &[SlotNotice]) -> Result<()> {
        let (title, body) = summarize(notices);
        self.post(serde_json::json!({
            "title": title,
            "body": body,
            "text": format!("{}\n{}", title, body),
            "slots": notices,
        }))
    }
}

/// Fans a notification out to several channels.
///
/// A failing channel is logged and does not stop the others; the call only
/// fails when every channel failed.
pub struct CombinedNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl CombinedNotifier {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build the channels enabled in configuration.
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if config.console {
            channels.push(Box::new(ConsoleNotifier));
        }

        if config.desktop {
            #[cfg(feature = "desktop")]
            channels.push(Box::new(SystemNotifier));
            #[cfg(not(feature = "desktop"))]
            tracing::warn!("Desktop notifications requested but built without the `desktop` feature");
        }

        if let Some(url) = &config.webhook_url {
            channels.push(Box::new(WebhookNotifier::new(url.clone())));
        }

        Self::new(channels)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn fan_out(&self, send: impl Fn(&dyn Notifier) -> Result<()>) -> Result<()> {
        let mut failures = 0;
        for channel in &self.channels {
            if let Err(e) = send(channel.as_ref()) {
                tracing::warn!("Notification channel failed: {:#}", e);
                failures += 1;
            }
        }

        if failures > 0 && failures == self.channels.len() {
            anyhow::bail!("All {} notification channels failed", failures);
        }
        Ok(())
    }
}

impl Notifier for CombinedNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.fan_out(|channel| channel.notify(title, body))
    }

    fn notify_slots(&self, notices: &[SlotNotice]) -> Result<()> {
        self.fan_out(|channel| channel.notify_slots(notices))
    }
}

/// Mock notifier for testing that records all notifications.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all notifications that have been sent.
    pub fn get_notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Get the count of notifications sent.
    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    /// Check if any notification was sent.
    pub fn was_called(&self) -> bool {
        !self.notifications.lock().unwrap().is_empty()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        (**self).notify(title, body)
    }

    fn notify_slots(&self, notices: &[SlotNotice]) -> Result<()> {
        (**self).notify_slots(notices)
    }
}
