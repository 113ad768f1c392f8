//! Roketto Watch Library
//!
//! This module exposes the core components of the court availability watcher
//! for testing and potential reuse.

pub mod api;
pub mod block;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod notice;
pub mod schedule;
pub mod seen;
pub mod slot;
pub mod traits;
pub mod watcher;

// Re-export commonly used types
pub use api::CalendarClient;
pub use block::filter_by_min_block;
pub use config::{AppConfig, WatchPlan};
pub use error::{FetchError, PlanError};
pub use extract::{CalendarMarkup, CalendarPage, extract_slots};
pub use filter::FilterCriteria;
pub use notice::{ObserverZone, SlotNotice};
pub use schedule::PollSchedule;
pub use seen::SeenSlots;
pub use slot::{Slot, SlotKey};
pub use traits::{
    CalendarSource, Clock, CombinedNotifier, ConsoleNotifier, MockClock, MockNotifier, Notifier,
    SystemClock, WebhookNotifier,
};
#[cfg(feature = "desktop")]
pub use traits::SystemNotifier;
pub use watcher::{CycleOutcome, Watcher};
