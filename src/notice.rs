//! Notification payloads with site-to-observer timezone conversion.

use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

use crate::slot::Slot;

/// Timezone the person watching lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverZone {
    /// The host's detected local zone.
    Host,
    Named(Tz),
}

impl ObserverZone {
    fn convert(&self, instant: DateTime<Tz>) -> (NaiveDateTime, String) {
        match self {
            // The host zone has no IANA name available, so it is shown as
            // a UTC offset.
            ObserverZone::Host => {
                let local = instant.with_timezone(&Local);
                (local.naive_local(), local.format("%:z").to_string())
            }
            ObserverZone::Named(tz) => {
                let local = instant.with_timezone(tz);
                (local.naive_local(), local.format("%Z").to_string())
            }
        }
    }
}

/// Resolve a site-local wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap are pushed forward by the length of the gap.
pub fn resolve_site_time(site: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match site.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // Offsets never change twice within a day, so the offset a day
            // earlier is the one in force before the gap.
            let before: FixedOffset = site
                .from_local_datetime(&(naive - TimeDelta::days(1)))
                .earliest()
                .map(|t| t.offset().fix())
                .unwrap_or_else(|| site.offset_from_utc_datetime(&naive).fix());
            site.from_utc_datetime(&(naive - before))
        }
    }
}

/// Everything a notifier needs to present one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotNotice {
    pub resource_label: String,
    pub site_start: NaiveDateTime,
    pub site_end: NaiveDateTime,
    pub observer_start: NaiveDateTime,
    pub observer_zone: String,
}

impl SlotNotice {
    pub fn new(slot: &Slot, site: Tz, observer: ObserverZone) -> Self {
        let site_start = slot.date().and_time(slot.start());
        let site_end = slot.date().and_time(slot.end());
        let instant = resolve_site_time(site, site_start);
        let (observer_start, observer_zone) = observer.convert(instant);

        Self {
            resource_label: slot.resource_label().to_string(),
            site_start,
            site_end,
            observer_start,
            observer_zone,
        }
    }

    /// One-line description, e.g.
    /// `Court 1: 2024-06-01 20:00-21:00 (local: Sat 2024-06-01 10:00 AM UTC)`.
    pub fn line(&self) -> String {
        format!(
            "{}: {} {}-{} (local: {} {})",
            self.resource_label,
            self.site_start.format("%Y-%m-%d"),
            self.site_start.format("%H:%M"),
            self.site_end.format("%H:%M"),
            self.observer_start.format("%a %Y-%m-%d %I:%M %p"),
            self.observer_zone
        )
    }
}

/// Title and body for one batch of newly found slots.
pub fn summarize(notices: &[SlotNotice]) -> (String, String) {
    let title = format!("Found {} new slot(s)", notices.len());
    let body = notices
        .iter()
        .map(|n| format!("  - {}", n.line()))
        .collect::<Vec<_>>()
        .join("\n");
    (title, body)
}
