use std::collections::HashSet;

use chrono::{NaiveTime, Weekday};

use crate::slot::Slot;

/// User criteria a slot must satisfy to be reported.
///
/// Every rule is optional; an unset rule matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Allowed weekdays of the slot's site-local date.
    pub weekdays: Option<HashSet<Weekday>>,
    /// Slot must start exactly at this time.
    pub exact_time: Option<NaiveTime>,
    /// Inclusive lower bound on the start time.
    pub from_time: Option<NaiveTime>,
    /// Exclusive upper bound on the start time.
    pub to_time: Option<NaiveTime>,
    /// Minimum consecutive hours on one court and date; 1 disables block filtering.
    pub min_hours: u32,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            weekdays: None,
            exact_time: None,
            from_time: None,
            to_time: None,
            min_hours: 1,
        }
    }
}

impl FilterCriteria {
    /// Check a single slot against all configured rules.
    pub fn matches(&self, slot: &Slot) -> bool {
        if let Some(weekdays) = &self.weekdays {
            if !weekdays.contains(&slot.weekday()) {
                return false;
            }
        }
        if let Some(exact) = self.exact_time {
            if slot.start() != exact {
                return false;
            }
        }
        if let Some(from) = self.from_time {
            if slot.start() < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if slot.start() >= to {
                return false;
            }
        }
        true
    }

    /// Human-readable summary of the time window, e.g. `09:00 to any`.
    pub fn describe_window(&self) -> Option<String> {
        if self.from_time.is_none() && self.to_time.is_none() {
            return None;
        }
        let fmt = |t: Option<NaiveTime>| {
            t.map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "any".to_string())
        };
        Some(format!("{} to {}", fmt(self.from_time), fmt(self.to_time)))
    }
}
