use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};

/// Identity of a slot instance: the same court, date and start time is the
/// same logical slot no matter what label or end time the markup shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub resource_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
}

/// One bookable hour on one court, in site-local time.
///
/// Equality and hashing use the identity key only, so two observations of
/// the same slot compare equal even if the court label drifted between polls.
#[derive(Debug, Clone)]
pub struct Slot {
    resource_id: String,
    resource_label: String,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
}

impl Slot {
    pub fn new(
        resource_id: impl Into<String>,
        resource_label: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_label: resource_label.into(),
            date,
            start,
            end,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn resource_label(&self) -> &str {
        &self.resource_label
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Length of the slot. Negative or zero for malformed slots.
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// A slot is usable only when it starts before it ends.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            resource_id: self.resource_id.clone(),
            date: self.date,
            start: self.start,
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.resource_id == other.resource_id
            && self.date == other.date
            && self.start == other.start
    }
}

impl Eq for Slot {}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource_id.hash(state);
        self.date.hash(state);
        self.start.hash(state);
    }
}
