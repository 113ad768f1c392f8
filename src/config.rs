use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, TimeDelta, Weekday};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::PlanError;
use crate::extract::SESSION_EXPIRED_MARKER;
use crate::filter::FilterCriteria;
use crate::notice::ObserverZone;
use crate::traits::Clock;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub venue: VenueConfig,
    pub network: NetworkConfig,
    pub watch: WatchConfig,
    pub filter: FilterConfig,
    pub polling: PollingConfig,
    pub timezone: TimezoneConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    pub base_url: String,
    /// Public booking page; visiting it primes the session cookie.
    pub show_path: String,
    /// Calendar widget endpoint, queried with `?date=YYYYMMDD`.
    pub calendar_path: String,
    pub user_agent: String,
    /// Text the site serves instead of the calendar once the session is gone.
    pub session_expired_marker: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://roketto.sportlogic.net.au".to_string(),
            show_path: "/secure/customer/booking/v1/public/show?readOnly=false&popupMsgDisabled=false&hideTopSiteBar=false".to_string(),
            calendar_path: "/secure/customer/booking/v1/public/calendar-widget".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36".to_string(),
            session_expired_marker: SESSION_EXPIRED_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 25,
            connect_timeout_secs: 10,
        }
    }
}

/// Which dates to watch. Dates are kept as text until the plan is built so
/// every accepted format goes through [`parse_date`].
#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days_ahead: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            date: None,
            start_date: None,
            end_date: None,
            days_ahead: 7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    pub weekdays: Vec<String>,
    pub time: Option<String>,
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    pub min_hours: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            weekdays: Vec::new(),
            time: None,
            from_time: None,
            to_time: None,
            min_hours: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Random +/- spread applied to every interval.
    pub jitter_secs: u64,
    pub min_interval_secs: u64,
    pub backoff_cap_secs: u64,
    pub once: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 180,
            jitter_secs: 25,
            min_interval_secs: 30,
            backoff_cap_secs: 600,
            once: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimezoneConfig {
    pub site: String,
    /// Observer zone; `None` uses the host's zone.
    pub local: Option<String>,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            site: "Australia/Sydney".to_string(),
            local: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub console: bool,
    pub desktop: bool,
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            console: true,
            desktop: false,
            webhook_url: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_file(None)
    }

    /// Load configuration, optionally layering an explicit file above the
    /// default locations.
    pub fn load_with_file(extra: Option<&Path>) -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roketto-watch");

        let venue = VenueConfig::default();

        let mut builder = Config::builder()
            // 1. Defaults
            // Venue
            .set_default("venue.base_url", venue.base_url)?
            .set_default("venue.show_path", venue.show_path)?
            .set_default("venue.calendar_path", venue.calendar_path)?
            .set_default("venue.user_agent", venue.user_agent)?
            .set_default("venue.session_expired_marker", venue.session_expired_marker)?
            // Network
            .set_default("network.request_timeout_secs", 25)?
            .set_default("network.connect_timeout_secs", 10)?
            // Watch
            .set_default("watch.date", None::<String>)?
            .set_default("watch.start_date", None::<String>)?
            .set_default("watch.end_date", None::<String>)?
            .set_default("watch.days_ahead", 7)?
            // Filter
            .set_default("filter.weekdays", Vec::<String>::new())?
            .set_default("filter.time", None::<String>)?
            .set_default("filter.from_time", None::<String>)?
            .set_default("filter.to_time", None::<String>)?
            .set_default("filter.min_hours", 1)?
            // Polling
            .set_default("polling.interval_secs", 180)?
            .set_default("polling.jitter_secs", 25)?
            .set_default("polling.min_interval_secs", 30)?
            .set_default("polling.backoff_cap_secs", 600)?
            .set_default("polling.once", false)?
            // Timezone
            .set_default("timezone.site", "Australia/Sydney")?
            .set_default("timezone.local", None::<String>)?
            // Notifications
            .set_default("notifications.console", true)?
            .set_default("notifications.desktop", false)?
            .set_default("notifications.webhook_url", None::<String>)?

            // 2. Local config file (optional)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false));

        // 4. Explicit --config file (must exist)
        if let Some(path) = extra {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // 5. Environment variables (ROKETTO__POLLING__INTERVAL_SECS=...)
        let builder = builder.add_source(
            Environment::with_prefix("ROKETTO")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("filter.weekdays")
                .try_parsing(true),
        );

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

/// Parse a date as `YYYY-MM-DD`, `YYYYMMDD` or `DD/MM/YYYY`.
pub fn parse_date(value: &str) -> Result<NaiveDate, PlanError> {
    ["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value.trim(), fmt).ok())
        .ok_or_else(|| PlanError::InvalidDate(value.to_string()))
}

/// Parse a time as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime, PlanError> {
    ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value.trim(), fmt).ok())
        .ok_or_else(|| PlanError::InvalidTime(value.to_string()))
}

/// Parse a weekday name such as `wed` or `Wednesday`.
pub fn parse_weekday(value: &str) -> Result<Weekday, PlanError> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| PlanError::InvalidWeekday(value.to_string()))
}

pub fn parse_timezone(value: &str) -> Result<Tz, PlanError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| PlanError::UnknownTimezone(value.to_string()))
}

fn parse_optional_date(value: &Option<String>) -> Result<Option<NaiveDate>, PlanError> {
    value.as_deref().map(parse_date).transpose()
}

fn parse_optional_time(value: &Option<String>) -> Result<Option<NaiveTime>, PlanError> {
    value.as_deref().map(parse_time).transpose()
}

/// Resolve the watched dates: a single date, an inclusive range, or the next
/// `days_ahead` days starting at `today`.
pub fn build_date_span(watch: &WatchConfig, today: NaiveDate) -> Result<Vec<NaiveDate>, PlanError> {
    let date = parse_optional_date(&watch.date)?;
    let start = parse_optional_date(&watch.start_date)?;
    let end = parse_optional_date(&watch.end_date)?;

    let dates = match (date, start, end) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => return Err(PlanError::ConflictingDates),
        (Some(date), None, None) => vec![date],
        (None, Some(start), Some(end)) => {
            if start > end {
                return Err(PlanError::InvertedRange { start, end });
            }
            start.iter_days().take_while(|d| *d <= end).collect()
        }
        (None, Some(_), None) | (None, None, Some(_)) => return Err(PlanError::IncompleteRange),
        (None, None, None) => (0..i64::from(watch.days_ahead))
            .map(|offset| today + TimeDelta::days(offset))
            .collect(),
    };

    if dates.is_empty() {
        return Err(PlanError::EmptySpan);
    }
    Ok(dates)
}

/// Build filter criteria from user configuration.
pub fn build_criteria(filter: &FilterConfig) -> Result<FilterCriteria, PlanError> {
    let weekdays = if filter.weekdays.is_empty() {
        None
    } else {
        Some(
            filter
                .weekdays
                .iter()
                .map(|w| parse_weekday(w))
                .collect::<Result<HashSet<_>, _>>()?,
        )
    };

    let exact_time = parse_optional_time(&filter.time)?;
    let from_time = parse_optional_time(&filter.from_time)?;
    let to_time = parse_optional_time(&filter.to_time)?;

    if let (Some(from), Some(to)) = (from_time, to_time) {
        if from >= to {
            return Err(PlanError::EmptyWindow { from, to });
        }
    }
    if filter.min_hours == 0 {
        return Err(PlanError::ZeroMinHours);
    }

    Ok(FilterCriteria {
        weekdays,
        exact_time,
        from_time,
        to_time,
        min_hours: filter.min_hours,
    })
}

/// Everything one run of the watcher needs, validated once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct WatchPlan {
    pub dates: Vec<NaiveDate>,
    pub criteria: FilterCriteria,
    pub polling: PollingConfig,
    pub site_tz: Tz,
    pub observer: ObserverZone,
}

impl WatchPlan {
    /// Validate `config` and resolve it against the current date at the venue.
    pub fn from_config(config: &AppConfig, clock: &dyn Clock) -> Result<Self, PlanError> {
        let site_tz = parse_timezone(&config.timezone.site)?;
        let observer = match config.timezone.local.as_deref() {
            Some(name) => ObserverZone::Named(parse_timezone(name)?),
            None => ObserverZone::Host,
        };

        let today = clock.now_utc().with_timezone(&site_tz).date_naive();
        let dates = build_date_span(&config.watch, today)?;
        let criteria = build_criteria(&config.filter)?;

        Ok(Self {
            dates,
            criteria,
            polling: config.polling.clone(),
            site_tz,
            observer,
        })
    }
}
