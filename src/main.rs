use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roketto_watch::{
    AppConfig, CalendarClient, CombinedNotifier, CycleOutcome, SystemClock, WatchPlan, Watcher,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "roketto-watch")]
#[command(about = "Watch Roketto badminton court availability safely")]
struct Args {
    /// Single date to watch (YYYY-MM-DD)
    #[arg(long, conflicts_with = "start_date")]
    date: Option<String>,

    /// Start date for range (inclusive)
    #[arg(long)]
    start_date: Option<String>,

    /// End date for range (inclusive)
    #[arg(long)]
    end_date: Option<String>,

    /// If no dates supplied, watch the next N days
    #[arg(long)]
    days_ahead: Option<u32>,

    /// Exact start time to match (HH:MM)
    #[arg(long = "time")]
    time: Option<String>,

    /// Earliest start time to match
    #[arg(long)]
    from_time: Option<String>,

    /// Latest start time (exclusive)
    #[arg(long)]
    to_time: Option<String>,

    /// Limit to a weekday (e.g. --weekday wed); repeat for several days
    #[arg(long = "weekday")]
    weekdays: Vec<String>,

    /// Base polling interval in seconds. Keep this high to be polite.
    #[arg(long)]
    interval: Option<u64>,

    /// Random jitter (+/- seconds) added to the interval
    #[arg(long)]
    jitter: Option<u64>,

    /// Run a single check and exit
    #[arg(long)]
    once: bool,

    /// Minimum consecutive hours on the same court/date to notify
    #[arg(long)]
    min_hours: Option<u32>,

    /// Time zone of the venue
    #[arg(long)]
    site_tz: Option<String>,

    /// Your time zone for display (defaults to the system zone)
    #[arg(long)]
    local_tz: Option<String>,

    /// Also show desktop notifications
    #[arg(long)]
    desktop: bool,

    /// Also POST notifications to this webhook URL
    #[arg(long)]
    webhook: Option<String>,

    /// Extra configuration file layered over the defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Command-line flags take precedence over every configuration source.
    fn apply(self, config: &mut AppConfig) {
        if self.date.is_some() || self.start_date.is_some() || self.end_date.is_some() {
            config.watch.date = self.date;
            config.watch.start_date = self.start_date;
            config.watch.end_date = self.end_date;
        }
        if let Some(days) = self.days_ahead {
            config.watch.days_ahead = days;
        }
        if self.time.is_some() {
            config.filter.time = self.time;
        }
        if self.from_time.is_some() {
            config.filter.from_time = self.from_time;
        }
        if self.to_time.is_some() {
            config.filter.to_time = self.to_time;
        }
        if !self.weekdays.is_empty() {
            config.filter.weekdays = self.weekdays;
        }
        if let Some(min_hours) = self.min_hours {
            config.filter.min_hours = min_hours;
        }
        if let Some(interval) = self.interval {
            config.polling.interval_secs = interval;
        }
        if let Some(jitter) = self.jitter {
            config.polling.jitter_secs = jitter;
        }
        if self.once {
            config.polling.once = true;
        }
        if let Some(site) = self.site_tz {
            config.timezone.site = site;
        }
        if self.local_tz.is_some() {
            config.timezone.local = self.local_tz;
        }
        if self.desktop {
            config.notifications.desktop = true;
        }
        if self.webhook.is_some() {
            config.notifications.webhook_url = self.webhook;
        }
    }
}

fn main() -> Result<ExitCode> {
    let mut args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("roketto_watch=debug".parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = AppConfig::load_with_file(args.config.take().as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);

    let plan = WatchPlan::from_config(&config, &SystemClock).context("Invalid watch settings")?;
    log_plan(&plan);
    let plan = Arc::new(plan);

    let client = CalendarClient::new(&config.venue, &config.network)?;
    let notifier = CombinedNotifier::from_config(&config.notifications);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(plan, client, notifier))
}

fn log_plan(plan: &WatchPlan) {
    let dates: Vec<String> = plan.dates.iter().map(|d| d.to_string()).collect();
    tracing::info!("Watching {} day(s): {}", dates.len(), dates.join(", "));

    if let Some(time) = plan.criteria.exact_time {
        tracing::info!("Target start time: {}", time.format("%H:%M"));
    }
    if let Some(window) = plan.criteria.describe_window() {
        tracing::info!("Time window: {}", window);
    }
    if plan.criteria.min_hours > 1 {
        tracing::info!("Minimum consecutive hours: {}", plan.criteria.min_hours);
    }
    if plan.polling.interval_secs < 90 {
        tracing::warn!("Interval < 90s may annoy the site; consider raising it");
    }
}

/// Poll until interrupted, or once when configured to.
async fn run(
    plan: Arc<WatchPlan>,
    client: CalendarClient,
    notifier: CombinedNotifier,
) -> Result<ExitCode> {
    let once = plan.polling.once;
    let mut watcher = Watcher::new(plan, client, notifier);

    loop {
        let outcome = watcher.run_cycle().await;

        if once {
            return Ok(match outcome {
                CycleOutcome::Completed { .. } => ExitCode::SUCCESS,
                CycleOutcome::Failed { .. } => ExitCode::FAILURE,
            });
        }

        let delay = watcher.delay_after(&outcome);
        tracing::debug!("Sleeping {:.0}s until next check", delay.as_secs_f64());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping after {} reported slot(s)", watcher.seen().len());
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}
