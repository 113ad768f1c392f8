use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::block::filter_by_min_block;
use crate::config::WatchPlan;
use crate::extract::CalendarPage;
use crate::notice::SlotNotice;
use crate::schedule::PollSchedule;
use crate::seen::SeenSlots;
use crate::slot::Slot;
use crate::traits::{CalendarSource, Notifier};

/// Result of one polling cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Every date was fetched; `notified` holds the slots announced this cycle.
    Completed { notified: Vec<Slot> },
    /// The cycle was aborted; wait `backoff` before trying again.
    Failed { error: String, backoff: Duration },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// Runs polling cycles against a calendar source and announces newly
/// matching slots through a notifier.
pub struct Watcher<S, N> {
    plan: Arc<WatchPlan>,
    source: S,
    notifier: N,
    schedule: PollSchedule,
    seen: SeenSlots,
    consecutive_failures: u32,
}

impl<S: CalendarSource, N: Notifier> Watcher<S, N> {
    pub fn new(plan: Arc<WatchPlan>, source: S, notifier: N) -> Self {
        let schedule = PollSchedule::new(&plan.polling);
        Self {
            plan,
            source,
            notifier,
            schedule,
            seen: SeenSlots::new(),
            consecutive_failures: 0,
        }
    }

    /// Run one full cycle over every watched date.
    ///
    /// Never returns an error: failures are logged, counted and turned into a
    /// backoff delay so the caller can keep polling indefinitely.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.poll().await {
            Ok(notified) => {
                self.consecutive_failures = 0;
                CycleOutcome::Completed { notified }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let backoff = self.schedule.backoff(self.consecutive_failures);
                tracing::error!("{:#} - backing off {}s", e, backoff.as_secs());
                CycleOutcome::Failed {
                    error: format!("{:#}", e),
                    backoff,
                }
            }
        }
    }

    async fn poll(&mut self) -> Result<Vec<Slot>> {
        let plan = Arc::clone(&self.plan);
        let criteria = &plan.criteria;

        let mut matched = Vec::new();
        for &date in &plan.dates {
            let markup = self
                .source
                .fetch_day(date)
                .await
                .with_context(|| format!("Failed to fetch calendar for {}", date))?;

            let slots = CalendarPage::parse(&markup).slots();
            let before = matched.len();
            matched.extend(slots.iter().filter(|s| criteria.matches(s)).cloned());
            tracing::debug!(
                "{}: {} available, {} matching",
                date,
                slots.len(),
                matched.len() - before
            );
        }

        let candidates = filter_by_min_block(matched, criteria.min_hours);
        let novel: Vec<Slot> = candidates
            .into_iter()
            .filter(|slot| self.seen.mark_if_new(slot))
            .collect();

        if novel.is_empty() {
            tracing::debug!("No new slots this cycle ({} already reported)", self.seen.len());
        } else {
            tracing::info!("Found {} new slot(s)", novel.len());
            self.announce(&novel)?;
        }

        Ok(novel)
    }

    fn announce(&self, slots: &[Slot]) -> Result<()> {
        let notices: Vec<SlotNotice> = slots
            .iter()
            .map(|slot| SlotNotice::new(slot, self.plan.site_tz, self.plan.observer))
            .collect();
        self.notifier
            .notify_slots(&notices)
            .context("Failed to deliver notification")
    }

    /// Jittered delay before the next cycle after a successful one.
    pub fn next_interval(&self) -> Duration {
        self.schedule.next_interval(&mut rand::thread_rng())
    }

    /// Delay to wait after `outcome`.
    pub fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Completed { .. } => self.next_interval(),
            CycleOutcome::Failed { backoff, .. } => *backoff,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn seen(&self) -> &SeenSlots {
        &self.seen
    }
}
