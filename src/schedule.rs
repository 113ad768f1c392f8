use std::time::Duration;

use rand::Rng;

use crate::config::PollingConfig;

/// Polling cadence: jittered sleeps between cycles and escalating backoff
/// after failed cycles.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval_secs: u64,
    jitter_secs: u64,
    min_interval_secs: u64,
    backoff_cap_secs: u64,
}

impl PollSchedule {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            interval_secs: config.interval_secs,
            jitter_secs: config.jitter_secs,
            min_interval_secs: config.min_interval_secs,
            backoff_cap_secs: config.backoff_cap_secs,
        }
    }

    /// Sleep before the next cycle: the base interval shifted by a uniform
    /// random offset in `[-jitter, +jitter]`, never below the floor.
    ///
    /// The randomness keeps the request pattern irregular for the remote site.
    pub fn next_interval<R: Rng>(&self, rng: &mut R) -> Duration {
        let base = self.interval_secs as f64;
        let secs = if self.jitter_secs == 0 {
            base
        } else {
            let jitter = self.jitter_secs as f64;
            base + rng.gen_range(-jitter..=jitter)
        };
        Duration::from_secs_f64(secs.max(self.min_interval_secs as f64))
    }

    /// Sleep after the `consecutive_failures`-th failed cycle in a row:
    /// `min(cap, interval * (failures + 1))`.
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        let factor = u64::from(consecutive_failures).saturating_add(1);
        let secs = self
            .interval_secs
            .saturating_mul(factor)
            .min(self.backoff_cap_secs);
        Duration::from_secs(secs)
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(&PollingConfig::default())
    }
}
