//! Per-table retry backoff for failed reconciliations.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

/// Shape of the backoff curve.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay before jitter.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Fraction of the delay added as random jitter, 0.0 to disable.
    pub jitter: f64,
}

impl BackoffConfig {
    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after `failures` consecutive failures (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self.multiplier.powi(failures.saturating_sub(1).min(64) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter > 0.0 {
            let extra = capped * self.jitter * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(capped + extra)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(600),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TableBackoff {
    failures: u32,
    retry_at_ms: u64,
}

/// Failure history of each table the scheduler has tried to reconcile.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    config: BackoffConfig,
    tables: HashMap<String, TableBackoff>,
}

impl BackoffTracker {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            tables: HashMap::new(),
        }
    }

    /// True while `table` is still waiting out its last failure.
    pub fn is_blocked(&self, table: &str, now_ms: u64) -> bool {
        self.tables
            .get(table)
            .is_some_and(|state| now_ms < state.retry_at_ms)
    }

    /// Records a failure and returns how long `table` is now blocked for.
    pub fn record_failure(&mut self, table: &str, now_ms: u64) -> Duration {
        let state = self.tables.entry(table.to_string()).or_insert(TableBackoff {
            failures: 0,
            retry_at_ms: now_ms,
        });
        state.failures = state.failures.saturating_add(1);
        let delay = self.config.delay_for(state.failures);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        state.retry_at_ms = now_ms.saturating_add(delay_ms);
        delay
    }

    /// Clears the history of `table` after a successful fetch.
    pub fn record_success(&mut self, table: &str) {
        self.tables.remove(table);
    }

    /// Consecutive failures recorded for `table`.
    pub fn failures(&self, table: &str) -> u32 {
        self.tables.get(table).map_or(0, |state| state.failures)
    }
}
