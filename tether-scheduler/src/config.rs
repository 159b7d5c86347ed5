//! Scheduler configuration
//!
//! Defines all configurable parameters for a scheduler including the
//! concurrency limit, dispatch timing, status polling and the worker address.

use anyhow::Context;
use std::time::Duration;

use crate::scheduler::PollSchedule;

/// Scheduler configuration
///
/// Every wait is configurable so tests and slow networks can tune them;
/// the defaults match what a worker on the local network expects.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Name of the scheduler, used in logs
    pub name: String,

    /// Worker base URL (e.g., "http://localhost:8080")
    pub worker_url: String,

    /// Maximum number of jobs handed to the worker at once
    pub max_concurrency: usize,

    /// Longest the dispatch loop sleeps before re-checking the queue
    pub dispatch_wait: Duration,

    /// Longest the dispatch loop sleeps between checks that a job reached the worker
    pub submission_wait: Duration,

    /// How often each running job's status is polled
    pub poll: PollSchedule,
}

impl SchedulerConfig {
    /// Creates a new configuration with defaults
    pub fn new(name: String, worker_url: String) -> Self {
        Self {
            name,
            worker_url,
            max_concurrency: 1,
            dispatch_wait: Duration::from_millis(500),
            submission_wait: Duration::from_millis(200),
            poll: PollSchedule::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - TETHER_WORKER_URL (default: http://localhost:8080)
    /// - TETHER_SCHEDULER_NAME (default: remote)
    /// - TETHER_MAX_CONCURRENCY (default: 1)
    /// - TETHER_DISPATCH_WAIT_MS (default: 500)
    /// - TETHER_SUBMISSION_WAIT_MS (default: 200)
    /// - TETHER_POLL_INITIAL_PERIOD_MS (default: 1500)
    /// - TETHER_POLL_INITIAL_INTERVAL_MS (default: 100)
    /// - TETHER_POLL_INTERVAL_MS (default: 500)
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let max_concurrency = match lookup("TETHER_MAX_CONCURRENCY") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("invalid TETHER_MAX_CONCURRENCY: {}", value))?,
            None => defaults.max_concurrency,
        };

        let poll = PollSchedule {
            initial_period: env_millis(
                &lookup,
                "TETHER_POLL_INITIAL_PERIOD_MS",
                defaults.poll.initial_period,
            )?,
            initial_interval: env_millis(
                &lookup,
                "TETHER_POLL_INITIAL_INTERVAL_MS",
                defaults.poll.initial_interval,
            )?,
            check_interval: env_millis(
                &lookup,
                "TETHER_POLL_INTERVAL_MS",
                defaults.poll.check_interval,
            )?,
        };

        Ok(Self {
            name: lookup("TETHER_SCHEDULER_NAME").unwrap_or(defaults.name),
            worker_url: lookup("TETHER_WORKER_URL").unwrap_or(defaults.worker_url),
            max_concurrency,
            dispatch_wait: env_millis(&lookup, "TETHER_DISPATCH_WAIT_MS", defaults.dispatch_wait)?,
            submission_wait: env_millis(
                &lookup,
                "TETHER_SUBMISSION_WAIT_MS",
                defaults.submission_wait,
            )?,
            poll,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("name cannot be empty");
        }

        if !self.worker_url.starts_with("http://") && !self.worker_url.starts_with("https://") {
            anyhow::bail!("worker_url must start with http:// or https://");
        }

        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be greater than 0");
        }

        if self.dispatch_wait.is_zero() || self.submission_wait.is_zero() {
            anyhow::bail!("dispatch and submission waits must be greater than 0");
        }

        if self.poll.initial_interval.is_zero() || self.poll.check_interval.is_zero() {
            anyhow::bail!("poll intervals must be greater than 0");
        }

        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new("remote".to_string(), "http://localhost:8080".to_string())
    }
}

/// Reads a duration in milliseconds, falling back to `default` when unset
fn env_millis(
    lookup: impl Fn(&str) -> Option<String>,
    var: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    match lookup(var) {
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("invalid {}: {}", var, value)),
        None => Ok(default),
    }
}
