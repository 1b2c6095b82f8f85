//! Channel health state machine.
//!
//! # States
//! - Healthy: channel receives traffic
//! - Quarantined: channel excluded from allocation until its window elapses
//! - Probing: channel receives traffic again, under observation
//!
//! # State Transitions
//! ```text
//! Healthy     → Quarantined: consecutive failures >= failure_threshold
//! Quarantined → Probing:     first availability check after quarantine_until
//! Probing     → Healthy:     consecutive successes >= recovery_window
//! Probing     → Quarantined: any failure (window keeps its grown length)
//! ```
//!
//! # Design Decisions
//! - Each quarantine doubles the next window up to a ceiling
//! - Full recovery forgives earlier backoff growth
//! - Quarantine expiry is observed lazily, there is no timer per channel

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::HealthConfig;

/// Health status of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Quarantined,
    Probing,
}

impl HealthStatus {
    /// Short human-readable label for dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Quarantined => "quarantined",
            HealthStatus::Probing => "probing",
        }
    }
}

/// Result of feeding one observation into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Entered quarantine for `window`.
    Quarantined { window: Duration },
    /// Quarantine expired; the channel admits probe traffic.
    Probing,
    /// Probing channel returned to healthy.
    Recovered,
}

/// Per-channel health record.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub quarantine_until: Option<Instant>,
    /// Length of the next quarantine episode.
    pub next_quarantine: Duration,
    pub last_observed_at: Option<Instant>,
}

impl HealthRecord {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_failures: 0,
            total_successes: 0,
            quarantine_until: None,
            next_quarantine: config.initial_quarantine(),
            last_observed_at: None,
        }
    }

    pub fn record_success(&mut self, now: Instant, config: &HealthConfig) -> Transition {
        self.total_successes += 1;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
        self.last_observed_at = Some(now);

        if self.status == HealthStatus::Probing
            && self.consecutive_successes >= config.recovery_window
        {
            self.status = HealthStatus::Healthy;
            self.quarantine_until = None;
            self.next_quarantine = config.initial_quarantine();
            return Transition::Recovered;
        }
        Transition::Unchanged
    }

    pub fn record_failure(&mut self, now: Instant, config: &HealthConfig) -> Transition {
        self.total_failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
        self.last_observed_at = Some(now);

        let trips = match self.status {
            HealthStatus::Healthy => self.consecutive_failures >= config.failure_threshold,
            HealthStatus::Probing => true,
            // Late results from requests allocated before the quarantine.
            HealthStatus::Quarantined => false,
        };
        if !trips {
            return Transition::Unchanged;
        }

        let window = self.next_quarantine;
        self.status = HealthStatus::Quarantined;
        self.quarantine_until = Some(now + window);
        self.next_quarantine = window
            .saturating_mul(config.backoff_multiplier)
            .min(config.max_quarantine());
        Transition::Quarantined { window }
    }

    /// Availability check. An expired quarantine moves the record to probing.
    pub fn check_available(&mut self, now: Instant) -> (bool, Transition) {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Probing => (true, Transition::Unchanged),
            HealthStatus::Quarantined if self.quarantine_expired(now) => {
                self.status = HealthStatus::Probing;
                self.consecutive_successes = 0;
                (true, Transition::Probing)
            }
            HealthStatus::Quarantined => (false, Transition::Unchanged),
        }
    }

    /// Same answer as `check_available`, without the state transition.
    pub fn would_be_available(&self, now: Instant) -> bool {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Probing => true,
            HealthStatus::Quarantined => self.quarantine_expired(now),
        }
    }

    fn quarantine_expired(&self, now: Instant) -> bool {
        self.quarantine_until.map_or(true, |until| now >= until)
    }

    /// Administrative override back to a fresh healthy record. Lifetime
    /// totals are kept.
    pub fn reset(&mut self, config: &HealthConfig) {
        self.status = HealthStatus::Healthy;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.quarantine_until = None;
        self.next_quarantine = config.initial_quarantine();
    }

    pub fn snapshot(&self, now: Instant) -> HealthSnapshot {
        let remaining = self
            .quarantine_until
            .filter(|_| self.status == HealthStatus::Quarantined)
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default();

        HealthSnapshot {
            status: self.status,
            label: self.status.label(),
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            quarantine_remaining_secs: ceil_secs(remaining),
            next_quarantine_secs: self.next_quarantine.as_secs(),
            last_observed_secs_ago: self
                .last_observed_at
                .map(|at| now.saturating_duration_since(at).as_secs()),
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Read-only view of a health record for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub label: &'static str,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Seconds until quarantine ends, rounded up. Zero unless quarantined.
    pub quarantine_remaining_secs: u64,
    pub next_quarantine_secs: u64,
    pub last_observed_secs_ago: Option<u64>,
}

impl HealthSnapshot {
    /// Snapshot of a channel that has never been observed.
    pub fn untracked(config: &HealthConfig) -> Self {
        HealthRecord::new(config).snapshot(Instant::now())
    }
}
