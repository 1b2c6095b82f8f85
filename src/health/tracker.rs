//! Outcome-driven health tracking across scopes.
//!
//! # Responsibilities
//! - Observe request outcomes reported by the outbound caller
//! - Keep one `HealthRecord` per (scope, channel), created lazily
//! - Answer availability queries for the scheduler
//! - Notify listeners when a channel enters quarantine
//!
//! # Design Decisions
//! - The caller decides what counts as a failure (5xx, timeouts), not the tracker
//! - Listeners are invoked after the record lock is released
//! - `is_available` performs the quarantined → probing transition; display
//!   queries (`status`, `all_statuses`) never do

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::HealthConfig;
use crate::health::state::{HealthRecord, HealthSnapshot, Transition};
use crate::observability::metrics;

/// Receives quarantine notifications from a `HealthTracker`.
pub trait QuarantineListener: Send + Sync {
    fn on_quarantine(&self, scope: &str, channel_id: &str);
}

/// Per-scope circuit breakers for channels.
pub struct HealthTracker {
    config: HealthConfig,
    /// scope → channel id → record.
    records: DashMap<String, HashMap<String, HealthRecord>>,
    listeners: RwLock<Vec<Arc<dyn QuarantineListener>>>,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Register a listener for quarantine transitions.
    pub fn subscribe(&self, listener: Arc<dyn QuarantineListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn with_record<T>(
        &self,
        scope: &str,
        channel_id: &str,
        f: impl FnOnce(&mut HealthRecord) -> T,
    ) -> T {
        let mut scope_records = self.records.entry(scope.to_string()).or_default();
        let record = scope_records
            .entry(channel_id.to_string())
            .or_insert_with(|| HealthRecord::new(&self.config));
        f(record)
    }

    pub fn record_success(&self, scope: &str, channel_id: &str) {
        let now = Instant::now();
        let transition = self.with_record(scope, channel_id, |record| {
            record.record_success(now, &self.config)
        });

        if transition == Transition::Recovered {
            tracing::info!(
                scope = %scope,
                channel = %channel_id,
                "Channel recovered and marked healthy"
            );
        }
    }

    pub fn record_failure(&self, scope: &str, channel_id: &str, error: impl Display) {
        let now = Instant::now();
        let (transition, failures) = self.with_record(scope, channel_id, |record| {
            let transition = record.record_failure(now, &self.config);
            (transition, record.consecutive_failures)
        });

        tracing::debug!(
            scope = %scope,
            channel = %channel_id,
            consecutive_failures = failures,
            error = %error,
            "Channel failure recorded"
        );

        if let Transition::Quarantined { window } = transition {
            tracing::warn!(
                scope = %scope,
                channel = %channel_id,
                consecutive_failures = failures,
                quarantine_secs = window.as_secs(),
                error = %error,
                "Channel quarantined"
            );
            metrics::record_quarantine(scope, channel_id);
            self.notify_quarantine(scope, channel_id);
        }
    }

    fn notify_quarantine(&self, scope: &str, channel_id: &str) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_quarantine(scope, channel_id);
        }
    }

    /// Whether the channel may receive traffic now.
    ///
    /// The first call after a quarantine window elapses moves the channel to
    /// probing and returns true. Unknown channels are available.
    pub fn is_available(&self, scope: &str, channel_id: &str) -> bool {
        let now = Instant::now();
        let Some(mut scope_records) = self.records.get_mut(scope) else {
            return true;
        };
        let Some(record) = scope_records.get_mut(channel_id) else {
            return true;
        };

        let (available, transition) = record.check_available(now);
        if transition == Transition::Probing {
            tracing::info!(
                scope = %scope,
                channel = %channel_id,
                "Quarantine expired, channel entering probing"
            );
        }
        available
    }

    /// Availability without side effects, for diagnostics and error
    /// classification.
    pub fn would_be_available(&self, scope: &str, channel_id: &str) -> bool {
        let now = Instant::now();
        self.records
            .get(scope)
            .and_then(|records| records.get(channel_id).map(|r| r.would_be_available(now)))
            .unwrap_or(true)
    }

    /// Keep only the ids that are currently available, in input order.
    pub fn filter_available<'a, I>(&self, scope: &str, channel_ids: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        channel_ids
            .into_iter()
            .filter(|id| self.is_available(scope, id))
            .collect()
    }

    pub fn status(&self, scope: &str, channel_id: &str) -> HealthSnapshot {
        let now = Instant::now();
        self.records
            .get(scope)
            .and_then(|records| records.get(channel_id).map(|r| r.snapshot(now)))
            .unwrap_or_else(|| HealthSnapshot::untracked(&self.config))
    }

    /// Snapshots of every channel observed in a scope, sorted by id.
    pub fn all_statuses(&self, scope: &str) -> Vec<(String, HealthSnapshot)> {
        let now = Instant::now();
        let mut statuses: Vec<_> = self
            .records
            .get(scope)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, record)| (id.clone(), record.snapshot(now)))
                    .collect()
            })
            .unwrap_or_default();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    /// Administrative override back to healthy with the initial backoff.
    pub fn reset(&self, scope: &str, channel_id: &str) {
        self.with_record(scope, channel_id, |record| record.reset(&self.config));
        tracing::info!(scope = %scope, channel = %channel_id, "Channel health reset");
    }
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("config", &self.config)
            .field("scopes", &self.records.len())
            .finish()
    }
}
