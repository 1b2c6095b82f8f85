//! Scheduler entry points.
//!
//! # Responsibilities
//! - Allocate a channel per logical request, queueing under saturation
//! - Release channels and hand freed capacity to queued requests
//! - Drop session bindings of channels that enter quarantine
//! - Expose read-only per-scope diagnostics

use std::fmt::Display;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::config::SchedulerConfig;
use crate::health::{HealthTracker, QuarantineListener};
use crate::observability::metrics;
use crate::registry::ChannelRegistry;
use crate::scheduler::channel::Channel;
use crate::scheduler::error::SchedulerError;
use crate::scheduler::scope::{AllocateOptions, SchedulerSnapshot, ScopeState};

type ScopeTable = DashMap<String, Arc<Mutex<ScopeState>>>;

fn lock(state: &Mutex<ScopeState>) -> MutexGuard<'_, ScopeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Allocation engine shared by every outbound request.
pub struct Scheduler {
    registry: Arc<dyn ChannelRegistry>,
    health: Arc<HealthTracker>,
    scopes: Arc<ScopeTable>,
    queue_timeout: Duration,
    next_ticket: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler and subscribe it to quarantine notifications.
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        health: Arc<HealthTracker>,
        config: &SchedulerConfig,
    ) -> Self {
        let scopes = Arc::new(ScopeTable::new());
        health.subscribe(Arc::new(AffinityReaper {
            scopes: Arc::downgrade(&scopes),
        }));

        Self {
            registry,
            health,
            scopes,
            queue_timeout: config.queue_timeout(),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn registry(&self) -> &Arc<dyn ChannelRegistry> {
        &self.registry
    }

    fn scope_state(&self, scope: &str) -> Arc<Mutex<ScopeState>> {
        if let Some(state) = self.scopes.get(scope) {
            return Arc::clone(state.value());
        }
        Arc::clone(self.scopes.entry(scope.to_string()).or_default().value())
    }

    /// Allocate a channel in `scope`.
    ///
    /// Waits up to the queue timeout when every channel is busy or
    /// quarantined. The caller must hand the channel back with `release`.
    pub async fn allocate(
        &self,
        scope: &str,
        options: AllocateOptions,
    ) -> Result<Channel, SchedulerError> {
        let definitions = self.registry.list_channels(scope);
        let state = self.scope_state(scope);

        let (ticket, rx) = {
            let mut guard = lock(&state);
            guard.refresh(&definitions);

            if let Some((channel, path)) = guard.try_allocate(scope, &options, &self.health) {
                metrics::record_allocation(scope, &channel.id, path);
                tracing::debug!(
                    scope = %scope,
                    channel = %channel.id,
                    path = ?path,
                    "Channel allocated"
                );
                return Ok(channel);
            }

            if !guard.has_channels() {
                tracing::warn!(scope = %scope, "Allocation rejected, no enabled channels");
                return Err(SchedulerError::NoChannelsConfigured {
                    scope: scope.to_string(),
                });
            }

            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            let pending = guard.enqueue(scope, ticket, options, tx);
            tracing::debug!(
                scope = %scope,
                ticket,
                pending,
                "No eligible channel, allocation queued"
            );
            (ticket, rx)
        };

        // Owns the receiver from here on, so a cancelled wait hands back a
        // channel that was already sent to it.
        let mut pending = PendingAllocation {
            scheduler: self,
            scope,
            rx,
        };

        if let Ok(Ok(channel)) = tokio::time::timeout(self.queue_timeout, &mut pending.rx).await {
            return Ok(channel);
        }

        let definitions = self.registry.list_channels(scope);
        let mut guard = lock(&state);
        if !guard.remove_waiter(scope, ticket) {
            // A release settled the waiter as the deadline fired.
            if let Ok(channel) = pending.rx.try_recv() {
                return Ok(channel);
            }
        }

        guard.refresh(&definitions);
        let error = guard.exhaustion_error(scope, &self.health);
        metrics::record_queue_timeout(scope, error.kind());
        tracing::warn!(
            scope = %scope,
            ticket,
            reason = error.kind(),
            wait_secs = self.queue_timeout.as_secs(),
            "Queued allocation timed out"
        );
        Err(error)
    }

    /// Allocate and wrap the channel in a lease that releases it on drop.
    pub async fn lease(
        self: &Arc<Self>,
        scope: &str,
        options: AllocateOptions,
    ) -> Result<ChannelLease, SchedulerError> {
        let channel = self.allocate(scope, options).await?;
        Ok(ChannelLease {
            scheduler: Arc::clone(self),
            scope: scope.to_string(),
            channel,
        })
    }

    /// Return a channel and hand freed capacity to queued allocations.
    /// Extra releases are absorbed at zero.
    pub fn release(&self, scope: &str, channel_id: &str) {
        let Some(state) = self.scopes.get(scope).map(|s| Arc::clone(s.value())) else {
            return;
        };
        // Read before locking: the registry is external code.
        let definitions = self.registry.list_channels(scope);

        let mut guard = lock(&state);
        let in_flight = guard.release(scope, channel_id);
        tracing::trace!(scope = %scope, channel = %channel_id, in_flight, "Channel released");
        if !guard.has_waiters() {
            return;
        }

        guard.refresh(&definitions);
        let settled = guard.drain(scope, &self.health);
        if settled > 0 {
            tracing::debug!(scope = %scope, settled, "Drained allocation queue");
        }
    }

    /// Read-only diagnostics for one scope. Scopes that never allocated are
    /// reported without being tracked.
    pub fn state(&self, scope: &str) -> SchedulerSnapshot {
        let definitions = self.registry.list_channels(scope);
        match self.scopes.get(scope).map(|s| Arc::clone(s.value())) {
            Some(state) => {
                let mut guard = lock(&state);
                guard.refresh(&definitions);
                guard.snapshot(scope, &self.health)
            }
            None => {
                let mut untracked = ScopeState::default();
                untracked.refresh(&definitions);
                untracked.snapshot(scope, &self.health)
            }
        }
    }
}

/// Receiving end of a queued allocation.
///
/// Dropped before the channel was taken out (cancelled caller, expired
/// outer timeout), it closes the receiver and releases whatever a drain
/// already sent. A send that loses the race against `close` fails and the
/// drain releases the channel itself.
struct PendingAllocation<'a> {
    scheduler: &'a Scheduler,
    scope: &'a str,
    rx: oneshot::Receiver<Channel>,
}

impl Drop for PendingAllocation<'_> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(channel) = self.rx.try_recv() {
            tracing::debug!(
                scope = %self.scope,
                channel = %channel.id,
                "Queued allocation abandoned after hand-over, releasing channel"
            );
            self.scheduler.release(self.scope, &channel.id);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("scopes", &self.scopes.len())
            .field("queue_timeout", &self.queue_timeout)
            .finish_non_exhaustive()
    }
}

/// Drops session bindings that point at a newly quarantined channel.
struct AffinityReaper {
    scopes: Weak<ScopeTable>,
}

impl QuarantineListener for AffinityReaper {
    fn on_quarantine(&self, scope: &str, channel_id: &str) {
        let Some(scopes) = self.scopes.upgrade() else {
            return;
        };
        let Some(state) = scopes.get(scope).map(|s| Arc::clone(s.value())) else {
            return;
        };

        let removed = lock(&state).unbind_channel(channel_id);
        tracing::info!(
            scope = %scope,
            channel = %channel_id,
            removed,
            "Removed session bindings of quarantined channel"
        );
    }
}

/// An allocated channel that is released when dropped.
#[derive(Debug)]
pub struct ChannelLease {
    scheduler: Arc<Scheduler>,
    scope: String,
    channel: Channel,
}

impl ChannelLease {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn record_success(&self) {
        self.scheduler
            .health
            .record_success(&self.scope, &self.channel.id);
    }

    pub fn record_failure(&self, error: impl Display) {
        self.scheduler
            .health
            .record_failure(&self.scope, &self.channel.id, error);
    }
}

impl Deref for ChannelLease {
    type Target = Channel;

    fn deref(&self) -> &Self::Target {
        &self.channel
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.scheduler.release(&self.scope, &self.channel.id);
    }
}
