//! Per-scope scheduling state.
//!
//! # Responsibilities
//! - Hold the live channel snapshot of one provider scope
//! - Track in-flight allocations per channel
//! - Keep session → channel bindings
//! - Queue allocations that found no eligible channel
//!
//! All methods assume the caller holds the scope mutex.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::ChannelConfig;
use crate::health::{HealthSnapshot, HealthTracker};
use crate::observability::metrics::{self, AllocationPath};
use crate::scheduler::channel::Channel;
use crate::scheduler::error::SchedulerError;
use crate::scheduler::selection::pick_weighted;

/// Options for a single allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocateOptions {
    /// Caller correlation key, e.g. a conversation id.
    pub session_id: Option<String>,
    /// Route the session to its previous channel when possible (default: true).
    pub enable_session_binding: bool,
}

impl AllocateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            enable_session_binding: true,
        }
    }

    pub fn without_binding(mut self) -> Self {
        self.enable_session_binding = false;
        self
    }

    /// The session id, when binding applies to this allocation.
    fn binding_key(&self) -> Option<&str> {
        if self.enable_session_binding {
            self.session_id.as_deref().filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

impl Default for AllocateOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            enable_session_binding: true,
        }
    }
}

/// A queued allocation. Whoever removes it from the queue settles it.
#[derive(Debug)]
pub(crate) struct Waiter {
    ticket: u64,
    options: AllocateOptions,
    tx: oneshot::Sender<Channel>,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeState {
    channels: Vec<Channel>,
    in_flight: HashMap<String, usize>,
    bindings: HashMap<String, String>,
    queue: VecDeque<Waiter>,
}

impl ScopeState {
    /// Rebuild the channel snapshot from registry definitions.
    pub(crate) fn refresh(&mut self, definitions: &[ChannelConfig]) {
        self.channels = definitions.iter().filter_map(Channel::from_config).collect();
    }

    pub(crate) fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    fn in_flight(&self, channel_id: &str) -> usize {
        self.in_flight.get(channel_id).copied().unwrap_or(0)
    }

    /// Pick and reserve a channel, or `None` if no channel is eligible.
    pub(crate) fn try_allocate(
        &mut self,
        scope: &str,
        options: &AllocateOptions,
        health: &HealthTracker,
    ) -> Option<(Channel, AllocationPath)> {
        let in_flight = &self.in_flight;
        let candidates: Vec<&Channel> = self
            .channels
            .iter()
            .filter(|channel| health.is_available(scope, &channel.id))
            .filter(|channel| channel.has_capacity(in_flight.get(&channel.id).copied().unwrap_or(0)))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let session = options.binding_key();
        let bound = session
            .and_then(|session| self.bindings.get(session))
            .and_then(|bound| candidates.iter().copied().find(|c| &c.id == bound));

        let (chosen, path) = match bound {
            Some(channel) => (channel.clone(), AllocationPath::Sticky),
            None => (
                pick_weighted(&candidates, &mut rand::thread_rng())?.clone(),
                AllocationPath::Weighted,
            ),
        };

        if let (Some(session), AllocationPath::Weighted) = (session, path) {
            self.bindings.insert(session.to_string(), chosen.id.clone());
        }

        let count = self.in_flight.entry(chosen.id.clone()).or_insert(0);
        *count += 1;
        metrics::set_in_flight(scope, &chosen.id, *count);
        Some((chosen, path))
    }

    /// Return one slot. Never goes below zero.
    pub(crate) fn release(&mut self, scope: &str, channel_id: &str) -> usize {
        let count = self.in_flight.entry(channel_id.to_string()).or_insert(0);
        *count = count.saturating_sub(1);
        metrics::set_in_flight(scope, channel_id, *count);
        *count
    }

    pub(crate) fn enqueue(
        &mut self,
        scope: &str,
        ticket: u64,
        options: AllocateOptions,
        tx: oneshot::Sender<Channel>,
    ) -> usize {
        self.queue.push_back(Waiter {
            ticket,
            options,
            tx,
        });
        metrics::set_pending(scope, self.queue.len());
        self.queue.len()
    }

    /// Remove a waiter by ticket. Returns false if it was already settled.
    pub(crate) fn remove_waiter(&mut self, scope: &str, ticket: u64) -> bool {
        let Some(index) = self.queue.iter().position(|w| w.ticket == ticket) else {
            return false;
        };
        self.queue.remove(index);
        metrics::set_pending(scope, self.queue.len());
        true
    }

    /// Drop waiters whose caller stopped waiting.
    fn purge_abandoned(&mut self) {
        self.queue.retain(|waiter| !waiter.tx.is_closed());
    }

    pub(crate) fn has_waiters(&mut self) -> bool {
        self.purge_abandoned();
        !self.queue.is_empty()
    }

    /// Hand freed capacity to queued waiters.
    ///
    /// Scans in arrival order and restarts after every successful hand-over,
    /// so one call may settle several waiters. Returns how many were settled.
    pub(crate) fn drain(&mut self, scope: &str, health: &HealthTracker) -> usize {
        let mut settled = 0;
        'scan: while self.has_waiters() {
            for index in 0..self.queue.len() {
                let options = self.queue[index].options.clone();
                let Some((channel, path)) = self.try_allocate(scope, &options, health) else {
                    continue;
                };
                let Some(waiter) = self.queue.remove(index) else {
                    break 'scan;
                };

                let channel_id = channel.id.clone();
                match waiter.tx.send(channel) {
                    Ok(()) => {
                        settled += 1;
                        metrics::record_allocation(scope, &channel_id, path);
                        tracing::debug!(
                            scope = %scope,
                            ticket = waiter.ticket,
                            channel = %channel_id,
                            "Queued allocation satisfied"
                        );
                    }
                    Err(_) => {
                        self.release(scope, &channel_id);
                    }
                }
                continue 'scan;
            }
            break;
        }
        metrics::set_pending(scope, self.queue.len());
        settled
    }

    /// Remove every binding that points at `channel_id`.
    pub(crate) fn unbind_channel(&mut self, channel_id: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|_, bound| bound != channel_id);
        before - self.bindings.len()
    }

    /// Classify why a queued allocation could not be served.
    pub(crate) fn exhaustion_error(&self, scope: &str, health: &HealthTracker) -> SchedulerError {
        let scope = scope.to_string();
        if self.channels.is_empty() {
            return SchedulerError::NoChannelsConfigured { scope };
        }
        let all_quarantined = self
            .channels
            .iter()
            .all(|channel| !health.would_be_available(&scope, &channel.id));
        if all_quarantined {
            SchedulerError::AllQuarantined { scope }
        } else {
            SchedulerError::AllAtCapacity { scope }
        }
    }

    pub(crate) fn snapshot(&mut self, scope: &str, health: &HealthTracker) -> SchedulerSnapshot {
        self.purge_abandoned();
        SchedulerSnapshot {
            scope: scope.to_string(),
            channels: self
                .channels
                .iter()
                .map(|channel| ChannelState {
                    id: channel.id.clone(),
                    name: channel.name.clone(),
                    weight: channel.weight,
                    max_concurrency: channel.max_concurrency,
                    in_flight: self.in_flight(&channel.id),
                    health: health.status(scope, &channel.id),
                })
                .collect(),
            pending: self.queue.len(),
            bindings: self.bindings.len(),
        }
    }
}

/// Diagnostic view of one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelState {
    pub id: String,
    pub name: String,
    pub weight: u32,
    /// `None` means unlimited.
    pub max_concurrency: Option<usize>,
    pub in_flight: usize,
    pub health: HealthSnapshot,
}

/// Diagnostic view of one scope.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub scope: String,
    pub channels: Vec<ChannelState>,
    /// Queued allocations still waiting.
    pub pending: usize,
    /// Live session bindings.
    pub bindings: usize,
}

impl SchedulerSnapshot {
    pub fn channel(&self, channel_id: &str) -> Option<&ChannelState> {
        self.channels.iter().find(|c| c.id == channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;

    fn state_with(definitions: &[ChannelConfig]) -> ScopeState {
        let mut state = ScopeState::default();
        state.refresh(definitions);
        state
    }

    #[test]
    fn test_capacity_excludes_full_channel() {
        let health = HealthTracker::new(HealthConfig::default());
        let mut state = state_with(&[ChannelConfig::new("a", "https://a.example.com").with_max_concurrency(2)]);
        let options = AllocateOptions::new();

        assert!(state.try_allocate("claude", &options, &health).is_some());
        assert!(state.try_allocate("claude", &options, &health).is_some());
        assert!(state.try_allocate("claude", &options, &health).is_none());

        assert_eq!(state.release("claude", "a"), 1);
        assert!(state.try_allocate("claude", &options, &health).is_some());
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut state = ScopeState::default();
        assert_eq!(state.release("claude", "ghost"), 0);
        assert_eq!(state.release("claude", "ghost"), 0);
    }

    #[test]
    fn test_binding_without_session_binding_flag() {
        let health = HealthTracker::new(HealthConfig::default());
        let mut state = state_with(&[ChannelConfig::new("a", "https://a.example.com")]);

        let options = AllocateOptions::for_session("s1").without_binding();
        state.try_allocate("claude", &options, &health);
        assert!(state.bindings.is_empty());

        let (_, path) = state
            .try_allocate("claude", &AllocateOptions::for_session("s1"), &health)
            .unwrap();
        assert_eq!(path, AllocationPath::Weighted);
        let (_, path) = state
            .try_allocate("claude", &AllocateOptions::for_session("s1"), &health)
            .unwrap();
        assert_eq!(path, AllocationPath::Sticky);
    }

    #[test]
    fn test_unbind_channel_counts() {
        let mut state = ScopeState::default();
        state.bindings.insert("s1".into(), "a".into());
        state.bindings.insert("s2".into(), "a".into());
        state.bindings.insert("s3".into(), "b".into());

        assert_eq!(state.unbind_channel("a"), 2);
        assert_eq!(state.bindings.len(), 1);
    }

    #[test]
    fn test_drain_skips_abandoned_waiters() {
        let health = HealthTracker::new(HealthConfig::default());
        let mut state = state_with(&[ChannelConfig::new("a", "https://a.example.com").with_max_concurrency(1)]);
        let options = AllocateOptions::new();
        state.try_allocate("claude", &options, &health).unwrap();

        let (abandoned_tx, abandoned_rx) = oneshot::channel();
        state.enqueue("claude", 1, options.clone(), abandoned_tx);
        drop(abandoned_rx);
        let (tx, mut rx) = oneshot::channel();
        state.enqueue("claude", 2, options, tx);

        state.release("claude", "a");
        assert_eq!(state.drain("claude", &health), 1);
        assert_eq!(rx.try_recv().unwrap().id, "a");
        assert_eq!(state.in_flight("a"), 1);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn test_exhaustion_error_kinds() {
        let health = HealthTracker::new(HealthConfig::default());
        let state = state_with(&[
            ChannelConfig::new("a", "https://a.example.com"),
            ChannelConfig::new("b", "https://b.example.com"),
        ]);

        for _ in 0..3 {
            health.record_failure("claude", "a", "500");
        }
        assert_eq!(state.exhaustion_error("claude", &health).kind(), "all_at_capacity");

        for _ in 0..3 {
            health.record_failure("claude", "b", "500");
        }
        assert_eq!(state.exhaustion_error("claude", &health).kind(), "all_quarantined");

        let empty = ScopeState::default();
        assert_eq!(empty.exhaustion_error("claude", &health).kind(), "no_channels_configured");
    }
}
