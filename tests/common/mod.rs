//! Shared fixtures for scheduler and admin integration tests.

use std::sync::Arc;
use std::time::Duration;

use channel_router::config::ChannelConfig;
use channel_router::{HealthTracker, InMemoryRegistry, RouterConfig, Scheduler};

pub struct Fixture {
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<InMemoryRegistry>,
    pub health: Arc<HealthTracker>,
}

/// A scheduler over an in-memory registry seeded with one scope.
pub fn fixture(scope: &str, channels: Vec<ChannelConfig>) -> Fixture {
    let mut config = RouterConfig::default();
    config.scopes.insert(scope.to_string(), channels);

    let registry = Arc::new(InMemoryRegistry::from_config(&config));
    let health = Arc::new(HealthTracker::new(config.health.clone()));
    let scheduler = Arc::new(Scheduler::new(
        registry.clone(),
        health.clone(),
        &config.scheduler,
    ));

    Fixture {
        scheduler,
        registry,
        health,
    }
}

pub fn channel(id: &str) -> ChannelConfig {
    ChannelConfig::new(id, format!("https://{}.example.com", id))
}

/// Record enough consecutive failures to quarantine a healthy channel.
pub fn quarantine(health: &HealthTracker, scope: &str, channel_id: &str) {
    for _ in 0..health.config().failure_threshold {
        health.record_failure(scope, channel_id, "503 Service Unavailable");
    }
}

/// Let spawned tasks run up to their next suspension point.
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
