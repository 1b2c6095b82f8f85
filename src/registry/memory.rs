//! In-memory channel registry.

use std::collections::BTreeMap;

use arc_swap::ArcSwap;

use crate::config::{ChannelConfig, RouterConfig};
use crate::registry::ChannelRegistry;

type ScopeMap = BTreeMap<String, Vec<ChannelConfig>>;

/// Registry backed by an atomically swapped snapshot.
///
/// Readers never block writers; every mutation publishes a new snapshot that
/// the next `list_channels` call observes.
#[derive(Debug)]
pub struct InMemoryRegistry {
    scopes: ArcSwap<ScopeMap>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            scopes: ArcSwap::from_pointee(ScopeMap::new()),
        }
    }

    /// Seed the registry with the channel tables of a configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            scopes: ArcSwap::from_pointee(config.scopes.clone()),
        }
    }

    /// Replace every channel of a scope.
    pub fn replace_scope(&self, scope: &str, channels: Vec<ChannelConfig>) {
        self.scopes.rcu(|current| {
            let mut next = ScopeMap::clone(current);
            next.insert(scope.to_string(), channels.clone());
            next
        });
    }

    /// Insert a channel, or update it in place when the id already exists.
    pub fn upsert(&self, scope: &str, channel: ChannelConfig) {
        self.scopes.rcu(|current| {
            let mut next = ScopeMap::clone(current);
            let channels = next.entry(scope.to_string()).or_default();
            match channels.iter_mut().find(|c| c.id == channel.id) {
                Some(existing) => *existing = channel.clone(),
                None => channels.push(channel.clone()),
            }
            next
        });
    }

    /// Remove a channel. Returns false if it was not present.
    pub fn remove(&self, scope: &str, channel_id: &str) -> bool {
        let mut removed = false;
        self.scopes.rcu(|current| {
            let mut next = ScopeMap::clone(current);
            removed = false;
            if let Some(channels) = next.get_mut(scope) {
                let before = channels.len();
                channels.retain(|c| c.id != channel_id);
                removed = channels.len() != before;
            }
            next
        });
        removed
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry for InMemoryRegistry {
    fn list_channels(&self, scope: &str) -> Vec<ChannelConfig> {
        self.scopes.load().get(scope).cloned().unwrap_or_default()
    }

    fn scopes(&self) -> Vec<String> {
        self.scopes.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_preserves_order() {
        let registry = InMemoryRegistry::new();
        registry.upsert("claude", ChannelConfig::new("a", "https://a.example.com"));
        registry.upsert("claude", ChannelConfig::new("b", "https://b.example.com"));
        registry.upsert(
            "claude",
            ChannelConfig::new("a", "https://a.example.com").with_weight(5),
        );

        let channels = registry.list_channels("claude");
        let ids: Vec<_> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(channels[0].weight, 5);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let registry = InMemoryRegistry::new();
        registry.replace_scope("claude", vec![ChannelConfig::new("a", "https://a.example.com")]);

        assert_eq!(registry.list_channels("claude").len(), 1);
        assert!(registry.list_channels("codex").is_empty());
        assert_eq!(registry.scopes(), vec!["claude".to_string()]);
    }

    #[test]
    fn test_remove() {
        let registry = InMemoryRegistry::new();
        registry.upsert("gemini", ChannelConfig::new("a", "https://a.example.com"));

        assert!(registry.remove("gemini", "a"));
        assert!(!registry.remove("gemini", "a"));
        assert!(registry.list_channels("gemini").is_empty());
    }
}
