//! Live channel snapshot.
//!
//! # Responsibilities
//! - Normalize a registry definition into a schedulable channel
//! - Floor weights at 1, map absent or zero caps to unlimited

use std::fmt;

use serde::Serialize;

use crate::config::ChannelConfig;

/// A schedulable channel handed to the outbound caller.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub credential: String,
    /// Selection weight, never below 1.
    pub weight: u32,
    /// Concurrency cap. `None` means unlimited.
    pub max_concurrency: Option<usize>,
}

impl Channel {
    /// Build a snapshot from a registry definition. Disabled channels yield `None`.
    pub fn from_config(config: &ChannelConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            credential: config.credential.clone(),
            weight: config.weight.max(1),
            max_concurrency: config
                .max_concurrency
                .filter(|&max| max > 0)
                .map(|max| max as usize),
        })
    }

    /// Whether another allocation fits under the cap.
    pub fn has_capacity(&self, in_flight: usize) -> bool {
        self.max_concurrency.map_or(true, |max| in_flight < max)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("weight", &self.weight)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let zero_weight = ChannelConfig::new("a", "https://a.example.com").with_weight(0);
        let channel = Channel::from_config(&zero_weight).unwrap();
        assert_eq!(channel.weight, 1);
        assert_eq!(channel.max_concurrency, None);

        let zero_cap = ChannelConfig::new("a", "https://a.example.com").with_max_concurrency(0);
        assert_eq!(Channel::from_config(&zero_cap).unwrap().max_concurrency, None);

        let capped = ChannelConfig::new("a", "https://a.example.com").with_max_concurrency(2);
        let channel = Channel::from_config(&capped).unwrap();
        assert!(channel.has_capacity(1));
        assert!(!channel.has_capacity(2));
    }

    #[test]
    fn test_disabled_is_skipped() {
        let config = ChannelConfig::new("a", "https://a.example.com").disabled();
        assert!(Channel::from_config(&config).is_none());
    }

    #[test]
    fn test_credential_hidden() {
        let config = ChannelConfig::new("a", "https://a.example.com").with_credential("sk-secret");
        let channel = Channel::from_config(&config).unwrap();
        assert!(!format!("{:?}", channel).contains("sk-secret"));
        assert!(!serde_json::to_string(&channel).unwrap().contains("sk-secret"));
    }
}
