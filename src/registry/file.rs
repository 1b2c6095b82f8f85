//! File-backed channel registry.
//!
//! Reads the `[[scopes.<name>]]` tables of the router configuration file on
//! every lookup, so channel edits take effect on the very next allocation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;

use crate::config::validation::validate_scopes;
use crate::config::ChannelConfig;
use crate::registry::ChannelRegistry;

type ScopeMap = BTreeMap<String, Vec<ChannelConfig>>;

/// Only the channel tables are read; every other section is ignored.
#[derive(Deserialize)]
struct ChannelTables {
    #[serde(default)]
    scopes: ScopeMap,
}

/// Registry that re-reads its TOML file on each call.
///
/// A file that cannot be read, parsed or validated is logged and the last
/// good snapshot is served instead.
///
/// Reads are synchronous and happen on the caller's task, including inside
/// `Scheduler::allocate` and `Scheduler::release`. That is fine for a
/// router config of a few kilobytes on local disk; embedders with slow or
/// remote storage should feed an `InMemoryRegistry` instead.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    last_good: ArcSwap<ScopeMap>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let registry = Self {
            path: path.into(),
            last_good: ArcSwap::from_pointee(ScopeMap::new()),
        };
        registry.reload();
        registry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ScopeMap, String> {
        let content = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        let tables: ChannelTables = toml::from_str(&content).map_err(|e| e.to_string())?;
        validate_scopes(&tables.scopes).map_err(|errors| {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })?;
        Ok(tables.scopes)
    }

    fn reload(&self) -> Arc<ScopeMap> {
        match self.read() {
            Ok(scopes) => {
                let scopes = Arc::new(scopes);
                self.last_good.store(scopes.clone());
                scopes
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "Failed to read channel registry, keeping last good channel list"
                );
                self.last_good.load_full()
            }
        }
    }
}

impl ChannelRegistry for FileRegistry {
    fn list_channels(&self, scope: &str) -> Vec<ChannelConfig> {
        self.reload().get(scope).cloned().unwrap_or_default()
    }

    fn scopes(&self) -> Vec<String> {
        self.reload().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_edits_are_visible_on_next_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        write(
            &path,
            r#"
            [[scopes.claude]]
            id = "a"
            endpoint = "https://a.example.com"
            "#,
        );

        let registry = FileRegistry::new(&path);
        assert_eq!(registry.list_channels("claude").len(), 1);

        write(
            &path,
            r#"
            [[scopes.claude]]
            id = "a"
            endpoint = "https://a.example.com"

            [[scopes.claude]]
            id = "b"
            endpoint = "https://b.example.com"
            enabled = false
            "#,
        );
        let channels = registry.list_channels("claude");
        assert_eq!(channels.len(), 2);
        assert!(!channels[1].enabled);
    }

    #[test]
    fn test_broken_file_keeps_last_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        write(
            &path,
            r#"
            [[scopes.codex]]
            id = "a"
            endpoint = "https://a.example.com"
            "#,
        );
        let registry = FileRegistry::new(&path);

        write(&path, "[[scopes.codex]\nthis is not toml");
        assert_eq!(registry.list_channels("codex").len(), 1);

        write(
            &path,
            r#"
            [[scopes.codex]]
            id = "a"
            endpoint = "https://a.example.com"

            [[scopes.codex]]
            id = "a"
            endpoint = "https://b.example.com"
            "#,
        );
        let channels = registry.list_channels("codex");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].endpoint, "https://a.example.com");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let registry = FileRegistry::new("/definitely/not/here.toml");
        assert!(registry.list_channels("claude").is_empty());
        assert!(registry.scopes().is_empty());
    }
}
