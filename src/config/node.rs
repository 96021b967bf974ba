use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DATA_DIR_ENV: &str = "APIARY_DATA_DIR";

/// What to do when new content is byte-different but canonically equal to
/// content that is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalDedup {
    /// Point the new version at the existing content row.
    #[default]
    Reuse,
    /// Store the submitted bytes as a new row that shares the canonical hash.
    StoreNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifies this node as the origin of the messages it publishes.
    pub node_id: String,
    pub data_dir: PathBuf,
    pub partitions: u32,
    /// Upper bound a request waits for its own message to be applied locally.
    pub apply_timeout_ms: u64,
    /// Applier wake-up interval when no append notification arrives.
    pub poll_interval_ms: u64,
    pub canonical_dedup: CanonicalDedup,
    pub log_backend: LogBackend,
    /// Content claimed more recently than this survives an orphan sweep, so
    /// versions still in flight on other lanes can land first.
    pub orphan_grace_ms: u64,
}

impl NodeConfig {
    /// Loads configuration from an optional TOML file, then applies the
    /// `APIARY_DATA_DIR` override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str::<NodeConfig>(&content)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(Error::Config("node_id cannot be empty".to_string()));
        }
        if self.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".to_string()));
        }
        if self.apply_timeout_ms == 0 {
            return Err(Error::Config(
                "apply_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("apiary.db")
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }

    #[must_use]
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn orphan_grace(&self) -> Duration {
        Duration::from_millis(self.orphan_grace_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: Uuid::new_v4().to_string(),
            data_dir: PathBuf::from("./data"),
            partitions: 4,
            apply_timeout_ms: 5_000,
            poll_interval_ms: 250,
            canonical_dedup: CanonicalDedup::Reuse,
            log_backend: LogBackend::File,
            orphan_grace_ms: 300_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("apiary.toml");
        std::fs::write(
            &path,
            "node_id = \"node-a\"\npartitions = 8\ncanonical_dedup = \"store_new\"\n",
        )
        .unwrap();

        let config: NodeConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.node_id, "node-a");
        assert_eq!(config.partitions, 8);
        assert_eq!(config.canonical_dedup, CanonicalDedup::StoreNew);
        assert_eq!(config.apply_timeout_ms, 5_000);
        assert_eq!(config.log_backend, LogBackend::File);
        assert_eq!(config.orphan_grace(), Duration::from_secs(300));
    }

    #[test]
    fn test_rejects_zero_partitions() {
        let config = NodeConfig {
            partitions: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = toml::from_str::<NodeConfig>("canonical_dedup = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = NodeConfig {
            data_dir: PathBuf::from("/var/lib/apiary"),
            ..NodeConfig::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/apiary/apiary.db"));
        assert_eq!(config.log_dir(), PathBuf::from("/var/lib/apiary/log"));
    }
}
