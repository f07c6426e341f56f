//! Snapshot storage backends for the Recall memory engine

mod fallback;
mod local;

#[cfg(feature = "redis-storage")]
mod redis;

pub use fallback::FallbackStorage;
pub use local::LocalStorage;
pub use recall_core::{ConversationSnapshot, MemoryError, Result, SnapshotStorage, StorageTier};

#[cfg(feature = "redis-storage")]
pub use self::redis::RedisStorage;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const ENV_DATA_DIR: &str = "RECALL_DATA_DIR";
pub const ENV_REDIS_URL: &str = "RECALL_REDIS_URL";
pub const ENV_REDIS_PREFIX: &str = "RECALL_REDIS_PREFIX";

pub const DEFAULT_REDIS_PREFIX: &str = "recall:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub local: LocalStorageConfig,

    /// Durable store; absent means local-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisStorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStorageConfig {
    pub url: String,

    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

fn default_local_path() -> String {
    "./data/conversations".to_string()
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

impl StorageConfig {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            local: LocalStorageConfig { path: path.into() },
            redis: None,
        }
    }

    pub fn with_redis(mut self, url: impl Into<String>) -> Self {
        self.redis = Some(RedisStorageConfig {
            url: url.into(),
            prefix: None,
            ttl_seconds: None,
        });
        self
    }

    /// Defaults overridden by `RECALL_DATA_DIR`, `RECALL_REDIS_URL` and `RECALL_REDIS_PREFIX`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.local.path = path;
        }
        if let Some(url) = lookup(ENV_REDIS_URL).filter(|v| !v.trim().is_empty()) {
            let prefix = lookup(ENV_REDIS_PREFIX).filter(|v| !v.is_empty());
            let ttl_seconds = self.redis.as_ref().and_then(|r| r.ttl_seconds);
            self.redis = Some(RedisStorageConfig {
                url,
                prefix,
                ttl_seconds,
            });
        }
        self
    }

    pub fn has_durable(&self) -> bool {
        self.redis.is_some()
    }

    pub fn get_prefix(&self) -> &str {
        self.redis
            .as_ref()
            .and_then(|r| r.prefix.as_deref())
            .unwrap_or(DEFAULT_REDIS_PREFIX)
    }
}

/// Select the storage backend once, at startup.
///
/// With a reachable durable store the result writes durably and falls back
/// to local files per call; otherwise it is plain local storage. Either way
/// construction never fails.
pub async fn create_storage(config: &StorageConfig) -> Arc<dyn SnapshotStorage> {
    let local = Arc::new(LocalStorage::new(&config.local.path));

    let Some(redis_config) = config.redis.as_ref() else {
        info!(
            path = %config.local.path,
            "No durable store configured, using local snapshot storage"
        );
        return local;
    };

    match connect_durable(redis_config, config.get_prefix()).await {
        Ok(durable) => {
            info!(
                prefix = config.get_prefix(),
                fallback_path = %config.local.path,
                "Using redis snapshot storage with local fallback"
            );
            Arc::new(FallbackStorage::new(durable, local))
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %config.local.path,
                "Durable store unavailable, using local snapshot storage"
            );
            local
        }
    }
}

#[cfg(feature = "redis-storage")]
async fn connect_durable(
    config: &RedisStorageConfig,
    prefix: &str,
) -> Result<Arc<dyn SnapshotStorage>> {
    let mut storage = RedisStorage::connect(&config.url)
        .await?
        .with_prefix(prefix);
    if let Some(ttl) = config.ttl_seconds {
        storage = storage.with_ttl(ttl);
    }
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "redis-storage"))]
async fn connect_durable(
    _config: &RedisStorageConfig,
    _prefix: &str,
) -> Result<Arc<dyn SnapshotStorage>> {
    Err(MemoryError::Config(
        "Redis storage requires the 'redis-storage' feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_local_only() {
        let config = StorageConfig::default();
        assert!(!config.has_durable());
        assert_eq!(config.local.path, "./data/conversations");
        assert_eq!(config.get_prefix(), "recall:");
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
local:
  path: /var/lib/recall
redis:
  url: redis://cache:6379
  prefix: "companion:"
  ttl_seconds: 86400
"#;
        let config: StorageConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.local.path, "/var/lib/recall");
        assert!(config.has_durable());
        assert_eq!(config.get_prefix(), "companion:");
        assert_eq!(config.redis.unwrap().ttl_seconds, Some(86400));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/recall"),
            (ENV_REDIS_URL, "redis://localhost:6379"),
        ]
        .into_iter()
        .collect();

        let config =
            StorageConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.local.path, "/tmp/recall");
        assert_eq!(
            config.redis.as_ref().map(|r| r.url.as_str()),
            Some("redis://localhost:6379")
        );
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = StorageConfig::default().with_overrides(|k| {
            if k == ENV_REDIS_URL {
                Some("  ".to_string())
            } else {
                None
            }
        });
        assert!(!config.has_durable());
    }

    #[tokio::test]
    async fn test_create_storage_without_durable_is_local() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::local(temp_dir.path().to_string_lossy());

        let storage = create_storage(&config).await;
        assert_eq!(storage.tier(), StorageTier::Local);
    }

    #[tokio::test]
    async fn test_create_storage_with_unreachable_durable_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::local(temp_dir.path().to_string_lossy())
            .with_redis("redis://127.0.0.1:1");

        let storage = create_storage(&config).await;
        assert_eq!(storage.tier(), StorageTier::Local);

        let snapshot = ConversationSnapshot::new("c1");
        assert_eq!(
            storage.save("c1", &snapshot).await.unwrap(),
            StorageTier::Local
        );
    }

    #[cfg(not(feature = "redis-storage"))]
    #[tokio::test]
    async fn test_durable_without_feature_is_config_error() {
        let config = StorageConfig::default().with_redis("redis://127.0.0.1:6379");
        let redis = config.redis.as_ref().unwrap();
        let result = connect_durable(redis, config.get_prefix()).await;
        assert!(matches!(result, Err(MemoryError::Config(_))));
    }
}
