use std::path::Path;

use thiserror::Error;

pub mod versions;

pub use versions::v1::{BulkConfig, Config, NotificationConfig, TimelineConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Read the config, falling back to defaults when the file is missing or
/// unreadable. Never fails startup.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from(raw_config),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config {}: {}", config_path.display(), e);
            }
            Config::default()
        }
    }
}

pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let raw_config = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_file(&dir.path().join("config.json")).await;
        assert_eq!(config.config_version, "v1");
        assert!(config.notifications.enabled);
        assert_eq!(config.timeline.page_size, 50);
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.bulk.max_proposals = 3;
        config.notifications.max_delivery_attempts = 2;

        save_config_to_file(&config, &path).await.unwrap();
        let loaded = load_config_from_file(&path).await;

        assert_eq!(loaded.bulk.max_proposals, 3);
        assert_eq!(loaded.notifications.max_delivery_attempts, 2);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config = Config::from(r#"{"config_version":"v1","bulk":{"max_proposals":10}}"#.to_string());
        assert_eq!(config.bulk.max_proposals, 10);
        assert_eq!(config.timeline.page_size, 50);
        assert_eq!(config.notifications.max_delivery_attempts, 5);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = Config::from("not json".to_string());
        assert_eq!(config.bulk.max_proposals, 500);
    }
}
