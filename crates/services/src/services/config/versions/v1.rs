use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct NotificationConfig {
    /// Hand requests to the sink right after a publish commits. When off,
    /// outbox rows stay `pending` until the delivery worker polls them.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Failed deliveries are retried until this many attempts were made.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct TimelineConfig {
    /// Rows fetched per keyset page when streaming a timeline.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct BulkConfig {
    #[serde(default = "default_max_proposals")]
    pub max_proposals: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_proposals: default_max_proposals(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_delivery_attempts() -> i64 {
    5
}

fn default_page_size() -> i64 {
    50
}

fn default_max_proposals() -> usize {
    500
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct Config {
    pub config_version: String,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        match serde_json::from_str::<Config>(&raw_config) {
            Ok(config) if config.config_version == "v1" => config,
            Ok(config) => {
                tracing::warn!(
                    "Unknown config version {}, using default",
                    config.config_version
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Config parse failed: {}, using default", e);
                Self::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: "v1".to_string(),
            notifications: NotificationConfig::default(),
            timeline: TimelineConfig::default(),
            bulk: BulkConfig::default(),
        }
    }
}
