//! Application configuration loaded from a TOML file.
//!
//! A default configuration file is written on first run so users have
//! something to edit.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Top-level configuration for the demo client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub identity: IdentitySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Travel URL, e.g. `127.0.0.1:7777/Highlands?team=blue`.
    pub url: String,
    /// Bandwidth declaration sent once welcomed, bytes per second.
    pub net_speed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Player nickname advertised at login.
    pub nickname: String,
    /// Extra game-specific login options, e.g. `loadout=scout`.
    pub login_options: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter.
    pub level: String,
    /// JSON formatting.
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings {
                url: "127.0.0.1:7777/Highlands".to_string(),
                net_speed: pending_session::session::DEFAULT_NET_SPEED,
            },
            identity: IdentitySettings {
                nickname: "Traveler".to_string(),
                login_options: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, creating a default file if missing.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }
}
