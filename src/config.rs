use std::path::PathBuf;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::input::SourceSettings;

const CONFIG_DIR: &str = ".config/padlink";
const CONFIG_FILE: &str = "config.toml";

/// Where the gamepad server lives.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
        }
    }
}

/// Identity reported to the server right after the welcome.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub device_name: String,
    pub device_model: String,
    pub os_version: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_name: "padlink".to_string(),
            device_model: std::env::consts::ARCH.to_string(),
            os_version: std::env::consts::OS.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub device: DeviceProfile,
    pub source: SourceSettings,
}

impl AppConfig {
    /// Reads `~/.config/padlink/config.toml`, writing a default file first
    /// if none exists. A file that fails to parse is reported and replaced
    /// by defaults in memory, never overwritten.
    pub async fn load_or_init() -> Result<Self> {
        let path = config_path();
        ensure_default_config(&path).await?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(
                    "Config file {} is invalid, using defaults: {}",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }
}

fn config_path() -> PathBuf {
    let mut path = get_home_dir();
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

async fn ensure_default_config(path: &PathBuf) -> Result<()> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
    {
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write default config file: {}", e))?;

    info!("Wrote default config to {}", path.display());
    Ok(())
}
