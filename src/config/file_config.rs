use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub listings_url: Option<String>,
    pub city_name: Option<String>,
    pub cron_secret: Option<String>,
    pub app_url: Option<String>,

    // Upstream services
    pub spotify: Option<SpotifyConfig>,
    pub mailer: Option<MailerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Override for tests and local stubs.
    pub api_base: Option<String>,
    pub accounts_base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MailerConfig {
    pub api_key: Option<String>,
    pub from: Option<String>,
    /// Override for tests and local stubs.
    pub base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
