mod file_config;

pub use file_config::{FileConfig, MailerConfig, SpotifyConfig};

use crate::digest;
use crate::server::RequestsLoggingLevel;
use crate::spotify;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_LISTINGS_URL: &str = "https://www.ohmyrockness.com/shows?all=true";
pub const DEFAULT_CITY_NAME: &str = "New York City";

/// CLI arguments that participate in config resolution. Mirrors the flags
/// that can be overridden by the TOML file.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub listings_url: String,
    pub city_name: String,
    pub cron_secret: Option<String>,
    pub app_url: String,
    pub spotify: SpotifySettings,
    pub mailer: MailerSettings,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub accounts_base: String,
}

#[derive(Debug, Clone)]
pub struct MailerSettings {
    pub api_key: String,
    pub from: String,
    pub base_url: String,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        if cli.db_path.as_os_str().is_empty() {
            bail!("database path must be specified");
        }

        let port = file.port.unwrap_or(cli.port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let listings_url = file
            .listings_url
            .unwrap_or_else(|| DEFAULT_LISTINGS_URL.to_string());
        let city_name = file
            .city_name
            .unwrap_or_else(|| DEFAULT_CITY_NAME.to_string());

        let cron_secret = file.cron_secret.filter(|s| !s.is_empty());
        if cron_secret.is_none() {
            warn!("No cron_secret configured; ingest/match/digest endpoints will reject all calls");
        }

        let app_url = file
            .app_url
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let spotify_file = file.spotify.unwrap_or_default();
        let spotify = SpotifySettings {
            client_id: spotify_file.client_id.unwrap_or_default(),
            client_secret: spotify_file.client_secret.unwrap_or_default(),
            api_base: spotify_file
                .api_base
                .unwrap_or_else(|| spotify::DEFAULT_API_BASE.to_string()),
            accounts_base: spotify_file
                .accounts_base
                .unwrap_or_else(|| spotify::DEFAULT_ACCOUNTS_BASE.to_string()),
        };
        if spotify.client_id.is_empty() {
            warn!("No spotify client credentials configured; library sync will fail upstream");
        }

        let mailer_file = file.mailer.unwrap_or_default();
        let mailer = MailerSettings {
            api_key: mailer_file.api_key.unwrap_or_default(),
            from: mailer_file
                .from
                .unwrap_or_else(|| "concerts@showgoer.dev".to_string()),
            base_url: mailer_file
                .base_url
                .unwrap_or_else(|| digest::DEFAULT_MAILER_BASE.to_string()),
        };
        if mailer.api_key.is_empty() {
            warn!("No mailer api_key configured; digest sends will fail upstream");
        }

        Ok(Self {
            db_path: cli.db_path.clone(),
            port,
            logging_level,
            listings_url,
            city_name,
            cron_secret,
            app_url,
            spotify,
            mailer,
        })
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
