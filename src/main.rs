use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showgoer::config::{AppConfig, CliConfig, FileConfig};
use showgoer::digest::ResendMailer;
use showgoer::scrape::ListingScraper;
use showgoer::server::{run_server, RequestsLoggingLevel, ServerConfig};
use showgoer::spotify::SpotifyClient;
use showgoer::store::{AppStore, SqliteAppStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite application database file.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    /// Path to a TOML config file (secrets, listings URL, upstream bases).
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3009)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening application database at {:?}...", config.db_path);
    let store: Arc<dyn AppStore> = Arc::new(SqliteAppStore::new(&config.db_path)?);

    // The configured city must exist before ingestion can attach rows to it.
    let city_id = store.ensure_city(&config.city_name)?;
    info!("Serving city '{}' (id {})", config.city_name, city_id);

    let scraper = Arc::new(
        ListingScraper::new(&config.listings_url).context("Failed to set up listings scraper")?,
    );
    let spotify = Arc::new(SpotifyClient::with_base_urls(
        &config.spotify.client_id,
        &config.spotify.client_secret,
        &config.spotify.api_base,
        &config.spotify.accounts_base,
    )?);
    let mailer = Arc::new(ResendMailer::with_base_url(
        &config.mailer.api_key,
        &config.mailer.from,
        &config.mailer.base_url,
    )?);

    let server_config = ServerConfig {
        port: config.port,
        requests_logging_level: config.logging_level.clone(),
        cron_secret: config.cron_secret.clone(),
        app_url: config.app_url.clone(),
        city_name: config.city_name.clone(),
    };

    info!("Starting server on port {}...", config.port);
    run_server(server_config, store, scraper, spotify, mailer).await
}
