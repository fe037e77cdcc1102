//! Showgoer Concert Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod concerts;
pub mod config;
pub mod digest;
pub mod matching;
pub mod normalize;
pub mod scrape;
pub mod server;
pub mod shows;
pub mod spotify;
pub mod sqlite_persistence;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use scrape::ListingScraper;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use store::{AppStore, SqliteAppStore};
