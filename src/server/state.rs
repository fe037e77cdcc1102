use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::digest::Mailer;
use crate::scrape::ListingScraper;
use crate::spotify::SpotifyClient;
use crate::store::AppStore;

use super::ServerConfig;

pub type GuardedAppStore = Arc<dyn AppStore>;
pub type GuardedScraper = Arc<ListingScraper>;
pub type GuardedSpotifyClient = Arc<SpotifyClient>;
pub type GuardedMailer = Arc<dyn Mailer>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedAppStore,
    pub scraper: GuardedScraper,
    pub spotify: GuardedSpotifyClient,
    pub mailer: GuardedMailer,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedAppStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedScraper {
    fn from_ref(input: &ServerState) -> Self {
        input.scraper.clone()
    }
}

impl FromRef<ServerState> for GuardedSpotifyClient {
    fn from_ref(input: &ServerState) -> Self {
        input.spotify.clone()
    }
}

impl FromRef<ServerState> for GuardedMailer {
    fn from_ref(input: &ServerState) -> Self {
        input.mailer.clone()
    }
}
