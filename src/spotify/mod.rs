//! Streaming-provider API client for library sync.
//!
//! Paginates a user's liked tracks into a normalized artist-name set and
//! exchanges a stored refresh token for a new access token when the old one
//! expires. The caller gets a distinct error for the expired-credential case
//! so it can prompt re-authentication instead of blind-retrying.

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use reqwest::header;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::normalize::normalize_artist_name;
use crate::store::AppStore;

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com";
pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRACKS_PAGE_LIMIT: usize = 50;

/// Failures talking to the provider API.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// The access token was rejected; a refresh may still rescue the sync.
    #[error("spotify_unauthorized")]
    Unauthorized,
    #[error("spotify_error_{0}")]
    Upstream(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Failures of a whole library sync, after the one allowed refresh.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No stored credentials at all; the user never connected the provider.
    #[error("no_spotify_token")]
    MissingCredentials,
    /// Refresh impossible or ineffective; only re-authentication helps.
    #[error("spotify_token_expired")]
    CredentialsExpired,
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct SpotifyClient {
    client: reqwest::Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TracksPage {
    #[serde(default)]
    items: Vec<PageItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PageItem {
    track: Option<PageTrack>,
}

#[derive(Deserialize)]
struct PageTrack {
    #[serde(default)]
    artists: Vec<PageArtist>,
}

#[derive(Deserialize)]
struct PageArtist {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

impl SpotifyClient {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        Self::with_base_urls(client_id, client_secret, DEFAULT_API_BASE, DEFAULT_ACCOUNTS_BASE)
    }

    /// Base URLs are injectable so tests can stand up a stub provider.
    pub fn with_base_urls(
        client_id: &str,
        client_secret: &str,
        api_base: &str,
        accounts_base: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create provider HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            accounts_base: accounts_base.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Walk every page of the user's liked tracks, normalizing each track
    /// artist into the set as it goes, so memory is bounded by distinct
    /// artists rather than track count.
    pub async fn fetch_liked_artists(
        &self,
        access_token: &str,
    ) -> Result<HashSet<String>, SpotifyError> {
        let mut artists = HashSet::new();
        let mut url = format!("{}/v1/me/tracks?limit={}", self.api_base, TRACKS_PAGE_LIMIT);

        loop {
            let response = self.client.get(&url).bearer_auth(access_token).send().await?;
            let status = response.status();
            if status.as_u16() == 401 {
                return Err(SpotifyError::Unauthorized);
            }
            if !status.is_success() {
                return Err(SpotifyError::Upstream(status.as_u16()));
            }

            let page: TracksPage = response.json().await?;
            for item in page.items {
                let Some(track) = item.track else { continue };
                for artist in track.artists {
                    if let Some(name) = artist.name {
                        let normalized = normalize_artist_name(&name);
                        if !normalized.is_empty() {
                            artists.insert(normalized);
                        }
                    }
                }
            }

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(artists)
    }

    /// Exchange the long-lived refresh token for a fresh access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_base))
            .header(header::AUTHORIZATION, format!("Basic {}", credentials))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .context("Failed to reach provider token endpoint")?;

        if !response.status().is_success() {
            bail!("token refresh failed with status {}", response.status());
        }

        let body: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;
        Ok(body.access_token)
    }
}

/// Fetch a user's full normalized artist library, refreshing the stored
/// access token at most once.
///
/// On a 401, the whole fetch restarts from the first page with a refreshed
/// token; there is no partial-progress resume. Any failure inside the
/// refresh-and-retry path is an expired-credential condition.
pub async fn fetch_library_with_refresh(
    spotify: &SpotifyClient,
    store: &dyn AppStore,
    user_id: i64,
) -> Result<HashSet<String>, SyncError> {
    let tokens = store
        .get_provider_tokens(user_id)?
        .ok_or(SyncError::MissingCredentials)?;

    match spotify.fetch_liked_artists(&tokens.access_token).await {
        Ok(artists) => Ok(artists),
        Err(SpotifyError::Unauthorized) => {
            let refresh_token = tokens
                .refresh_token
                .ok_or(SyncError::CredentialsExpired)?;

            info!("Access token rejected for user {}, refreshing once", user_id);
            let access_token = spotify
                .refresh_access_token(&refresh_token)
                .await
                .map_err(|err| {
                    warn!("Token refresh failed for user {}: {}", user_id, err);
                    SyncError::CredentialsExpired
                })?;

            if let Err(err) = store.set_provider_access_token(user_id, &access_token) {
                warn!("Failed to persist refreshed access token: {}", err);
            }

            spotify
                .fetch_liked_artists(&access_token)
                .await
                .map_err(|_| SyncError::CredentialsExpired)
        }
        Err(err) => Err(SyncError::Upstream(err.to_string())),
    }
}
