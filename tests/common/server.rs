//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database, wired to the
//! given stub upstream URLs.

use showgoer::digest::ResendMailer;
use showgoer::scrape::ListingScraper;
use showgoer::server::{make_app, RequestsLoggingLevel, ServerConfig};
use showgoer::spotify::SpotifyClient;
use showgoer::store::{AppStore, SqliteAppStore};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const CRON_SECRET: &str = "cron-test-secret";
pub const TEST_CITY: &str = "New York City";

pub struct TestUpstreams {
    pub listings_url: String,
    pub spotify_api_base: String,
    pub spotify_accounts_base: String,
    pub mailer_base: String,
}

impl Default for TestUpstreams {
    fn default() -> Self {
        // Unroutable defaults: tests that never touch an upstream fail fast
        // if a handler unexpectedly calls out.
        Self {
            listings_url: "http://127.0.0.1:1/shows".to_string(),
            spotify_api_base: "http://127.0.0.1:1".to_string(),
            spotify_accounts_base: "http://127.0.0.1:1".to_string(),
            mailer_base: "http://127.0.0.1:1".to_string(),
        }
    }
}

pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Store handle for seeding and asserting directly against the database.
    pub store: Arc<SqliteAppStore>,

    /// Resolved id of the test city.
    pub city_id: i64,
}

impl TestServer {
    pub async fn spawn(upstreams: TestUpstreams) -> Self {
        let store = Arc::new(SqliteAppStore::in_memory().unwrap());
        let city_id = store.ensure_city(TEST_CITY).unwrap();

        let config = ServerConfig {
            port: 0,
            requests_logging_level: RequestsLoggingLevel::None,
            cron_secret: Some(CRON_SECRET.to_string()),
            app_url: "http://app.test".to_string(),
            city_name: TEST_CITY.to_string(),
        };

        let app = make_app(
            config,
            store.clone(),
            Arc::new(ListingScraper::new(&upstreams.listings_url).unwrap()),
            Arc::new(
                SpotifyClient::with_base_urls(
                    "test-client-id",
                    "test-client-secret",
                    &upstreams.spotify_api_base,
                    &upstreams.spotify_accounts_base,
                )
                .unwrap(),
            ),
            Arc::new(
                ResendMailer::with_base_url("test-api-key", "shows@test", &upstreams.mailer_base)
                    .unwrap(),
            ),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{}", addr),
            store,
            city_id,
        }
    }

    /// Create a profile in the test city with a session token.
    pub fn seed_user(&self, email: Option<&str>, session_token: &str) -> i64 {
        let user_id = self.store.create_profile(email).unwrap();
        self.store.set_profile_city(user_id, self.city_id).unwrap();
        self.store.insert_auth_token(user_id, session_token).unwrap();
        user_id
    }
}
