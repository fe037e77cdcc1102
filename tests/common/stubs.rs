//! Stub upstream servers for end-to-end tests.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

async fn serve_on_random_port(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve a fixed listings page. Returns the page URL to scrape.
pub async fn spawn_listings_stub(page: String) -> String {
    let router = Router::new().route("/shows", get(move || async move { Html(page) }));
    let base = serve_on_random_port(router).await;
    format!("{}/shows", base)
}

// ============================================================================
// Streaming provider stub
// ============================================================================

#[derive(Clone)]
struct SpotifyStubState {
    /// Track artist names, split into pages of `page_size`.
    artists: Arc<Vec<String>>,
    page_size: usize,
    valid_tokens: Arc<Mutex<HashSet<String>>>,
    refresh_fails: bool,
    api_base: Arc<Mutex<String>>,
    page_requests: Arc<AtomicUsize>,
    refresh_requests: Arc<AtomicUsize>,
}

/// Handle to a stub provider serving paged liked tracks and token refresh.
pub struct SpotifyStub {
    pub api_base: String,
    pub accounts_base: String,
    pub page_requests: Arc<AtomicUsize>,
    pub refresh_requests: Arc<AtomicUsize>,
    pub valid_tokens: Arc<Mutex<HashSet<String>>>,
}

impl SpotifyStub {
    pub fn pages_fetched(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_requests.load(Ordering::SeqCst)
    }

    /// Invalidate a token so further page fetches 401.
    pub fn expire_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }
}

async fn tracks_handler(
    State(state): State<SpotifyStubState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.page_requests.fetch_add(1, Ordering::SeqCst);

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    if !state.valid_tokens.lock().unwrap().contains(token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let offset: usize = params
        .get("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let page: Vec<_> = state
        .artists
        .iter()
        .skip(offset)
        .take(state.page_size)
        .map(|name| json!({ "track": { "artists": [{ "name": name }] } }))
        .collect();

    let next = if offset + state.page_size < state.artists.len() {
        let api_base = state.api_base.lock().unwrap().clone();
        Some(format!(
            "{}/v1/me/tracks?limit={}&offset={}",
            api_base,
            state.page_size,
            offset + state.page_size
        ))
    } else {
        None
    };

    Json(json!({ "items": page, "next": next })).into_response()
}

#[derive(Deserialize)]
struct TokenRequestBody {
    grant_type: String,
    #[allow(dead_code)]
    refresh_token: String,
}

async fn token_handler(
    State(state): State<SpotifyStubState>,
    Form(body): Form<TokenRequestBody>,
) -> Response {
    state.refresh_requests.fetch_add(1, Ordering::SeqCst);

    if state.refresh_fails || body.grant_type != "refresh_token" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    state
        .valid_tokens
        .lock()
        .unwrap()
        .insert("fresh-token".to_string());
    Json(json!({ "access_token": "fresh-token" })).into_response()
}

/// Spawn a provider stub serving `artists` (one liked track each) in pages of
/// `page_size`, accepting `valid_tokens`, refreshing to "fresh-token" unless
/// `refresh_fails`.
pub async fn spawn_spotify_stub(
    artists: Vec<String>,
    page_size: usize,
    valid_tokens: &[&str],
    refresh_fails: bool,
) -> SpotifyStub {
    let state = SpotifyStubState {
        artists: Arc::new(artists),
        page_size,
        valid_tokens: Arc::new(Mutex::new(
            valid_tokens.iter().map(|t| t.to_string()).collect(),
        )),
        refresh_fails,
        api_base: Arc::new(Mutex::new(String::new())),
        page_requests: Arc::new(AtomicUsize::new(0)),
        refresh_requests: Arc::new(AtomicUsize::new(0)),
    };

    let router = Router::new()
        .route("/v1/me/tracks", get(tracks_handler))
        .route("/api/token", post(token_handler))
        .with_state(state.clone());
    let base = serve_on_random_port(router).await;
    *state.api_base.lock().unwrap() = base.clone();

    SpotifyStub {
        api_base: base.clone(),
        accounts_base: base,
        page_requests: state.page_requests,
        refresh_requests: state.refresh_requests,
        valid_tokens: state.valid_tokens,
    }
}

// ============================================================================
// Email provider stub
// ============================================================================

pub struct MailerStub {
    pub base_url: String,
    pub received: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MailerStub {
    pub fn sent_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

pub async fn spawn_mailer_stub() -> MailerStub {
    let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = received.clone();

    let router = Router::new().route(
        "/emails",
        post(move |Json(body): Json<serde_json::Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(body);
                Json(json!({ "id": "stub-email" }))
            }
        }),
    );
    let base_url = serve_on_random_port(router).await;

    MailerStub { base_url, received }
}
