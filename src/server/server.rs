use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::concerts::build_concert_rows;
use crate::digest::{run_digest, DigestMode, Mailer};
use crate::matching::{self, IngestOutcome};
use crate::scrape::ListingScraper;
use crate::shows::{group_by_date, group_into_shows, month_window_end, ShowGroup, ShowView};
use crate::spotify::{self, SpotifyClient, SyncError};
use crate::store::{AppStore, DigestFrequency};

use super::cron_auth::CronAuth;
use super::session::Session;
use super::state::ServerState;
use super::{log_requests, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn today_string() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

/// Cron entry point: scrape the listings page, upsert concert rows, then
/// chain straight into matching so new concerts link to users immediately.
async fn ingest_concerts(_auth: CronAuth, State(state): State<ServerState>) -> Response {
    let city_id = match state.store.get_city_id(&state.config.city_name) {
        Ok(Some(id)) => id,
        Ok(None) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "city_not_found"),
        Err(err) => {
            error!("Failed to resolve city: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "city_lookup_failed");
        }
    };

    let shows = match state.scraper.scrape().await {
        Ok(shows) => shows,
        Err(err) => {
            error!("Scrape failed: {:#}", err);
            return error_response(StatusCode::BAD_GATEWAY, &err.to_string());
        }
    };

    if shows.is_empty() {
        return Json(json!({ "count": 0, "message": "no_upcoming_shows" })).into_response();
    }

    let rows = build_concert_rows(&shows, city_id);
    let upserted = match state.store.upsert_concerts(&rows) {
        Ok(count) => count,
        Err(err) => {
            error!("Concert upsert failed: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    let outcome = IngestOutcome { city_id, upserted };
    let matches = match matching::run_match_after_ingest(state.store.as_ref(), outcome) {
        Ok(count) => json!({ "count": count }),
        Err(err) => {
            error!("Match pass after ingest failed: {:#}", err);
            json!({ "error": "match_failed" })
        }
    };

    Json(json!({
        "concerts": upserted,
        "shows": shows.len(),
        "matches": matches,
    }))
    .into_response()
}

async fn match_concerts(_auth: CronAuth, State(state): State<ServerState>) -> Response {
    match matching::run_match(state.store.as_ref()) {
        Ok(count) => Json(json!({ "count": count })).into_response(),
        Err(err) => {
            error!("Match pass failed: {:#}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

#[derive(Deserialize, Debug)]
struct SendDigestParams {
    mode: Option<String>,
}

async fn send_digest(
    _auth: CronAuth,
    State(state): State<ServerState>,
    Query(params): Query<SendDigestParams>,
) -> Response {
    let mode = DigestMode::parse(params.mode.as_deref());

    match run_digest(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.app_url,
        mode,
    )
    .await
    {
        Ok(outcome) => Json(json!({
            "sent": outcome.sent,
            "skipped": outcome.skipped,
            "mode": mode.as_str(),
            "window_days": mode.window_days(),
        }))
        .into_response(),
        Err(err) => {
            error!("Digest run failed: {:#}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

/// Session entry point: pull the user's liked-tracks library, upsert artists
/// and (user, artist) edges, then best-effort re-run matching.
async fn sync_artists(session: Session, State(state): State<ServerState>) -> Response {
    let artist_set = match spotify::fetch_library_with_refresh(
        state.spotify.as_ref(),
        state.store.as_ref(),
        session.user_id,
    )
    .await
    {
        Ok(artists) => artists,
        Err(SyncError::MissingCredentials) => {
            return error_response(StatusCode::UNAUTHORIZED, "no_spotify_token");
        }
        Err(SyncError::CredentialsExpired) => {
            return error_response(StatusCode::UNAUTHORIZED, "spotify_token_expired");
        }
        Err(SyncError::Upstream(message)) => {
            error!("Library sync failed upstream: {}", message);
            return error_response(StatusCode::BAD_GATEWAY, &message);
        }
        Err(SyncError::Storage(err)) => {
            error!("Library sync failed on storage: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    if artist_set.is_empty() {
        return Json(json!({ "count": 0 })).into_response();
    }

    let mut names: Vec<String> = artist_set.into_iter().collect();
    names.sort();

    let artists = match state.store.upsert_artists(&names) {
        Ok(artists) => artists,
        Err(err) => {
            error!("Artist upsert failed: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };
    let artist_ids: Vec<i64> = artists.iter().map(|a| a.id).collect();

    if let Err(err) = state.store.link_user_artists(session.user_id, &artist_ids) {
        error!("User-artist link upsert failed: {:#}", err);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }

    // Non-fatal: sync succeeded, matching also runs on the next cron tick.
    if let Err(err) = matching::run_match(state.store.as_ref()) {
        warn!("Match pass after sync failed: {:#}", err);
    }

    info!(
        "Synced {} artists for user {}",
        artists.len(),
        session.user_id
    );
    Json(json!({ "count": artists.len() })).into_response()
}

#[derive(Serialize)]
struct DayShows {
    date: String,
    shows: Vec<ShowView>,
}

async fn weekly_shows(session: Session, State(state): State<ServerState>) -> Response {
    let synced = match state.store.count_user_artists(session.user_id) {
        Ok(count) => count > 0,
        Err(err) => {
            error!("Failed to count user artists: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };
    if !synced {
        return Json(json!({ "needs_sync": true, "days": [] })).into_response();
    }

    let rows = match state
        .store
        .matched_concerts_for_user(session.user_id, &today_string(), None)
    {
        Ok(rows) => rows,
        Err(err) => {
            error!("Failed to load matched concerts: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    let views: Vec<ShowView> = group_into_shows(&rows)
        .into_iter()
        .map(ShowGroup::into_view)
        .collect();
    let days: Vec<DayShows> = group_by_date(views, |v| v.date.as_str())
        .into_iter()
        .map(|(date, shows)| DayShows { date, shows })
        .collect();

    Json(json!({ "needs_sync": false, "days": days })).into_response()
}

async fn monthly_shows(session: Session, State(state): State<ServerState>) -> Response {
    let today = chrono::Local::now().date_naive();
    let end = month_window_end(today);

    let rows = match state.store.matched_concerts_for_user(
        session.user_id,
        &today.format("%Y-%m-%d").to_string(),
        Some(&end),
    ) {
        Ok(rows) => rows,
        Err(err) => {
            error!("Failed to load matched concerts: {:#}", err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    // Keyed by calendar day for random access from the calendar grid.
    let mut days: BTreeMap<String, Vec<ShowView>> = BTreeMap::new();
    for group in group_into_shows(&rows) {
        let view = group.into_view();
        days.entry(view.date.clone()).or_default().push(view);
    }

    Json(json!({ "days": days })).into_response()
}

#[derive(Deserialize, Debug)]
struct UpdateSettingsBody {
    pub city_id: Option<i64>,
    pub digest_preference: String,
}

async fn put_settings(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<UpdateSettingsBody>,
) -> Response {
    let Some(digest) = DigestFrequency::parse(&body.digest_preference) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_digest_preference");
    };

    match state
        .store
        .update_profile_settings(session.user_id, body.city_id, digest)
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!("Settings update failed: {:#}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

#[derive(Deserialize, Debug)]
struct UnsubscribeBody {
    pub uid: i64,
    pub preference: String,
}

/// Email-footer preference update: authenticated only by knowing the uid
/// from the unsubscribe link, matching the hosted original.
async fn post_unsubscribe(
    State(state): State<ServerState>,
    Json(body): Json<UnsubscribeBody>,
) -> Response {
    let Some(digest) = DigestFrequency::parse(&body.preference) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_digest_preference");
    };

    match state.store.update_digest_preference(body.uid, digest) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!("Unsubscribe update failed: {:#}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn AppStore>,
    scraper: Arc<ListingScraper>,
    spotify: Arc<SpotifyClient>,
    mailer: Arc<dyn Mailer>,
) -> Router {
    let state = ServerState {
        config,
        start_time: Instant::now(),
        store,
        scraper,
        spotify,
        mailer,
        hash: env!("GIT_HASH").to_string(),
    };

    let api_routes: Router = Router::new()
        .route("/ingest-concerts", post(ingest_concerts).get(ingest_concerts))
        .route("/match-concerts", post(match_concerts).get(match_concerts))
        .route("/send-digest", post(send_digest).get(send_digest))
        .route("/sync-artists", post(sync_artists))
        .route("/shows/weekly", get(weekly_shows))
        .route("/shows/monthly", get(monthly_shows))
        .route("/settings", put(put_settings))
        .route("/unsubscribe", post(post_unsubscribe))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    store: Arc<dyn AppStore>,
    scraper: Arc<ListingScraper>,
    spotify: Arc<SpotifyClient>,
    mailer: Arc<dyn Mailer>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, store, scraper, spotify, mailer);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::OutboundEmail;
    use crate::store::SqliteAppStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for `oneshot`

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send(&self, _email: &OutboundEmail) -> Result<()> {
            Ok(())
        }
    }

    fn test_app() -> (Router, Arc<SqliteAppStore>) {
        let store = Arc::new(SqliteAppStore::in_memory().unwrap());
        let config = ServerConfig {
            port: 0,
            requests_logging_level: super::super::RequestsLoggingLevel::None,
            cron_secret: Some("test-secret".to_string()),
            app_url: "http://localhost".to_string(),
            city_name: "New York City".to_string(),
        };
        let app = make_app(
            config,
            store.clone(),
            Arc::new(ListingScraper::new("http://localhost:1/shows").unwrap()),
            Arc::new(
                SpotifyClient::with_base_urls("id", "secret", "http://localhost:1", "http://localhost:1")
                    .unwrap(),
            ),
            Arc::new(NullMailer),
        );
        (app, store)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn session_routes_reject_without_token() {
        let (app, _store) = test_app();

        for (method, route) in [
            ("POST", "/api/sync-artists"),
            ("GET", "/api/shows/weekly"),
            ("GET", "/api/shows/monthly"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);
        }
    }

    #[tokio::test]
    async fn cron_routes_reject_wrong_or_missing_secret() {
        let (app, _store) = test_app();

        for route in ["/api/ingest-concerts", "/api/match-concerts", "/api/send-digest"] {
            let request = Request::builder()
                .method("POST")
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);

            let request = Request::builder()
                .method("POST")
                .uri(route)
                .header("Authorization", "Bearer wrong-secret")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", route);
        }
    }

    #[tokio::test]
    async fn match_endpoint_returns_zero_on_empty_store() {
        let (app, _store) = test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/match-concerts")
            .header("Authorization", "Bearer test-secret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "count": 0 }));
    }

    #[tokio::test]
    async fn digest_endpoint_reports_mode_and_window() {
        let (app, _store) = test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/send-digest?mode=daily")
            .header("Authorization", "Bearer test-secret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"], "daily");
        assert_eq!(body["window_days"], 1);
        assert_eq!(body["sent"], 0);
    }

    #[tokio::test]
    async fn weekly_view_prompts_for_sync_before_first_sync() {
        let (app, store) = test_app();
        let user = store.create_profile(None).unwrap();
        store.insert_auth_token(user, "session-tok").unwrap();

        let request = Request::builder()
            .method("GET")
            .uri("/api/shows/weekly")
            .header("Authorization", "session-tok")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["needs_sync"], true);
    }

    #[tokio::test]
    async fn settings_update_round_trips() {
        let (app, store) = test_app();
        let user = store.create_profile(None).unwrap();
        let city = store.ensure_city("New York City").unwrap();
        store.insert_auth_token(user, "session-tok").unwrap();

        let request = Request::builder()
            .method("PUT")
            .uri("/api/settings")
            .header("Authorization", "session-tok")
            .header("Content-Type", "application/json")
            .body(Body::from(
                json!({ "city_id": city, "digest_preference": "daily" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let profile = store.get_profile(user).unwrap().unwrap();
        assert_eq!(profile.city_id, Some(city));
        assert_eq!(profile.digest_preference, DigestFrequency::Daily);
    }

    #[tokio::test]
    async fn unsubscribe_updates_preference_without_session() {
        let (app, store) = test_app();
        let user = store.create_profile(Some("a@b.c")).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/unsubscribe")
            .header("Content-Type", "application/json")
            .body(Body::from(
                json!({ "uid": user, "preference": "none" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let profile = store.get_profile(user).unwrap().unwrap();
        assert_eq!(profile.digest_preference, DigestFrequency::None);
    }

    #[tokio::test]
    async fn invalid_digest_preference_is_rejected() {
        let (app, store) = test_app();
        let user = store.create_profile(None).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/unsubscribe")
            .header("Content-Type", "application/json")
            .body(Body::from(
                json!({ "uid": user, "preference": "hourly" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let (app, _store) = test_app();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["uptime"].is_string());
    }
}
