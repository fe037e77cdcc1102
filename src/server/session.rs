use super::state::ServerState;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use tracing::debug;

/// An authenticated dashboard user, resolved from a session token.
#[derive(Debug)]
pub struct Session {
    pub user_id: i64,
    pub token: String,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

pub struct SessionRejection;

impl IntoResponse for SessionRejection {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

async fn extract_session_token_from_cookies(parts: &mut Parts, ctx: &ServerState) -> Option<String> {
    CookieJar::from_request_parts(parts, ctx)
        .await
        .ok()?
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(str::to_string)
}

fn extract_session_token_from_headers(parts: &mut Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn extract_session(parts: &mut Parts, ctx: &ServerState) -> Option<Session> {
    let token = match extract_session_token_from_cookies(parts, ctx)
        .await
        .or_else(|| extract_session_token_from_headers(parts))
    {
        None => {
            debug!("No session token in cookies nor headers");
            return None;
        }
        Some(token) => token,
    };

    let user_id = match ctx.store.get_auth_token_user(&token) {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            debug!("Session token not found");
            return None;
        }
        Err(err) => {
            debug!("Failed to look up session token: {}", err);
            return None;
        }
    };

    // Best-effort bookkeeping, not critical for authentication.
    if let Err(err) = ctx.store.touch_auth_token(&token) {
        debug!("Failed to update session token last_used_at: {}", err);
    }

    Some(Session { user_id, token })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session(parts, ctx).await.ok_or(SessionRejection)
    }
}

impl FromRequestParts<ServerState> for Option<Session> {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(extract_session(parts, ctx).await)
    }
}
