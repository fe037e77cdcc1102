//! Shared-secret auth for the cron-invoked endpoints.

use super::state::ServerState;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// Proof that the request carried `Authorization: Bearer <cron secret>`.
///
/// Any mismatch, a missing header, or an unconfigured secret all reject the
/// same way; the caller is an automated scheduler that should never see a
/// partial success.
pub struct CronAuth;

pub struct CronAuthRejection;

impl IntoResponse for CronAuthRejection {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

impl FromRequestParts<ServerState> for CronAuth {
    type Rejection = CronAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = ctx.config.cron_secret.as_deref() else {
            return Err(CronAuthRejection);
        };

        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(value) if value == format!("Bearer {}", secret) => Ok(CronAuth),
            _ => Err(CronAuthRejection),
        }
    }
}
