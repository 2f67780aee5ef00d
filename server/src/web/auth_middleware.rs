use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::auth::token::validate_session_token;

use super::app_state::AppState;

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "coderoom_session";

/// Extractor that validates the session JWT from the `coderoom_session` cookie,
/// or from an `Authorization: Bearer` header for non-browser clients.
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = match jar.get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
                .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Not authenticated").into_response())?,
        };

        let claims = validate_session_token(&token, &state.auth_config.jwt_secret).map_err(|_| {
            (StatusCode::UNAUTHORIZED, "Invalid or expired session").into_response()
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}
