//! Session lookup from request cookies.

use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};
use going_security::{Session, SessionCookie, SessionKey};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID: SessionKey<Uuid> = SessionKey::new("user_id");
pub const USERNAME: SessionKey<String> = SessionKey::new("username");
pub const LOGGED_IN_AT: SessionKey<DateTime<Utc>> = SessionKey::new("logged_in_at");

/// Session id named by any `Cookie` header on the request.
pub fn session_id_from_headers(headers: &HeaderMap, cookie: &SessionCookie) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| cookie.extract(value))
        .map(str::to_string)
}

/// A live session. Rejects with 401 when the cookie is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = session_id_from_headers(&parts.headers, &state.cookie)
            .ok_or_else(|| ApiError::Unauthorized("Missing session cookie".to_string()))?;
        let session = state.sessions.get(&id)?;
        Ok(Self(session))
    }
}
