//! Authentication HTTP handlers (register, login, logout, me)

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::error::ApiError;
use crate::extract::{session_id_from_headers, CurrentSession, LOGGED_IN_AT, USERNAME, USER_ID};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::users::UserRecord;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserDto,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub username: String,
    pub logged_in_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Register handler - POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    if state.users.find_by_username(&payload.username).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "Username already exists: {}",
            payload.username
        )));
    }

    let passwords = state.passwords.clone();
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;

    let user = UserRecord::new(payload.username, password_hash);
    let dto = UserDto::from(&user);
    state.users.insert(user).await?;

    info!(username = %dto.username, "user registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

/// Login handler - POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let user = state.users.find_by_username(&payload.username).await?;

    // Unknown users go through a decoy verify so they cost the same as a wrong password.
    let passwords = state.passwords.clone();
    let password = payload.password;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let (matched, password) = tokio::task::spawn_blocking(move || {
        passwords
            .check(&password, stored_hash.as_deref())
            .map(|matched| (matched, password))
    })
    .await??;

    let user = match user {
        Some(user) if matched => user,
        Some(user) => {
            warn!(username = %user.username, "login failed: invalid password");
            return Err(invalid_credentials());
        }
        None => {
            warn!(username = %payload.username, "login failed: unknown user");
            return Err(invalid_credentials());
        }
    };

    if state.passwords.needs_rehash(&user.password_hash)? {
        upgrade_hash(&state, &user, password).await;
    }

    // A login always gets a fresh id; drop whatever the client presented.
    if let Some(previous) = session_id_from_headers(&headers, &state.cookie) {
        state.sessions.delete(&previous);
    }

    let session = state.sessions.create()?;
    session.insert(&USER_ID, &user.id)?;
    session.insert(&USERNAME, &user.username)?;
    session.insert(&LOGGED_IN_AT, &Utc::now())?;

    let set_cookie = state.cookie.issue(session.id(), session.created_at());
    info!(username = %user.username, degraded_id = session.is_degraded_id(), "login successful");

    Ok((
        [(SET_COOKIE, set_cookie)],
        Json(ApiResponse::success(LoginResponse {
            user: UserDto::from(&user),
            expires_at: session.expires_at(),
        })),
    ))
}

/// Logout handler - POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(id) = session_id_from_headers(&headers, &state.cookie) {
        state.sessions.delete(&id);
    }
    (
        [(SET_COOKIE, state.cookie.clear())],
        Json(ApiResponse::success_with_message((), "Logged out successfully")),
    )
}

/// Current user handler - GET /auth/me
pub async fn me(
    CurrentSession(session): CurrentSession,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let (user_id, username) = match (session.get(&USER_ID)?, session.get(&USERNAME)?) {
        (Some(id), Some(name)) => (id, name),
        _ => return Err(ApiError::Unauthorized("Not logged in".to_string())),
    };

    Ok(Json(ApiResponse::success(MeResponse {
        user_id: user_id.to_string(),
        username,
        logged_in_at: session.get(&LOGGED_IN_AT)?,
        expires_at: session.expires_at(),
    })))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}

/// Rehashes with the current parameters. Failures are logged, never fatal to the login.
async fn upgrade_hash(state: &AppState, user: &UserRecord, password: String) {
    let passwords = state.passwords.clone();
    let rehashed = match tokio::task::spawn_blocking(move || passwords.hash(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            warn!(username = %user.username, error = %e, "password rehash failed");
            return;
        }
        Err(e) => {
            warn!(username = %user.username, error = %e, "password rehash task failed");
            return;
        }
    };

    match state.users.update_password_hash(user.id, rehashed).await {
        Ok(()) => info!(username = %user.username, "password hash upgraded"),
        Err(e) => warn!(username = %user.username, error = %e, "failed to store upgraded hash"),
    }
}
