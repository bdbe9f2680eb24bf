use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{password, session};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::directory;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    #[serde(default)]
    pub bio: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!("{name}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}")
}

fn clear_session_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

fn authenticated(state: &AppState, status: StatusCode, user: User, token: String) -> Response {
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse { user, token }),
    )
        .into_response()
}

// -- Handlers --

/// POST /auth/register: create an account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let username = req.username.trim();
    directory::validate_username(username)?;
    password::validate_password(&req.password)?;
    let hash = password::hash_password(&req.password, state.config.auth.bcrypt_cost)?;

    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let conn = state.db.get()?;
    let user = directory::create_user(&conn, username, email, &req.bio, &hash)?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;

    Ok(authenticated(&state, StatusCode::CREATED, user, token))
}

/// POST /auth/login: exchange username and password for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let Some(user) = directory::find_by_username(&conn, req.username.trim())? else {
        password::verify_unknown_user(&req.password, state.config.auth.bcrypt_cost);
        return Err(AppError::Unauthorized);
    };

    if !password::verify_password(&req.password, &user.password_hash) {
        tracing::info!(username = %user.username, "login failed");
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    tracing::info!(user_id = %user.id, "login");
    Ok(authenticated(&state, StatusCode::OK, user, token))
}

/// POST /auth/logout: end the session used for this request.
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &user.token)?;

    let cookie = clear_session_cookie(&state.config.auth.cookie_name);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}
