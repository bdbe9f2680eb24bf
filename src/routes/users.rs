use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::db::models::User;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::directory::{self, Profile, ProfileUpdate};
use crate::state::AppState;

#[derive(Serialize)]
pub struct FollowResponse {
    pub following: bool,
    /// False when the call did not change anything.
    pub changed: bool,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(my_profile).patch(update_profile).delete(delete_account),
        )
        .route("/users/{id}", get(user_profile))
        .route("/users/{id}/followers", get(list_followers))
        .route("/users/{id}/following", get(list_following))
        .route("/users/{id}/follow", post(follow))
        .route("/users/{id}/unfollow", post(unfollow))
}

// --- Handlers ---

async fn my_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(directory::profile(&conn, &user.id)?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    Ok(Json(directory::update_profile(&conn, &user.id, &update)?))
}

async fn delete_account(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    directory::delete_user(&mut conn, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_profile(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(directory::profile(&conn, &id)?))
}

async fn list_followers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(directory::followers(&conn, &id)?))
}

async fn list_following(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(directory::following(&conn, &id)?))
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<FollowResponse>> {
    let mut conn = state.db.get()?;
    let changed = directory::follow(&mut conn, &user.id, &id)?;
    Ok(Json(FollowResponse {
        following: true,
        changed,
    }))
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<FollowResponse>> {
    let conn = state.db.get()?;
    let changed = directory::unfollow(&conn, &user.id, &id)?;
    Ok(Json(FollowResponse {
        following: false,
        changed,
    }))
}
