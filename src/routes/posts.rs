use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Comment, Post};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::likes::{self, LikeOutcome};
use crate::social::pagination::{Page, PageParams};
use crate::social::posts::{self, CommentView, PostDetail, PostSummary, PostUpdate};
use crate::state::AppState;

// --- Request types ---

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

// Not flattened from `PageParams`: numbers don't survive `flatten` in
// query strings.
#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(post_detail).patch(update_post).delete(delete_post),
        )
        .route("/posts/{id}/like", post(toggle_like))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{id}", patch(update_comment).delete(delete_comment))
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<Json<Page<PostSummary>>> {
    let req = PageParams {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(&state.config.feed)?;
    let conn = state.db.get()?;
    Ok(Json(posts::list_posts(&conn, req, query.q.as_deref())?))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let conn = state.db.get()?;
    let post = posts::create_post(&conn, &user.id, &req.title, &req.body)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn post_detail(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostDetail>> {
    let conn = state.db.get()?;
    Ok(Json(posts::post_detail(&conn, &id)?))
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<PostUpdate>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    Ok(Json(posts::update_post(&conn, &id, &user.id, &update)?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    posts::delete_post(&mut conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<LikeOutcome>> {
    let mut conn = state.db.get()?;
    Ok(Json(likes::toggle_like(&mut conn, &user.id, &post_id)?))
}

async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<CommentView>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::list_comments(&conn, &post_id)?))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let mut conn = state.db.get()?;
    let comment = posts::add_comment(&mut conn, &post_id, &user.id, &req.body)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<Comment>> {
    let conn = state.db.get()?;
    Ok(Json(posts::update_comment(&conn, &id, &user.id, &req.body)?))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    posts::delete_comment(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
