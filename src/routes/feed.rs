use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::feed;
use crate::social::pagination::{Page, PageParams};
use crate::social::posts::PostSummary;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/feed", get(get_feed))
}

/// GET /feed?page=&page_size=
async fn get_feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PostSummary>>> {
    let req = params.resolve(&state.config.feed)?;
    let conn = state.db.get()?;
    Ok(Json(feed::get_feed(&conn, &user.id, req)?))
}
