use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::Notification;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::social::notifications;
use crate::social::pagination::PageParams;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub unread_only: bool,
}

/// A notification plus whether its target still exists.
#[derive(Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub target_exists: bool,
}

#[derive(Serialize)]
pub struct NotificationList {
    pub page: u32,
    pub page_size: u32,
    pub count: i64,
    pub unread: i64,
    pub results: Vec<NotificationView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/{id}/read", post(mark_read))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<NotificationList>> {
    let req = PageParams {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(&state.config.feed)?;

    let conn = state.db.get()?;
    let page = notifications::list_notifications(&conn, &user.id, req, query.unread_only)?;
    let unread = notifications::unread_count(&conn, &user.id)?;

    let results = page
        .results
        .into_iter()
        .map(|notification| -> AppResult<NotificationView> {
            let target_exists =
                notifications::resolve_target(&conn, &notification.target)?.is_some();
            Ok(NotificationView {
                notification,
                target_exists,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(NotificationList {
        page: page.page,
        page_size: page.page_size,
        count: page.count,
        unread,
        results,
    }))
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Notification>> {
    let conn = state.db.get()?;
    Ok(Json(notifications::mark_read(&conn, &id, &user.id)?))
}
