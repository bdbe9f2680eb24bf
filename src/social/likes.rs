use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::db::models::TargetRef;
use crate::db::time;
use crate::error::{AppError, AppResult};
use crate::social::notifications::{self, VERB_LIKED};
use crate::social::posts;

/// Attempts before a contended toggle gives up with `Conflict`.
const MAX_TOGGLE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

/// Flip whether `user_id` likes `post_id`.
///
/// Each toggle runs in an `IMMEDIATE` transaction, so concurrent toggles on
/// the same pair are applied one after another and the `(post_id, user_id)`
/// primary key can never be duplicated. A like (not an unlike) notifies the
/// post's author.
pub fn toggle_like(conn: &mut Connection, user_id: &str, post_id: &str) -> AppResult<LikeOutcome> {
    let mut attempt = 1;
    loop {
        match try_toggle(conn, user_id, post_id) {
            Err(e) if e.is_contention() && attempt < MAX_TOGGLE_ATTEMPTS => {
                tracing::debug!(post_id, user_id, attempt, error = %e, "like toggle contended, retrying");
                attempt += 1;
            }
            Err(e) if e.is_contention() => {
                tracing::warn!(post_id, user_id, error = %e, "like toggle gave up");
                return Err(AppError::Conflict(
                    "Like is being updated concurrently, try again".into(),
                ));
            }
            result => return result,
        }
    }
}

fn try_toggle(conn: &mut Connection, user_id: &str, post_id: &str) -> AppResult<LikeOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let post = posts::get_post(&tx, post_id)?;

    let existing = tx
        .query_row(
            "SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let liked = if existing {
        tx.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        false
    } else {
        tx.execute(
            "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, time::now_db()],
        )?;
        notifications::notify(
            &tx,
            &post.author_id,
            Some(user_id),
            VERB_LIKED,
            &TargetRef::Post(post.id.clone()),
        )?;
        true
    };

    let like_count = like_count(&tx, post_id)?;
    tx.commit()?;

    tracing::debug!(post_id, user_id, liked, like_count, "like toggled");
    Ok(LikeOutcome { liked, like_count })
}

pub fn like_count(conn: &Connection, post_id: &str) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?)
}

pub fn has_liked(conn: &Connection, user_id: &str, post_id: &str) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
        |row| row.get(0),
    )?)
}
