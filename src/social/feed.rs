use rusqlite::{params, Connection};

use crate::error::AppResult;
use crate::social::pagination::{Page, PageRequest};
use crate::social::posts::{PostSummary, SUMMARY_SELECT};

/// Posts by everyone `user_id` follows, newest first with ties broken by
/// post id descending. Following nobody, or asking past the last page,
/// yields an empty page rather than an error.
pub fn get_feed(conn: &Connection, user_id: &str, req: PageRequest) -> AppResult<Page<PostSummary>> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts
         WHERE author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)",
        params![user_id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Ok(Page::empty(req));
    }

    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT}
         WHERE p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let results = stmt
        .query_map(
            params![user_id, req.limit(), req.offset()],
            PostSummary::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        user_id,
        total = count,
        page = req.page,
        returned = results.len(),
        "feed resolved"
    );
    Ok(Page::new(req, count, results))
}
