use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::models::{Comment, Post, TargetRef};
use crate::db::time;
use crate::error::{AppError, AppResult};
use crate::social::notifications::{self, VERB_COMMENTED};
use crate::social::pagination::{Page, PageRequest};
use crate::social::policy;

const MAX_TITLE_LEN: usize = 255;
const MAX_BODY_LEN: usize = 10_000;
const MAX_COMMENT_LEN: usize = 2_000;

/// List/feed representation of a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments_count: i64,
    pub likes_count: i64,
}

/// Shared by the post list and the feed; callers append WHERE/ORDER.
pub(crate) const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.author_id, u.username, p.created_at, p.updated_at,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id)
     FROM posts p
     JOIN users u ON u.id = p.author_id";

impl PostSummary {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            author_id: row.get(2)?,
            author: row.get(3)?,
            created_at: time::get(row, 4)?,
            updated_at: time::get(row, 5)?,
            comments_count: row.get(6)?,
            likes_count: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "Title must be {MAX_TITLE_LEN} characters or less"
        )));
    }
    Ok(())
}

fn validate_body(body: &str, max: usize, what: &str) -> AppResult<()> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{what} cannot be empty")));
    }
    if body.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{what} must be {max} characters or less"
        )));
    }
    Ok(())
}

pub fn create_post(conn: &Connection, author_id: &str, title: &str, body: &str) -> AppResult<Post> {
    create_post_at(conn, author_id, title, body, time::now())
}

/// `create_post` with an explicit creation time, truncated to storage
/// precision.
pub(crate) fn create_post_at(
    conn: &Connection,
    author_id: &str,
    title: &str,
    body: &str,
    created_at: DateTime<Utc>,
) -> AppResult<Post> {
    let title = title.trim();
    validate_title(title)?;
    validate_body(body, MAX_BODY_LEN, "Body")?;
    let created_at = time::truncate(created_at);

    let post = Post {
        id: uuid::Uuid::now_v7().to_string(),
        author_id: author_id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        created_at,
        updated_at: created_at,
    };
    let stamp = time::to_db(&created_at);
    conn.execute(
        "INSERT INTO posts (id, author_id, title, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![post.id, post.author_id, post.title, post.body, stamp],
    )?;

    tracing::debug!(post_id = %post.id, author = %author_id, "post created");
    Ok(post)
}

pub fn get_post(conn: &Connection, id: &str) -> AppResult<Post> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS),
        params![id],
        Post::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn update_post(
    conn: &Connection,
    id: &str,
    requester_id: &str,
    update: &PostUpdate,
) -> AppResult<Post> {
    let mut post = get_post(conn, id)?;
    if !policy::can_edit(&post, requester_id) {
        return Err(AppError::PermissionDenied);
    }

    if let Some(title) = &update.title {
        let title = title.trim();
        validate_title(title)?;
        post.title = title.to_string();
    }
    if let Some(body) = &update.body {
        validate_body(body, MAX_BODY_LEN, "Body")?;
        post.body = body.clone();
    }
    post.updated_at = time::now();

    conn.execute(
        "UPDATE posts SET title = ?1, body = ?2, updated_at = ?3 WHERE id = ?4",
        params![post.title, post.body, time::to_db(&post.updated_at), post.id],
    )?;
    Ok(post)
}

/// Delete a post with its comments and likes in one transaction.
/// Notifications pointing at it are left alone.
pub fn delete_post(conn: &mut Connection, id: &str, requester_id: &str) -> AppResult<()> {
    let post = get_post(conn, id)?;
    if !policy::can_delete(&post, requester_id) {
        return Err(AppError::PermissionDenied);
    }

    let tx = conn.transaction()?;
    let comments = tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
    let likes = tx.execute("DELETE FROM likes WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!(post_id = %id, comments, likes, "post deleted");
    Ok(())
}

/// All posts, newest first. `query` matches title or body,
/// case-insensitively.
pub fn list_posts(
    conn: &Connection,
    req: PageRequest,
    query: Option<&str>,
) -> AppResult<Page<PostSummary>> {
    let query = query.map(str::trim).filter(|q| !q.is_empty());
    let filter = "WHERE (?1 IS NULL
            OR instr(lower(p.title), lower(?1)) > 0
            OR instr(lower(p.body), lower(?1)) > 0)";

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p {filter}"),
        params![query],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT} {filter} ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3"
    ))?;
    let results = stmt
        .query_map(
            params![query, req.limit(), req.offset()],
            PostSummary::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(req, count, results))
}

pub fn post_detail(conn: &Connection, id: &str) -> AppResult<PostDetail> {
    let post = get_post(conn, id)?;
    let author: String = conn.query_row(
        "SELECT username FROM users WHERE id = ?1",
        params![post.author_id],
        |row| row.get(0),
    )?;
    let likes_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let comments = query_comments(conn, id)?;

    Ok(PostDetail {
        post,
        author,
        likes_count,
        comments_count: comments.len() as i64,
        comments,
    })
}

/// Add a comment and tell the post's author about it.
pub fn add_comment(
    conn: &mut Connection,
    post_id: &str,
    author_id: &str,
    body: &str,
) -> AppResult<Comment> {
    validate_body(body, MAX_COMMENT_LEN, "Comment")?;

    let tx = conn.transaction()?;
    let post = get_post(&tx, post_id)?;

    let now = time::now();
    let comment = Comment {
        id: uuid::Uuid::now_v7().to_string(),
        post_id: post_id.to_string(),
        author_id: author_id.to_string(),
        body: body.to_string(),
        created_at: now,
        updated_at: now,
    };
    tx.execute(
        "INSERT INTO comments (id, post_id, author_id, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            comment.id,
            comment.post_id,
            comment.author_id,
            comment.body,
            time::to_db(&now)
        ],
    )?;

    notifications::notify(
        &tx,
        &post.author_id,
        Some(author_id),
        VERB_COMMENTED,
        &TargetRef::Comment(comment.id.clone()),
    )?;
    tx.commit()?;

    tracing::debug!(comment_id = %comment.id, post_id = %post_id, "comment added");
    Ok(comment)
}

pub fn get_comment(conn: &Connection, id: &str) -> AppResult<Comment> {
    conn.query_row(
        &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
        params![id],
        Comment::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Comments on a post, oldest first.
pub fn list_comments(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentView>> {
    get_post(conn, post_id)?;
    query_comments(conn, post_id)
}

pub fn update_comment(
    conn: &Connection,
    id: &str,
    requester_id: &str,
    body: &str,
) -> AppResult<Comment> {
    let mut comment = get_comment(conn, id)?;
    if !policy::can_edit_comment(&comment, requester_id) {
        return Err(AppError::PermissionDenied);
    }
    validate_body(body, MAX_COMMENT_LEN, "Comment")?;

    comment.body = body.to_string();
    comment.updated_at = time::now();
    conn.execute(
        "UPDATE comments SET body = ?1, updated_at = ?2 WHERE id = ?3",
        params![comment.body, time::to_db(&comment.updated_at), comment.id],
    )?;
    Ok(comment)
}

pub fn delete_comment(conn: &Connection, id: &str, requester_id: &str) -> AppResult<()> {
    let comment = get_comment(conn, id)?;
    if !policy::can_edit_comment(&comment, requester_id) {
        return Err(AppError::PermissionDenied);
    }
    conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(())
}

fn query_comments(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.author_id, c.body, c.created_at, c.updated_at, u.username
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentView {
                comment: Comment::from_row(row)?,
                author: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::social::test_support::insert_user;

    #[test]
    fn create_and_get_post() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let post = create_post(&conn, &alice.id, "  Hello  ", "World").unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(get_post(&conn, &post.id).unwrap(), post);
    }

    #[test]
    fn returned_records_match_stored_rows() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");

        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        assert_eq!(get_post(&conn, &post.id).unwrap(), post);

        let odd = Utc::now() + chrono::Duration::nanoseconds(999);
        let dated = create_post_at(&conn, &alice.id, "t", "b", odd).unwrap();
        assert_eq!(get_post(&conn, &dated.id).unwrap(), dated);

        let edited = update_post(
            &conn,
            &post.id,
            &alice.id,
            &PostUpdate {
                title: None,
                body: Some("edited".into()),
            },
        )
        .unwrap();
        assert_eq!(get_post(&conn, &post.id).unwrap(), edited);

        let comment = add_comment(&mut conn, &post.id, &bob.id, "nice").unwrap();
        assert_eq!(get_comment(&conn, &comment.id).unwrap(), comment);

        let comment = update_comment(&conn, &comment.id, &bob.id, "nicer").unwrap();
        assert_eq!(get_comment(&conn, &comment.id).unwrap(), comment);
    }

    #[test]
    fn get_missing_post_is_not_found() {
        let conn = db::open_in_memory().unwrap();
        assert!(matches!(get_post(&conn, "nope"), Err(AppError::NotFound)));
    }

    #[test]
    fn create_post_validates_fields() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        assert!(matches!(
            create_post(&conn, &alice.id, "  ", "body"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            create_post(&conn, &alice.id, &"t".repeat(256), "body"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            create_post(&conn, &alice.id, "title", ""),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn only_author_can_delete() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();

        assert!(matches!(
            delete_post(&mut conn, &post.id, &bob.id),
            Err(AppError::PermissionDenied)
        ));
        delete_post(&mut conn, &post.id, &alice.id).unwrap();
        assert!(matches!(get_post(&conn, &post.id), Err(AppError::NotFound)));
    }

    #[test]
    fn delete_cascades_to_comments() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        let comment = add_comment(&mut conn, &post.id, &bob.id, "nice").unwrap();

        delete_post(&mut conn, &post.id, &alice.id).unwrap();

        assert!(matches!(
            get_comment(&conn, &comment.id),
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            list_comments(&conn, &post.id),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn comment_notifies_post_author_except_self() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();

        add_comment(&mut conn, &post.id, &alice.id, "me first").unwrap();
        assert_eq!(notifications::unread_count(&conn, &alice.id).unwrap(), 0);

        let comment = add_comment(&mut conn, &post.id, &bob.id, "nice").unwrap();
        let page = notifications::list_notifications(
            &conn,
            &alice.id,
            PageRequest::new(1, 10).unwrap(),
            false,
        )
        .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].verb, VERB_COMMENTED);
        assert_eq!(page.results[0].target, TargetRef::Comment(comment.id));
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        assert!(matches!(
            add_comment(&mut conn, "missing", &alice.id, "hi"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn comments_are_oldest_first() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        let first = add_comment(&mut conn, &post.id, &alice.id, "one").unwrap();
        let second = add_comment(&mut conn, &post.id, &alice.id, "two").unwrap();
        conn.execute(
            "UPDATE comments SET created_at = '2000-01-01T00:00:00.000000Z' WHERE id = ?1",
            params![first.id],
        )
        .unwrap();

        let ids: Vec<_> = list_comments(&conn, &post.id)
            .unwrap()
            .into_iter()
            .map(|c| c.comment.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn update_post_is_author_only() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        let update = PostUpdate {
            title: Some("new".into()),
            body: None,
        };

        assert!(matches!(
            update_post(&conn, &post.id, &bob.id, &update),
            Err(AppError::PermissionDenied)
        ));
        let updated = update_post(&conn, &post.id, &alice.id, &update).unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.body, "b");
        assert!(updated.updated_at >= post.updated_at);
    }

    #[test]
    fn comment_edit_and_delete_are_author_only() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        let comment = add_comment(&mut conn, &post.id, &bob.id, "hi").unwrap();

        assert!(matches!(
            update_comment(&conn, &comment.id, &alice.id, "edited"),
            Err(AppError::PermissionDenied)
        ));
        assert_eq!(
            update_comment(&conn, &comment.id, &bob.id, "edited")
                .unwrap()
                .body,
            "edited"
        );
        assert!(matches!(
            delete_comment(&conn, &comment.id, &alice.id),
            Err(AppError::PermissionDenied)
        ));
        delete_comment(&conn, &comment.id, &bob.id).unwrap();
        assert!(list_comments(&conn, &post.id).unwrap().is_empty());
    }

    #[test]
    fn list_posts_searches_title_and_body() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        create_post(&conn, &alice.id, "Rust tips", "borrowing").unwrap();
        create_post(&conn, &alice.id, "Cooking", "I like RUST-coloured pans").unwrap();
        create_post(&conn, &alice.id, "Gardening", "tomatoes").unwrap();

        let req = PageRequest::new(1, 10).unwrap();
        assert_eq!(list_posts(&conn, req, None).unwrap().count, 3);

        let hits = list_posts(&conn, req, Some("rust")).unwrap();
        assert_eq!(hits.count, 2);
        assert!(hits.results.iter().all(|p| p.title != "Gardening"));
    }

    #[test]
    fn detail_includes_counts() {
        let mut conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let post = create_post(&conn, &alice.id, "t", "b").unwrap();
        add_comment(&mut conn, &post.id, &bob.id, "hi").unwrap();

        let detail = post_detail(&conn, &post.id).unwrap();
        assert_eq!(detail.author, "alice");
        assert_eq!(detail.comments_count, 1);
        assert_eq!(detail.comments[0].author, "bob");
        assert_eq!(detail.likes_count, 0);
    }
}
