use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::models::{Comment, Notification, Post, TargetRef, User};
use crate::db::time;
use crate::error::{AppError, AppResult};
use crate::social::pagination::{Page, PageRequest};
use crate::social::{directory, policy, posts};

pub const VERB_LIKED: &str = "liked your post";
pub const VERB_COMMENTED: &str = "commented on your post";
pub const VERB_FOLLOWED: &str = "followed you";

/// Append a notification for `recipient_id`.
///
/// Self-actions never notify: when the actor is the recipient this returns
/// `Ok(None)` without writing. Nothing is deduplicated, so repeated events
/// produce repeated rows.
pub fn notify(
    conn: &Connection,
    recipient_id: &str,
    actor_id: Option<&str>,
    verb: &str,
    target: &TargetRef,
) -> AppResult<Option<Notification>> {
    if actor_id == Some(recipient_id) {
        return Ok(None);
    }

    let id = uuid::Uuid::now_v7().to_string();
    let created_at = time::now();
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, actor_id, verb, target_kind, target_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            id,
            recipient_id,
            actor_id,
            verb,
            target.kind(),
            target.id(),
            time::to_db(&created_at)
        ],
    )?;

    tracing::debug!(
        notification_id = %id,
        recipient = %recipient_id,
        verb,
        "notification created"
    );

    Ok(Some(Notification {
        id,
        recipient_id: recipient_id.to_string(),
        actor_id: actor_id.map(str::to_string),
        verb: verb.to_string(),
        target: target.clone(),
        read: false,
        created_at,
    }))
}

pub fn get_notification(conn: &Connection, id: &str) -> AppResult<Notification> {
    conn.query_row(
        &format!(
            "SELECT {} FROM notifications WHERE id = ?1",
            Notification::COLUMNS
        ),
        params![id],
        Notification::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Flip the read flag. Only the recipient may do this; repeating it is a
/// no-op.
pub fn mark_read(conn: &Connection, id: &str, requester_id: &str) -> AppResult<Notification> {
    let mut notification = get_notification(conn, id)?;
    if !policy::can_mark_read(&notification, requester_id) {
        return Err(AppError::PermissionDenied);
    }

    if !notification.read {
        conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id],
        )?;
        notification.read = true;
    }

    Ok(notification)
}

/// Newest first, ties broken by id descending.
pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    req: PageRequest,
    unread_only: bool,
) -> AppResult<Page<Notification>> {
    let filter = if unread_only { " AND is_read = 0" } else { "" };

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1{filter}"),
        params![user_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM notifications
         WHERE recipient_id = ?1{filter}
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
        Notification::COLUMNS
    ))?;
    let results = stmt
        .query_map(
            params![user_id, req.limit(), req.offset()],
            Notification::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(req, count, results))
}

pub fn unread_count(conn: &Connection, user_id: &str) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )?)
}

/// The current state of a notification's target.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    Post(Post),
    Comment(Comment),
    User(User),
}

/// Look the target up now. `None` means it has been deleted since the
/// notification was written.
pub fn resolve_target(conn: &Connection, target: &TargetRef) -> AppResult<Option<Target>> {
    let found = match target {
        TargetRef::Post(id) => posts::get_post(conn, id).map(Target::Post),
        TargetRef::Comment(id) => posts::get_comment(conn, id).map(Target::Comment),
        TargetRef::User(id) => directory::get_user(conn, id).map(Target::User),
    };

    match found {
        Ok(target) => Ok(Some(target)),
        Err(AppError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::social::test_support::insert_user;

    fn page(n: u32) -> PageRequest {
        PageRequest::new(n, 10).unwrap()
    }

    #[test]
    fn self_notification_is_suppressed() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");

        let result = notify(
            &conn,
            &alice.id,
            Some(&alice.id),
            VERB_LIKED,
            &TargetRef::Post("p1".into()),
        )
        .unwrap();
        assert!(result.is_none());
        assert_eq!(list_notifications(&conn, &alice.id, page(1), false).unwrap().count, 0);
    }

    #[test]
    fn returned_notification_matches_stored_row() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");

        let created = notify(
            &conn,
            &alice.id,
            Some(&bob.id),
            VERB_FOLLOWED,
            &TargetRef::User(bob.id.clone()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(get_notification(&conn, &created.id).unwrap(), created);
    }

    #[test]
    fn notifications_are_not_deduplicated() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let target = TargetRef::User(bob.id.clone());

        for _ in 0..3 {
            notify(&conn, &alice.id, Some(&bob.id), VERB_FOLLOWED, &target).unwrap();
        }
        assert_eq!(unread_count(&conn, &alice.id).unwrap(), 3);
    }

    #[test]
    fn actorless_notification_is_allowed() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let created = notify(&conn, &alice.id, None, "system", &TargetRef::User(alice.id.clone()))
            .unwrap()
            .unwrap();
        assert_eq!(created.actor_id, None);
        assert!(!created.read);
    }

    #[test]
    fn list_is_newest_first() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");

        let first = notify(&conn, &alice.id, Some(&bob.id), VERB_FOLLOWED, &TargetRef::User(bob.id.clone()))
            .unwrap()
            .unwrap();
        let second = notify(&conn, &alice.id, Some(&bob.id), VERB_LIKED, &TargetRef::Post("p".into()))
            .unwrap()
            .unwrap();
        conn.execute(
            "UPDATE notifications SET created_at = '2020-01-01T00:00:00.000000Z' WHERE id = ?1",
            params![first.id],
        )
        .unwrap();

        let listed = list_notifications(&conn, &alice.id, page(1), false).unwrap();
        let ids: Vec<_> = listed.results.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn mark_read_requires_recipient_and_is_idempotent() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let n = notify(&conn, &alice.id, Some(&bob.id), VERB_FOLLOWED, &TargetRef::User(bob.id.clone()))
            .unwrap()
            .unwrap();

        assert!(matches!(
            mark_read(&conn, &n.id, &bob.id),
            Err(AppError::PermissionDenied)
        ));
        assert!(!get_notification(&conn, &n.id).unwrap().read);

        assert!(mark_read(&conn, &n.id, &alice.id).unwrap().read);
        assert!(mark_read(&conn, &n.id, &alice.id).unwrap().read);
        assert_eq!(unread_count(&conn, &alice.id).unwrap(), 0);
    }

    #[test]
    fn mark_read_unknown_id_is_not_found() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        assert!(matches!(
            mark_read(&conn, "missing", &alice.id),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn unread_only_filters_read_rows() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let target = TargetRef::User(bob.id.clone());
        let n = notify(&conn, &alice.id, Some(&bob.id), VERB_FOLLOWED, &target)
            .unwrap()
            .unwrap();
        notify(&conn, &alice.id, Some(&bob.id), VERB_FOLLOWED, &target).unwrap();
        mark_read(&conn, &n.id, &alice.id).unwrap();

        let unread = list_notifications(&conn, &alice.id, page(1), true).unwrap();
        assert_eq!(unread.count, 1);
        assert!(unread.results.iter().all(|n| !n.read));
    }

    #[test]
    fn resolve_missing_target_is_none() {
        let conn = db::open_in_memory().unwrap();
        let alice = insert_user(&conn, "alice");

        assert!(resolve_target(&conn, &TargetRef::Post("gone".into()))
            .unwrap()
            .is_none());
        assert!(matches!(
            resolve_target(&conn, &TargetRef::User(alice.id.clone())).unwrap(),
            Some(Target::User(u)) if u.id == alice.id
        ));
    }
}
