use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::{TargetRef, User};
use crate::db::time;
use crate::error::{AppError, AppResult};
use crate::social::notifications::{self, VERB_FOLLOWED};

const MAX_USERNAME_LEN: usize = 150;

/// A user plus the sizes of both sides of their follow graph.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub bio: Option<String>,
}

/// Letters, digits and `@ . + - _`, the usual account-name alphabet.
pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits and @/./+/-/_".into(),
        ));
    }
    Ok(())
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    bio: &str,
    password_hash: &str,
) -> AppResult<User> {
    validate_username(username)?;

    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        username: username.to_string(),
        email: email.map(str::to_string),
        bio: bio.to_string(),
        password_hash: password_hash.to_string(),
        created_at: time::now(),
    };
    // The UNIQUE(username) constraint decides races between registrations.
    let inserted = conn.execute(
        "INSERT INTO users (id, username, email, bio, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(username) DO NOTHING",
        params![
            user.id,
            user.username,
            user.email,
            user.bio,
            user.password_hash,
            time::to_db(&user.created_at)
        ],
    )?;
    if inserted == 0 {
        return Err(AppError::Conflict(format!(
            "Username '{username}' is already taken"
        )));
    }

    tracing::info!(user_id = %user.id, username = %user.username, "user created");
    Ok(user)
}

pub fn get_user(conn: &Connection, id: &str) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS),
            params![username],
            User::from_row,
        )
        .optional()?)
}

pub fn profile(conn: &Connection, id: &str) -> AppResult<Profile> {
    let user = get_user(conn, id)?;
    let followers_count = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let following_count = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(Profile {
        user,
        followers_count,
        following_count,
    })
}

/// Users can only edit their own profile, so there is no separate
/// requester argument: `user_id` is the caller.
pub fn update_profile(conn: &Connection, user_id: &str, update: &ProfileUpdate) -> AppResult<User> {
    let mut user = get_user(conn, user_id)?;
    if let Some(email) = &update.email {
        let email = email.trim();
        user.email = if email.is_empty() {
            None
        } else {
            Some(email.to_string())
        };
    }
    if let Some(bio) = &update.bio {
        user.bio = bio.clone();
    }

    conn.execute(
        "UPDATE users SET email = ?1, bio = ?2 WHERE id = ?3",
        params![user.email, user.bio, user.id],
    )?;
    Ok(user)
}

/// Add `target_id` to `follower_id`'s followed set.
///
/// Returns `true` when a new edge was created. Following someone already
/// followed succeeds and returns `false`; only a new edge notifies the
/// target.
pub fn follow(conn: &mut Connection, follower_id: &str, target_id: &str) -> AppResult<bool> {
    if follower_id == target_id {
        return Err(AppError::InvalidOperation(
            "You cannot follow yourself".into(),
        ));
    }
    get_user(conn, target_id)?;

    let tx = conn.transaction()?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
        params![follower_id, target_id, time::now_db()],
    )? > 0;

    if inserted {
        notifications::notify(
            &tx,
            target_id,
            Some(follower_id),
            VERB_FOLLOWED,
            &TargetRef::User(follower_id.to_string()),
        )?;
    }
    tx.commit()?;

    tracing::debug!(follower = %follower_id, target = %target_id, inserted, "follow");
    Ok(inserted)
}

/// Remove the edge if present. Returns whether anything was removed.
pub fn unfollow(conn: &Connection, follower_id: &str, target_id: &str) -> AppResult<bool> {
    get_user(conn, target_id)?;
    let removed = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, target_id],
    )? > 0;
    tracing::debug!(follower = %follower_id, target = %target_id, removed, "unfollow");
    Ok(removed)
}

pub fn is_following(conn: &Connection, follower_id: &str, target_id: &str) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, target_id],
        |row| row.get(0),
    )?)
}

/// Users following `user_id`, ordered by username.
pub fn followers(conn: &Connection, user_id: &str) -> AppResult<Vec<User>> {
    get_user(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.bio, u.password_hash, u.created_at
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.followee_id = ?1
         ORDER BY u.username",
    )?;
    let users = stmt
        .query_map(params![user_id], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Users `user_id` follows, ordered by username.
pub fn following(conn: &Connection, user_id: &str) -> AppResult<Vec<User>> {
    get_user(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.bio, u.password_hash, u.created_at
         FROM follows f JOIN users u ON u.id = f.followee_id
         WHERE f.follower_id = ?1
         ORDER BY u.username",
    )?;
    let users = stmt
        .query_map(params![user_id], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Delete an account and everything it owns.
///
/// Posts go with their comments and likes; the user's own comments, likes,
/// follow edges, sessions and received notifications go too. Notifications
/// the user triggered for others stay, with the actor cleared.
pub fn delete_user(conn: &mut Connection, user_id: &str) -> AppResult<()> {
    get_user(conn, user_id)?;

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        params![user_id],
    )?;
    tx.execute(
        "DELETE FROM likes WHERE post_id IN (SELECT id FROM posts WHERE author_id = ?1)",
        params![user_id],
    )?;
    tx.execute("DELETE FROM posts WHERE author_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM comments WHERE author_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM likes WHERE user_id = ?1", params![user_id])?;
    tx.execute(
        "DELETE FROM follows WHERE follower_id = ?1 OR followee_id = ?1",
        params![user_id],
    )?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    tx.execute(
        "DELETE FROM notifications WHERE recipient_id = ?1",
        params![user_id],
    )?;
    tx.execute(
        "UPDATE notifications SET actor_id = NULL WHERE actor_id = ?1",
        params![user_id],
    )?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    tx.commit()?;

    tracing::info!(user_id = %user_id, "user deleted");
    Ok(())
}
