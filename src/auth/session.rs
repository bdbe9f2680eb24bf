use chrono::Duration;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;
use crate::db::time;
use crate::error::AppResult;

/// Sessions never outlive ten years, whatever the config says.
const MAX_SESSION_HOURS: u64 = 24 * 365 * 10;

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> AppResult<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let expires_at = time::now() + Duration::hours(hours.min(MAX_SESSION_HOURS) as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, token, time::to_db(&expires_at), time::now_db()],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> AppResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// The user owning an unexpired session, if any.
pub fn user_for_token(conn: &Connection, token: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT u.id, u.username, u.email, u.bio, u.password_hash, u.created_at
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > ?2",
            params![token, time::now_db()],
            User::from_row,
        )
        .optional()?)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
