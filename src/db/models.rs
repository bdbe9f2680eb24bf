use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::db::time;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub bio: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, username, email, bio, password_hash, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            bio: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: time::get(row, 5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub const COLUMNS: &'static str = "id, author_id, title, body, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            created_at: time::get(row, 4)?,
            updated_at: time::get(row, 5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub const COLUMNS: &'static str = "id, post_id, author_id, body, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            body: row.get(3)?,
            created_at: time::get(row, 4)?,
            updated_at: time::get(row, 5)?,
        })
    }
}

/// What a notification points at. Stored as `(target_kind, target_id)`
/// but never read back as an untyped pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetRef {
    Post(String),
    Comment(String),
    User(String),
}

impl TargetRef {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetRef::Post(_) => "post",
            TargetRef::Comment(_) => "comment",
            TargetRef::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TargetRef::Post(id) | TargetRef::Comment(id) | TargetRef::User(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "post" => Some(TargetRef::Post(id)),
            "comment" => Some(TargetRef::Comment(id)),
            "user" => Some(TargetRef::User(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: Option<String>,
    pub verb: String,
    pub target: TargetRef,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub const COLUMNS: &'static str =
        "id, recipient_id, actor_id, verb, target_kind, target_id, is_read, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(4)?;
        let target = TargetRef::from_parts(&kind, row.get(5)?).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown target kind: {kind}").into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            recipient_id: row.get(1)?,
            actor_id: row.get(2)?,
            verb: row.get(3)?,
            target,
            read: row.get(6)?,
            created_at: time::get(row, 7)?,
        })
    }
}
