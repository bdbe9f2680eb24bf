//! Follow graph, posts, feed, likes and notifications.
//!
//! Every operation takes a plain `rusqlite::Connection`; the HTTP layer
//! checks one out of the pool per request. Operations that must be atomic
//! take `&mut Connection` and open their own transaction.

pub mod directory;
pub mod feed;
pub mod likes;
pub mod notifications;
pub mod pagination;
pub mod policy;
pub mod posts;

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    use crate::db::models::User;
    use crate::social::directory;

    pub fn insert_user(conn: &Connection, username: &str) -> User {
        directory::create_user(conn, username, None, "", "not-a-real-hash").unwrap()
    }
}
