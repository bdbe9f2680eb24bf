//! Ownership checks, called at the top of every mutating operation.

use crate::db::models::{Comment, Notification, Post};

pub fn can_delete(post: &Post, requester_id: &str) -> bool {
    post.author_id == requester_id
}

pub fn can_edit(post: &Post, requester_id: &str) -> bool {
    post.author_id == requester_id
}

pub fn can_edit_comment(comment: &Comment, requester_id: &str) -> bool {
    comment.author_id == requester_id
}

pub fn can_mark_read(notification: &Notification, requester_id: &str) -> bool {
    notification.recipient_id == requester_id
}
