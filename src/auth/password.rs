use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    bcrypt::hash(password, cost).map_err(|e| AppError::Internal(format!("bcrypt: {e}")))
}

/// Constant-time check via bcrypt. A malformed stored hash verifies false.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

const DUMMY_PASSWORD: &str = "flock-dummy-password";

/// A real bcrypt hash that belongs to no account, built once per process.
fn dummy_hash(cost: u32) -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| bcrypt::hash(DUMMY_PASSWORD, cost).unwrap_or_default())
}

/// Spend one bcrypt verification on nothing. Login calls this for unknown
/// usernames so they take as long as a wrong password.
pub fn verify_unknown_user(password: &str, cost: u32) {
    std::hint::black_box(verify_password(password, dummy_hash(cost)));
}
