use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    /// The session token the request authenticated with.
    pub token: String,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let conn = state.db.get()?;
        let user = session::user_for_token(&conn, &token)?.ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            token,
        })
    }
}

/// Token from `Authorization: Token <key>` / `Authorization: Bearer <key>`,
/// falling back to the session cookie.
fn extract_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return value
            .strip_prefix("Token ")
            .or_else(|| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}
