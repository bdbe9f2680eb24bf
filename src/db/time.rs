use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Fixed-width UTC format: lexical order of stored strings equals
/// chronological order, so `ORDER BY created_at` is correct in SQL.
const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Drop precision the stored form cannot hold, so a value handed back to a
/// caller equals the one later read from the row.
pub fn truncate(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

/// Current time at storage precision. Mint every persisted timestamp here.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

pub fn now_db() -> String {
    to_db(&now())
}

pub fn parse_db(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DB_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Read a timestamp column, failing the row mapping on malformed text.
pub fn get(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}
