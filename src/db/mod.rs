pub mod models;
pub mod time;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_social_graph",
        include_str!("../../migrations/002_social_graph.sql"),
    ),
    (
        "003_notifications",
        include_str!("../../migrations/003_notifications.sql"),
    ),
];

/// Per-connection settings. `foreign_keys` is connection scoped in SQLite,
/// so every pooled connection gets it, not just the first.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

pub fn create_pool(db_path: &Path, config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let busy_timeout = config.busy_timeout();
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(move |conn| configure_connection(conn, busy_timeout));
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(config.connect_timeout())
        .build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;
    migrate(&conn)?;
    tracing::info!("Database migrations complete");
    Ok(())
}

/// Apply any migrations not yet recorded in `schema_version`.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    Ok(())
}

/// Fresh in-memory database with the schema applied. Used by tests.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn, Duration::from_millis(5000))?;
    migrate(&conn)?;
    Ok(conn)
}
