//! SQLite schema DDL and the stored schema version.

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{MinerError, MinerResult};

/// Layout written by this build. A database stamped with another version is
/// refused rather than rewritten.
pub const SCHEMA_VERSION: i32 = 1;

/// Core DDL statements: 7 CREATE TABLE + 4 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (7) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS dataset_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS projects (
        name TEXT PRIMARY KEY,
        tracker_key TEXT NOT NULL,
        branch TEXT NOT NULL,
        release_tag_template TEXT NOT NULL,
        proportion REAL NOT NULL,
        versions_dropped INTEGER NOT NULL DEFAULT 0,
        tickets_dropped INTEGER NOT NULL DEFAULT 0,
        mined_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS versions (
        project TEXT NOT NULL REFERENCES projects(name) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        released BOOLEAN NOT NULL,
        commit_hash TEXT NOT NULL,
        released_at TEXT NOT NULL,
        PRIMARY KEY(project, name)
    );",
    "CREATE TABLE IF NOT EXISTS tickets (
        project TEXT NOT NULL REFERENCES projects(name) ON DELETE CASCADE,
        id TEXT NOT NULL,
        fix_commit TEXT,
        opening_version TEXT,
        fix_version TEXT,
        injected_version TEXT,
        injected_inferred BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY(project, id)
    );",
    "CREATE TABLE IF NOT EXISTS ticket_methods (
        project TEXT NOT NULL,
        ticket_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        signature TEXT NOT NULL,
        PRIMARY KEY(project, ticket_id, position),
        FOREIGN KEY(project, ticket_id) REFERENCES tickets(project, id) ON DELETE CASCADE
    );",
    "CREATE TABLE IF NOT EXISTS methods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project TEXT NOT NULL REFERENCES projects(name) ON DELETE CASCADE,
        version TEXT NOT NULL,
        class_path TEXT NOT NULL,
        signature TEXT NOT NULL,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        loc INTEGER NOT NULL,
        statements INTEGER NOT NULL,
        cyclomatic INTEGER NOT NULL,
        cognitive INTEGER NOT NULL,
        parameters INTEGER NOT NULL,
        fan_out INTEGER NOT NULL,
        deprecated BOOLEAN NOT NULL DEFAULT FALSE,
        body_hash TEXT NOT NULL,
        buggy BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE(project, version, signature)
    );",
    "CREATE TABLE IF NOT EXISTS diagnostics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project TEXT NOT NULL REFERENCES projects(name) ON DELETE CASCADE,
        stage TEXT NOT NULL,
        category TEXT NOT NULL,
        message TEXT NOT NULL
    );",
    // ── indexes (4) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_versions_position ON versions(project, position);",
    "CREATE INDEX IF NOT EXISTS idx_methods_version ON methods(project, version);",
    "CREATE INDEX IF NOT EXISTS idx_methods_buggy ON methods(project, buggy);",
    "CREATE INDEX IF NOT EXISTS idx_diagnostics_category ON diagnostics(project, stage, category);",
];

// ─── Version stamp ──────────────────────────────────────────────────────────

/// Stored schema version, `None` on a database that was never stamped.
pub fn schema_version(conn: &Connection) -> MinerResult<Option<i32>> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM dataset_meta WHERE key = 'schema_version';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    stored
        .map(|value| {
            value
                .parse::<i32>()
                .map_err(|_| MinerError::Config(format!("unreadable schema version {value:?}")))
        })
        .transpose()
}

/// Stamp [`SCHEMA_VERSION`] on a fresh database, or check the existing stamp.
pub fn stamp_schema_version(conn: &Connection) -> MinerResult<()> {
    match schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO dataset_meta(key, value) VALUES('schema_version', ?1);",
                params![SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        Some(SCHEMA_VERSION) => Ok(()),
        Some(found) => Err(MinerError::Config(format!(
            "dataset schema version {found} is not supported (expected {SCHEMA_VERSION})"
        ))),
    }
}
