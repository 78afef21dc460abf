//! SQLite dataset store.
//!
//! Each public method opens its own connection so that the caller never has
//! to manage connection lifetime.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::errors::MinerResult;
use crate::models::{Dataset, MethodRecord, TicketRecord, VersionRecord};
use crate::store::schema;

// ---------------------------------------------------------------------------
// Helper: tilde expansion
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Stored summaries
// ---------------------------------------------------------------------------

/// Headline numbers of one stored project.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredProject {
    pub name: String,
    pub tracker_key: String,
    pub branch: String,
    pub release_tag_template: String,
    pub proportion: f64,
    pub versions: i64,
    pub versions_dropped: i64,
    pub tickets: i64,
    pub tickets_dropped: i64,
    pub methods: i64,
    pub buggy_methods: i64,
    pub diagnostics: i64,
    pub mined_at: String,
}

// ---------------------------------------------------------------------------
// DatasetStore
// ---------------------------------------------------------------------------

pub struct DatasetStore {
    db_path: PathBuf,
}

impl DatasetStore {
    /// Resolve `db_path` and create its parent directories.
    pub fn open(db_path: &Path) -> MinerResult<Self> {
        let expanded = expand_tilde(&db_path.to_string_lossy());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { db_path: resolved })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> MinerResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Create every table and stamp or check the schema version.
    pub fn init_schema(&self) -> MinerResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::stamp_schema_version(&conn)?;
        Ok(())
    }

    /// Replace every stored row of the dataset's project in one transaction.
    pub fn save_dataset(&self, dataset: &Dataset) -> MinerResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let project = &dataset.project.name;

        tx.execute("DELETE FROM projects WHERE name = ?1;", params![project])?;
        tx.execute(
            "INSERT INTO projects ( \
                 name, tracker_key, branch, release_tag_template, proportion, \
                 versions_dropped, tickets_dropped \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                project,
                dataset.project.tracker_key,
                dataset.project.branch,
                dataset.project.release_tag_template,
                dataset.summary.proportion,
                dataset.summary.versions_dropped as i64,
                dataset.summary.tickets_dropped as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO versions (project, position, name, released, commit_hash, released_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for v in &dataset.versions {
                stmt.execute(params![project, v.index, v.name, v.released, v.commit, v.released_at])?;
            }
        }

        {
            let mut ticket_stmt = tx.prepare(
                "INSERT INTO tickets ( \
                     project, id, fix_commit, opening_version, fix_version, \
                     injected_version, injected_inferred \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            let mut method_stmt = tx.prepare(
                "INSERT INTO ticket_methods (project, ticket_id, position, signature) \
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for t in &dataset.tickets {
                ticket_stmt.execute(params![
                    project,
                    t.id,
                    t.fix_commit,
                    t.opening_version,
                    t.fix_version,
                    t.injected_version,
                    t.injected_inferred,
                ])?;
                for (position, signature) in t.buggy_methods.iter().enumerate() {
                    method_stmt.execute(params![project, t.id, position as i64, signature])?;
                }
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO methods ( \
                     project, version, class_path, signature, file_path, start_line, end_line, \
                     loc, statements, cyclomatic, cognitive, parameters, fan_out, deprecated, \
                     body_hash, buggy \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            )?;
            for m in &dataset.methods {
                stmt.execute(params![
                    project,
                    m.version,
                    m.class_path,
                    m.signature,
                    m.file_path,
                    m.start_line,
                    m.end_line,
                    m.loc,
                    m.statements,
                    m.cyclomatic,
                    m.cognitive,
                    m.parameters,
                    m.fan_out,
                    m.deprecated,
                    m.body_hash,
                    m.buggy,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO diagnostics (project, stage, category, message) \
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for d in dataset.diagnostics.entries() {
                stmt.execute(params![project, d.stage.as_str(), d.category, d.message])?;
            }
        }

        tx.commit()?;
        info!(
            project = %project,
            versions = dataset.versions.len(),
            tickets = dataset.tickets.len(),
            methods = dataset.methods.len(),
            db = %self.db_path.display(),
            "dataset saved"
        );
        Ok(())
    }

    pub fn list_projects(&self) -> MinerResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name FROM projects ORDER BY name;")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn load_versions(&self, project: &str) -> MinerResult<Vec<VersionRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT position, name, released, commit_hash, released_at \
             FROM versions WHERE project = ?1 ORDER BY position;",
        )?;
        let rows = stmt
            .query_map(params![project], |row| {
                Ok(VersionRecord {
                    index: row.get(0)?,
                    name: row.get(1)?,
                    released: row.get(2)?,
                    commit: row.get(3)?,
                    released_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_tickets(&self, project: &str) -> MinerResult<Vec<TicketRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, fix_commit, opening_version, fix_version, injected_version, \
                    injected_inferred \
             FROM tickets WHERE project = ?1 ORDER BY rowid;",
        )?;
        let mut tickets = stmt
            .query_map(params![project], |row| {
                Ok(TicketRecord {
                    id: row.get(0)?,
                    fix_commit: row.get(1)?,
                    opening_version: row.get(2)?,
                    fix_version: row.get(3)?,
                    injected_version: row.get(4)?,
                    injected_inferred: row.get(5)?,
                    buggy_methods: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sig_stmt = conn.prepare(
            "SELECT signature FROM ticket_methods \
             WHERE project = ?1 AND ticket_id = ?2 ORDER BY position;",
        )?;
        for ticket in &mut tickets {
            ticket.buggy_methods = sig_stmt
                .query_map(params![project, ticket.id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
        }
        Ok(tickets)
    }

    pub fn load_methods(&self, project: &str) -> MinerResult<Vec<MethodRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT m.version, m.class_path, m.signature, m.file_path, m.start_line, m.end_line, \
                    m.loc, m.statements, m.cyclomatic, m.cognitive, m.parameters, m.fan_out, \
                    m.deprecated, m.body_hash, m.buggy \
             FROM methods m \
             JOIN versions v ON v.project = m.project AND v.name = m.version \
             WHERE m.project = ?1 \
             ORDER BY v.position, m.id;",
        )?;
        let rows = stmt
            .query_map(params![project], |row| {
                Ok(MethodRecord {
                    version: row.get(0)?,
                    class_path: row.get(1)?,
                    signature: row.get(2)?,
                    file_path: row.get(3)?,
                    start_line: row.get(4)?,
                    end_line: row.get(5)?,
                    loc: row.get(6)?,
                    statements: row.get(7)?,
                    cyclomatic: row.get(8)?,
                    cognitive: row.get(9)?,
                    parameters: row.get(10)?,
                    fan_out: row.get(11)?,
                    deprecated: row.get(12)?,
                    body_hash: row.get(13)?,
                    buggy: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Diagnostic counts of a project, grouped by stage and category.
    pub fn summarize_diagnostics(&self, project: &str) -> MinerResult<Vec<(String, String, i64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT stage, category, COUNT(*) FROM diagnostics \
             WHERE project = ?1 GROUP BY stage, category ORDER BY stage, category;",
        )?;
        let rows = stmt
            .query_map(params![project], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_project(&self, project: &str) -> MinerResult<Option<StoredProject>> {
        let conn = self.connect()?;
        let stored = conn
            .query_row(
                "SELECT p.name, p.tracker_key, p.branch, p.release_tag_template, p.proportion, \
                        (SELECT COUNT(*) FROM versions WHERE project = p.name), \
                        p.versions_dropped, \
                        (SELECT COUNT(*) FROM tickets WHERE project = p.name), \
                        p.tickets_dropped, \
                        (SELECT COUNT(*) FROM methods WHERE project = p.name), \
                        (SELECT COUNT(*) FROM methods WHERE project = p.name AND buggy), \
                        (SELECT COUNT(*) FROM diagnostics WHERE project = p.name), \
                        COALESCE(p.mined_at, '') \
                 FROM projects p WHERE p.name = ?1;",
                params![project],
                |row| {
                    Ok(StoredProject {
                        name: row.get(0)?,
                        tracker_key: row.get(1)?,
                        branch: row.get(2)?,
                        release_tag_template: row.get(3)?,
                        proportion: row.get(4)?,
                        versions: row.get(5)?,
                        versions_dropped: row.get(6)?,
                        tickets: row.get(7)?,
                        tickets_dropped: row.get(8)?,
                        methods: row.get(9)?,
                        buggy_methods: row.get(10)?,
                        diagnostics: row.get(11)?,
                        mined_at: row.get(12)?,
                    })
                },
            )
            .optional()?;
        Ok(stored)
    }
}
