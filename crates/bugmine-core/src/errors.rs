//! Error types for the bugmine core library.
//!
//! Two kinds of failure flow through the pipeline. [`MinerError`] is fatal:
//! infrastructure or configuration faults that abort the run. [`Skip`]
//! describes an expected per-entity gap (a version without a release tag, a
//! ticket without a fix commit, ...) that is logged, recorded in
//! [`Diagnostics`], and then stepped over.

use serde::Serialize;
use tracing::warn;

/// Top-level fatal error enum for the bugmine core library.
#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("VCS error: {0}")]
    Vcs(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(feature = "python")]
impl From<MinerError> for pyo3::PyErr {
    fn from(err: MinerError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            MinerError::Config(_) | MinerError::Toml(_) => PyValueError::new_err(err.to_string()),
            MinerError::Parse(_) | MinerError::Json(_) => PyValueError::new_err(err.to_string()),
            MinerError::Io(_) => PyIOError::new_err(err.to_string()),
            MinerError::Tracker(_) | MinerError::Http(_) => PyIOError::new_err(err.to_string()),
            MinerError::Vcs(_) | MinerError::Git(_) | MinerError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}

pub type MinerResult<T> = Result<T, MinerError>;

// ---------------------------------------------------------------------------
// Expected gaps
// ---------------------------------------------------------------------------

/// An expected, non-fatal mining gap. The offending entity is dropped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Skip {
    #[error("version {version} has no release tag {tag}")]
    MissingReleaseTag { version: String, tag: String },

    #[error("no commit references ticket {ticket}")]
    NoFixCommit { ticket: String },

    #[error("no version contains fix commit {commit} of ticket {ticket}")]
    NoFixVersion { ticket: String, commit: String },

    #[error("no version was released after ticket {ticket} was opened")]
    NoOpeningVersion { ticket: String },

    #[error("ticket {ticket} was opened in {opening}, after its fix version {fix}")]
    OpenedAfterFix {
        ticket: String,
        opening: String,
        fix: String,
    },

    #[error("ticket {ticket} has injected version {injected} not before fix version {fix}")]
    InjectedNotBeforeFix {
        ticket: String,
        injected: String,
        fix: String,
    },

    #[error("ticket {ticket} has no injected version")]
    NoInjectedVersion { ticket: String },

    #[error("ticket {ticket} cannot be labeled: {reason}")]
    Unlabelable { ticket: String, reason: String },

    #[error("file {path} could not be parsed")]
    Unparsable { path: String },
}

impl Skip {
    /// Short machine-friendly category, stored alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            Skip::MissingReleaseTag { .. } => "missing_release_tag",
            Skip::NoFixCommit { .. } => "no_fix_commit",
            Skip::NoFixVersion { .. } => "no_fix_version",
            Skip::NoOpeningVersion { .. } => "no_opening_version",
            Skip::OpenedAfterFix { .. } => "opened_after_fix",
            Skip::InjectedNotBeforeFix { .. } => "injected_not_before_fix",
            Skip::NoInjectedVersion { .. } => "no_injected_version",
            Skip::Unlabelable { .. } => "unlabelable",
            Skip::Unparsable { .. } => "unparsable",
        }
    }
}

/// Pipeline stage a diagnostic was raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Versions,
    Extraction,
    Linking,
    Tickets,
    Proportion,
    Labeling,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Versions => "versions",
            Stage::Extraction => "extraction",
            Stage::Linking => "linking",
            Stage::Tickets => "tickets",
            Stage::Proportion => "proportion",
            Stage::Labeling => "labeling",
        }
    }
}

/// One recorded gap.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub category: &'static str,
    pub message: String,
}

/// Audit trail of every entity the run dropped or stepped over.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the gap at `warn` level and keep it for the dataset.
    pub fn record(&mut self, stage: Stage, skip: Skip) {
        warn!(stage = stage.as_str(), "{skip}");
        self.entries.push(Diagnostic {
            stage,
            category: skip.category(),
            message: skip.to_string(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, category: &str) -> usize {
        self.entries
            .iter()
            .filter(|d| d.category == category)
            .count()
    }
}
