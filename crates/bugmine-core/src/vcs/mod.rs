//! Version-control boundary consumed by the pipeline.

pub mod git;

use chrono::{DateTime, Utc};

use crate::errors::MinerResult;
use crate::extractor::SourceFilter;

pub use git::GitRepository;

/// One commit of the mined branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub parents: Vec<String>,
}

impl CommitInfo {
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

/// Line-level edits of one file between two commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: Option<String>,
    pub new_path: String,
    /// 1-based lines of the new file touched by the change.
    pub edited_lines: Vec<u32>,
}

/// A file snapshot at some commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub contents: String,
}

/// Read-only access to a repository's tags, history and snapshots.
pub trait VersionControl {
    /// Commit a tag points to, or `None` when the tag does not exist.
    fn resolve_tag(&self, tag: &str) -> MinerResult<Option<String>>;

    fn commit_time(&self, hash: &str) -> MinerResult<DateTime<Utc>>;

    /// Every commit reachable from the configured branch, newest first.
    fn log(&self) -> MinerResult<Vec<CommitInfo>>;

    /// Source files changed from `parent` to `commit`, deleted files excluded.
    /// With no parent every file of `commit` counts as added.
    fn diff(
        &self,
        parent: Option<&str>,
        commit: &str,
        filter: &SourceFilter,
    ) -> MinerResult<Vec<FileDiff>>;

    /// Every source file of the snapshot at `commit`, sorted by path.
    fn tree_at(&self, commit: &str, filter: &SourceFilter) -> MinerResult<Vec<SourceFile>>;

    fn file_at(&self, commit: &str, path: &str) -> MinerResult<Option<String>>;
}
