//! In-memory tracker and repository used by unit tests.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::errors::{MinerError, MinerResult};
use crate::extractor::SourceFilter;
use crate::tracker::{IssueTracker, SearchPage, TrackerIssue, TrackerVersion};
use crate::vcs::{CommitInfo, FileDiff, SourceFile, VersionControl};

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTracker {
    versions: Vec<TrackerVersion>,
    issues: Vec<TrackerIssue>,
    reported_total: Option<usize>,
    search_calls: Cell<usize>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, names: &[&str]) -> Self {
        self.versions = names
            .iter()
            .map(|name| TrackerVersion {
                name: name.to_string(),
                released: true,
            })
            .collect();
        self
    }

    pub fn with_issues(mut self, issues: Vec<TrackerIssue>) -> Self {
        self.issues = issues;
        self
    }

    /// Report a `total` that disagrees with the stored issues.
    pub fn with_reported_total(mut self, total: usize) -> Self {
        self.reported_total = Some(total);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.get()
    }
}

impl IssueTracker for FakeTracker {
    fn versions(&self, _project_key: &str) -> MinerResult<Vec<TrackerVersion>> {
        Ok(self.versions.clone())
    }

    fn search(&self, _jql: &str, start_at: usize, max_results: usize) -> MinerResult<SearchPage> {
        self.search_calls.set(self.search_calls.get() + 1);
        let start = start_at.min(self.issues.len());
        let end = (start + max_results).min(self.issues.len());
        Ok(SearchPage {
            total: self.reported_total.unwrap_or(self.issues.len()),
            issues: self.issues[start..end].to_vec(),
        })
    }
}

pub fn issue(key: &str, created: i64, affected: &[&str]) -> TrackerIssue {
    TrackerIssue {
        key: key.to_string(),
        created: Some(at(created)),
        affected_versions: affected.iter().map(|v| v.to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

struct FakeCommit {
    info: CommitInfo,
    files: BTreeMap<String, String>,
}

/// Commits hold full snapshots; diffs compare files line by line.
#[derive(Default)]
pub struct FakeRepository {
    commits: Vec<FakeCommit>,
    tags: HashMap<String, String>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(
        mut self,
        hash: &str,
        message: &str,
        secs: i64,
        parents: &[&str],
        files: &[(&str, &str)],
    ) -> Self {
        self.commits.push(FakeCommit {
            info: CommitInfo {
                hash: hash.to_string(),
                message: message.to_string(),
                timestamp: at(secs),
                parents: parents.iter().map(|p| p.to_string()).collect(),
            },
            files: files
                .iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect(),
        });
        self
    }

    pub fn with_tag(mut self, tag: &str, hash: &str) -> Self {
        self.tags.insert(tag.to_string(), hash.to_string());
        self
    }

    fn find(&self, hash: &str) -> MinerResult<&FakeCommit> {
        self.commits
            .iter()
            .find(|c| c.info.hash == hash)
            .ok_or_else(|| MinerError::Vcs(format!("unknown commit {hash}")))
    }
}

impl VersionControl for FakeRepository {
    fn resolve_tag(&self, tag: &str) -> MinerResult<Option<String>> {
        Ok(self.tags.get(tag).cloned())
    }

    fn commit_time(&self, hash: &str) -> MinerResult<DateTime<Utc>> {
        Ok(self.find(hash)?.info.timestamp)
    }

    fn log(&self) -> MinerResult<Vec<CommitInfo>> {
        let mut commits: Vec<CommitInfo> = self.commits.iter().rev().map(|c| c.info.clone()).collect();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(commits)
    }

    fn diff(
        &self,
        parent: Option<&str>,
        commit: &str,
        filter: &SourceFilter,
    ) -> MinerResult<Vec<FileDiff>> {
        let new = &self.find(commit)?.files;
        let empty = BTreeMap::new();
        let old = match parent {
            Some(p) => &self.find(p)?.files,
            None => &empty,
        };
        let mut out = Vec::new();
        for (path, contents) in new {
            if !filter.accepts(path) {
                continue;
            }
            let previous = old.get(path);
            if previous == Some(contents) {
                continue;
            }
            let old_lines: Vec<&str> = previous.map(|t| t.lines().collect()).unwrap_or_default();
            let edited_lines = contents
                .lines()
                .enumerate()
                .filter(|(i, line)| old_lines.get(*i) != Some(line))
                .map(|(i, _)| i as u32 + 1)
                .collect();
            out.push(FileDiff {
                old_path: previous.map(|_| path.clone()),
                new_path: path.clone(),
                edited_lines,
            });
        }
        Ok(out)
    }

    fn tree_at(&self, commit: &str, filter: &SourceFilter) -> MinerResult<Vec<SourceFile>> {
        Ok(self
            .find(commit)?
            .files
            .iter()
            .filter(|(path, _)| filter.accepts(path))
            .map(|(path, contents)| SourceFile {
                path: path.clone(),
                contents: contents.clone(),
            })
            .collect())
    }

    fn file_at(&self, commit: &str, path: &str) -> MinerResult<Option<String>> {
        Ok(self.find(commit)?.files.get(path).cloned())
    }
}
