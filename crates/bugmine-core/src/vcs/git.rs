//! `git2` implementation of [`VersionControl`].

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Delta, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use tracing::{debug, info};

use super::{CommitInfo, FileDiff, SourceFile, VersionControl};
use crate::errors::{MinerError, MinerResult};
use crate::extractor::SourceFilter;

/// A local git repository. The handle is released when this value drops.
pub struct GitRepository {
    repo: Repository,
    branch: String,
}

impl GitRepository {
    pub fn open(path: &Path, branch: &str) -> MinerResult<Self> {
        let repo = Repository::open(path).map_err(|e| {
            MinerError::Vcs(format!("{} is not a git repository: {e}", path.display()))
        })?;
        Ok(Self {
            repo,
            branch: branch.to_string(),
        })
    }

    /// Open `path`, cloning `remote_url` into it first when it holds no repository.
    pub fn open_or_clone(path: &Path, remote_url: Option<&str>, branch: &str) -> MinerResult<Self> {
        if let Some(url) = remote_url {
            if Repository::open(path).is_err() {
                info!(url, path = %path.display(), branch, "cloning repository");
                let repo = git2::build::RepoBuilder::new()
                    .branch(branch)
                    .clone(url, path)
                    .map_err(|e| MinerError::Vcs(format!("Failed to clone {url}: {e}")))?;
                return Ok(Self {
                    repo,
                    branch: branch.to_string(),
                });
            }
        }
        Self::open(path, branch)
    }

    fn commit(&self, hash: &str) -> MinerResult<git2::Commit<'_>> {
        let oid = Oid::from_str(hash)?;
        Ok(self.repo.find_commit(oid)?)
    }

    fn tree_for(&self, hash: &str) -> MinerResult<git2::Tree<'_>> {
        Ok(self.commit(hash)?.tree()?)
    }

    /// Tip of the configured branch, local first, then `origin`.
    fn branch_tip(&self) -> MinerResult<Oid> {
        for name in [
            format!("refs/heads/{}", self.branch),
            format!("refs/remotes/origin/{}", self.branch),
        ] {
            match self.repo.find_reference(&name) {
                Ok(reference) => {
                    debug!(reference = %name, "walking branch");
                    return Ok(reference.peel_to_commit()?.id());
                }
                Err(e) if is_missing(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(MinerError::Vcs(format!(
            "branch {} not found locally or on origin",
            self.branch
        )))
    }
}

fn timestamp(seconds: i64) -> MinerResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| MinerError::Vcs(format!("commit time {seconds} out of range")))
}

fn is_missing(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec)
}

impl VersionControl for GitRepository {
    fn resolve_tag(&self, tag: &str) -> MinerResult<Option<String>> {
        let reference = match self.repo.find_reference(&format!("refs/tags/{tag}")) {
            Ok(reference) => reference,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // A tag may name a tree or blob; such a version has no release commit.
        match reference.peel_to_commit() {
            Ok(commit) => Ok(Some(commit.id().to_string())),
            Err(e) if is_missing(&e) => {
                debug!(tag, error = %e, "tag does not name a commit");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn commit_time(&self, hash: &str) -> MinerResult<DateTime<Utc>> {
        timestamp(self.commit(hash)?.time().seconds())
    }

    fn log(&self) -> MinerResult<Vec<CommitInfo>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(self.branch_tip()?)?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitInfo {
                hash: commit.id().to_string(),
                message: commit.message().unwrap_or("").to_string(),
                timestamp: timestamp(commit.time().seconds())?,
                parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            });
        }
        Ok(commits)
    }

    fn diff(
        &self,
        parent: Option<&str>,
        commit: &str,
        filter: &SourceFilter,
    ) -> MinerResult<Vec<FileDiff>> {
        let new_tree = self.tree_for(commit)?;
        let old_tree = parent.map(|p| self.tree_for(p)).transpose()?;

        let mut options = DiffOptions::new();
        options.context_lines(0);
        let diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut options))?;

        let mut out = Vec::new();
        for idx in 0..diff.deltas().count() {
            let Some(delta) = diff.get_delta(idx) else {
                continue;
            };
            if delta.status() == Delta::Deleted {
                continue;
            }
            let Some(new_path) = delta.new_file().path().map(|p| p.to_string_lossy().into_owned()) else {
                continue;
            };
            if !filter.accepts(&new_path) {
                continue;
            }
            let Some(patch) = git2::Patch::from_diff(&diff, idx)? else {
                continue;
            };
            let mut edited_lines = Vec::new();
            for hunk_idx in 0..patch.num_hunks() {
                let (hunk, _) = patch.hunk(hunk_idx)?;
                edited_lines.extend(hunk.new_start()..hunk.new_start() + hunk.new_lines());
            }
            out.push(FileDiff {
                old_path: delta
                    .old_file()
                    .path()
                    .filter(|_| delta.status() != Delta::Added)
                    .map(|p| p.to_string_lossy().into_owned()),
                new_path,
                edited_lines,
            });
        }
        Ok(out)
    }

    fn tree_at(&self, commit: &str, filter: &SourceFilter) -> MinerResult<Vec<SourceFile>> {
        let tree = self.tree_for(commit)?;
        let mut entries: Vec<(String, Oid)> = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    let path = format!("{root}{name}");
                    if filter.accepts(&path) {
                        entries.push((path, entry.id()));
                    }
                }
            }
            TreeWalkResult::Ok
        })?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut files = Vec::with_capacity(entries.len());
        for (path, oid) in entries {
            let blob = self.repo.find_blob(oid)?;
            files.push(SourceFile {
                path,
                contents: String::from_utf8_lossy(blob.content()).into_owned(),
            });
        }
        Ok(files)
    }

    fn file_at(&self, commit: &str, path: &str) -> MinerResult<Option<String>> {
        let tree = self.tree_for(commit)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }
}
