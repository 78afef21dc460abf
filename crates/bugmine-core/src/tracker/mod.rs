//! Issue-tracker boundary consumed by the pipeline.

pub mod jira;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::MinerResult;

pub use jira::JiraClient;

/// A version as listed by the tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerVersion {
    pub name: String,
    pub released: bool,
}

/// A resolved bug report as returned by a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerIssue {
    pub key: String,
    pub created: Option<DateTime<Utc>>,
    pub affected_versions: Vec<String>,
}

/// One page of search results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPage {
    pub total: usize,
    pub issues: Vec<TrackerIssue>,
}

pub trait IssueTracker {
    fn versions(&self, project_key: &str) -> MinerResult<Vec<TrackerVersion>>;

    fn search(&self, jql: &str, start_at: usize, max_results: usize) -> MinerResult<SearchPage>;
}

/// Query selecting every fixed bug of a project, oldest fix version first.
pub fn fixed_bugs_jql(project_key: &str) -> String {
    format!(
        "project = {project_key} AND issuetype = Bug AND status in (Resolved, Closed) \
         AND resolution = Fixed ORDER BY fixVersion ASC"
    )
}

/// Page through every fixed bug of `project_key`.
///
/// Stops once `total` issues were read or a page comes back empty.
pub fn fetch_fixed_bugs(
    tracker: &dyn IssueTracker,
    project_key: &str,
    page_size: usize,
) -> MinerResult<Vec<TrackerIssue>> {
    let jql = fixed_bugs_jql(project_key);
    let mut issues = Vec::new();
    let mut start_at = 0;
    loop {
        let page = tracker.search(&jql, start_at, page_size)?;
        let count = page.issues.len();
        debug!(start_at, count, total = page.total, "fetched search page");
        issues.extend(page.issues);
        start_at += count;
        if count == 0 || start_at >= page.total {
            break;
        }
    }
    info!(project = project_key, tickets = issues.len(), "fetched fixed bugs");
    Ok(issues)
}
