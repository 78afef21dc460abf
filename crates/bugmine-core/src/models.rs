//! Shared typed models used across extraction, labeling, and storage layers.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::Diagnostics;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Compute a SHA-256 hex digest of a method body.
pub fn body_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare two version names segment by segment.
///
/// Names are split on `.`; each segment is compared numerically and a missing
/// or non-numeric segment counts as 0, so `"2.0"`, `"2"` and `"2.0.beta"` are
/// all equal.
pub fn compare_version_names(left: &str, right: &str) -> Ordering {
    let left_parts: Vec<&str> = left.split('.').collect();
    let right_parts: Vec<&str> = right.split('.').collect();
    let length = left_parts.len().max(right_parts.len());
    for i in 0..length {
        let a = left_parts.get(i).map_or(0, |s| numeric_segment(s));
        let b = right_parts.get(i).map_or(0, |s| numeric_segment(s));
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn numeric_segment(segment: &str) -> u64 {
    segment.trim().parse().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Size and complexity metrics of one method, computed once at extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MethodMetrics {
    pub loc: u32,
    pub statements: u32,
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub parameters: u32,
    pub fan_out: u32,
    pub deprecated: bool,
}

/// A method observed in one version's snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Method {
    /// `package.Outer.Inner#name(ParamType, ...)`
    pub signature: String,
    /// `<file path>/<class name>`
    pub class_path: String,
    pub file_path: String,
    pub version: String,
    pub start_line: u32,
    pub end_line: u32,
    pub body_hash: String,
    pub metrics: MethodMetrics,
    pub buggy: bool,
}

impl Method {
    /// This method carrying the buggy label.
    pub fn into_buggy(self) -> Method {
        Method { buggy: true, ..self }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A tracker version confirmed by a release tag in the repository.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Version {
    pub name: String,
    pub released: bool,
    pub commit: String,
    pub released_at: DateTime<Utc>,
    pub methods: Vec<Method>,
}

impl Version {
    pub fn method(&self, signature: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.signature == signature)
    }

    pub fn buggy_count(&self) -> usize {
        self.methods.iter().filter(|m| m.buggy).count()
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A resolved bug report and what the pipeline learned about it.
///
/// Version references are version names; their indices are looked up in the
/// project's chronological version list when needed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Ticket {
    pub id: String,
    pub created: Option<DateTime<Utc>>,
    /// Affected version names as reported by the tracker.
    pub affected: Vec<String>,
    pub fix_commit: Option<String>,
    pub opening: Option<String>,
    pub fix: Option<String>,
    pub injected: Option<String>,
    pub injected_inferred: bool,
    pub buggy_signatures: Vec<String>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// The project being mined. Its two collections are filled by the pipeline.
#[derive(Clone, Debug)]
pub struct Project {
    pub name: String,
    pub tracker_key: String,
    pub repository: PathBuf,
    pub branch: String,
    pub release_tag_template: String,
    pub versions: Vec<Version>,
    pub tickets: Vec<Ticket>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        tracker_key: impl Into<String>,
        repository: impl Into<PathBuf>,
        branch: impl Into<String>,
        release_tag_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tracker_key: tracker_key.into(),
            repository: repository.into(),
            branch: branch.into(),
            release_tag_template: release_tag_template.into(),
            versions: Vec::new(),
            tickets: Vec::new(),
        }
    }

    pub fn version_index(&self, name: &str) -> Option<usize> {
        version_index(&self.versions, name)
    }

    pub fn version(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name == name)
    }
}

/// Position of the named version in a chronologically sorted list.
pub fn version_index(versions: &[Version], name: &str) -> Option<usize> {
    versions.iter().position(|v| v.name == name)
}

// ---------------------------------------------------------------------------
// Produced records
// ---------------------------------------------------------------------------

/// Per-version dataset row.
#[cfg_attr(feature = "python", pyo3::pyclass(frozen, get_all))]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VersionRecord {
    pub index: i64,
    pub name: String,
    pub released: bool,
    pub commit: String,
    pub released_at: String,
}

impl VersionRecord {
    pub fn from_version(index: usize, version: &Version) -> Self {
        Self {
            index: index as i64,
            name: version.name.clone(),
            released: version.released,
            commit: version.commit.clone(),
            released_at: version.released_at.to_rfc3339(),
        }
    }
}

/// Per-ticket dataset row.
#[cfg_attr(feature = "python", pyo3::pyclass(frozen, get_all))]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TicketRecord {
    pub id: String,
    pub fix_commit: Option<String>,
    pub opening_version: Option<String>,
    pub fix_version: Option<String>,
    pub injected_version: Option<String>,
    pub injected_inferred: bool,
    pub buggy_methods: Vec<String>,
}

impl From<&Ticket> for TicketRecord {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id.clone(),
            fix_commit: ticket.fix_commit.clone(),
            opening_version: ticket.opening.clone(),
            fix_version: ticket.fix.clone(),
            injected_version: ticket.injected.clone(),
            injected_inferred: ticket.injected_inferred,
            buggy_methods: ticket.buggy_signatures.clone(),
        }
    }
}

/// Per-method dataset row.
#[cfg_attr(feature = "python", pyo3::pyclass(frozen, get_all))]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MethodRecord {
    pub version: String,
    pub class_path: String,
    pub signature: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub loc: i64,
    pub statements: i64,
    pub cyclomatic: i64,
    pub cognitive: i64,
    pub parameters: i64,
    pub fan_out: i64,
    pub deprecated: bool,
    pub body_hash: String,
    pub buggy: bool,
}

impl From<&Method> for MethodRecord {
    fn from(method: &Method) -> Self {
        Self {
            version: method.version.clone(),
            class_path: method.class_path.clone(),
            signature: method.signature.clone(),
            file_path: method.file_path.clone(),
            start_line: i64::from(method.start_line),
            end_line: i64::from(method.end_line),
            loc: i64::from(method.metrics.loc),
            statements: i64::from(method.metrics.statements),
            cyclomatic: i64::from(method.metrics.cyclomatic),
            cognitive: i64::from(method.metrics.cognitive),
            parameters: i64::from(method.metrics.parameters),
            fan_out: i64::from(method.metrics.fan_out),
            deprecated: method.metrics.deprecated,
            body_hash: method.body_hash.clone(),
            buggy: method.buggy,
        }
    }
}

/// Project identity as stored with a dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub name: String,
    pub tracker_key: String,
    pub branch: String,
    pub release_tag_template: String,
}

/// Headline counts of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub versions: usize,
    pub versions_dropped: usize,
    pub tickets: usize,
    pub tickets_dropped: usize,
    pub tickets_inferred: usize,
    pub methods: usize,
    pub buggy_methods: usize,
    pub proportion: f64,
}

impl DatasetSummary {
    pub fn buggy_ratio(&self) -> f64 {
        if self.methods == 0 {
            0.0
        } else {
            self.buggy_methods as f64 / self.methods as f64
        }
    }
}

/// Everything one pipeline run produces.
#[derive(Clone, Debug, Serialize)]
pub struct Dataset {
    pub project: ProjectRecord,
    pub versions: Vec<VersionRecord>,
    pub tickets: Vec<TicketRecord>,
    pub methods: Vec<MethodRecord>,
    pub summary: DatasetSummary,
    pub diagnostics: Diagnostics,
}

impl Dataset {
    /// Flatten a fully labeled project into dataset records.
    pub fn from_project(
        project: &Project,
        mut summary: DatasetSummary,
        diagnostics: Diagnostics,
    ) -> Self {
        let versions: Vec<VersionRecord> = project
            .versions
            .iter()
            .enumerate()
            .map(|(i, v)| VersionRecord::from_version(i, v))
            .collect();
        let tickets: Vec<TicketRecord> = project.tickets.iter().map(TicketRecord::from).collect();
        let methods: Vec<MethodRecord> = project
            .versions
            .iter()
            .flat_map(|v| v.methods.iter().map(MethodRecord::from))
            .collect();

        summary.versions = versions.len();
        summary.tickets = tickets.len();
        summary.tickets_inferred = project.tickets.iter().filter(|t| t.injected_inferred).count();
        summary.methods = methods.len();
        summary.buggy_methods = methods.iter().filter(|m| m.buggy).count();

        Self {
            project: ProjectRecord {
                name: project.name.clone(),
                tracker_key: project.tracker_key.clone(),
                branch: project.branch.clone(),
                release_tag_template: project.release_tag_template.clone(),
            },
            versions,
            tickets,
            methods,
            summary,
            diagnostics,
        }
    }

    pub fn to_json_pretty(&self) -> crate::errors::MinerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
