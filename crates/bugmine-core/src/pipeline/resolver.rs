//! Tracker versions to tagged, dated, chronologically ordered releases.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{validate_tag_template, VERSION_PLACEHOLDER};
use crate::errors::{Diagnostics, MinerError, MinerResult, Skip, Stage};
use crate::models::{compare_version_names, Method, Version};
use crate::tracker::TrackerVersion;
use crate::vcs::VersionControl;

/// A version whose release tag was found, before its methods are extracted.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedVersion {
    pub name: String,
    pub released: bool,
    pub commit: String,
    pub released_at: DateTime<Utc>,
}

impl ResolvedVersion {
    pub fn with_methods(self, methods: Vec<Method>) -> Version {
        Version {
            name: self.name,
            released: self.released,
            commit: self.commit,
            released_at: self.released_at,
            methods,
        }
    }
}

/// Release tag name of `version` under `template`.
pub fn tag_for(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}

/// Resolve each tracker version to its tag commit and sort the survivors.
///
/// Versions without a tag are dropped and recorded. Ties in release time are
/// broken by the numeric name order.
pub fn resolve_versions(
    vcs: &dyn VersionControl,
    tracker_versions: &[TrackerVersion],
    template: &str,
    diagnostics: &mut Diagnostics,
) -> MinerResult<Vec<ResolvedVersion>> {
    validate_tag_template(template)?;

    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for version in tracker_versions {
        if !seen.insert(version.name.as_str()) {
            continue;
        }
        let tag = tag_for(template, &version.name);
        let Some(commit) = vcs.resolve_tag(&tag)? else {
            diagnostics.record(
                Stage::Versions,
                Skip::MissingReleaseTag {
                    version: version.name.clone(),
                    tag,
                },
            );
            continue;
        };
        let released_at = vcs.commit_time(&commit)?;
        resolved.push(ResolvedVersion {
            name: version.name.clone(),
            released: version.released,
            commit,
            released_at,
        });
    }

    resolved.sort_by(|a, b| {
        a.released_at
            .cmp(&b.released_at)
            .then_with(|| compare_version_names(&a.name, &b.name))
    });

    if resolved.is_empty() {
        return Err(MinerError::Config(format!(
            "none of {} tracker versions has a release tag matching {template:?}",
            tracker_versions.len()
        )));
    }
    info!(
        resolved = resolved.len(),
        dropped = tracker_versions.len() - resolved.len(),
        "resolved release tags"
    );
    Ok(resolved)
}
