//! End-to-end labeling pipeline.
//!
//! Stages run in order, each consuming the previous stage's output:
//! version resolution, method extraction, ticket linking and placement,
//! change analysis, proportion, labeling. Everything is sequential.

pub mod changes;
pub mod labeler;
pub mod linker;
pub mod proportion;
pub mod resolver;
pub mod tickets;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{MinerConfig, ProportionConfig};
use crate::errors::{Diagnostics, MinerResult};
use crate::extractor::{MethodExtractor, SourceFilter};
use crate::models::{Dataset, DatasetSummary, Project, Ticket, Version};
use crate::tracker::{fetch_fixed_bugs, IssueTracker, JiraClient};
use crate::vcs::{CommitInfo, GitRepository, VersionControl};

/// Knobs of one run that are not part of the project identity.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub filter: SourceFilter,
    pub proportion: ProportionConfig,
    pub page_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            filter: SourceFilter::default(),
            proportion: ProportionConfig::default(),
            page_size: 100,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &MinerConfig) -> Self {
        Self {
            filter: SourceFilter::new(
                config.repository.source_extensions.clone(),
                config.repository.test_dir_segments.clone(),
            ),
            proportion: config.proportion.clone(),
            page_size: config.tracker.page_size as usize,
        }
    }
}

/// A fully labeled project with the bookkeeping of the run that produced it.
#[derive(Clone, Debug)]
pub struct MinedProject {
    pub project: Project,
    pub summary: DatasetSummary,
    pub diagnostics: Diagnostics,
}

impl MinedProject {
    pub fn into_dataset(self) -> Dataset {
        Dataset::from_project(&self.project, self.summary, self.diagnostics)
    }
}

/// Run every stage for `project`, filling its versions and tickets.
pub fn mine_project(
    project: Project,
    tracker: &dyn IssueTracker,
    vcs: &dyn VersionControl,
    settings: &PipelineSettings,
) -> MinerResult<MinedProject> {
    let started = Instant::now();
    let mut diagnostics = Diagnostics::new();
    let mut extractor = MethodExtractor::new(settings.filter.clone())?;

    let tracker_versions = tracker.versions(&project.tracker_key)?;
    let resolved = resolver::resolve_versions(
        vcs,
        &tracker_versions,
        &project.release_tag_template,
        &mut diagnostics,
    )?;

    let mut versions: Vec<Version> = Vec::with_capacity(resolved.len());
    for release in resolved {
        let extracted = extractor.extract_methods(vcs, &release.commit, &mut diagnostics)?;
        let mut seen: HashSet<String> = HashSet::with_capacity(extracted.len());
        let mut methods = Vec::with_capacity(extracted.len());
        for method in extracted {
            // The same signature may be declared in two files of one tree.
            if !seen.insert(method.signature.clone()) {
                debug!(version = %release.name, signature = %method.signature, "duplicate signature dropped");
                continue;
            }
            methods.push(method.into_method(&release.name));
        }
        versions.push(release.with_methods(methods));
    }

    let issues = fetch_fixed_bugs(tracker, &project.tracker_key, settings.page_size)?;
    let commits = vcs.log()?;
    let placed = tickets::assemble_tickets(&issues, &versions, &commits, &mut diagnostics)?;

    let by_hash: HashMap<&str, &CommitInfo> = commits.iter().map(|c| (c.hash.as_str(), c)).collect();
    let mut modified_by_commit: HashMap<String, Vec<String>> = HashMap::new();
    let mut analyzed: Vec<Ticket> = Vec::with_capacity(placed.len());
    for ticket in placed {
        let Some(commit) = ticket.fix_commit.as_deref().and_then(|h| by_hash.get(h)) else {
            analyzed.push(ticket);
            continue;
        };
        let signatures = match modified_by_commit.get(&commit.hash) {
            Some(cached) => cached.clone(),
            None => {
                let found = changes::modified_methods(vcs, &mut extractor, commit, &mut diagnostics)?;
                modified_by_commit.insert(commit.hash.clone(), found.clone());
                found
            }
        };
        analyzed.push(Ticket {
            buggy_signatures: signatures,
            ..ticket
        });
    }

    let estimate = proportion::estimate(&analyzed, &versions, &settings.proportion);
    let predicted = proportion::apply_proportion(analyzed, &versions, estimate.value);
    let labelable = tickets::retain_labelable(predicted, &versions, &mut diagnostics);

    let (versions, _stats) = labeler::label_versions(versions, &labelable, &mut diagnostics);

    let summary = DatasetSummary {
        versions_dropped: diagnostics.count("missing_release_tag"),
        tickets_dropped: issues.len() - labelable.len(),
        proportion: estimate.value,
        ..DatasetSummary::default()
    };
    let project = Project {
        versions,
        tickets: labelable,
        ..project
    };
    info!(
        project = %project.name,
        versions = project.versions.len(),
        tickets = project.tickets.len(),
        diagnostics = diagnostics.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline finished"
    );
    Ok(MinedProject {
        project,
        summary,
        diagnostics,
    })
}

/// Build the tracker and repository clients from `config` and mine the project.
pub fn mine_with_config(config: &MinerConfig) -> MinerResult<Dataset> {
    let tracker = JiraClient::new(&config.tracker)?;
    let vcs = GitRepository::open_or_clone(
        &config.repository.path,
        config.repository.remote_url.as_deref(),
        &config.repository.branch,
    )?;
    let project = Project::new(
        config.project_name(),
        config.project.tracker_key.clone(),
        config.repository.path.clone(),
        config.repository.branch.clone(),
        config.repository.release_tag_template.clone(),
    );
    let mined = mine_project(project, &tracker, &vcs, &PipelineSettings::from_config(config))?;
    Ok(mined.into_dataset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProportionStrategy;
    use crate::testing::{issue, FakeRepository, FakeTracker};

    const A_V1: &str = "package demo;

class A {
    int f(int x) {
        return x + 1;
    }

    int g(int y) {
        return y * 2;
    }
}
";

    // g() fixed
    const A_V2: &str = "package demo;

class A {
    int f(int x) {
        return x + 1;
    }

    int g(int y) {
        return y * 3;
    }
}
";

    // f() fixed
    const A_V3: &str = "package demo;

class A {
    int f(int x) {
        return x + 2;
    }

    int g(int y) {
        return y * 3;
    }
}
";

    const F: &str = "demo.A#f(int)";
    const G: &str = "demo.A#g(int)";

    fn repository() -> FakeRepository {
        let file = "src/main/java/demo/A.java";
        FakeRepository::new()
            .with_commit("c0", "initial import", 100, &[], &[(file, A_V1)])
            .with_commit("c1", "Fix BK-2: wrong factor", 150, &["c0"], &[(file, A_V2)])
            .with_commit("c2", "prepare 2.0", 200, &["c1"], &[(file, A_V2)])
            .with_commit("c3", "BK-1 fixed: off by one (fixes BK-1)", 250, &["c2"], &[(file, A_V3)])
            .with_commit("c4", "prepare 3.0", 300, &["c3"], &[(file, A_V3)])
            .with_tag("release-1.0", "c0")
            .with_tag("release-2.0", "c2")
            .with_tag("release-3.0", "c4")
    }

    fn project() -> Project {
        Project::new("demo", "BK", "/tmp/demo", "master", "release-{VERSION}")
    }

    fn buggy(mined: &MinedProject, version: &str, signature: &str) -> bool {
        mined
            .project
            .version(version)
            .and_then(|v| v.method(signature))
            .map(|m| m.buggy)
            .unwrap()
    }

    #[test]
    fn test_scenario_proportion_from_observed_ticket() {
        let tracker = FakeTracker::new()
            .with_versions(&["1.0", "2.0", "3.0", "4.0"])
            .with_issues(vec![issue("BK-1", 95, &[]), issue("BK-2", 90, &["1.0"])]);
        let mined = mine_project(project(), &tracker, &repository(), &PipelineSettings::default()).unwrap();

        assert_eq!(mined.summary.proportion, 1.0);
        let names: Vec<&str> = mined.project.versions.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["1.0", "2.0", "3.0"]);
        assert_eq!(mined.summary.versions_dropped, 1);

        let a = mined.project.tickets.iter().find(|t| t.id == "BK-1").unwrap();
        assert_eq!(a.injected.as_deref(), Some("1.0"));
        assert!(a.injected_inferred);
        assert_eq!(a.fix.as_deref(), Some("3.0"));
        assert_eq!(a.buggy_signatures, vec![F]);

        assert!(buggy(&mined, "1.0", F));
        assert!(buggy(&mined, "2.0", F));
        assert!(!buggy(&mined, "3.0", F));

        assert!(buggy(&mined, "1.0", G));
        assert!(!buggy(&mined, "2.0", G));
        assert!(!buggy(&mined, "3.0", G));
    }

    #[test]
    fn test_fallback_proportion_without_observed_tickets() {
        let tracker = FakeTracker::new()
            .with_versions(&["1.0", "2.0", "3.0"])
            .with_issues(vec![issue("BK-1", 95, &[])]);
        let mined = mine_project(project(), &tracker, &repository(), &PipelineSettings::default()).unwrap();

        assert_eq!(mined.summary.proportion, 0.5);
        // round(2 - 2 * 0.5) = 1
        let a = &mined.project.tickets[0];
        assert_eq!(a.injected.as_deref(), Some("2.0"));
        assert!(!buggy(&mined, "1.0", F));
        assert!(buggy(&mined, "2.0", F));
        assert!(!buggy(&mined, "3.0", F));
    }

    #[test]
    fn test_configured_fallback_and_strategy() {
        let tracker = FakeTracker::new()
            .with_versions(&["1.0", "2.0", "3.0"])
            .with_issues(vec![issue("BK-1", 95, &[])]);
        let settings = PipelineSettings {
            proportion: ProportionConfig {
                strategy: ProportionStrategy::Mean,
                fallback: 1.0,
            },
            ..PipelineSettings::default()
        };
        let mined = mine_project(project(), &tracker, &repository(), &settings).unwrap();
        assert_eq!(mined.project.tickets[0].injected.as_deref(), Some("1.0"));
        assert!(buggy(&mined, "1.0", F));
    }

    #[test]
    fn test_retained_tickets_respect_ordering() {
        let tracker = FakeTracker::new()
            .with_versions(&["1.0", "2.0", "3.0"])
            .with_issues(vec![
                issue("BK-1", 95, &[]),
                issue("BK-2", 90, &["1.0"]),
                issue("BK-3", 90, &[]),
                issue("BK-4", 260, &[]),
            ]);
        let mined = mine_project(project(), &tracker, &repository(), &PipelineSettings::default()).unwrap();
        let versions = &mined.project.versions;
        let index = |name: &Option<String>| {
            crate::models::version_index(versions, name.as_deref().unwrap()).unwrap()
        };
        for ticket in &mined.project.tickets {
            assert!(index(&ticket.opening) <= index(&ticket.fix));
            assert!(index(&ticket.injected) < index(&ticket.fix));
        }
        assert_eq!(mined.summary.tickets_dropped, 2);
        assert_eq!(mined.diagnostics.count("no_fix_commit"), 2);
    }

    #[test]
    fn test_duplicate_signatures_kept_once_per_version() {
        let repo = FakeRepository::new()
            .with_commit(
                "c0",
                "initial import",
                100,
                &[],
                &[
                    ("src/main/java/demo/A.java", A_V1),
                    ("src/main/java/demo/copy/A.java", A_V1),
                ],
            )
            .with_tag("release-1.0", "c0");
        let tracker = FakeTracker::new().with_versions(&["1.0"]);
        let mined = mine_project(project(), &tracker, &repo, &PipelineSettings::default()).unwrap();

        let methods = &mined.project.versions[0].methods;
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().all(|m| m.file_path == "src/main/java/demo/A.java"));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let tracker = FakeTracker::new()
            .with_versions(&["1.0", "2.0", "3.0"])
            .with_issues(vec![issue("BK-1", 95, &[]), issue("BK-2", 90, &["1.0"])]);
        let repo = repository();
        let first = mine_project(project(), &tracker, &repo, &PipelineSettings::default())
            .unwrap()
            .into_dataset();
        let second = mine_project(project(), &tracker, &repo, &PipelineSettings::default())
            .unwrap()
            .into_dataset();
        assert_eq!(first.methods, second.methods);
        assert_eq!(first.tickets, second.tickets);
        assert_eq!(first.summary.buggy_methods, 3);
    }
}
