//! Run configuration, loaded from a TOML file.
//!
//! Every setting has a default except the tracker project key and the
//! repository path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{MinerError, MinerResult};

/// Placeholder substituted with a version name in the release-tag template.
pub const VERSION_PLACEHOLDER: &str = "{VERSION}";

pub const DEFAULT_TRACKER_URL: &str = "https://issues.apache.org/jira/rest/api/2";

/// Top-level configuration of one mining run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    pub project: ProjectConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    pub repository: RepositoryConfig,

    #[serde(default)]
    pub proportion: ProportionConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// `[project]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name; derived from the repository when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Tracker project key, e.g. `BOOKKEEPER`.
    pub tracker_key: String,
}

/// `[tracker]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_url")]
    pub base_url: String,

    /// Issues requested per search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: default_tracker_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
        }
    }
}

/// `[repository]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Local working copy. Cloned from `remote_url` when missing.
    pub path: PathBuf,

    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_tag_template")]
    pub release_tag_template: String,

    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    #[serde(default = "default_test_segments")]
    pub test_dir_segments: Vec<String>,
}

/// How per-ticket proportion samples are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProportionStrategy {
    Median,
    Mean,
}

/// `[proportion]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ProportionStrategy,

    /// Used when no ticket yields a usable sample.
    #[serde(default = "default_fallback")]
    pub fallback: f64,
}

impl Default for ProportionConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            fallback: default_fallback(),
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

fn default_tracker_url() -> String {
    DEFAULT_TRACKER_URL.to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout() -> u64 {
    60
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_tag_template() -> String {
    "release-{VERSION}".to_string()
}

fn default_source_extensions() -> Vec<String> {
    vec![".java".to_string()]
}

fn default_test_segments() -> Vec<String> {
    vec!["test".to_string(), "tests".to_string()]
}

fn default_strategy() -> ProportionStrategy {
    ProportionStrategy::Median
}

fn default_fallback() -> f64 {
    0.5
}

fn default_database() -> PathBuf {
    PathBuf::from("bugmine.db")
}

impl MinerConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> MinerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> MinerResult<Self> {
        let config: MinerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MinerResult<()> {
        if self.project.tracker_key.trim().is_empty() {
            return Err(MinerError::Config(
                "project.tracker_key must not be empty".to_string(),
            ));
        }
        validate_tag_template(&self.repository.release_tag_template)?;
        if self.tracker.page_size == 0 {
            return Err(MinerError::Config(
                "tracker.page_size must be positive".to_string(),
            ));
        }
        if !self.proportion.fallback.is_finite() || self.proportion.fallback < 0.0 {
            return Err(MinerError::Config(format!(
                "proportion.fallback must be a finite non-negative number, got {}",
                self.proportion.fallback
            )));
        }
        if self.repository.source_extensions.is_empty() {
            return Err(MinerError::Config(
                "repository.source_extensions must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured project name, else one derived from the repository.
    pub fn project_name(&self) -> String {
        if let Some(name) = self.project.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        self.repository
            .remote_url
            .as_deref()
            .and_then(name_from_remote)
            .or_else(|| {
                self.repository
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.project.tracker_key.to_lowercase())
    }
}

pub fn validate_tag_template(template: &str) -> MinerResult<()> {
    if template.is_empty() || !template.contains(VERSION_PLACEHOLDER) {
        return Err(MinerError::Config(format!(
            "release tag template {template:?} must contain {VERSION_PLACEHOLDER}"
        )));
    }
    Ok(())
}

/// Repository name from `https://host/owner/repo(.git)` or `git@host:owner/repo.git`.
pub fn name_from_remote(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
