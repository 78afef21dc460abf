//! Jira REST v2 client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{IssueTracker, SearchPage, TrackerIssue, TrackerVersion};
use crate::config::TrackerConfig;
use crate::errors::{MinerError, MinerResult};

/// Format of Jira's `fields.created`, e.g. `2014-06-03T12:51:08.000+0000`.
const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

pub struct JiraClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    name: String,
    #[serde(default)]
    released: bool,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    total: usize,
    #[serde(default)]
    issues: Vec<IssuePayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    key: String,
    #[serde(default)]
    fields: FieldsPayload,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsPayload {
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    versions: Vec<NamedPayload>,
}

#[derive(Debug, Deserialize)]
struct NamedPayload {
    name: String,
}

impl JiraClient {
    pub fn new(config: &TrackerConfig) -> MinerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> MinerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "tracker request");
        let response = self.client.get(&url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(MinerError::Tracker(format!(
                "GET {url} returned {}: {}",
                status.as_u16(),
                message.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json()?)
    }
}

impl IssueTracker for JiraClient {
    fn versions(&self, project_key: &str) -> MinerResult<Vec<TrackerVersion>> {
        let payload: Vec<VersionPayload> = self.get(&format!("/project/{project_key}/versions"), &[])?;
        info!(project = project_key, versions = payload.len(), "fetched tracker versions");
        Ok(payload
            .into_iter()
            .map(|v| TrackerVersion {
                name: v.name,
                released: v.released,
            })
            .collect())
    }

    fn search(&self, jql: &str, start_at: usize, max_results: usize) -> MinerResult<SearchPage> {
        let payload: SearchPayload = self.get(
            "/search",
            &[
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", max_results.to_string()),
                ("fields", "key,created,versions".to_string()),
            ],
        )?;
        Ok(page_from_payload(payload))
    }
}

fn page_from_payload(payload: SearchPayload) -> SearchPage {
    SearchPage {
        total: payload.total,
        issues: payload
            .issues
            .into_iter()
            .map(|issue| TrackerIssue {
                created: issue.fields.created.as_deref().and_then(parse_created),
                affected_versions: issue.fields.versions.into_iter().map(|v| v.name).collect(),
                key: issue.key,
            })
            .collect(),
    }
}

/// Parse a Jira timestamp. Unparsable values yield `None`.
pub fn parse_created(text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_str(text, CREATED_FORMAT) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            debug!(text, error = %e, "unparsable creation date");
            None
        }
    }
}
