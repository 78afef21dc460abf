//! Placing tickets on the version timeline.
//!
//! Every function here takes a chronologically sorted version list and
//! returns positions in it.

use chrono::{DateTime, Utc};

use super::linker::TicketLinker;
use crate::errors::{Diagnostics, MinerResult, Skip, Stage};
use crate::models::{compare_version_names, version_index, Ticket, Version};
use crate::tracker::TrackerIssue;
use crate::vcs::CommitInfo;

/// First version released at or after `created`.
pub fn opening_version(versions: &[Version], created: DateTime<Utc>) -> Option<usize> {
    versions.iter().position(|v| v.released_at >= created)
}

/// Version whose tag is `commit`, else the first one released after it.
pub fn fix_version(versions: &[Version], commit: &CommitInfo) -> Option<usize> {
    versions
        .iter()
        .position(|v| v.commit == commit.hash)
        .or_else(|| versions.iter().position(|v| v.released_at > commit.timestamp))
}

/// Earliest affected version, by name order, that the project knows.
pub fn observed_injected(versions: &[Version], affected: &[String]) -> Option<usize> {
    let mut names: Vec<&String> = affected.iter().collect();
    names.sort_by(|a, b| compare_version_names(a, b));
    names.iter().find_map(|name| version_index(versions, name))
}

/// Link each issue to its fix commit and assign opening, fix and observed
/// injected versions. Issues that cannot be placed are recorded and dropped.
pub fn assemble_tickets(
    issues: &[TrackerIssue],
    versions: &[Version],
    commits: &[CommitInfo],
    diagnostics: &mut Diagnostics,
) -> MinerResult<Vec<Ticket>> {
    let linker = TicketLinker::new(commits);
    let mut tickets = Vec::with_capacity(issues.len());
    for issue in issues {
        let Some(link) = linker.link(&issue.key)? else {
            diagnostics.record(
                Stage::Linking,
                Skip::NoFixCommit {
                    ticket: issue.key.clone(),
                },
            );
            continue;
        };
        match place_ticket(issue, versions, link.commit) {
            Ok(ticket) => tickets.push(ticket),
            Err((stage, skip)) => diagnostics.record(stage, skip),
        }
    }
    Ok(tickets)
}

fn place_ticket(
    issue: &TrackerIssue,
    versions: &[Version],
    fix_commit: &CommitInfo,
) -> Result<Ticket, (Stage, Skip)> {
    let id = issue.key.clone();
    let fix = fix_version(versions, fix_commit).ok_or_else(|| {
        (
            Stage::Tickets,
            Skip::NoFixVersion {
                ticket: id.clone(),
                commit: fix_commit.hash.clone(),
            },
        )
    })?;
    let opening = issue
        .created
        .and_then(|created| opening_version(versions, created))
        .ok_or_else(|| (Stage::Tickets, Skip::NoOpeningVersion { ticket: id.clone() }))?;
    if opening > fix {
        return Err((
            Stage::Tickets,
            Skip::OpenedAfterFix {
                ticket: id,
                opening: versions[opening].name.clone(),
                fix: versions[fix].name.clone(),
            },
        ));
    }
    let injected = observed_injected(versions, &issue.affected_versions);
    if let Some(injected) = injected.filter(|i| *i >= fix) {
        return Err((
            Stage::Tickets,
            Skip::InjectedNotBeforeFix {
                ticket: id,
                injected: versions[injected].name.clone(),
                fix: versions[fix].name.clone(),
            },
        ));
    }

    Ok(Ticket {
        id,
        created: issue.created,
        affected: issue.affected_versions.clone(),
        fix_commit: Some(fix_commit.hash.clone()),
        opening: Some(versions[opening].name.clone()),
        fix: Some(versions[fix].name.clone()),
        injected: injected.map(|i| versions[i].name.clone()),
        injected_inferred: false,
        buggy_signatures: Vec::new(),
    })
}

/// Keep only tickets with an injected version strictly before the fix.
pub fn retain_labelable(
    tickets: Vec<Ticket>,
    versions: &[Version],
    diagnostics: &mut Diagnostics,
) -> Vec<Ticket> {
    tickets
        .into_iter()
        .filter(|ticket| {
            let fix = ticket.fix.as_deref().and_then(|f| version_index(versions, f));
            let injected = ticket.injected.as_deref().and_then(|i| version_index(versions, i));
            match (injected, fix) {
                (Some(i), Some(f)) if i < f => true,
                (Some(i), Some(f)) => {
                    diagnostics.record(
                        Stage::Proportion,
                        Skip::InjectedNotBeforeFix {
                            ticket: ticket.id.clone(),
                            injected: versions[i].name.clone(),
                            fix: versions[f].name.clone(),
                        },
                    );
                    false
                }
                _ => {
                    diagnostics.record(
                        Stage::Proportion,
                        Skip::NoInjectedVersion {
                            ticket: ticket.id.clone(),
                        },
                    );
                    false
                }
            }
        })
        .collect()
}
