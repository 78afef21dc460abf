//! Ticket to fix-commit linking by commit-message heuristics.

use regex::Regex;

use crate::errors::{MinerError, MinerResult};
use crate::vcs::CommitInfo;

/// How a commit message referenced the ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStrength {
    /// A fix/resolve/close verb followed by the ticket id on the same line.
    Strong,
    /// The ticket id alone, as a whole word.
    Weak,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixLink<'a> {
    pub commit: &'a CommitInfo,
    pub strength: LinkStrength,
}

/// Matches tickets against one branch history.
pub struct TicketLinker<'a> {
    commits: &'a [CommitInfo],
}

fn patterns(ticket_id: &str) -> MinerResult<(Regex, Regex)> {
    let id = regex::escape(&ticket_id.trim().to_uppercase());
    let compile = |pattern: String| {
        Regex::new(&pattern)
            .map_err(|e| MinerError::Config(format!("cannot match ticket id {ticket_id:?}: {e}")))
    };
    let strong = compile(format!(
        r"(?i)\b(fix(?:es|ed)?|resolve(?:s|d)?|close(?:s|d)?)\b.*\b{id}\b"
    ))?;
    let weak = compile(format!(r"(?i)\b{id}\b"))?;
    Ok((strong, weak))
}

impl<'a> TicketLinker<'a> {
    pub fn new(commits: &'a [CommitInfo]) -> Self {
        Self { commits }
    }

    /// Most recent strong match, else most recent weak match.
    ///
    /// Timestamp ties keep the commit seen first in log order. Fails only
    /// when the id is too large to compile into a pattern.
    pub fn link(&self, ticket_id: &str) -> MinerResult<Option<FixLink<'a>>> {
        let (strong, weak) = patterns(ticket_id)?;
        let mut best_strong: Option<&'a CommitInfo> = None;
        let mut best_weak: Option<&'a CommitInfo> = None;

        for commit in self.commits {
            if strong.is_match(&commit.message) && is_newer(commit, best_strong) {
                best_strong = Some(commit);
            }
            if weak.is_match(&commit.message) && is_newer(commit, best_weak) {
                best_weak = Some(commit);
            }
        }

        Ok(best_strong
            .map(|commit| FixLink {
                commit,
                strength: LinkStrength::Strong,
            })
            .or_else(|| {
                best_weak.map(|commit| FixLink {
                    commit,
                    strength: LinkStrength::Weak,
                })
            }))
    }
}

fn is_newer(candidate: &CommitInfo, current: Option<&CommitInfo>) -> bool {
    current.map_or(true, |best| candidate.timestamp > best.timestamp)
}
