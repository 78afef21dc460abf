//! Backward propagation of buggy labels over the version timeline.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::errors::{Diagnostics, Skip, Stage};
use crate::models::{version_index, Ticket, Version};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelStats {
    pub tickets_applied: usize,
    pub tickets_skipped: usize,
    pub methods_flagged: usize,
}

/// Flag every method of every ticket's range `[injected, fix)` whose signature
/// the fix commit touched.
///
/// Labels only ever add: a method already buggy stays buggy. Methods absent
/// from a version in the range are skipped.
pub fn label_versions(
    versions: Vec<Version>,
    tickets: &[Ticket],
    diagnostics: &mut Diagnostics,
) -> (Vec<Version>, LabelStats) {
    let mut stats = LabelStats::default();
    let mut targets: HashMap<usize, HashSet<&str>> = HashMap::new();

    for ticket in tickets {
        if ticket.buggy_signatures.is_empty() {
            debug!(ticket = %ticket.id, "no modified methods to label");
            continue;
        }
        let injected = ticket.injected.as_deref().and_then(|n| version_index(&versions, n));
        let fix = ticket.fix.as_deref().and_then(|n| version_index(&versions, n));
        let (iv, fv) = match (injected, fix) {
            (Some(iv), Some(fv)) if iv <= fv => (iv, fv),
            (Some(_), Some(_)) => {
                skip(diagnostics, &mut stats, ticket, "injected version after fix version");
                continue;
            }
            _ => {
                skip(diagnostics, &mut stats, ticket, "injected or fix version unknown");
                continue;
            }
        };
        for index in iv..fv {
            targets
                .entry(index)
                .or_default()
                .extend(ticket.buggy_signatures.iter().map(String::as_str));
        }
        stats.tickets_applied += 1;
    }

    let labeled: Vec<Version> = versions
        .into_iter()
        .enumerate()
        .map(|(index, version)| {
            let Some(signatures) = targets.get(&index) else {
                return version;
            };
            let methods = version
                .methods
                .into_iter()
                .map(|method| {
                    if !method.buggy && signatures.contains(method.signature.as_str()) {
                        stats.methods_flagged += 1;
                        method.into_buggy()
                    } else {
                        method
                    }
                })
                .collect();
            Version { methods, ..version }
        })
        .collect();

    info!(
        applied = stats.tickets_applied,
        skipped = stats.tickets_skipped,
        flagged = stats.methods_flagged,
        "labeled methods"
    );
    (labeled, stats)
}

fn skip(diagnostics: &mut Diagnostics, stats: &mut LabelStats, ticket: &Ticket, reason: &str) {
    stats.tickets_skipped += 1;
    diagnostics.record(
        Stage::Labeling,
        Skip::Unlabelable {
            ticket: ticket.id.clone(),
            reason: reason.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Method, MethodMetrics};
    use crate::testing::at;

    fn method(signature: &str, version: &str) -> Method {
        Method {
            signature: signature.to_string(),
            class_path: "A.java/A".to_string(),
            file_path: "A.java".to_string(),
            version: version.to_string(),
            start_line: 1,
            end_line: 2,
            body_hash: String::new(),
            metrics: MethodMetrics::default(),
            buggy: false,
        }
    }

    fn timeline() -> Vec<Version> {
        ["1.0", "2.0", "3.0", "4.0"]
            .iter()
            .enumerate()
            .map(|(i, name)| Version {
                name: name.to_string(),
                released: true,
                commit: format!("c{i}"),
                released_at: at(i as i64),
                methods: if *name == "2.0" {
                    vec![method("A#g()", name)]
                } else {
                    vec![method("A#f()", name), method("A#g()", name)]
                },
            })
            .collect()
    }

    fn ticket(id: &str, injected: &str, fix: &str, signatures: &[&str]) -> Ticket {
        Ticket {
            id: id.to_string(),
            injected: Some(injected.to_string()),
            fix: Some(fix.to_string()),
            buggy_signatures: signatures.iter().map(|s| s.to_string()).collect(),
            ..Ticket::default()
        }
    }

    fn flags(versions: &[Version], signature: &str) -> Vec<Option<bool>> {
        versions
            .iter()
            .map(|v| v.method(signature).map(|m| m.buggy))
            .collect()
    }

    #[test]
    fn test_range_is_half_open() {
        let mut diagnostics = Diagnostics::new();
        let (labeled, stats) = label_versions(
            timeline(),
            &[ticket("BK-1", "1.0", "4.0", &["A#f()"])],
            &mut diagnostics,
        );
        // 2.0 lacks A#f() and is skipped silently.
        assert_eq!(flags(&labeled, "A#f()"), vec![Some(true), None, Some(true), Some(false)]);
        assert_eq!(flags(&labeled, "A#g()"), vec![Some(false); 4]);
        assert_eq!(stats.methods_flagged, 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_labels_only_add() {
        let mut diagnostics = Diagnostics::new();
        let tickets = [
            ticket("BK-1", "1.0", "3.0", &["A#g()"]),
            ticket("BK-2", "2.0", "4.0", &["A#g()"]),
        ];
        let (labeled, stats) = label_versions(timeline(), &tickets, &mut diagnostics);
        assert_eq!(
            flags(&labeled, "A#g()"),
            vec![Some(true), Some(true), Some(true), Some(false)]
        );
        assert_eq!(stats.methods_flagged, 3);
        assert_eq!(stats.tickets_applied, 2);

        let (relabeled, _) = label_versions(labeled.clone(), &[], &mut diagnostics);
        assert_eq!(relabeled, labeled);
    }

    #[test]
    fn test_invalid_ranges_are_skipped() {
        let mut diagnostics = Diagnostics::new();
        let tickets = [
            ticket("BK-1", "3.0", "2.0", &["A#f()"]),
            ticket("BK-2", "9.9", "2.0", &["A#f()"]),
            ticket("BK-3", "1.0", "2.0", &[]),
        ];
        let (labeled, stats) = label_versions(timeline(), &tickets, &mut diagnostics);
        assert_eq!(stats.tickets_skipped, 2);
        assert_eq!(diagnostics.count("unlabelable"), 2);
        assert!(labeled.iter().all(|v| v.buggy_count() == 0));
    }

    #[test]
    fn test_input_versions_untouched() {
        let original = timeline();
        let mut diagnostics = Diagnostics::new();
        let (labeled, _) = label_versions(
            original.clone(),
            &[ticket("BK-1", "1.0", "2.0", &["A#f()"])],
            &mut diagnostics,
        );
        assert_eq!(original[0].buggy_count(), 0);
        assert_eq!(labeled[0].buggy_count(), 1);
    }
}
