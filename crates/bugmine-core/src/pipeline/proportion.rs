//! Proportion estimate of the injected version for tickets lacking one.
//!
//! For a ticket with known injected (IV), opening (OV) and fix (FV) version
//! indices, `p = (FV - IV) / (FV - OV)`. The project-wide `p` then predicts
//! `IV = FV - (FV - OV) * p` for the remaining tickets.

use statrs::statistics::{Data, OrderStatistics};
use tracing::info;

use crate::config::{ProportionConfig, ProportionStrategy};
use crate::models::{version_index, Ticket, Version};

/// The value applied to a project and how it was obtained.
#[derive(Clone, Debug, PartialEq)]
pub struct ProportionEstimate {
    pub value: f64,
    pub samples: usize,
    pub fallback_used: bool,
}

/// One ticket's `p`, when its indices satisfy `IV <= OV < FV`.
pub fn proportion_sample(injected: usize, opening: usize, fix: usize) -> Option<f64> {
    if fix == opening || !(injected <= opening && opening < fix) {
        return None;
    }
    Some((fix - injected) as f64 / (fix - opening) as f64)
}

/// Aggregate `samples`, or `None` when there are none.
pub fn aggregate(samples: Vec<f64>, strategy: ProportionStrategy) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let value = match strategy {
        ProportionStrategy::Median => Data::new(samples).median(),
        ProportionStrategy::Mean => {
            use statrs::statistics::Statistics;
            samples.iter().mean()
        }
    };
    Some(value)
}

fn indices(ticket: &Ticket, versions: &[Version]) -> (Option<usize>, Option<usize>, Option<usize>) {
    let find = |name: &Option<String>| name.as_deref().and_then(|n| version_index(versions, n));
    (find(&ticket.injected), find(&ticket.opening), find(&ticket.fix))
}

/// Compute the project-wide `p` from tickets with an observed injected version.
pub fn estimate(tickets: &[Ticket], versions: &[Version], config: &ProportionConfig) -> ProportionEstimate {
    let samples: Vec<f64> = tickets
        .iter()
        .filter(|t| !t.injected_inferred)
        .filter_map(|t| match indices(t, versions) {
            (Some(iv), Some(ov), Some(fv)) => proportion_sample(iv, ov, fv),
            _ => None,
        })
        .collect();
    let count = samples.len();
    let estimate = match aggregate(samples, config.strategy) {
        Some(value) => ProportionEstimate {
            value,
            samples: count,
            fallback_used: false,
        },
        None => ProportionEstimate {
            value: config.fallback,
            samples: 0,
            fallback_used: true,
        },
    };
    info!(
        p = estimate.value,
        samples = estimate.samples,
        fallback = estimate.fallback_used,
        "proportion estimated"
    );
    estimate
}

/// `round(FV - (FV - OV) * p)`, clamped to `[0, version_count)`.
pub fn predict_injected(opening: usize, fix: usize, p: f64, version_count: usize) -> usize {
    let predicted = (fix as f64 - (fix - opening) as f64 * p).round();
    let max = version_count.saturating_sub(1) as f64;
    predicted.clamp(0.0, max) as usize
}

/// Fill in the injected version of every ticket that lacks one.
///
/// Only tickets with `OV < FV` are predicted; the rest are returned as is.
pub fn apply_proportion(tickets: Vec<Ticket>, versions: &[Version], p: f64) -> Vec<Ticket> {
    tickets
        .into_iter()
        .map(|ticket| {
            if ticket.injected.is_some() {
                return ticket;
            }
            match indices(&ticket, versions) {
                (None, Some(ov), Some(fv)) if ov < fv => {
                    let iv = predict_injected(ov, fv, p, versions.len());
                    Ticket {
                        injected: Some(versions[iv].name.clone()),
                        injected_inferred: true,
                        ..ticket
                    }
                }
                _ => ticket,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;

    fn versions(count: usize) -> Vec<Version> {
        (0..count)
            .map(|i| Version {
                name: format!("{}.0", i + 1),
                released: true,
                commit: format!("c{i}"),
                released_at: at(i as i64 * 100),
                methods: Vec::new(),
            })
            .collect()
    }

    fn ticket(id: &str, injected: Option<&str>, opening: &str, fix: &str) -> Ticket {
        Ticket {
            id: id.to_string(),
            injected: injected.map(str::to_string),
            opening: Some(opening.to_string()),
            fix: Some(fix.to_string()),
            ..Ticket::default()
        }
    }

    #[test]
    fn test_proportion_sample_conditions() {
        assert_eq!(proportion_sample(0, 0, 1), Some(1.0));
        assert_eq!(proportion_sample(0, 2, 4), Some(2.0));
        assert_eq!(proportion_sample(1, 1, 1), None);
        assert_eq!(proportion_sample(2, 1, 3), None);
        assert_eq!(proportion_sample(0, 3, 2), None);
    }

    #[test]
    fn test_median_is_robust_to_outliers() {
        let median = aggregate(vec![0.1, 0.2, 0.9], ProportionStrategy::Median).unwrap();
        assert!((median - 0.2).abs() < 1e-12);
        let mean = aggregate(vec![0.1, 0.2, 0.9], ProportionStrategy::Mean).unwrap();
        assert!((mean - 0.4).abs() < 1e-12);
        assert_eq!(aggregate(Vec::new(), ProportionStrategy::Median), None);
    }

    #[test]
    fn test_fallback_when_no_usable_samples() {
        let v = versions(3);
        let tickets = vec![
            ticket("A", None, "1.0", "3.0"),
            ticket("B", Some("2.0"), "2.0", "2.0"),
        ];
        let estimate = estimate(&tickets, &v, &ProportionConfig::default());
        assert_eq!(estimate.value, 0.5);
        assert!(estimate.fallback_used);
        assert_eq!(estimate.samples, 0);
    }

    #[test]
    fn test_inferred_tickets_are_not_samples() {
        let v = versions(3);
        let mut inferred = ticket("A", Some("1.0"), "1.0", "2.0");
        inferred.injected_inferred = true;
        let estimate = estimate(&[inferred], &v, &ProportionConfig::default());
        assert!(estimate.fallback_used);
    }

    #[test]
    fn test_predict_injected_rounds_and_clamps() {
        assert_eq!(predict_injected(0, 2, 1.0, 3), 0);
        assert_eq!(predict_injected(1, 4, 0.5, 5), 3);
        assert_eq!(predict_injected(1, 2, 5.0, 3), 0);
        assert_eq!(predict_injected(0, 2, -1.0, 3), 2);
    }

    #[test]
    fn test_apply_fills_only_missing_injected() {
        let v = versions(3);
        let tickets = vec![
            ticket("A", None, "1.0", "3.0"),
            ticket("B", Some("1.0"), "1.0", "2.0"),
            ticket("C", None, "2.0", "2.0"),
        ];
        let applied = apply_proportion(tickets, &v, 1.0);
        assert_eq!(applied[0].injected.as_deref(), Some("1.0"));
        assert!(applied[0].injected_inferred);
        assert_eq!(applied[1].injected.as_deref(), Some("1.0"));
        assert!(!applied[1].injected_inferred);
        assert_eq!(applied[2].injected, None);
    }
}
