//! Resolution engine — maps an eGFR score to exactly one staging rule.
//!
//! Policy:
//! 1. Candidates are rules whose `[egfr_low, egfr_high)` contains the score.
//! 2. Among several candidates the lowest stage number wins (the more severe
//!    classification), then the highest revision (most recent write), then
//!    the smallest id.
//! 3. With no candidate the outcome is positional: at or above every upper
//!    bound is `UnmatchedAbove`, below every lower bound is `UnmatchedBelow`,
//!    anything else (including an empty table) is `UnmatchedGap`.
//!
//! The result depends only on the score and the set of rules, never on their
//! order, so resolving the same pair twice yields the same classification.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{ClassificationOutcome, EgfrScore, ResolvedClassification, StagingRule};

pub fn resolve(score: &EgfrScore, rules: &[StagingRule]) -> ResolvedClassification {
    let value = score.value;
    let winner = rules
        .iter()
        .filter(|r| r.contains(value))
        .min_by(|a, b| precedence(a, b));

    let (matched_rule, outcome) = match winner {
        Some(rule) => (Some(rule.clone()), ClassificationOutcome::Matched),
        None => (None, unmatched_position(value, rules)),
    };

    match &matched_rule {
        Some(rule) => tracing::debug!(
            egfr = value,
            rule_id = %rule.id,
            stage = rule.stage,
            "Score resolved to staging rule"
        ),
        None => tracing::warn!(
            egfr = value,
            outcome = outcome.as_str(),
            rules = rules.len(),
            "No staging rule covers score"
        ),
    }

    ResolvedClassification {
        score: *score,
        matched_rule,
        outcome,
    }
}

/// Total order over overlapping candidates; `Less` wins.
fn precedence(a: &StagingRule, b: &StagingRule) -> Ordering {
    a.stage
        .cmp(&b.stage)
        .then_with(|| b.revision.cmp(&a.revision))
        .then_with(|| a.id.cmp(&b.id))
}

fn unmatched_position(value: f64, rules: &[StagingRule]) -> ClassificationOutcome {
    if rules.is_empty() {
        return ClassificationOutcome::UnmatchedGap;
    }
    let min_low = rules.iter().map(|r| r.egfr_low).fold(f64::INFINITY, f64::min);
    let max_high = rules
        .iter()
        .map(|r| r.egfr_high)
        .fold(f64::NEG_INFINITY, f64::max);

    if value >= max_high {
        ClassificationOutcome::UnmatchedAbove
    } else if value < min_low {
        ClassificationOutcome::UnmatchedBelow
    } else {
        ClassificationOutcome::UnmatchedGap
    }
}

// ── Coverage diagnostics ──────────────────────────────────────────────────────

/// Two rules whose intervals intersect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOverlap {
    pub first: uuid::Uuid,
    pub second: uuid::Uuid,
    pub from: f64,
    pub to: f64,
    /// Rule that wins inside the shared interval.
    pub effective: uuid::Uuid,
}

/// An interval between the lowest and highest bound no rule covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGap {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub rule_count: usize,
    pub covered_from: Option<f64>,
    pub covered_to: Option<f64>,
    pub overlaps: Vec<RuleOverlap>,
    pub gaps: Vec<CoverageGap>,
}

/// Describe overlaps and gaps in a rule set for the admin view. Purely
/// informational; writes are never rejected on this basis.
pub fn coverage_report(rules: &[StagingRule]) -> CoverageReport {
    let mut sorted: Vec<&StagingRule> = rules.iter().collect();
    sorted.sort_by(|a, b| {
        a.egfr_low
            .total_cmp(&b.egfr_low)
            .then(a.egfr_high.total_cmp(&b.egfr_high))
            .then(a.id.cmp(&b.id))
    });

    let mut overlaps = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in sorted.iter().skip(i + 1) {
            if b.egfr_low >= a.egfr_high {
                break;
            }
            if a.overlaps(b) {
                let effective = if precedence(a, b) == Ordering::Greater { b.id } else { a.id };
                overlaps.push(RuleOverlap {
                    first: a.id,
                    second: b.id,
                    from: b.egfr_low,
                    to: a.egfr_high.min(b.egfr_high),
                    effective,
                });
            }
        }
    }

    let mut gaps = Vec::new();
    let mut reach: Option<f64> = None;
    for rule in &sorted {
        if let Some(end) = reach {
            if rule.egfr_low > end {
                gaps.push(CoverageGap {
                    from: end,
                    to: rule.egfr_low,
                });
            }
        }
        reach = Some(reach.map_or(rule.egfr_high, |end| end.max(rule.egfr_high)));
    }

    CoverageReport {
        rule_count: rules.len(),
        covered_from: sorted.first().map(|r| r.egfr_low),
        covered_to: reach,
        overlaps,
        gaps,
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn rule(n: u128, stage: u32, low: f64, high: f64, revision: i64) -> StagingRule {
        StagingRule {
            id: Uuid::from_u128(n),
            stage,
            egfr_low: low,
            egfr_high: high,
            lifestyle_advice: String::new(),
            food_advice: String::new(),
            medical_advice: String::new(),
            revision,
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn score(value: f64) -> EgfrScore {
        EgfrScore {
            value,
            computed_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    /// Contiguous rules from 0 upwards, one per (width, stage) pair.
    fn gapless_table() -> impl Strategy<Value = Vec<StagingRule>> {
        prop::collection::vec((1.0..40.0f64, 1u32..=5), 1..8).prop_map(|bands| {
            let mut low = 0.0;
            bands
                .into_iter()
                .enumerate()
                .map(|(i, (width, stage))| {
                    let r = rule(i as u128, stage, low, low + width, 1);
                    low += width;
                    r
                })
                .collect()
        })
    }

    fn upper_bound(rules: &[StagingRule]) -> f64 {
        rules.iter().map(|r| r.egfr_high).fold(f64::NEG_INFINITY, f64::max)
    }

    proptest! {
        /// Inside a gapless table every score matches the one rule containing it
        #[test]
        fn random_partition_matches_containing_rule(
            rules in gapless_table(),
            fraction in 0.0..0.999f64,
        ) {
            let value = fraction * upper_bound(&rules);
            let containing: Vec<_> = rules.iter().filter(|r| r.contains(value)).collect();
            prop_assert_eq!(containing.len(), 1);

            let c = resolve(&score(value), &rules);
            prop_assert_eq!(c.outcome, ClassificationOutcome::Matched);
            prop_assert_eq!(c.matched_rule.map(|r| r.id), Some(containing[0].id));
        }

        /// Rule order never changes the classification
        #[test]
        fn resolution_ignores_rule_order(
            (rules, shuffled) in gapless_table()
                .prop_flat_map(|rules| (Just(rules.clone()), Just(rules).prop_shuffle())),
            value in -20.0..300.0f64,
        ) {
            let s = score(value);
            prop_assert_eq!(resolve(&s, &rules), resolve(&s, &shuffled));
        }

        /// Resolving the same pair twice gives the same answer
        #[test]
        fn resolution_is_idempotent(rules in gapless_table(), value in -20.0..300.0f64) {
            let s = score(value);
            prop_assert_eq!(resolve(&s, &rules), resolve(&s, &rules));
        }

        /// Overlapping candidates resolve to the lowest stage, newest revision
        #[test]
        fn overlap_picks_lowest_stage(
            rules in gapless_table(),
            extra in prop::collection::vec(
                (0.0..200.0f64, 0.5..60.0f64, 1u32..=5, 0i64..4),
                1..5,
            ),
            value in 0.0..250.0f64,
        ) {
            let mut table = rules;
            for (i, (low, width, stage, revision)) in extra.into_iter().enumerate() {
                table.push(rule(100 + i as u128, stage, low, low + width, revision));
            }

            let candidates: Vec<_> = table.iter().filter(|r| r.contains(value)).collect();
            let c = resolve(&score(value), &table);
            match candidates.iter().map(|r| r.stage).min() {
                None => prop_assert!(c.matched_rule.is_none()),
                Some(lowest) => {
                    let newest = candidates
                        .iter()
                        .filter(|r| r.stage == lowest)
                        .map(|r| r.revision)
                        .max();
                    let winner = c.matched_rule.unwrap();
                    prop_assert_eq!(winner.stage, lowest);
                    prop_assert_eq!(Some(winner.revision), newest);
                }
            }
        }

        /// Scores outside the covered span are placed above or below it
        #[test]
        fn uncovered_scores_are_positional(rules in gapless_table(), offset in 0.0..100.0f64) {
            let above = resolve(&score(upper_bound(&rules) + offset), &rules);
            prop_assert_eq!(above.outcome, ClassificationOutcome::UnmatchedAbove);
            prop_assert!(above.matched_rule.is_none());

            let below = resolve(&score(-offset - 0.001), &rules);
            prop_assert_eq!(below.outcome, ClassificationOutcome::UnmatchedBelow);
        }
    }
}
