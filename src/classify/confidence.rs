//! Calibrated confidence scoring and the needs-review verdict.
//!
//! Starts from a fixed baseline and applies bounded additive adjustments
//! for evidence richness, scoreboard margin, certainty, path-ratio
//! agreement, tag coverage, label agreement, and known-confusable category
//! pairs. The final score is clamped to [0.30, 0.95]; every adjustment is
//! recorded as a named factor so the calibration is auditable.

use crate::config::{ClassificationConfig, RuleSet};
use crate::core::{
    BaseTypeOutcome, Certainty, ChangeType, ConfidenceBand, ConfidenceBreakdown, ConfidenceFactor,
    FeatureVector, ReviewReason,
};

const BASELINE: f64 = 0.52;
const SCORE_FLOOR: f64 = 0.30;
const SCORE_CEIL: f64 = 0.95;

/// Margin below which the top-two race counts as thin.
const THIN_MARGIN: f64 = 0.8;

/// Everything the calculator reads, borrowed from the orchestrator.
pub struct ConfidenceInputs<'a> {
    pub base: &'a BaseTypeOutcome,
    pub final_type: ChangeType,
    pub features: &'a FeatureVector,
    pub capability_tags: &'a [String],
    pub labels: &'a [String],
    /// Length of the combined text-plus-paths blob.
    pub combined_text_len: usize,
    /// True when the intent override changed the final label.
    pub intent_applied: bool,
}

/// Confidence plus the review verdict derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceOutcome {
    pub breakdown: ConfidenceBreakdown,
    pub needs_review: bool,
    pub why_needs_review: Vec<ReviewReason>,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn margin_adjustment(margin: f64) -> f64 {
    if margin >= 2.0 {
        0.18
    } else if margin >= 1.2 {
        0.10
    } else if margin >= 0.8 {
        0.04
    } else if margin >= 0.5 {
        0.0
    } else {
        -0.08
    }
}

fn certainty_adjustment(certainty: Certainty) -> f64 {
    match certainty {
        Certainty::High => 0.18,
        Certainty::Medium => 0.07,
        Certainty::Low => -0.03,
    }
}

/// Count labels agreeing / conflicting with the final label.
fn label_agreement(
    labels: &[String],
    final_type: ChangeType,
    rules: &RuleSet,
) -> (u64, u64) {
    let mut agree = 0u64;
    let mut conflict = 0u64;
    for label in labels {
        let lowered = label.to_lowercase();
        if let Some((_, mapped)) = rules
            .label_type_map
            .iter()
            .find(|(name, _)| *name == lowered)
        {
            if *mapped == final_type {
                agree += 1;
            } else {
                conflict += 1;
            }
        }
    }
    (agree, conflict)
}

/// Compute the confidence score, band, and review verdict.
pub fn compute_confidence(
    inputs: &ConfidenceInputs<'_>,
    rules: &RuleSet,
    config: &ClassificationConfig,
) -> ConfidenceOutcome {
    let base = inputs.base;
    let features = inputs.features;
    let mut factors: Vec<ConfidenceFactor> = Vec::new();
    let mut score = BASELINE;

    let push = |factors: &mut Vec<ConfidenceFactor>, score: &mut f64, name: &str, delta: f64| {
        if delta != 0.0 {
            factors.push(ConfidenceFactor {
                name: name.to_string(),
                delta,
            });
            *score += delta;
        }
    };

    let richness = [
        features.has_description,
        features.label_count > 0,
        features.commit_count > 0,
        features.files_changed > 1,
    ]
    .iter()
    .filter(|present| **present)
    .count();
    push(
        &mut factors,
        &mut score,
        "evidence_richness",
        0.05 * richness as f64,
    );

    if matches!(base.base_type, ChangeType::DocsOnly | ChangeType::TestOnly) {
        push(&mut factors, &mut score, "confident_base_type", 0.16);
    }
    if inputs.final_type != ChangeType::Feature {
        push(&mut factors, &mut score, "non_default_final_type", 0.10);
    }

    push(
        &mut factors,
        &mut score,
        "scoreboard_margin",
        margin_adjustment(base.top_margin),
    );
    push(
        &mut factors,
        &mut score,
        "certainty_level",
        certainty_adjustment(base.certainty),
    );

    let strong_ratio = rules.tuning.strong_ratio;
    if base.base_type == ChangeType::Chore && features.dep_only_change {
        push(&mut factors, &mut score, "dep_only_chore", 0.22);
    }
    if base.base_type == ChangeType::DocsOnly && features.docs_file_ratio >= strong_ratio {
        push(&mut factors, &mut score, "ratio_backed_docs", 0.20);
    }
    if base.base_type == ChangeType::TestOnly && features.test_file_ratio >= strong_ratio {
        push(&mut factors, &mut score, "ratio_backed_tests", 0.18);
    }
    if matches!(base.base_type, ChangeType::DocsOnly | ChangeType::TestOnly)
        && features.code_file_ratio > 0.6
    {
        push(&mut factors, &mut score, "surface_label_conflict", -0.20);
    }

    push(
        &mut factors,
        &mut score,
        "capability_tags",
        (0.04 * inputs.capability_tags.len() as f64).min(0.16),
    );

    if base.top_margin < THIN_MARGIN && base.keyword_evidence.len() >= 3 {
        push(&mut factors, &mut score, "ambiguous_evidence_spread", -0.10);
    }

    let mut conflict_penalized = false;
    if let Some(runner_up) = base.runner_up {
        if base.top_margin < 1.0 {
            for pair in &rules.conflict_pairs {
                if !pair.matches(base.base_type, runner_up) {
                    continue;
                }
                let exempt = pair
                    .exempt_margin
                    .map(|m| base.top_margin >= m)
                    .unwrap_or(false);
                if !exempt {
                    push(&mut factors, &mut score, "conflict_pair", -pair.penalty);
                    conflict_penalized = true;
                }
                break;
            }
        }
    }

    let (agree, conflict) = label_agreement(inputs.labels, inputs.final_type, rules);
    push(
        &mut factors,
        &mut score,
        "label_agreement",
        (0.04 * agree as f64).min(0.08),
    );
    push(
        &mut factors,
        &mut score,
        "label_conflict",
        -(0.04 * conflict as f64).min(0.12),
    );

    if base.base_type == ChangeType::Feature
        && inputs.capability_tags.is_empty()
        && features.files_changed <= 1
        && inputs.combined_text_len < 80
    {
        push(&mut factors, &mut score, "thin_feature_signal", -0.08);
    }
    if inputs.intent_applied {
        push(&mut factors, &mut score, "infra_intent_override", 0.06);
    }
    if !features.has_description && features.label_count == 0 && features.commit_count == 0 {
        push(&mut factors, &mut score, "signal_absence", -0.08);
    }

    let raw_score = score;
    let final_score = round3(score.clamp(SCORE_FLOOR, SCORE_CEIL));

    let low_floor = (config.needs_review_threshold - 0.10).clamp(0.45, 0.80);
    let band = if final_score >= 0.80 {
        ConfidenceBand::High
    } else if final_score < low_floor {
        ConfidenceBand::Low
    } else {
        ConfidenceBand::Medium
    };

    let needs_review = final_score < config.needs_review_threshold;
    let mut why_needs_review = Vec::new();
    if needs_review {
        if base.top_margin < THIN_MARGIN {
            why_needs_review.push(ReviewReason::LowTop2Margin);
        }
        if conflict_penalized {
            why_needs_review.push(ReviewReason::ConflictingClassSignals);
        }
        if conflict > 0 {
            why_needs_review.push(ReviewReason::ConflictingLabels);
        }
        if !features.has_description {
            why_needs_review.push(ReviewReason::MissingDescription);
        }
        if why_needs_review.is_empty() {
            why_needs_review.push(ReviewReason::CompositeLowConfidence);
        }
    }

    ConfidenceOutcome {
        breakdown: ConfidenceBreakdown {
            baseline: BASELINE,
            factors,
            raw_score,
            score: final_score,
            band,
            conflict_penalized,
            label_agreement_count: agree,
            label_disagreement_count: conflict,
        },
        needs_review,
        why_needs_review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base_outcome(
        base_type: ChangeType,
        margin: f64,
        certainty: Certainty,
        runner_up: Option<ChangeType>,
    ) -> BaseTypeOutcome {
        BaseTypeOutcome {
            base_type,
            rule: "weighted_scoreboard".to_string(),
            certainty,
            top_margin: margin,
            scoreboard: BTreeMap::new(),
            keyword_evidence: BTreeMap::new(),
            runner_up,
        }
    }

    fn features() -> FeatureVector {
        FeatureVector {
            churn: 100,
            files_changed: 3,
            additions: 80,
            deletions: 20,
            commit_count: 2,
            review_comment_count: 0,
            review_thread_count: 0,
            unresolved_thread_count: 0,
            pipeline_failed_count: 0,
            infra_ticket_match_count: 0,
            infra_keyword_score: 0.0,
            infra_label_match_count: 0,
            infra_signal_score: 0.0,
            infra_signal_level: crate::core::InfraSignalLevel::None,
            matched_infra_tickets: vec![],
            matched_infra_keywords: vec![],
            matched_infra_labels: vec![],
            docs_file_ratio: 0.0,
            test_file_ratio: 0.0,
            dep_file_ratio: 0.0,
            infra_file_ratio: 0.0,
            code_file_ratio: 1.0,
            dep_only_change: false,
            has_description: true,
            label_count: 1,
        }
    }

    fn compute(inputs: &ConfidenceInputs<'_>) -> ConfidenceOutcome {
        compute_confidence(
            inputs,
            &RuleSet::default(),
            &ClassificationConfig::default(),
        )
    }

    #[test]
    fn test_score_is_always_bounded() {
        // Everything negative at once still stays at the floor.
        let base = base_outcome(
            ChangeType::Feature,
            0.1,
            Certainty::Low,
            Some(ChangeType::Bugfix),
        );
        let mut poor = features();
        poor.has_description = false;
        poor.label_count = 0;
        poor.commit_count = 0;
        poor.files_changed = 1;
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::Feature,
            features: &poor,
            capability_tags: &[],
            labels: &[],
            combined_text_len: 20,
            intent_applied: false,
        });
        assert!(outcome.breakdown.score >= SCORE_FLOOR);
        assert!(outcome.breakdown.score <= SCORE_CEIL);
        assert!(outcome.needs_review);
    }

    #[test]
    fn test_strong_template_outcome_scores_high() {
        let base = BaseTypeOutcome {
            base_type: ChangeType::DocsOnly,
            rule: "all_changed_files_are_docs".to_string(),
            certainty: Certainty::High,
            top_margin: 10.0,
            scoreboard: BTreeMap::new(),
            keyword_evidence: BTreeMap::new(),
            runner_up: None,
        };
        let mut docs = features();
        docs.docs_file_ratio = 1.0;
        docs.code_file_ratio = 0.0;
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::DocsOnly,
            features: &docs,
            capability_tags: &[],
            labels: &["documentation".to_string()],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert!(outcome.breakdown.score >= 0.90);
        assert_eq!(outcome.breakdown.band, ConfidenceBand::High);
        assert!(!outcome.needs_review);
        assert!(outcome.why_needs_review.is_empty());
    }

    #[test]
    fn test_conflict_pair_penalty_applies_below_margin_one() {
        let base = base_outcome(
            ChangeType::Feature,
            0.4,
            Certainty::Low,
            Some(ChangeType::Refactor),
        );
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::Feature,
            features: &features(),
            capability_tags: &[],
            labels: &[],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert!(outcome.breakdown.conflict_penalized);
        assert!(outcome
            .breakdown
            .factors
            .iter()
            .any(|f| f.name == "conflict_pair" && (f.delta + 0.09).abs() < 1e-9));
    }

    #[test]
    fn test_bugfix_feature_pair_exempt_at_point_75() {
        let base = base_outcome(
            ChangeType::Bugfix,
            0.8,
            Certainty::Low,
            Some(ChangeType::Feature),
        );
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::Bugfix,
            features: &features(),
            capability_tags: &[],
            labels: &[],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert!(!outcome.breakdown.conflict_penalized);

        let thin = base_outcome(
            ChangeType::Bugfix,
            0.5,
            Certainty::Low,
            Some(ChangeType::Feature),
        );
        let outcome = compute(&ConfidenceInputs {
            base: &thin,
            final_type: ChangeType::Bugfix,
            features: &features(),
            capability_tags: &[],
            labels: &[],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert!(outcome.breakdown.conflict_penalized);
    }

    #[test]
    fn test_label_conflict_counts_and_reason() {
        let base = base_outcome(
            ChangeType::Bugfix,
            0.6,
            Certainty::Low,
            Some(ChangeType::Feature),
        );
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::Bugfix,
            features: &features(),
            capability_tags: &[],
            labels: &["feature".to_string(), "bug".to_string()],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert_eq!(outcome.breakdown.label_agreement_count, 1);
        assert_eq!(outcome.breakdown.label_disagreement_count, 1);
        assert!(outcome.needs_review);
        assert_eq!(
            outcome.why_needs_review,
            vec![
                ReviewReason::LowTop2Margin,
                ReviewReason::ConflictingClassSignals,
                ReviewReason::ConflictingLabels,
            ]
        );
    }

    #[test]
    fn test_surface_label_conflict_penalty() {
        let base = base_outcome(ChangeType::DocsOnly, 1.5, Certainty::Medium, None);
        let mut mismatched = features();
        mismatched.code_file_ratio = 0.9;
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::DocsOnly,
            features: &mismatched,
            capability_tags: &[],
            labels: &[],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert!(outcome
            .breakdown
            .factors
            .iter()
            .any(|f| f.name == "surface_label_conflict"));
    }

    #[test]
    fn test_composite_reason_when_nothing_specific_applies() {
        // Medium-margin feature with description: below threshold but with
        // no specific reason code.
        let base = base_outcome(
            ChangeType::Feature,
            0.9,
            Certainty::Low,
            Some(ChangeType::Chore),
        );
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::Feature,
            features: &features(),
            capability_tags: &[],
            labels: &[],
            combined_text_len: 200,
            intent_applied: false,
        });
        assert!(outcome.needs_review);
        assert_eq!(
            outcome.why_needs_review,
            vec![ReviewReason::CompositeLowConfidence]
        );
    }

    #[test]
    fn test_needs_review_tracks_threshold_exactly() {
        let base = base_outcome(ChangeType::DocsOnly, 10.0, Certainty::High, None);
        let mut docs = features();
        docs.docs_file_ratio = 1.0;
        docs.code_file_ratio = 0.0;
        let outcome = compute(&ConfidenceInputs {
            base: &base,
            final_type: ChangeType::DocsOnly,
            features: &docs,
            capability_tags: &[],
            labels: &[],
            combined_text_len: 120,
            intent_applied: false,
        });
        assert_eq!(
            outcome.needs_review,
            outcome.breakdown.score < ClassificationConfig::default().needs_review_threshold
        );
    }
}
