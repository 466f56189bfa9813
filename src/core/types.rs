//! Value types shared across the classification engine and its callers.
//!
//! Everything here is an immutable snapshot or a derived value object:
//! inputs are constructed once by the acquisition/feature layers and read
//! by the engine, outputs are constructed once per classification call.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of change-type labels.
///
/// `final_type` is always a member of this set; there is no escape hatch
/// for ad hoc labels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    Feature,
    Bugfix,
    Refactor,
    TestOnly,
    DocsOnly,
    Chore,
    PerfSecurity,
    Infra,
}

impl ChangeType {
    /// All labels, in canonical order.
    pub const ALL: [ChangeType; 8] = [
        ChangeType::Feature,
        ChangeType::Bugfix,
        ChangeType::Refactor,
        ChangeType::TestOnly,
        ChangeType::DocsOnly,
        ChangeType::Chore,
        ChangeType::PerfSecurity,
        ChangeType::Infra,
    ];

    /// Categories eligible to win the weighted scoreboard. Infra is only
    /// ever assigned through the override paths, never scored directly.
    pub const SCOREBOARD: [ChangeType; 7] = [
        ChangeType::Feature,
        ChangeType::Bugfix,
        ChangeType::Refactor,
        ChangeType::TestOnly,
        ChangeType::DocsOnly,
        ChangeType::Chore,
        ChangeType::PerfSecurity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Feature => "feature",
            ChangeType::Bugfix => "bugfix",
            ChangeType::Refactor => "refactor",
            ChangeType::TestOnly => "test-only",
            ChangeType::DocsOnly => "docs-only",
            ChangeType::Chore => "chore",
            ChangeType::PerfSecurity => "perf-security",
            ChangeType::Infra => "infra",
        }
    }

    pub fn parse(value: &str) -> Option<ChangeType> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative confidence in the label itself, derived from the scoreboard
/// margin. Distinct from the numeric `classification_confidence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Certainty {
    Low,
    Medium,
    High,
}

impl Certainty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Certainty::Low => "low",
            Certainty::Medium => "medium",
            Certainty::High => "high",
        }
    }
}

/// Strength of the weighted infra signal relative to configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfraSignalLevel {
    None,
    Weak,
    Strong,
}

impl InfraSignalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfraSignalLevel::None => "none",
            InfraSignalLevel::Weak => "weak",
            InfraSignalLevel::Strong => "strong",
        }
    }

    pub fn parse(value: &str) -> Option<InfraSignalLevel> {
        match value {
            "none" => Some(InfraSignalLevel::None),
            "weak" => Some(InfraSignalLevel::Weak),
            "strong" => Some(InfraSignalLevel::Strong),
            _ => None,
        }
    }
}

/// Qualitative band for the numeric confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::Low => "low",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<ConfidenceBand> {
        match value {
            "low" => Some(ConfidenceBand::Low),
            "medium" => Some(ConfidenceBand::Medium),
            "high" => Some(ConfidenceBand::High),
            _ => None,
        }
    }
}

/// Ordinal complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplexityLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::VeryLow => "Very Low",
            ComplexityLevel::Low => "Low",
            ComplexityLevel::Medium => "Medium",
            ComplexityLevel::High => "High",
            ComplexityLevel::VeryHigh => "Very High",
        }
    }

    pub fn parse(value: &str) -> Option<ComplexityLevel> {
        match value {
            "Very Low" => Some(ComplexityLevel::VeryLow),
            "Low" => Some(ComplexityLevel::Low),
            "Medium" => Some(ComplexityLevel::Medium),
            "High" => Some(ComplexityLevel::High),
            "Very High" => Some(ComplexityLevel::VeryHigh),
            _ => None,
        }
    }
}

/// Reason codes explaining a needs-review verdict, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    LowTop2Margin,
    ConflictingClassSignals,
    ConflictingLabels,
    MissingDescription,
    CompositeLowConfidence,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewReason::LowTop2Margin => "low_top2_margin",
            ReviewReason::ConflictingClassSignals => "conflicting_class_signals",
            ReviewReason::ConflictingLabels => "conflicting_labels",
            ReviewReason::MissingDescription => "missing_description",
            ReviewReason::CompositeLowConfidence => "composite_low_confidence",
        }
    }
}

/// Immutable view of a merge request as seen by the classifier.
///
/// Never mutated after construction; the acquisition layer builds one per
/// record and the engine only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequestSnapshot {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    /// Concatenated commit-message text, lowercased by the extractor.
    #[serde(default)]
    pub commit_message_text: String,
}

/// A single changed file within a merge request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangedFile {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl ChangedFile {
    pub fn path(path: impl Into<String>) -> Self {
        ChangedFile {
            new_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Effective path: new path when present, else old path.
    pub fn effective_path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("")
    }
}

/// Derived numeric/categorical signals, computed once per snapshot.
///
/// Owned by the caller and passed by reference into the engine. Every
/// field is required; a missing feature is a contract violation surfaced
/// at deserialization time, never silently defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub churn: u64,
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
    pub commit_count: u64,
    pub review_comment_count: u64,
    pub review_thread_count: u64,
    pub unresolved_thread_count: u64,
    pub pipeline_failed_count: u64,
    pub infra_ticket_match_count: u64,
    pub infra_keyword_score: f64,
    pub infra_label_match_count: u64,
    pub infra_signal_score: f64,
    pub infra_signal_level: InfraSignalLevel,
    pub matched_infra_tickets: Vec<String>,
    pub matched_infra_keywords: Vec<String>,
    pub matched_infra_labels: Vec<String>,
    pub docs_file_ratio: f64,
    pub test_file_ratio: f64,
    pub dep_file_ratio: f64,
    pub infra_file_ratio: f64,
    pub code_file_ratio: f64,
    pub dep_only_change: bool,
    pub has_description: bool,
    pub label_count: u64,
}

/// Outcome of the base-type classification stage, kept verbatim in the
/// rationale so the decision is auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTypeOutcome {
    pub base_type: ChangeType,
    /// Stable identifier of the rule that decided: a short-circuit
    /// template name or `weighted_scoreboard`.
    pub rule: String,
    pub certainty: Certainty,
    /// Margin between the winning category and the runner-up. Templates
    /// report a synthetic margin of 10.0.
    pub top_margin: f64,
    /// Per-category scores; empty when a template short-circuited.
    #[serde(default)]
    pub scoreboard: BTreeMap<ChangeType, f64>,
    /// Keyword terms that fired, per category.
    #[serde(default)]
    pub keyword_evidence: BTreeMap<ChangeType, Vec<String>>,
    pub runner_up: Option<ChangeType>,
}

/// Infra-related evidence: the weighted signal plus the intent override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraRationale {
    pub signal_score: f64,
    pub signal_level: InfraSignalLevel,
    pub matched_tickets: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub matched_labels: Vec<String>,
    /// True when any intent evidence was found, regardless of gating.
    pub intent_fired: bool,
    /// True when the intent override actually changed `final_type`.
    pub intent_applied: bool,
    pub intent_evidence: Vec<String>,
}

/// Summary of the change surface, carried into the rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub docs_file_ratio: f64,
    pub test_file_ratio: f64,
    pub dep_file_ratio: f64,
    pub infra_file_ratio: f64,
    pub code_file_ratio: f64,
    pub dep_only_change: bool,
}

impl PathSummary {
    pub fn from_features(features: &FeatureVector) -> Self {
        PathSummary {
            docs_file_ratio: features.docs_file_ratio,
            test_file_ratio: features.test_file_ratio,
            dep_file_ratio: features.dep_file_ratio,
            infra_file_ratio: features.infra_file_ratio,
            code_file_ratio: features.code_file_ratio,
            dep_only_change: features.dep_only_change,
        }
    }
}

/// One bounded additive adjustment applied by the confidence calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub name: String,
    pub delta: f64,
}

/// Full confidence computation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub baseline: f64,
    pub factors: Vec<ConfidenceFactor>,
    /// Sum before clamping.
    pub raw_score: f64,
    /// Final score, clamped to [0.30, 0.95] and rounded to 3 decimals.
    pub score: f64,
    pub band: ConfidenceBand,
    /// True when a conflict-pair penalty fired.
    pub conflict_penalized: bool,
    pub label_agreement_count: u64,
    pub label_disagreement_count: u64,
}

/// One capped component of the complexity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityComponent {
    pub name: String,
    pub raw: u64,
    pub contribution: f64,
}

/// Complexity model output with its component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    pub components: Vec<ComplexityComponent>,
    pub score: f64,
    pub level: ComplexityLevel,
}

/// Structured evidence tree explaining every score and decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    pub base: BaseTypeOutcome,
    pub infra: InfraRationale,
    pub paths: PathSummary,
    pub capability_evidence: BTreeMap<String, Vec<String>>,
    pub risk_tags: Vec<String>,
    pub confidence: ConfidenceBreakdown,
    pub complexity: ComplexityBreakdown,
}

/// Final labeled record: one per classification call, never mutated.
/// A re-run produces a new result object; the caller decides whether to
/// supersede a stored prior result keyed by `classifier_version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub base_type: ChangeType,
    pub final_type: ChangeType,
    pub is_infra_related: bool,
    pub infra_override_applied: bool,
    pub complexity_level: ComplexityLevel,
    pub complexity_score: f64,
    pub capability_tags: Vec<String>,
    pub risk_tags: Vec<String>,
    pub classification_confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub needs_review: bool,
    pub why_needs_review: Vec<ReviewReason>,
    pub classifier_version: String,
    pub rationale: Rationale,
    pub classified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_round_trips_through_serde() {
        for t in ChangeType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            let back: ChangeType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, t);
        }
    }

    #[test]
    fn test_change_type_parse() {
        assert_eq!(ChangeType::parse("perf-security"), Some(ChangeType::PerfSecurity));
        assert_eq!(ChangeType::parse("docs-only"), Some(ChangeType::DocsOnly));
        assert_eq!(ChangeType::parse("unknown"), None);
    }

    #[test]
    fn test_complexity_level_uses_display_labels() {
        let json = serde_json::to_string(&ComplexityLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"Very High\"");
        assert_eq!(ComplexityLevel::parse("Very Low"), Some(ComplexityLevel::VeryLow));
    }

    #[test]
    fn test_effective_path_prefers_new_path() {
        let f = ChangedFile {
            old_path: Some("old.rs".into()),
            new_path: Some("new.rs".into()),
            ..Default::default()
        };
        assert_eq!(f.effective_path(), "new.rs");

        let deleted = ChangedFile {
            old_path: Some("gone.rs".into()),
            ..Default::default()
        };
        assert_eq!(deleted.effective_path(), "gone.rs");
    }

    #[test]
    fn test_feature_vector_rejects_missing_fields() {
        // Contract violation: a feature row without churn must fail fast,
        // not default to zero.
        let err = serde_json::from_str::<FeatureVector>("{\"files_changed\": 3}");
        assert!(err.is_err());
    }
}
