//! The classification & confidence engine.
//!
//! A pure, synchronous computation per record: no I/O, no shared mutable
//! state. `Classifier::classify` takes a snapshot, its changed files, and
//! a fully derived feature vector, and produces one versioned
//! `ClassificationResult` with a complete rationale. Safe to invoke
//! concurrently over disjoint records.

pub mod base_type;
pub mod complexity;
pub mod confidence;
pub mod features;
pub mod infra_signal;
pub mod intent;
pub mod paths;
pub mod tags;

pub use base_type::classify_base;
pub use complexity::score_complexity;
pub use confidence::{compute_confidence, ConfidenceInputs, ConfidenceOutcome};
pub use features::{extract_features, DiscussionSummary, PipelineSummary};
pub use infra_signal::{extract_infra_signals, InfraSignals};
pub use intent::{detect_infra_intent, IntentDetection, IntentEvidence, IntentEvidenceKind};
pub use paths::{analyze_paths, classify_path, PathKind, PathStats};
pub use tags::{detect_capability_tags, detect_risk_tags, CapabilityTags};

use chrono::Utc;

use crate::config::{ClassificationConfig, RuleSet};
use crate::core::{
    ChangeType, ChangedFile, ClassificationResult, FeatureVector, InfraRationale,
    MergeRequestSnapshot, PathSummary, Rationale,
};

/// Monotonically-increasing engine version. Every behavior change to the
/// scoring rules bumps this string; storage keys classifications by it to
/// detect stale records.
pub const CLASSIFIER_VERSION: &str = "v3.0";

/// Lowercased views of the record text, shared by the scanning stages.
pub struct TextIndex {
    /// Lowercased title.
    pub title: String,
    /// Title, description, and labels joined with newlines.
    pub text: String,
    /// `text` plus the changed paths; used by intent and tag scans.
    pub text_with_paths: String,
    /// Lowercased effective paths.
    pub paths: Vec<String>,
}

impl TextIndex {
    pub fn new(snapshot: &MergeRequestSnapshot, files: &[ChangedFile]) -> Self {
        let title = snapshot.title.to_lowercase();
        let description = snapshot
            .description
            .as_deref()
            .unwrap_or("")
            .to_lowercase();
        let labels = snapshot
            .labels
            .iter()
            .map(|l| l.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let paths: Vec<String> = files
            .iter()
            .map(|f| f.effective_path().trim().to_lowercase())
            .collect();

        let text = format!("{title}\n{description}\n{labels}");
        let text_with_paths = format!("{text}\n{}", paths.join(" "));

        TextIndex {
            title,
            text,
            text_with_paths,
            paths,
        }
    }
}

/// Deterministic scoring pipeline over immutable inputs.
pub struct Classifier {
    config: ClassificationConfig,
    rules: RuleSet,
}

impl Classifier {
    pub fn new(config: ClassificationConfig, rules: RuleSet) -> Self {
        Classifier { config, rules }
    }

    pub fn config(&self) -> &ClassificationConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify one record.
    ///
    /// Sequence: base type, intent override, final-label precedence,
    /// capability/risk tagging, confidence, complexity, then assembly of
    /// the versioned result with its full rationale.
    pub fn classify(
        &self,
        snapshot: &MergeRequestSnapshot,
        files: &[ChangedFile],
        features: &FeatureVector,
    ) -> ClassificationResult {
        let text = TextIndex::new(snapshot, files);

        let base = classify_base(&text, features, &self.rules);

        let strong_signal = features.infra_signal_score >= self.config.infra_strong_threshold;
        let weak_signal = features.infra_signal_score >= self.config.infra_weak_threshold;

        let intent = detect_infra_intent(&text, &self.rules);
        let intent_applied = intent.fired() && intent.may_apply_to(base.base_type);

        // Two independent routes force the infra label: a strong weighted
        // signal, or gated intent evidence.
        let infra_override_applied = strong_signal || intent_applied;
        let final_type = if infra_override_applied {
            ChangeType::Infra
        } else {
            base.base_type
        };
        let is_infra_related = final_type == ChangeType::Infra || weak_signal || intent.fired();

        let capabilities = detect_capability_tags(&text, features, final_type, &self.rules);
        let risk_tags = detect_risk_tags(&text, features, &capabilities.tags, final_type, &self.rules);

        let confidence = compute_confidence(
            &ConfidenceInputs {
                base: &base,
                final_type,
                features,
                capability_tags: &capabilities.tags,
                labels: &snapshot.labels,
                combined_text_len: text.text_with_paths.len(),
                intent_applied,
            },
            &self.rules,
            &self.config,
        );

        let complexity = score_complexity(features);

        let rationale = Rationale {
            base: base.clone(),
            infra: InfraRationale {
                signal_score: features.infra_signal_score,
                signal_level: features.infra_signal_level,
                matched_tickets: features.matched_infra_tickets.clone(),
                matched_keywords: features.matched_infra_keywords.clone(),
                matched_labels: features.matched_infra_labels.clone(),
                intent_fired: intent.fired(),
                intent_applied,
                intent_evidence: intent.rendered_evidence(),
            },
            paths: PathSummary::from_features(features),
            capability_evidence: capabilities.evidence.clone(),
            risk_tags: risk_tags.clone(),
            confidence: confidence.breakdown.clone(),
            complexity: complexity.clone(),
        };

        ClassificationResult {
            base_type: base.base_type,
            final_type,
            is_infra_related,
            infra_override_applied,
            complexity_level: complexity.level,
            complexity_score: complexity.score,
            capability_tags: capabilities.tags,
            risk_tags,
            classification_confidence: confidence.breakdown.score,
            confidence_band: confidence.breakdown.band,
            needs_review: confidence.needs_review,
            why_needs_review: confidence.why_needs_review,
            classifier_version: CLASSIFIER_VERSION.to_string(),
            rationale,
            classified_at: Utc::now(),
        }
    }
}
