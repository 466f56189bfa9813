//! Feature derivation: folds raw merge-request data into the read-only
//! `FeatureVector` consumed by the classifier.

use serde::{Deserialize, Serialize};

use crate::classify::infra_signal::extract_infra_signals;
use crate::classify::paths::analyze_paths;
use crate::config::{ClassificationConfig, RuleSet};
use crate::core::{ChangedFile, FeatureVector, MergeRequestSnapshot};

/// Aggregated review-discussion counters for one merge request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionSummary {
    pub thread_count: u64,
    pub note_count: u64,
    pub unresolved_count: u64,
}

/// Aggregated pipeline counters for one merge request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub pipeline_count: u64,
    pub failed_count: u64,
    pub success_count: u64,
    pub retry_count: u64,
}

/// Derive the full feature vector for one snapshot.
///
/// Runs the infra signal extractor and path analyzer, then merges their
/// output with the engineering-activity counters. Computed once per
/// snapshot; the engine only ever reads the result.
pub fn extract_features(
    snapshot: &MergeRequestSnapshot,
    files: &[ChangedFile],
    commit_count: u64,
    discussions: &DiscussionSummary,
    pipelines: &PipelineSummary,
    rules: &RuleSet,
    config: &ClassificationConfig,
) -> FeatureVector {
    let description = snapshot.description.as_deref().unwrap_or("");
    let signals =
        extract_infra_signals(&snapshot.title, description, &snapshot.labels, rules, config);
    let path_stats = analyze_paths(files, rules);

    let additions: u64 = files.iter().map(|f| f.additions).sum();
    let deletions: u64 = files.iter().map(|f| f.deletions).sum();

    FeatureVector {
        churn: additions + deletions,
        files_changed: files.len() as u64,
        additions,
        deletions,
        commit_count,
        review_comment_count: discussions.note_count,
        review_thread_count: discussions.thread_count,
        unresolved_thread_count: discussions.unresolved_count,
        pipeline_failed_count: pipelines.failed_count,
        infra_ticket_match_count: signals.ticket_match_count,
        infra_keyword_score: signals.keyword_score,
        infra_label_match_count: signals.label_match_count,
        infra_signal_score: signals.signal_score,
        infra_signal_level: signals.signal_level,
        matched_infra_tickets: signals.matched_tickets,
        matched_infra_keywords: signals.matched_keywords,
        matched_infra_labels: signals.matched_labels,
        docs_file_ratio: path_stats.docs_file_ratio,
        test_file_ratio: path_stats.test_file_ratio,
        dep_file_ratio: path_stats.dep_file_ratio,
        infra_file_ratio: path_stats.infra_file_ratio,
        code_file_ratio: path_stats.code_file_ratio,
        dep_only_change: path_stats.dep_only_change,
        has_description: !description.trim().is_empty(),
        label_count: snapshot.labels.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InfraSignalLevel;

    fn snapshot(title: &str, description: &str, labels: &[&str]) -> MergeRequestSnapshot {
        MergeRequestSnapshot {
            title: title.to_string(),
            description: if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            },
            labels: labels.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_merges_signals_and_path_stats() {
        let files = vec![
            ChangedFile {
                new_path: Some("src/api.rs".into()),
                additions: 120,
                deletions: 30,
                ..Default::default()
            },
            ChangedFile::path("README.md"),
        ];
        let features = extract_features(
            &snapshot("INFRA-9 harden cluster access", "", &["infra"]),
            &files,
            4,
            &DiscussionSummary {
                thread_count: 2,
                note_count: 5,
                unresolved_count: 1,
            },
            &PipelineSummary {
                failed_count: 1,
                ..Default::default()
            },
            &RuleSet::default(),
            &ClassificationConfig::default(),
        );

        assert_eq!(features.churn, 150);
        assert_eq!(features.files_changed, 2);
        assert_eq!(features.commit_count, 4);
        assert_eq!(features.review_comment_count, 5);
        assert_eq!(features.unresolved_thread_count, 1);
        assert_eq!(features.pipeline_failed_count, 1);
        assert_eq!(features.infra_ticket_match_count, 1);
        assert_eq!(features.infra_signal_level, InfraSignalLevel::Strong);
        assert_eq!(features.docs_file_ratio, 0.5);
        assert!(!features.has_description);
        assert_eq!(features.label_count, 1);
    }

    #[test]
    fn test_blank_description_does_not_count_as_present() {
        let features = extract_features(
            &snapshot("title", "   ", &[]),
            &[],
            0,
            &DiscussionSummary::default(),
            &PipelineSummary::default(),
            &RuleSet::default(),
            &ClassificationConfig::default(),
        );
        assert!(!features.has_description);
        assert_eq!(features.files_changed, 0);
    }
}
