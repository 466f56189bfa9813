//! Property checks over randomized records: bounded confidence, closed
//! label set, override precedence, gating, and verdict consistency.

use proptest::prelude::*;

use mergemap::classify::{extract_features, Classifier, DiscussionSummary, PipelineSummary};
use mergemap::config::{ClassificationConfig, RuleSet};
use mergemap::core::{ChangeType, ChangedFile, MergeRequestSnapshot};

const TITLE_WORDS: &[&str] = &[
    "fix", "add", "implement", "refactor", "docs", "update", "deploy", "bump", "security",
    "cache", "parser", "terraform", "tests", "cleanup", "performance", "release", "api",
];

const PATH_POOL: &[&str] = &[
    "src/lib.rs",
    "src/api/mod.rs",
    "src/parser.py",
    "README.md",
    "docs/guide.md",
    "tests/integration.rs",
    "package-lock.json",
    "go.mod",
    "infra/main.tf",
    ".gitlab-ci.yml",
    "helm/values.yaml",
    "scripts/deploy.sh",
];

const LABEL_POOL: &[&str] = &["bug", "feature", "infra", "docs", "chore", "sre", "backend"];

fn arb_title() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(TITLE_WORDS), 1..6)
        .prop_map(|words| words.join(" "))
}

fn arb_description() -> impl Strategy<Value = Option<String>> {
    prop::option::of(
        prop::collection::vec(prop::sample::select(TITLE_WORDS), 0..12)
            .prop_map(|words| words.join(" ")),
    )
}

fn arb_labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(LABEL_POOL), 0..3)
        .prop_map(|labels| labels.into_iter().map(String::from).collect())
}

fn arb_files() -> impl Strategy<Value = Vec<ChangedFile>> {
    prop::collection::vec(
        (prop::sample::select(PATH_POOL), 0u64..400, 0u64..400),
        0..6,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(path, additions, deletions)| ChangedFile {
                new_path: Some(path.to_string()),
                additions,
                deletions,
                ..Default::default()
            })
            .collect()
    })
}

#[derive(Debug, Clone)]
struct ArbRecord {
    snapshot: MergeRequestSnapshot,
    files: Vec<ChangedFile>,
    commit_count: u64,
    discussions: DiscussionSummary,
    pipelines: PipelineSummary,
}

fn arb_record() -> impl Strategy<Value = ArbRecord> {
    (
        arb_title(),
        arb_description(),
        arb_labels(),
        arb_files(),
        0u64..20,
        0u64..30,
        0u64..10,
        0u64..5,
    )
        .prop_map(
            |(title, description, labels, files, commits, notes, threads, failed)| ArbRecord {
                snapshot: MergeRequestSnapshot {
                    title,
                    description,
                    labels,
                    ..Default::default()
                },
                files,
                commit_count: commits,
                discussions: DiscussionSummary {
                    thread_count: threads,
                    note_count: notes,
                    unresolved_count: threads.min(2),
                },
                pipelines: PipelineSummary {
                    pipeline_count: failed,
                    failed_count: failed,
                    ..Default::default()
                },
            },
        )
}

proptest! {
    #[test]
    fn prop_confidence_is_bounded_and_verdict_consistent(record in arb_record()) {
        let config = ClassificationConfig::default();
        let engine = Classifier::new(config, RuleSet::default());
        let features = extract_features(
            &record.snapshot,
            &record.files,
            record.commit_count,
            &record.discussions,
            &record.pipelines,
            engine.rules(),
            engine.config(),
        );
        let result = engine.classify(&record.snapshot, &record.files, &features);

        prop_assert!(result.classification_confidence >= 0.30);
        prop_assert!(result.classification_confidence <= 0.95);
        prop_assert!(ChangeType::ALL.contains(&result.final_type));
        prop_assert_eq!(
            result.needs_review,
            result.classification_confidence < config.needs_review_threshold
        );
        if result.needs_review {
            prop_assert!(!result.why_needs_review.is_empty());
        }
        prop_assert!(result.complexity_score >= 0.0);
        prop_assert!(result.complexity_score <= 12.0);
    }

    #[test]
    fn prop_strong_signal_forces_infra(record in arb_record()) {
        let config = ClassificationConfig::default();
        let engine = Classifier::new(config, RuleSet::default());
        let features = extract_features(
            &record.snapshot,
            &record.files,
            record.commit_count,
            &record.discussions,
            &record.pipelines,
            engine.rules(),
            engine.config(),
        );
        let result = engine.classify(&record.snapshot, &record.files, &features);

        if features.infra_signal_score >= config.infra_strong_threshold {
            prop_assert_eq!(result.final_type, ChangeType::Infra);
            prop_assert!(result.infra_override_applied);
        }
        if features.infra_signal_score >= config.infra_weak_threshold {
            prop_assert!(result.is_infra_related);
        }
    }

    #[test]
    fn prop_text_only_intent_never_relabels_bugfix_or_chore(record in arb_record()) {
        let config = ClassificationConfig::default();
        let engine = Classifier::new(config, RuleSet::default());
        let features = extract_features(
            &record.snapshot,
            &record.files,
            record.commit_count,
            &record.discussions,
            &record.pipelines,
            engine.rules(),
            engine.config(),
        );
        let result = engine.classify(&record.snapshot, &record.files, &features);

        let infra = &result.rationale.infra;
        let path_evidence = infra.intent_evidence.iter().any(|e| e.starts_with("path:"));
        let strong_signal = features.infra_signal_score >= config.infra_strong_threshold;
        if matches!(result.base_type, ChangeType::Bugfix | ChangeType::Chore)
            && !path_evidence
            && !strong_signal
        {
            prop_assert_eq!(result.final_type, result.base_type);
            prop_assert!(!result.infra_override_applied);
        }
    }

    #[test]
    fn prop_base_type_never_infra(record in arb_record()) {
        // Infra is reachable only through the override paths.
        let engine = Classifier::new(ClassificationConfig::default(), RuleSet::default());
        let features = extract_features(
            &record.snapshot,
            &record.files,
            record.commit_count,
            &record.discussions,
            &record.pipelines,
            engine.rules(),
            engine.config(),
        );
        let result = engine.classify(&record.snapshot, &record.files, &features);
        prop_assert_ne!(result.base_type, ChangeType::Infra);
    }
}
