//! Primary change-type classification.
//!
//! Stage A is an explicit, ordered list of short-circuit template rules;
//! the first match wins with high certainty. Stage B is a weighted
//! per-category scoreboard with margin-based tie-breaking and a deliberate
//! bias back to the default `feature` label when a non-feature winner is
//! only narrowly ahead. The full scoreboard, margin, and keyword evidence
//! are emitted so the decision can be audited downstream.

use std::collections::BTreeMap;

use crate::classify::paths::{is_docs_path, is_test_path};
use crate::classify::TextIndex;
use crate::config::RuleSet;
use crate::core::{BaseTypeOutcome, Certainty, ChangeType, FeatureVector};

/// Synthetic margin reported by short-circuit templates.
const TEMPLATE_MARGIN: f64 = 10.0;

/// Everything a template predicate is allowed to look at.
struct TemplateContext {
    dep_only: bool,
    all_docs: bool,
    all_tests: bool,
    bugfix_hits: Vec<String>,
    refactor_hits: Vec<String>,
    security_hits: Vec<String>,
    feature_phrase: bool,
    code_ratio: f64,
}

/// Ordered template table: (rule id, label, predicate). First match wins.
type TemplatePredicate = fn(&TemplateContext) -> bool;

const TEMPLATES: &[(&str, ChangeType, TemplatePredicate)] = &[
    (
        "all_changed_files_are_dependency_manifests",
        ChangeType::Chore,
        |ctx| ctx.dep_only,
    ),
    (
        "all_changed_files_are_docs",
        ChangeType::DocsOnly,
        |ctx| ctx.all_docs,
    ),
    (
        "all_changed_files_are_tests",
        ChangeType::TestOnly,
        |ctx| ctx.all_tests,
    ),
    (
        "bugfix_keyword_with_code_surface",
        ChangeType::Bugfix,
        |ctx| !ctx.bugfix_hits.is_empty() && !ctx.feature_phrase && ctx.code_ratio >= 0.25,
    ),
    (
        "refactor_keyword_without_feature_phrase",
        ChangeType::Refactor,
        |ctx| !ctx.refactor_hits.is_empty() && !ctx.feature_phrase,
    ),
    (
        "security_or_cve_keyword",
        ChangeType::PerfSecurity,
        |ctx| !ctx.security_hits.is_empty(),
    ),
];

fn matching_terms(text: &str, terms: &[String]) -> Vec<String> {
    let mut hits: Vec<String> = terms
        .iter()
        .filter(|t| text.contains(t.as_str()))
        .cloned()
        .collect();
    hits.sort();
    hits.dedup();
    hits
}

fn title_starts_with_fix_token(title: &str, tokens: &[String]) -> bool {
    let first = match title.split_whitespace().next() {
        Some(t) => t,
        None => return false,
    };
    let trimmed: String = first
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    tokens.iter().any(|t| *t == trimmed)
}

fn template_context(text: &TextIndex, features: &FeatureVector, rules: &RuleSet) -> TemplateContext {
    TemplateContext {
        dep_only: features.dep_only_change,
        all_docs: !text.paths.is_empty() && text.paths.iter().all(|p| is_docs_path(p)),
        all_tests: !text.paths.is_empty() && text.paths.iter().all(|p| is_test_path(p)),
        bugfix_hits: matching_terms(&text.text, &rules.template_bugfix_keywords),
        refactor_hits: matching_terms(&text.text, &rules.template_refactor_keywords),
        security_hits: matching_terms(&text.text, &rules.template_security_keywords),
        feature_phrase: rules
            .feature_phrases
            .iter()
            .any(|p| text.text.contains(p.as_str())),
        code_ratio: features.code_file_ratio,
    }
}

fn template_evidence(
    label: ChangeType,
    ctx: &TemplateContext,
) -> BTreeMap<ChangeType, Vec<String>> {
    let mut evidence = BTreeMap::new();
    let hits = match label {
        ChangeType::Bugfix => ctx.bugfix_hits.clone(),
        ChangeType::Refactor => ctx.refactor_hits.clone(),
        ChangeType::PerfSecurity => ctx.security_hits.clone(),
        _ => Vec::new(),
    };
    if !hits.is_empty() {
        evidence.insert(label, hits);
    }
    evidence
}

/// Run Stage A templates, then the Stage B scoreboard.
pub fn classify_base(
    text: &TextIndex,
    features: &FeatureVector,
    rules: &RuleSet,
) -> BaseTypeOutcome {
    let ctx = template_context(text, features, rules);

    for (rule, label, predicate) in TEMPLATES {
        if predicate(&ctx) {
            return BaseTypeOutcome {
                base_type: *label,
                rule: (*rule).to_string(),
                certainty: Certainty::High,
                top_margin: TEMPLATE_MARGIN,
                scoreboard: BTreeMap::new(),
                keyword_evidence: template_evidence(*label, &ctx),
                runner_up: None,
            };
        }
    }

    score_board(text, features, rules, ctx.feature_phrase)
}

/// Stage B: weighted multi-category scoring with feature-bias tie-break.
fn score_board(
    text: &TextIndex,
    features: &FeatureVector,
    rules: &RuleSet,
    feature_phrase: bool,
) -> BaseTypeOutcome {
    let tuning = &rules.tuning;
    let mut scores: BTreeMap<ChangeType, f64> = BTreeMap::new();
    let mut evidence: BTreeMap<ChangeType, Vec<String>> = BTreeMap::new();

    scores.insert(ChangeType::Feature, tuning.feature_seed);
    for category in ChangeType::SCOREBOARD {
        if category == ChangeType::Feature {
            continue;
        }
        let hits = matching_terms(&text.text, rules.keywords_for(category));
        let score = hits.len() as f64 * rules.weights.weight_for(category);
        scores.insert(category, score);
        if !hits.is_empty() {
            evidence.insert(category, hits);
        }
    }

    let mut bump = |cat: ChangeType, delta: f64, note: String| {
        *scores.entry(cat).or_insert(0.0) += delta;
        evidence.entry(cat).or_default().push(note);
    };

    if features.docs_file_ratio >= tuning.ratio_bonus_threshold {
        bump(
            ChangeType::DocsOnly,
            tuning.docs_ratio_bonus,
            format!("docs_ratio={:.2}", features.docs_file_ratio),
        );
    }
    if features.test_file_ratio >= tuning.ratio_bonus_threshold {
        bump(
            ChangeType::TestOnly,
            tuning.test_ratio_bonus,
            format!("test_ratio={:.2}", features.test_file_ratio),
        );
    }
    if features.dep_only_change {
        bump(
            ChangeType::Chore,
            tuning.dep_only_chore_bonus,
            "dep_only_change".to_string(),
        );
    }
    if feature_phrase {
        bump(
            ChangeType::Feature,
            tuning.feature_phrase_bonus,
            "feature_phrase".to_string(),
        );
    }
    if title_starts_with_fix_token(&text.title, &rules.title_fix_tokens) {
        bump(
            ChangeType::Bugfix,
            tuning.title_fix_bugfix_bonus,
            "title_fix_token".to_string(),
        );
        *scores.entry(ChangeType::Feature).or_insert(0.0) -= tuning.title_fix_feature_penalty;
    }

    // Rank descending by score; canonical category order breaks exact ties
    // so the outcome is deterministic.
    let mut ranked: Vec<(ChangeType, f64)> = ChangeType::SCOREBOARD
        .iter()
        .map(|c| (*c, scores.get(c).copied().unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (top_category, top_score) = ranked[0];
    let (runner_category, runner_score) = ranked[1];
    let margin = top_score - runner_score;

    let feature_score = scores.get(&ChangeType::Feature).copied().unwrap_or(0.0);
    let mut winner = top_category;
    // Deliberate default-label bias: under ambiguity a narrow non-feature
    // win reverts to feature. Downstream confidence calibration depends on
    // this exact rule.
    if top_category != ChangeType::Feature
        && margin < tuning.tie_break_margin
        && feature_score >= top_score - tuning.tie_break_feature_gap
    {
        winner = ChangeType::Feature;
    }

    let mut certainty = if margin >= tuning.high_certainty_margin {
        Certainty::High
    } else if margin >= tuning.medium_certainty_margin {
        Certainty::Medium
    } else {
        Certainty::Low
    };

    // A ratio-backed docs/test/chore win is trustworthy regardless of how
    // close the keyword race was.
    let ratio_backed = match winner {
        ChangeType::DocsOnly => features.docs_file_ratio >= tuning.strong_ratio,
        ChangeType::TestOnly => features.test_file_ratio >= tuning.strong_ratio,
        ChangeType::Chore => features.dep_only_change,
        _ => false,
    };
    if ratio_backed {
        certainty = Certainty::High;
    }

    let runner_up = if winner == top_category {
        Some(runner_category)
    } else {
        Some(top_category)
    };

    BaseTypeOutcome {
        base_type: winner,
        rule: "weighted_scoreboard".to_string(),
        certainty,
        top_margin: margin,
        scoreboard: scores,
        keyword_evidence: evidence,
        runner_up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::paths::analyze_paths;
    use crate::core::{ChangedFile, MergeRequestSnapshot};

    fn features_for(paths: &[&str], rules: &RuleSet) -> FeatureVector {
        let files: Vec<ChangedFile> = paths.iter().map(|p| ChangedFile::path(*p)).collect();
        let stats = analyze_paths(&files, rules);
        FeatureVector {
            churn: 0,
            files_changed: files.len() as u64,
            additions: 0,
            deletions: 0,
            commit_count: 1,
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
            docs_file_ratio: stats.docs_file_ratio,
            test_file_ratio: stats.test_file_ratio,
            dep_file_ratio: stats.dep_file_ratio,
            infra_file_ratio: stats.infra_file_ratio,
            code_file_ratio: stats.code_file_ratio,
            dep_only_change: stats.dep_only_change,
            has_description: false,
            label_count: 0,
        }
    }

    fn index(title: &str, description: &str, paths: &[&str]) -> TextIndex {
        let snapshot = MergeRequestSnapshot {
            title: title.to_string(),
            description: Some(description.to_string()),
            ..Default::default()
        };
        let files: Vec<ChangedFile> = paths.iter().map(|p| ChangedFile::path(*p)).collect();
        TextIndex::new(&snapshot, &files)
    }

    #[test]
    fn test_template_docs_only_short_circuits() {
        let rules = RuleSet::default();
        let paths = ["README.md", "docs/guide.md"];
        let outcome = classify_base(
            &index("Update documentation", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.base_type, ChangeType::DocsOnly);
        assert_eq!(outcome.rule, "all_changed_files_are_docs");
        assert_eq!(outcome.certainty, Certainty::High);
        assert_eq!(outcome.top_margin, 10.0);
        assert!(outcome.scoreboard.is_empty());
    }

    #[test]
    fn test_template_dep_only_wins_before_docs() {
        let rules = RuleSet::default();
        let paths = ["Cargo.lock"];
        let outcome = classify_base(
            &index("bump deps", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.base_type, ChangeType::Chore);
        assert_eq!(outcome.rule, "all_changed_files_are_dependency_manifests");
    }

    #[test]
    fn test_template_bugfix_requires_code_surface() {
        let rules = RuleSet::default();
        let paths = ["src/parser.py"];
        let outcome = classify_base(
            &index("Fix null pointer in parser", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.base_type, ChangeType::Bugfix);
        assert_eq!(outcome.rule, "bugfix_keyword_with_code_surface");
    }

    #[test]
    fn test_bugfix_template_blocked_by_feature_phrase() {
        let rules = RuleSet::default();
        let paths = ["src/api.rs"];
        let outcome = classify_base(
            &index("Implement retry and fix timeouts", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        // The feature phrase suppresses the template; the scoreboard still
        // sees both signals.
        assert_eq!(outcome.rule, "weighted_scoreboard");
    }

    #[test]
    fn test_scoreboard_defaults_to_feature() {
        let rules = RuleSet::default();
        let paths = ["src/api.rs"];
        let outcome = classify_base(
            &index("Add pagination endpoint", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.base_type, ChangeType::Feature);
        assert_eq!(outcome.rule, "weighted_scoreboard");
    }

    #[test]
    fn test_tie_break_reverts_to_feature() {
        let rules = RuleSet::default();
        // "introduce" blocks the bugfix template and lifts feature to 1.3;
        // "fix" scores bugfix at 1.45. Margin 0.15 with feature in reach,
        // so the default-label bias wins.
        let paths = ["src/api.rs"];
        let outcome = classify_base(
            &index("introduce a fix for rollout drift", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.rule, "weighted_scoreboard");
        assert_eq!(outcome.base_type, ChangeType::Feature);
        assert_eq!(outcome.runner_up, Some(ChangeType::Bugfix));
        assert!(outcome.top_margin < rules.tuning.tie_break_margin);
    }

    #[test]
    fn test_title_fix_token_boosts_bugfix_in_scoreboard() {
        let rules = RuleSet::default();
        // Feature phrase blocks the template, so the scoreboard decides;
        // the title token pushes bugfix ahead.
        let paths = ["src/api.rs"];
        let outcome = classify_base(
            &index("Fix dropped events when we introduce batching", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.rule, "weighted_scoreboard");
        assert_eq!(outcome.base_type, ChangeType::Bugfix);
        let evidence = outcome.keyword_evidence.get(&ChangeType::Bugfix).unwrap();
        assert!(evidence.iter().any(|e| e == "title_fix_token"));
    }

    #[test]
    fn test_fixture_title_is_not_a_fix_token() {
        assert!(!title_starts_with_fix_token(
            "fixtures for parser tests",
            &["fix".to_string(), "bugfix".to_string(), "hotfix".to_string()],
        ));
        assert!(title_starts_with_fix_token(
            "Fix: crash on empty input",
            &["fix".to_string()],
        ));
    }

    #[test]
    fn test_ratio_backed_docs_win_upgrades_certainty() {
        let rules = RuleSet::default();
        // Not all paths are docs, so the template is skipped, but a 0.75
        // docs ratio backs the scoreboard win strongly enough for high
        // certainty despite a medium margin.
        let paths = ["docs/a.md", "docs/b.md", "docs/c.md", "src/x.rs"];
        let outcome = classify_base(
            &index("update docs", "", &paths),
            &features_for(&paths, &rules),
            &rules,
        );
        assert_eq!(outcome.rule, "weighted_scoreboard");
        assert_eq!(outcome.base_type, ChangeType::DocsOnly);
        assert!(outcome.top_margin < rules.tuning.high_certainty_margin);
        assert_eq!(outcome.certainty, Certainty::High);
    }
}
