//! Keyword, weight, and threshold tables driving the classifier.
//!
//! Every table lives here as injected configuration rather than as
//! module-level constants inside the scoring code, so the whole engine can
//! be exercised with alternative rule sets. `RuleSet::default()` is the
//! production table; `RuleSet::with_infra_rules` swaps in the externally
//! configured ticket patterns, keyword list, and label allow-list.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

use crate::core::{ChangeType, Error, Result};

/// Default infra keyword list, matched as substrings of title/description.
pub const DEFAULT_INFRA_KEYWORDS: &[&str] = &[
    "terraform",
    "k8s",
    "kubernetes",
    "helm",
    "ci/cd",
    "docker",
    "cluster",
    "network",
    "networking",
    "deployment",
    "observability",
    "prometheus",
    "grafana",
    "sre",
    "infra",
];

/// Default label allow-list counted by the infra signal extractor.
pub const DEFAULT_INFRA_LABELS: &[&str] = &["infra", "platform", "devops", "sre"];

/// Default ticket-reference patterns (case-insensitive).
pub const DEFAULT_INFRA_TICKET_PATTERNS: &[&str] = &[r"INFRA-\d+", r"OPS-\d+"];

/// Per-category keyword weights for the Stage-B scoreboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryWeights {
    pub bugfix: f64,
    pub refactor: f64,
    pub test_only: f64,
    pub docs_only: f64,
    pub chore: f64,
    pub perf_security: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        CategoryWeights {
            bugfix: 1.45,
            refactor: 1.10,
            test_only: 0.90,
            docs_only: 0.90,
            chore: 0.95,
            perf_security: 1.30,
        }
    }
}

impl CategoryWeights {
    pub fn weight_for(&self, category: ChangeType) -> f64 {
        match category {
            ChangeType::Bugfix => self.bugfix,
            ChangeType::Refactor => self.refactor,
            ChangeType::TestOnly => self.test_only,
            ChangeType::DocsOnly => self.docs_only,
            ChangeType::Chore => self.chore,
            ChangeType::PerfSecurity => self.perf_security,
            // Feature is score-seeded, infra is override-only.
            ChangeType::Feature | ChangeType::Infra => 0.0,
        }
    }
}

/// Fixed bonuses and seeds used by the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreboardTuning {
    pub feature_seed: f64,
    pub docs_ratio_bonus: f64,
    pub test_ratio_bonus: f64,
    pub dep_only_chore_bonus: f64,
    pub feature_phrase_bonus: f64,
    pub title_fix_bugfix_bonus: f64,
    pub title_fix_feature_penalty: f64,
    /// Ratio threshold activating the docs/test bonuses.
    pub ratio_bonus_threshold: f64,
    /// Tie-break window: a non-feature winner needs at least this margin.
    pub tie_break_margin: f64,
    /// Tie-break window: feature must be within this distance of the top.
    pub tie_break_feature_gap: f64,
    pub high_certainty_margin: f64,
    pub medium_certainty_margin: f64,
    /// Ratio above which a docs/test win is considered strongly backed.
    pub strong_ratio: f64,
}

impl Default for ScoreboardTuning {
    fn default() -> Self {
        ScoreboardTuning {
            feature_seed: 0.6,
            docs_ratio_bonus: 1.4,
            test_ratio_bonus: 1.4,
            dep_only_chore_bonus: 1.8,
            feature_phrase_bonus: 0.7,
            title_fix_bugfix_bonus: 0.8,
            title_fix_feature_penalty: 0.2,
            ratio_bonus_threshold: 0.6,
            tie_break_margin: 0.25,
            tie_break_feature_gap: 0.15,
            high_certainty_margin: 2.2,
            medium_certainty_margin: 1.0,
            strong_ratio: 0.75,
        }
    }
}

/// A known-confusable category pair and its confidence penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictPair {
    pub a: ChangeType,
    pub b: ChangeType,
    pub penalty: f64,
    /// Margin at which the penalty stops applying for this pair; `None`
    /// means the global cutoff of 1.0 is the only exemption.
    pub exempt_margin: Option<f64>,
}

impl ConflictPair {
    pub fn matches(&self, x: ChangeType, y: ChangeType) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// A topical capability keyword family.
#[derive(Debug, Clone)]
pub struct CapabilityFamily {
    /// Emitted tag, e.g. `infra.terraform`.
    pub tag: &'static str,
    /// Substring keywords matched against combined text (incl. paths).
    pub keywords: &'static [&'static str],
    /// Path suffixes that also count as evidence (e.g. `.tf`).
    pub path_suffixes: &'static [&'static str],
    /// When set, the family only fires if this keyword is present; the
    /// evidence list is still the full keyword hit set.
    pub gate_keyword: Option<&'static str>,
}

/// Complete rule table for one engine instance.
#[derive(Debug, Clone)]
pub struct RuleSet {
    // -- infra signal extractor ------------------------------------------
    pub infra_ticket_patterns: Vec<Regex>,
    pub infra_keywords: Vec<String>,
    pub infra_label_allowlist: Vec<String>,

    // -- path analyzer ----------------------------------------------------
    pub dependency_manifests: BTreeSet<String>,

    // -- base-type classifier --------------------------------------------
    pub bugfix_keywords: Vec<String>,
    pub refactor_keywords: Vec<String>,
    pub test_keywords: Vec<String>,
    pub docs_keywords: Vec<String>,
    pub chore_keywords: Vec<String>,
    pub perf_security_keywords: Vec<String>,
    pub feature_phrases: Vec<String>,
    pub title_fix_tokens: Vec<String>,
    pub template_bugfix_keywords: Vec<String>,
    pub template_refactor_keywords: Vec<String>,
    pub template_security_keywords: Vec<String>,
    pub weights: CategoryWeights,
    pub tuning: ScoreboardTuning,

    // -- infra-intent override -------------------------------------------
    pub intent_strong_terms: Vec<String>,
    pub intent_title_terms: Vec<String>,

    // -- capability & risk tagger ----------------------------------------
    pub capability_families: Vec<CapabilityFamily>,
    pub breaking_change_phrases: Vec<String>,
    pub large_change_churn: u64,

    // -- confidence calculator -------------------------------------------
    pub conflict_pairs: Vec<ConflictPair>,
    pub label_type_map: Vec<(String, ChangeType)>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn compile_ticket_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::config(format!("invalid infra ticket pattern {p:?}: {e}")))
        })
        .collect()
}

impl Default for RuleSet {
    fn default() -> Self {
        let defaults: Vec<String> = DEFAULT_INFRA_TICKET_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        // The built-in patterns are known-valid literals.
        let patterns = compile_ticket_patterns(&defaults).expect("default ticket patterns compile");
        RuleSet::with_infra_rules(
            patterns,
            owned(DEFAULT_INFRA_KEYWORDS),
            owned(DEFAULT_INFRA_LABELS),
        )
    }
}

impl RuleSet {
    /// Build the production rule table around externally supplied infra
    /// ticket patterns, keyword list, and label allow-list.
    pub fn with_infra_rules(
        infra_ticket_patterns: Vec<Regex>,
        infra_keywords: Vec<String>,
        infra_label_allowlist: Vec<String>,
    ) -> Self {
        RuleSet {
            infra_ticket_patterns,
            infra_keywords: infra_keywords.iter().map(|k| k.to_lowercase()).collect(),
            infra_label_allowlist: infra_label_allowlist
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),

            dependency_manifests: [
                "package-lock.json",
                "pnpm-lock.yaml",
                "yarn.lock",
                "poetry.lock",
                "requirements.txt",
                "requirements-dev.txt",
                "pom.xml",
                "build.gradle",
                "build.gradle.kts",
                "gemfile.lock",
                "composer.lock",
                "cargo.lock",
                "go.mod",
                "go.sum",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),

            bugfix_keywords: owned(&[
                "fix", "bug", "hotfix", "regression", "issue", "crash", "broken", "defect",
            ]),
            refactor_keywords: owned(&[
                "refactor",
                "cleanup",
                "clean up",
                "restructure",
                "rename",
                "simplify",
                "reorganize",
            ]),
            test_keywords: owned(&["test", "tests", "unit test", "coverage", "spec"]),
            docs_keywords: owned(&["docs", "documentation", "readme", "changelog", "typo"]),
            chore_keywords: owned(&[
                "chore", "deps", "dependency", "bump", "upgrade", "build", "ci", "lint", "format",
            ]),
            perf_security_keywords: owned(&[
                "security",
                "vulnerability",
                "cve",
                "perf",
                "performance",
                "optimize",
                "latency",
                "hardening",
            ]),
            feature_phrases: owned(&["new feature", "implement", "introduce", "add support"]),
            title_fix_tokens: owned(&["fix", "bugfix", "hotfix"]),
            template_bugfix_keywords: owned(&["fix", "bug", "hotfix", "regression"]),
            template_refactor_keywords: owned(&["refactor", "cleanup", "restructure", "rename"]),
            template_security_keywords: owned(&["security", "vulnerability", "cve"]),
            weights: CategoryWeights::default(),
            tuning: ScoreboardTuning::default(),

            intent_strong_terms: owned(&[
                "codedeploy",
                "deployment pipeline",
                "deploy pipeline",
                "gitlab-ci",
                "github actions",
                "terraform",
                "terragrunt",
                "kubernetes",
                "k8s",
                "helm",
                "dockerfile",
                "infrastructure as code",
                "serverless",
                "lambda",
            ]),
            intent_title_terms: owned(&["deploy", "deployment", "redeploy", "release", "rollout"]),

            capability_families: vec![
                CapabilityFamily {
                    tag: "infra.redis",
                    keywords: &["redis", "cache"],
                    path_suffixes: &[],
                    gate_keyword: Some("redis"),
                },
                CapabilityFamily {
                    tag: "infra.terraform",
                    keywords: &["terraform", "terragrunt"],
                    path_suffixes: &[".tf"],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "infra.k8s",
                    keywords: &["k8s", "kubernetes", "helm", "cluster"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "infra.cicd",
                    keywords: &[
                        "ci/cd",
                        "pipeline",
                        "gitlab-ci",
                        "github actions",
                        "jenkins",
                        "codedeploy",
                        "deploy",
                        "deployment",
                        "release",
                        "rollout",
                        "lambda",
                        "serverless",
                    ],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "observability",
                    keywords: &[
                        "observability",
                        "prometheus",
                        "grafana",
                        "datadog",
                        "tracing",
                        "metrics",
                        "newrelic",
                    ],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "deps.update",
                    keywords: &[
                        "dependency",
                        "deps",
                        "bump",
                        "renovate",
                        "package-lock",
                        "pnpm-lock",
                        "poetry.lock",
                    ],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "security.sca",
                    keywords: &["snyk", "sca", "dependency scan"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "security.auth",
                    keywords: &["auth", "oauth", "jwt", "token", "rbac", "authorization"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "data.migration",
                    keywords: &["migration", "schema", "alembic", "flyway", "liquibase"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "api.contract",
                    keywords: &["openapi", "swagger", "api contract", "graphql schema"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
                CapabilityFamily {
                    tag: "performance",
                    keywords: &["latency", "throughput", "performance", "perf"],
                    path_suffixes: &[],
                    gate_keyword: None,
                },
            ],
            breaking_change_phrases: owned(&[
                "breaking",
                "breaking change",
                "backward incompatible",
            ]),
            large_change_churn: 1500,

            // Hand-curated confusable pairs. New categories require a
            // deliberate extension of this table, never inference from
            // scoreboard adjacency.
            conflict_pairs: vec![
                ConflictPair {
                    a: ChangeType::Bugfix,
                    b: ChangeType::Feature,
                    penalty: 0.10,
                    exempt_margin: Some(0.75),
                },
                ConflictPair {
                    a: ChangeType::Feature,
                    b: ChangeType::Infra,
                    penalty: 0.12,
                    exempt_margin: None,
                },
                ConflictPair {
                    a: ChangeType::Chore,
                    b: ChangeType::PerfSecurity,
                    penalty: 0.07,
                    exempt_margin: None,
                },
                ConflictPair {
                    a: ChangeType::Feature,
                    b: ChangeType::Refactor,
                    penalty: 0.09,
                    exempt_margin: None,
                },
            ],

            label_type_map: vec![
                ("feature".into(), ChangeType::Feature),
                ("enhancement".into(), ChangeType::Feature),
                ("bug".into(), ChangeType::Bugfix),
                ("bugfix".into(), ChangeType::Bugfix),
                ("fix".into(), ChangeType::Bugfix),
                ("refactor".into(), ChangeType::Refactor),
                ("refactoring".into(), ChangeType::Refactor),
                ("test".into(), ChangeType::TestOnly),
                ("tests".into(), ChangeType::TestOnly),
                ("testing".into(), ChangeType::TestOnly),
                ("docs".into(), ChangeType::DocsOnly),
                ("documentation".into(), ChangeType::DocsOnly),
                ("chore".into(), ChangeType::Chore),
                ("dependencies".into(), ChangeType::Chore),
                ("deps".into(), ChangeType::Chore),
                ("security".into(), ChangeType::PerfSecurity),
                ("performance".into(), ChangeType::PerfSecurity),
                ("perf".into(), ChangeType::PerfSecurity),
                ("infra".into(), ChangeType::Infra),
                ("infrastructure".into(), ChangeType::Infra),
                ("platform".into(), ChangeType::Infra),
                ("devops".into(), ChangeType::Infra),
                ("sre".into(), ChangeType::Infra),
            ],
        }
    }

    /// Build a rule set from raw pattern strings, failing on any invalid
    /// regular expression.
    pub fn from_raw(
        ticket_patterns: &[String],
        infra_keywords: Vec<String>,
        infra_label_allowlist: Vec<String>,
    ) -> Result<Self> {
        let patterns = compile_ticket_patterns(ticket_patterns)?;
        Ok(RuleSet::with_infra_rules(
            patterns,
            infra_keywords,
            infra_label_allowlist,
        ))
    }

    /// Keyword list for one scoreboard category.
    pub fn keywords_for(&self, category: ChangeType) -> &[String] {
        match category {
            ChangeType::Bugfix => &self.bugfix_keywords,
            ChangeType::Refactor => &self.refactor_keywords,
            ChangeType::TestOnly => &self.test_keywords,
            ChangeType::DocsOnly => &self.docs_keywords,
            ChangeType::Chore => &self.chore_keywords,
            ChangeType::PerfSecurity => &self.perf_security_keywords,
            ChangeType::Feature | ChangeType::Infra => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_set_builds() {
        let rules = RuleSet::default();
        assert_eq!(rules.infra_ticket_patterns.len(), 2);
        assert!(rules.infra_keywords.contains(&"terraform".to_string()));
        assert!(rules.dependency_manifests.contains("cargo.lock"));
    }

    #[test]
    fn test_from_raw_rejects_bad_pattern() {
        let err = RuleSet::from_raw(
            &["INFRA-(\\d".to_string()],
            vec![],
            vec![],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_ticket_patterns_are_case_insensitive() {
        let rules = RuleSet::default();
        assert!(rules.infra_ticket_patterns[0].is_match("infra-42"));
    }

    #[test]
    fn test_conflict_pair_matches_either_order() {
        let pair = ConflictPair {
            a: ChangeType::Bugfix,
            b: ChangeType::Feature,
            penalty: 0.1,
            exempt_margin: None,
        };
        assert!(pair.matches(ChangeType::Feature, ChangeType::Bugfix));
        assert!(pair.matches(ChangeType::Bugfix, ChangeType::Feature));
        assert!(!pair.matches(ChangeType::Bugfix, ChangeType::Chore));
    }
}
