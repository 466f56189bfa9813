//! Change-surface analysis over the set of changed file paths.
//!
//! Each path lands in at most one of docs / test / dependency-manifest /
//! infra-path; everything not matching docs, test, or dependency counts
//! toward the code ratio (infra paths included, since CI and deployment
//! files are still code-shaped changes).

use serde::{Deserialize, Serialize};

use crate::config::RuleSet;
use crate::core::ChangedFile;

/// Category assigned to a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Docs,
    Test,
    Dependency,
    InfraPath,
    Other,
}

const INFRA_EXACT_FILES: &[&str] = &[
    ".gitlab-ci.yml",
    ".gitlab-ci.yaml",
    "dockerfile",
    "serverless.yml",
];

const INFRA_PREFIXES: &[&str] = &[
    "infra/",
    "infrastructure/",
    "terraform/",
    "helm/",
    "k8s/",
    ".github/workflows/",
];

const INFRA_SUFFIXES: &[&str] = &[".tf", ".tfvars"];

const TEST_SUFFIXES: &[&str] = &["_test.py", ".spec.ts", ".spec.js", ".test.ts", ".test.js"];

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn is_docs_path(path: &str) -> bool {
    path.ends_with(".md") || path.starts_with("docs/") || path.contains("/docs/")
}

pub(crate) fn is_test_path(path: &str) -> bool {
    path.contains("test") || TEST_SUFFIXES.iter().any(|s| path.ends_with(s))
}

/// Infra-indicating path check, shared with the intent override.
pub fn is_infra_path(path: &str) -> bool {
    INFRA_EXACT_FILES.contains(&path)
        || INFRA_PREFIXES.iter().any(|p| path.starts_with(p))
        || INFRA_SUFFIXES.iter().any(|s| path.ends_with(s))
}

/// Classify one lowercased path into its single category.
pub fn classify_path(path: &str, rules: &RuleSet) -> PathKind {
    if path.is_empty() {
        return PathKind::Other;
    }
    if is_docs_path(path) {
        PathKind::Docs
    } else if is_test_path(path) {
        PathKind::Test
    } else if rules.dependency_manifests.contains(basename(path)) {
        PathKind::Dependency
    } else if is_infra_path(path) {
        PathKind::InfraPath
    } else {
        PathKind::Other
    }
}

/// Aggregated path statistics for one merge request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    pub docs_file_count: u64,
    pub test_file_count: u64,
    pub dep_file_count: u64,
    pub infra_file_count: u64,
    pub code_file_count: u64,
    pub docs_file_ratio: f64,
    pub test_file_ratio: f64,
    pub dep_file_ratio: f64,
    pub infra_file_ratio: f64,
    pub code_file_ratio: f64,
    pub dep_only_change: bool,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Compute ratios and flags over the changed-path set.
///
/// The ratio denominator has a floor of 1 so an empty change produces all
/// zeros rather than a division by zero.
pub fn analyze_paths(files: &[ChangedFile], rules: &RuleSet) -> PathStats {
    let paths: Vec<String> = files
        .iter()
        .map(|f| f.effective_path().trim().to_lowercase())
        .collect();
    let total = paths.len().max(1) as f64;

    let mut stats = PathStats::default();
    for path in &paths {
        match classify_path(path, rules) {
            PathKind::Docs => stats.docs_file_count += 1,
            PathKind::Test => stats.test_file_count += 1,
            PathKind::Dependency => stats.dep_file_count += 1,
            PathKind::InfraPath => stats.infra_file_count += 1,
            PathKind::Other => {}
        }
    }

    // Code = everything that is not docs, test, or dependency. Infra
    // paths count toward both the infra ratio and the code ratio.
    let non_code = stats.docs_file_count + stats.test_file_count + stats.dep_file_count;
    stats.code_file_count = paths.len() as u64 - non_code;

    stats.docs_file_ratio = round4(stats.docs_file_count as f64 / total);
    stats.test_file_ratio = round4(stats.test_file_count as f64 / total);
    stats.dep_file_ratio = round4(stats.dep_file_count as f64 / total);
    stats.infra_file_ratio = round4(stats.infra_file_count as f64 / total);
    stats.code_file_ratio = round4(stats.code_file_count as f64 / total);
    stats.dep_only_change = !paths.is_empty() && stats.dep_file_count as usize == paths.len();

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<ChangedFile> {
        paths.iter().map(|p| ChangedFile::path(*p)).collect()
    }

    #[test]
    fn test_empty_change_has_zero_ratios() {
        let stats = analyze_paths(&[], &RuleSet::default());
        assert_eq!(stats.code_file_ratio, 0.0);
        assert!(!stats.dep_only_change);
    }

    #[test]
    fn test_docs_classification_wins_over_test() {
        // A path under docs/ mentioning "test" is still a docs path.
        let kind = classify_path("docs/testing-guide.md", &RuleSet::default());
        assert_eq!(kind, PathKind::Docs);
    }

    #[test]
    fn test_dep_only_change() {
        let stats = analyze_paths(&files(&["Cargo.lock", "go.mod"]), &RuleSet::default());
        assert!(stats.dep_only_change);
        assert_eq!(stats.dep_file_ratio, 1.0);
        assert_eq!(stats.code_file_ratio, 0.0);
    }

    #[test]
    fn test_infra_paths_count_as_code() {
        let stats = analyze_paths(
            &files(&["terraform/main.tf", "src/app.py"]),
            &RuleSet::default(),
        );
        assert_eq!(stats.infra_file_count, 1);
        assert_eq!(stats.code_file_count, 2);
        assert_eq!(stats.code_file_ratio, 1.0);
    }

    #[test]
    fn test_mixed_surface_ratios() {
        let stats = analyze_paths(
            &files(&["readme.md", "src/lib.rs", "tests/it.rs", "package-lock.json"]),
            &RuleSet::default(),
        );
        assert_eq!(stats.docs_file_ratio, 0.25);
        assert_eq!(stats.test_file_ratio, 0.25);
        assert_eq!(stats.dep_file_ratio, 0.25);
        assert_eq!(stats.code_file_ratio, 0.25);
        assert!(!stats.dep_only_change);
    }

    #[test]
    fn test_infra_path_rules() {
        let rules = RuleSet::default();
        for p in [
            ".gitlab-ci.yml",
            "dockerfile",
            ".github/workflows/ci.yml",
            "helm/values.yaml",
            "envs/prod.tfvars",
        ] {
            assert_eq!(classify_path(p, &rules), PathKind::InfraPath, "{p}");
        }
        assert_eq!(classify_path("src/deploy.rs", &rules), PathKind::Other);
    }

    #[test]
    fn test_deleted_file_uses_old_path() {
        let file = ChangedFile {
            old_path: Some("docs/old.md".into()),
            new_path: None,
            ..Default::default()
        };
        let stats = analyze_paths(&[file], &RuleSet::default());
        assert_eq!(stats.docs_file_count, 1);
    }
}
