//! Infra-intent override detection.
//!
//! Independent of the weighted infra signal score: strong infra terms in
//! the combined text, softer deploy-ish terms in the title alone, and
//! infra-indicating paths each produce evidence. The override fires on any
//! evidence, but whether it may relabel the record depends on the base
//! type: a passing mention of "deploy" in a bugfix description must not
//! turn a trivial fix into infra, so bugfix and chore require path
//! evidence before the label changes.

use serde::{Deserialize, Serialize};

use crate::classify::paths::is_infra_path;
use crate::classify::TextIndex;
use crate::config::RuleSet;
use crate::core::ChangeType;

/// Where a piece of intent evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentEvidenceKind {
    Term,
    Title,
    Path,
}

/// One intent-evidence item, rendered as `kind:value` in the rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEvidence {
    pub kind: IntentEvidenceKind,
    pub value: String,
}

impl IntentEvidence {
    pub fn render(&self) -> String {
        let prefix = match self.kind {
            IntentEvidenceKind::Term => "term",
            IntentEvidenceKind::Title => "title",
            IntentEvidenceKind::Path => "path",
        };
        format!("{prefix}:{}", self.value)
    }
}

/// Result of the intent scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentDetection {
    pub evidence: Vec<IntentEvidence>,
}

impl IntentDetection {
    /// True when any evidence item was found.
    pub fn fired(&self) -> bool {
        !self.evidence.is_empty()
    }

    pub fn has_path_evidence(&self) -> bool {
        self.evidence
            .iter()
            .any(|e| e.kind == IntentEvidenceKind::Path)
    }

    /// Whether the override may change `final_type` given the base type.
    pub fn may_apply_to(&self, base_type: ChangeType) -> bool {
        match base_type {
            ChangeType::Bugfix | ChangeType::Chore => self.has_path_evidence(),
            _ => self.fired(),
        }
    }

    /// Sorted, de-duplicated evidence strings for the rationale.
    pub fn rendered_evidence(&self) -> Vec<String> {
        let mut rendered: Vec<String> = self.evidence.iter().map(|e| e.render()).collect();
        rendered.sort();
        rendered.dedup();
        rendered
    }
}

fn path_intent_hit(path: &str) -> bool {
    is_infra_path(path)
        || path.starts_with("lambda/")
        || path.starts_with("lambdas/")
        || path.starts_with("scripts/deploy")
        || path.ends_with("/deploy.sh")
        || path == "deploy.sh"
}

/// Scan text and paths for infra-intent evidence.
pub fn detect_infra_intent(text: &TextIndex, rules: &RuleSet) -> IntentDetection {
    let mut evidence = Vec::new();

    for term in &rules.intent_strong_terms {
        if text.text_with_paths.contains(term.as_str()) {
            evidence.push(IntentEvidence {
                kind: IntentEvidenceKind::Term,
                value: term.clone(),
            });
        }
    }

    for term in &rules.intent_title_terms {
        if text.title.contains(term.as_str()) {
            evidence.push(IntentEvidence {
                kind: IntentEvidenceKind::Title,
                value: term.clone(),
            });
        }
    }

    for path in &text.paths {
        if path_intent_hit(path) {
            evidence.push(IntentEvidence {
                kind: IntentEvidenceKind::Path,
                value: path.clone(),
            });
        }
    }

    IntentDetection { evidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChangedFile, MergeRequestSnapshot};

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
    fn test_strong_term_in_description_fires() {
        let detection = detect_infra_intent(
            &index("Add service mesh", "roll out via terraform", &["src/mesh.rs"]),
            &RuleSet::default(),
        );
        assert!(detection.fired());
        assert!(!detection.has_path_evidence());
        assert!(detection
            .rendered_evidence()
            .contains(&"term:terraform".to_string()));
    }

    #[test]
    fn test_soft_deploy_term_only_counts_in_title() {
        let rules = RuleSet::default();
        let in_desc = detect_infra_intent(
            &index("Fix parser", "this also touches a deploy script", &["src/p.rs"]),
            &rules,
        );
        assert!(!in_desc
            .evidence
            .iter()
            .any(|e| e.kind == IntentEvidenceKind::Title));

        let in_title = detect_infra_intent(&index("Deploy new parser", "", &["src/p.rs"]), &rules);
        assert!(in_title
            .evidence
            .iter()
            .any(|e| e.kind == IntentEvidenceKind::Title));
    }

    #[test]
    fn test_ci_config_path_fires() {
        let detection = detect_infra_intent(
            &index("Update pipeline config", "", &[".gitlab-ci.yml"]),
            &RuleSet::default(),
        );
        assert!(detection.has_path_evidence());
        assert!(detection
            .rendered_evidence()
            .contains(&"path:.gitlab-ci.yml".to_string()));
    }

    #[test]
    fn test_text_only_evidence_cannot_relabel_bugfix_or_chore() {
        let detection = IntentDetection {
            evidence: vec![IntentEvidence {
                kind: IntentEvidenceKind::Term,
                value: "terraform".to_string(),
            }],
        };
        assert!(!detection.may_apply_to(ChangeType::Bugfix));
        assert!(!detection.may_apply_to(ChangeType::Chore));
        assert!(detection.may_apply_to(ChangeType::Feature));
        assert!(detection.may_apply_to(ChangeType::Refactor));
    }

    #[test]
    fn test_path_evidence_relabels_any_base_type() {
        let detection = IntentDetection {
            evidence: vec![IntentEvidence {
                kind: IntentEvidenceKind::Path,
                value: "deploy.sh".to_string(),
            }],
        };
        assert!(detection.may_apply_to(ChangeType::Bugfix));
        assert!(detection.may_apply_to(ChangeType::Chore));
    }

    #[test]
    fn test_no_evidence_no_fire() {
        let detection = detect_infra_intent(
            &index("Improve query planner", "faster joins", &["src/planner.rs"]),
            &RuleSet::default(),
        );
        assert!(!detection.fired());
        assert!(!detection.may_apply_to(ChangeType::Feature));
    }
}
