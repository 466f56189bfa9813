//! Capability and risk tagging.
//!
//! Capability tags come from independent topical keyword families scanned
//! over the combined text and paths; risk tags are derived from the
//! capability set, the text, and raw features. Both are emitted as sorted,
//! de-duplicated sets with their evidence.

use std::collections::{BTreeMap, BTreeSet};

use crate::classify::TextIndex;
use crate::config::RuleSet;
use crate::core::{ChangeType, FeatureVector};

/// Capability tags plus the evidence that produced each tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityTags {
    pub tags: Vec<String>,
    pub evidence: BTreeMap<String, Vec<String>>,
}

/// Detect capability tags for one record.
pub fn detect_capability_tags(
    text: &TextIndex,
    features: &FeatureVector,
    final_type: ChangeType,
    rules: &RuleSet,
) -> CapabilityTags {
    let mut tags: BTreeSet<String> = BTreeSet::new();
    let mut evidence: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for family in &rules.capability_families {
        if let Some(gate) = family.gate_keyword {
            if !text.text_with_paths.contains(gate) {
                continue;
            }
        }

        let mut hits: Vec<String> = family
            .keywords
            .iter()
            .filter(|k| text.text_with_paths.contains(**k))
            .map(|k| k.to_string())
            .collect();
        for suffix in family.path_suffixes {
            hits.extend(text.paths.iter().filter(|p| p.ends_with(*suffix)).cloned());
        }
        hits.sort();
        hits.dedup();

        if !hits.is_empty() {
            tags.insert(family.tag.to_string());
            evidence.insert(family.tag.to_string(), hits);
        }
    }

    if features.infra_signal_score >= 0.1 || final_type == ChangeType::Infra {
        tags.insert("infra.general".to_string());
        evidence
            .entry("infra.general".to_string())
            .or_default()
            .push(format!("infra_signal={}", features.infra_signal_score));
    }

    CapabilityTags {
        tags: tags.into_iter().collect(),
        evidence,
    }
}

/// Derive risk tags from capabilities, text, and features.
pub fn detect_risk_tags(
    text: &TextIndex,
    features: &FeatureVector,
    capability_tags: &[String],
    final_type: ChangeType,
    rules: &RuleSet,
) -> Vec<String> {
    let mut risks: BTreeSet<String> = BTreeSet::new();

    if capability_tags.iter().any(|t| t.starts_with("security.")) {
        risks.insert("risk.security".to_string());
    }
    if capability_tags.iter().any(|t| t == "data.migration") {
        risks.insert("risk.migration".to_string());
    }
    if rules
        .breaking_change_phrases
        .iter()
        .any(|p| text.text_with_paths.contains(p.as_str()))
    {
        risks.insert("risk.breaking-change".to_string());
    }
    if final_type == ChangeType::Infra || capability_tags.iter().any(|t| t.starts_with("infra.")) {
        risks.insert("risk.infra".to_string());
    }
    if features.churn > rules.large_change_churn {
        risks.insert("risk.large-change".to_string());
    }

    risks.into_iter().collect()
}
