//! Infrastructure-relatedness signal extraction.
//!
//! Scores ticket-reference matches, allow-listed labels, and keyword hits
//! into a single weighted `infra_signal_score`, then maps the score to a
//! qualitative level against the configured thresholds. Pure function of
//! its inputs; deterministic for identical inputs and rules.

use serde::{Deserialize, Serialize};

use crate::config::{ClassificationConfig, RuleSet};
use crate::core::InfraSignalLevel;

const TICKET_WEIGHT: f64 = 2.5;
const LABEL_WEIGHT: f64 = 2.0;
const KEYWORD_WEIGHT: f64 = 1.5;
const KEYWORD_SCORE_CAP: f64 = 3.0;

/// Extracted infra signals, later folded into the `FeatureVector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraSignals {
    pub ticket_match_count: u64,
    pub keyword_score: f64,
    pub label_match_count: u64,
    pub signal_score: f64,
    pub signal_level: InfraSignalLevel,
    pub matched_tickets: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub matched_labels: Vec<String>,
}

/// Score infra-relatedness from title, description, and labels.
///
/// Ticket patterns run over the raw title/description (they are compiled
/// case-insensitive); keyword matching runs over the lowercased text.
pub fn extract_infra_signals(
    title: &str,
    description: &str,
    labels: &[String],
    rules: &RuleSet,
    config: &ClassificationConfig,
) -> InfraSignals {
    let raw_text = format!("{title}\n{description}");
    let lowered = raw_text.to_lowercase();

    let mut matched_tickets: Vec<String> = Vec::new();
    for pattern in &rules.infra_ticket_patterns {
        for m in pattern.find_iter(&raw_text) {
            matched_tickets.push(m.as_str().to_string());
        }
    }

    let mut matched_keywords: Vec<String> = rules
        .infra_keywords
        .iter()
        .filter(|kw| lowered.contains(kw.as_str()))
        .cloned()
        .collect();
    matched_keywords.sort();
    matched_keywords.dedup();

    let mut matched_labels: Vec<String> = labels
        .iter()
        .map(|l| l.to_lowercase())
        .filter(|l| rules.infra_label_allowlist.contains(l))
        .collect();
    matched_labels.sort();
    matched_labels.dedup();

    let ticket_score = matched_tickets.len() as f64 * TICKET_WEIGHT;
    let label_score = matched_labels.len() as f64 * LABEL_WEIGHT;
    let keyword_score = (matched_keywords.len() as f64 * KEYWORD_WEIGHT).min(KEYWORD_SCORE_CAP);
    let signal_score = ticket_score + label_score + keyword_score;

    let signal_level = if signal_score >= config.infra_strong_threshold {
        InfraSignalLevel::Strong
    } else if signal_score >= config.infra_weak_threshold {
        InfraSignalLevel::Weak
    } else {
        InfraSignalLevel::None
    };

    InfraSignals {
        ticket_match_count: matched_tickets.len() as u64,
        keyword_score,
        label_match_count: matched_labels.len() as u64,
        signal_score,
        signal_level,
        matched_tickets,
        matched_keywords,
        matched_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassificationConfig {
        ClassificationConfig::default()
    }

    #[test]
    fn test_no_signal_on_plain_change() {
        let signals = extract_infra_signals(
            "Add pagination to user list",
            "Implements cursor-based pagination",
            &[],
            &RuleSet::default(),
            &config(),
        );
        assert_eq!(signals.signal_score, 0.0);
        assert_eq!(signals.signal_level, InfraSignalLevel::None);
        assert!(signals.matched_tickets.is_empty());
    }

    #[test]
    fn test_ticket_and_label_weights() {
        let signals = extract_infra_signals(
            "INFRA-123 rotate credentials",
            "see OPS-9",
            &["infra".to_string(), "backend".to_string()],
            &RuleSet::default(),
            &config(),
        );
        assert_eq!(signals.ticket_match_count, 2);
        assert_eq!(signals.label_match_count, 1);
        // 2 tickets * 2.5 + 1 label * 2.0 + "infra" keyword * 1.5
        assert_eq!(signals.signal_score, 2.5 * 2.0 + 2.0 + 1.5);
        assert_eq!(signals.signal_level, InfraSignalLevel::Strong);
    }

    #[test]
    fn test_keyword_score_is_capped() {
        let signals = extract_infra_signals(
            "terraform helm kubernetes docker cluster",
            "",
            &[],
            &RuleSet::default(),
            &config(),
        );
        assert_eq!(signals.keyword_score, 3.0);
        assert_eq!(signals.signal_score, 3.0);
        assert_eq!(signals.signal_level, InfraSignalLevel::Weak);
    }

    #[test]
    fn test_ticket_match_is_case_insensitive() {
        let signals = extract_infra_signals(
            "infra-77 tweak alerting",
            "",
            &[],
            &RuleSet::default(),
            &config(),
        );
        assert_eq!(signals.ticket_match_count, 1);
        assert_eq!(signals.matched_tickets, vec!["infra-77".to_string()]);
    }

    #[test]
    fn test_duplicate_labels_count_once() {
        let signals = extract_infra_signals(
            "",
            "",
            &["SRE".to_string(), "sre".to_string()],
            &RuleSet::default(),
            &config(),
        );
        assert_eq!(signals.label_match_count, 1);
    }
}
