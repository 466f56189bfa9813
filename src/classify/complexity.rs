//! Engineering-activity complexity model.
//!
//! Independent additive sum over normalized counters, each capped before
//! summing so no single signal dominates. The theoretical maximum is 12.0.

use crate::core::{ComplexityBreakdown, ComplexityComponent, ComplexityLevel, FeatureVector};

/// (name, divisor, cap) for each counter.
const COMPONENTS: &[(&str, f64, f64)] = &[
    ("churn", 250.0, 4.0),
    ("files_changed", 10.0, 2.0),
    ("commit_count", 8.0, 1.5),
    ("review_comment_count", 20.0, 1.5),
    ("review_thread_count", 10.0, 1.0),
    ("unresolved_thread_count", 5.0, 1.0),
    ("pipeline_failed_count", 3.0, 1.0),
];

fn counter(features: &FeatureVector, name: &str) -> u64 {
    match name {
        "churn" => features.churn,
        "files_changed" => features.files_changed,
        "commit_count" => features.commit_count,
        "review_comment_count" => features.review_comment_count,
        "review_thread_count" => features.review_thread_count,
        "unresolved_thread_count" => features.unresolved_thread_count,
        "pipeline_failed_count" => features.pipeline_failed_count,
        _ => 0,
    }
}

fn tier_for(score: f64) -> ComplexityLevel {
    if score < 1.5 {
        ComplexityLevel::VeryLow
    } else if score < 3.0 {
        ComplexityLevel::Low
    } else if score < 5.0 {
        ComplexityLevel::Medium
    } else if score < 7.0 {
        ComplexityLevel::High
    } else {
        ComplexityLevel::VeryHigh
    }
}

/// Score the record and map it to an ordinal tier.
pub fn score_complexity(features: &FeatureVector) -> ComplexityBreakdown {
    let mut components = Vec::with_capacity(COMPONENTS.len());
    let mut score = 0.0;
    for (name, divisor, cap) in COMPONENTS {
        let raw = counter(features, name);
        let contribution = (raw as f64 / divisor).min(*cap);
        score += contribution;
        components.push(ComplexityComponent {
            name: (*name).to_string(),
            raw,
            contribution,
        });
    }

    ComplexityBreakdown {
        components,
        score,
        level: tier_for(score),
    }
}
