//! Parsing of external summarizer output.
//!
//! Tool stdout mixes logger noise, ANSI color, and the markdown document we
//! actually want. Extraction strips the noise, finds the first
//! markdown-shaped line, and splits the document into titled sections; a
//! reviewer-facing summary is selected from the best available section.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::enrich::redact::strip_ansi;

/// Parsed document: title, per-section bodies, and the chosen summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedOutput {
    pub title: String,
    pub sections: BTreeMap<String, String>,
    pub summary: Option<String>,
}

const MARKDOWN_STARTS: &[&str] = &["#", "-", "*", "```", ">"];

/// Strip ANSI and logger lines, then cut everything before the first
/// markdown-shaped line.
pub fn extract_markdown(raw: &str) -> String {
    let cleaned = strip_ansi(raw);
    let log_line = Regex::new(r"^\d{4}-\d{2}-\d{2} .* \| (DEBUG|INFO|WARNING|ERROR)\s+\| ")
        .expect("log-line pattern compiles");
    let lines: Vec<&str> = cleaned
        .lines()
        .filter(|line| !log_line.is_match(line))
        .collect();
    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let split: Vec<&str> = text.lines().collect();
    let start = split.iter().position(|line| {
        let trimmed = line.trim_start();
        MARKDOWN_STARTS.iter().any(|s| trimmed.starts_with(s))
    });
    match start {
        Some(idx) => split[idx..].join("\n").trim().to_string(),
        None => text.to_string(),
    }
}

/// Split a markdown document into `## `-titled sections.
pub fn parse_sections(content: &str) -> ParsedOutput {
    let mut title = String::new();
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut buffer: Vec<String> = Vec::new();

    let flush = |current: &Option<String>, buffer: &mut Vec<String>, sections: &mut BTreeMap<String, String>| {
        if let Some(name) = current {
            let body = buffer.join("\n").trim().to_string();
            if !body.is_empty() {
                sections.insert(name.clone(), body);
            }
        }
        buffer.clear();
    };

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            flush(&current, &mut buffer, &mut sections);
            current = Some(heading.trim().to_lowercase());
        } else if let Some(doc_title) = line.strip_prefix("# ") {
            if title.is_empty() {
                title = doc_title.trim().to_string();
            }
        } else {
            buffer.push(line.to_string());
        }
    }
    flush(&current, &mut buffer, &mut sections);

    let summary = select_summary(&sections);
    ParsedOutput {
        title,
        sections,
        summary,
    }
}

/// True when the text looks like a raw diff rather than prose.
pub fn looks_like_diff(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .take(8)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return false;
    }
    let prefixes = ["@@ ", "diff --git", "+++ ", "--- ", "+", "-"];
    let hits = lines
        .iter()
        .filter(|l| prefixes.iter().any(|p| l.starts_with(p)))
        .count();
    hits >= (lines.len() / 2).max(2)
}

const SUMMARY_SECTION_ORDER: &[&str] = &["summary", "overview", "changes"];
const SUMMARY_MAX_LEN: usize = 1000;
const SUMMARY_MIN_WORDS: usize = 8;

/// Pick the first usable prose section as the reviewer summary.
fn select_summary(sections: &BTreeMap<String, String>) -> Option<String> {
    for name in SUMMARY_SECTION_ORDER {
        let Some(body) = sections.get(*name) else {
            continue;
        };
        let cleaned = body.trim();
        if cleaned.is_empty() || looks_like_diff(cleaned) {
            continue;
        }
        if cleaned.split_whitespace().count() < SUMMARY_MIN_WORDS {
            continue;
        }
        let truncated: String = cleaned.chars().take(SUMMARY_MAX_LEN).collect();
        return Some(truncated);
    }
    None
}
