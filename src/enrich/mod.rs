//! External-tool enrichment of low-confidence classifications.
//!
//! The active-learning loop spends expensive summarizer invocations only
//! on records the engine flagged: candidates are selected by confidence
//! and needs-review verdict, the tool runs once per MR as a subprocess,
//! and the cleaned, redacted output is stored as an enrichment artifact
//! keyed by content hash so re-runs are idempotent.

pub mod parse;
pub mod redact;
pub mod runner;

pub use parse::{extract_markdown, looks_like_diff, parse_sections, ParsedOutput};
pub use redact::{collect_secret_values, redact_secrets, strip_ansi};
pub use runner::{resolve_command, run_command, RunOutput};

use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::core::Result;
use crate::storage::{Database, EnrichCandidate, EnrichmentArtifact, EnrichmentRun};

/// Options for one enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub tool: String,
    /// Select records with confidence strictly below this value (records
    /// already flagged needs-review qualify regardless).
    pub confidence_below: f64,
    pub limit: u32,
    /// Skip records that already have an artifact for this tool.
    pub only_missing: bool,
    pub timeout: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        EnrichOptions {
            tool: "describe".to_string(),
            confidence_below: 0.75,
            limit: 10,
            only_missing: true,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn stderr_excerpt(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(redact_secrets(&trimmed.chars().take(2000).collect::<String>()))
    }
}

/// Run the summarizer for every selected candidate in one project.
pub fn enrich_project(
    db: &Database,
    project_id: i64,
    options: &EnrichOptions,
) -> Result<EnrichReport> {
    let conn = db.connect()?;
    let candidates = db.enrich_candidates(
        &conn,
        project_id,
        options.confidence_below,
        options.limit,
        options.only_missing,
        &options.tool,
    )?;

    let mut report = EnrichReport {
        candidates: candidates.len(),
        ..Default::default()
    };
    log::info!(
        "project {project_id}: {} enrichment candidate(s) for {}",
        candidates.len(),
        options.tool
    );

    for candidate in &candidates {
        match enrich_one(db, &conn, candidate, options) {
            Ok(true) => report.succeeded += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                // A single broken record must not abort the batch.
                log::warn!("mr {}: enrichment error: {e}", candidate.mr_id);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

fn enrich_one(
    db: &Database,
    conn: &rusqlite::Connection,
    candidate: &EnrichCandidate,
    options: &EnrichOptions,
) -> Result<bool> {
    let command = resolve_command(&options.tool, &candidate.web_url)?;
    let started_at = Utc::now().to_rfc3339();
    let output = run_command(&command, options.timeout);
    let finished_at = Utc::now().to_rfc3339();

    // The stored command is redacted the same way the output is.
    let stored_command = redact_secrets(&command);

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            db.insert_enrichment_run(
                conn,
                &EnrichmentRun {
                    mr_id: candidate.mr_id,
                    tool: options.tool.clone(),
                    status: "error".to_string(),
                    command: stored_command,
                    exit_code: None,
                    stderr_excerpt: Some(e.to_string()),
                    started_at,
                    finished_at,
                },
            )?;
            return Ok(false);
        }
    };

    let status = if output.timed_out {
        "timeout"
    } else if output.succeeded() {
        "ok"
    } else {
        "failed"
    };
    db.insert_enrichment_run(
        conn,
        &EnrichmentRun {
            mr_id: candidate.mr_id,
            tool: options.tool.clone(),
            status: status.to_string(),
            command: stored_command,
            exit_code: output.exit_code,
            stderr_excerpt: stderr_excerpt(&output.stderr),
            started_at,
            finished_at,
        },
    )?;

    if !output.succeeded() {
        return Ok(false);
    }

    let markdown = redact_secrets(&extract_markdown(&output.stdout));
    if markdown.is_empty() {
        log::warn!("mr {}: tool produced no markdown", candidate.mr_id);
        return Ok(false);
    }
    let parsed = parse_sections(&markdown);

    db.upsert_enrichment_artifact(
        conn,
        &EnrichmentArtifact {
            mr_id: candidate.mr_id,
            project_id: candidate.project_id,
            mr_iid: candidate.mr_iid,
            tool: options.tool.clone(),
            summary: parsed.summary.clone(),
            sections: serde_json::to_value(&parsed.sections)?,
            content_sha256: sha256_hex(&markdown),
            markdown,
        },
    )?;
    Ok(true)
}
