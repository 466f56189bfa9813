//! SQLite persistence for merge requests, features, classifications,
//! checkpoints, and enrichment artifacts.
//!
//! Every public method takes an open connection so callers control
//! transaction scope; `Database` itself only owns the path. Writes are
//! idempotent upserts keyed by GitLab identity, and classifications carry
//! the `classifier_version` used for staleness detection.

mod schema;

pub use schema::SCHEMA_SQL;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::classify::{DiscussionSummary, PipelineSummary};
use crate::core::{ChangedFile, ClassificationResult, Error, FeatureVector, Result};

/// One stored merge request row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequestRecord {
    /// GitLab global id, used as the primary key.
    pub id: i64,
    pub project_id: i64,
    pub iid: i64,
    pub title: String,
    pub description: Option<String>,
    pub state: Option<String>,
    pub author_username: Option<String>,
    pub labels: Vec<String>,
    pub web_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
}

/// One stored commit row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub title: Option<String>,
    pub authored_date: Option<String>,
}

/// Approval counters for one merge request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub approvals_required: u64,
    pub approvals_given: u64,
}

/// Joined export row: identity plus classification outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    pub project_id: i64,
    pub mr_iid: i64,
    pub title: String,
    pub base_type: String,
    pub final_type: String,
    pub is_infra_related: bool,
    pub infra_override_applied: bool,
    pub complexity_level: String,
    pub complexity_score: f64,
    pub classification_confidence: f64,
    pub confidence_band: String,
    pub needs_review: bool,
    pub classifier_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<serde_json::Value>,
}

/// Row selected for the human-labeling audit sample.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub project_id: i64,
    pub mr_iid: i64,
    pub title: String,
    pub predicted_type: String,
    pub predicted_complexity: String,
}

/// Candidate for expensive external enrichment.
#[derive(Debug, Clone)]
pub struct EnrichCandidate {
    pub mr_id: i64,
    pub project_id: i64,
    pub mr_iid: i64,
    pub web_url: String,
    pub classification_confidence: f64,
    pub needs_review: bool,
}

/// Stored enrichment artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentArtifact {
    pub mr_id: i64,
    pub project_id: i64,
    pub mr_iid: i64,
    pub tool: String,
    pub summary: Option<String>,
    pub sections: serde_json::Value,
    pub content_sha256: String,
    pub markdown: String,
}

/// Outcome of one enrichment subprocess invocation.
#[derive(Debug, Clone)]
pub struct EnrichmentRun {
    pub mr_id: i64,
    pub tool: String,
    pub status: String,
    pub command: String,
    pub exit_code: Option<i64>,
    pub stderr_excerpt: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

/// Per-label aggregate used by the status report.
#[derive(Debug, Clone)]
pub struct TypeCount {
    pub final_type: String,
    pub count: i64,
    pub needs_review: i64,
}

/// Sync checkpoint watermark.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub watermark_updated_at: Option<String>,
    pub last_mr_iid: Option<i64>,
}

fn mr_from_row(row: &Row<'_>) -> rusqlite::Result<MergeRequestRecord> {
    let labels_json: String = row.get("labels_json")?;
    let labels = serde_json::from_str(&labels_json).unwrap_or_default();
    Ok(MergeRequestRecord {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        iid: row.get("iid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        state: row.get("state")?,
        author_username: row.get("author_username")?,
        labels,
        web_url: row.get("web_url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        merged_at: row.get("merged_at")?,
        closed_at: row.get("closed_at")?,
        source_branch: row.get("source_branch")?,
        target_branch: row.get("target_branch")?,
    })
}

/// SQLite store; one instance per database file.
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create a handle, ensuring the parent directory exists.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Database { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection with foreign keys enabled.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(|e| Error::Storage {
            message: format!("cannot open database: {e}"),
            path: Some(self.path.clone()),
            source: Some(e),
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Apply the idempotent schema batch.
    pub fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // -- merge requests ---------------------------------------------------

    pub fn upsert_merge_request(
        &self,
        conn: &Connection,
        mr: &MergeRequestRecord,
    ) -> Result<i64> {
        let labels_json = serde_json::to_string(&mr.labels)?;
        conn.execute(
            "INSERT INTO merge_requests (
               id, project_id, iid, title, description, state, author_username,
               labels_json, web_url, created_at, updated_at, merged_at, closed_at,
               source_branch, target_branch
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
               title=excluded.title,
               description=excluded.description,
               state=excluded.state,
               author_username=excluded.author_username,
               labels_json=excluded.labels_json,
               web_url=excluded.web_url,
               created_at=excluded.created_at,
               updated_at=excluded.updated_at,
               merged_at=excluded.merged_at,
               closed_at=excluded.closed_at,
               source_branch=excluded.source_branch,
               target_branch=excluded.target_branch",
            params![
                mr.id,
                mr.project_id,
                mr.iid,
                mr.title,
                mr.description,
                mr.state,
                mr.author_username,
                labels_json,
                mr.web_url,
                mr.created_at,
                mr.updated_at,
                mr.merged_at,
                mr.closed_at,
                mr.source_branch,
                mr.target_branch,
            ],
        )?;
        Ok(mr.id)
    }

    pub fn get_merge_request(
        &self,
        conn: &Connection,
        mr_id: i64,
    ) -> Result<Option<MergeRequestRecord>> {
        let record = conn
            .query_row(
                "SELECT * FROM merge_requests WHERE id = ?1",
                params![mr_id],
                mr_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Map of `iid -> updated_at` used by refresh to skip unchanged rows.
    pub fn mr_updated_at_map(
        &self,
        conn: &Connection,
        project_id: i64,
    ) -> Result<HashMap<i64, String>> {
        let mut stmt = conn.prepare(
            "SELECT iid, updated_at FROM merge_requests
             WHERE project_id = ?1 AND updated_at IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (iid, updated_at) = row?;
            map.insert(iid, updated_at);
        }
        Ok(map)
    }

    pub fn list_project_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT project_id FROM merge_requests ORDER BY project_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Merge requests for a project, optionally restricted to rows whose
    /// stored classification is missing or from a different engine version.
    pub fn list_mrs_for_classification(
        &self,
        conn: &Connection,
        project_id: i64,
        only_stale: bool,
        expected_version: &str,
    ) -> Result<Vec<MergeRequestRecord>> {
        let mut records = Vec::new();
        if only_stale {
            let mut stmt = conn.prepare(
                "SELECT m.* FROM merge_requests m
                 LEFT JOIN mr_classifications c ON c.mr_id = m.id
                 WHERE m.project_id = ?1
                   AND (c.mr_id IS NULL OR c.classifier_version != ?2)
                 ORDER BY m.updated_at ASC",
            )?;
            let rows = stmt.query_map(params![project_id, expected_version], mr_from_row)?;
            for row in rows {
                records.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT m.* FROM merge_requests m
                 WHERE m.project_id = ?1
                 ORDER BY m.updated_at ASC",
            )?;
            let rows = stmt.query_map(params![project_id], mr_from_row)?;
            for row in rows {
                records.push(row?);
            }
        }
        Ok(records)
    }

    // -- change details ---------------------------------------------------

    pub fn replace_commits(
        &self,
        conn: &Connection,
        mr_id: i64,
        commits: &[CommitRecord],
    ) -> Result<()> {
        conn.execute("DELETE FROM mr_commits WHERE mr_id = ?1", params![mr_id])?;
        let mut stmt = conn.prepare(
            "INSERT INTO mr_commits (mr_id, commit_sha, title, authored_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mr_id, commit_sha) DO NOTHING",
        )?;
        for commit in commits {
            stmt.execute(params![mr_id, commit.sha, commit.title, commit.authored_date])?;
        }
        Ok(())
    }

    pub fn replace_files(
        &self,
        conn: &Connection,
        mr_id: i64,
        files: &[ChangedFile],
    ) -> Result<()> {
        conn.execute("DELETE FROM mr_files WHERE mr_id = ?1", params![mr_id])?;
        let mut stmt = conn.prepare(
            "INSERT INTO mr_files (mr_id, old_path, new_path, additions, deletions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for file in files {
            stmt.execute(params![
                mr_id,
                file.old_path,
                file.new_path,
                file.additions as i64,
                file.deletions as i64,
            ])?;
        }
        Ok(())
    }

    pub fn load_commits(&self, conn: &Connection, mr_id: i64) -> Result<Vec<CommitRecord>> {
        let mut stmt = conn.prepare(
            "SELECT commit_sha, title, authored_date FROM mr_commits WHERE mr_id = ?1",
        )?;
        let rows = stmt.query_map(params![mr_id], |row| {
            Ok(CommitRecord {
                sha: row.get(0)?,
                title: row.get(1)?,
                authored_date: row.get(2)?,
            })
        })?;
        let mut commits = Vec::new();
        for row in rows {
            commits.push(row?);
        }
        Ok(commits)
    }

    pub fn load_files(&self, conn: &Connection, mr_id: i64) -> Result<Vec<ChangedFile>> {
        let mut stmt = conn.prepare(
            "SELECT old_path, new_path, additions, deletions FROM mr_files WHERE mr_id = ?1",
        )?;
        let rows = stmt.query_map(params![mr_id], |row| {
            Ok(ChangedFile {
                old_path: row.get(0)?,
                new_path: row.get(1)?,
                additions: row.get::<_, i64>(2)? as u64,
                deletions: row.get::<_, i64>(3)? as u64,
            })
        })?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    pub fn upsert_discussions(
        &self,
        conn: &Connection,
        mr_id: i64,
        summary: &DiscussionSummary,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO mr_discussions (mr_id, thread_count, note_count, unresolved_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mr_id) DO UPDATE SET
               thread_count=excluded.thread_count,
               note_count=excluded.note_count,
               unresolved_count=excluded.unresolved_count",
            params![
                mr_id,
                summary.thread_count as i64,
                summary.note_count as i64,
                summary.unresolved_count as i64,
            ],
        )?;
        Ok(())
    }

    pub fn load_discussions(&self, conn: &Connection, mr_id: i64) -> Result<DiscussionSummary> {
        let summary = conn
            .query_row(
                "SELECT thread_count, note_count, unresolved_count
                 FROM mr_discussions WHERE mr_id = ?1",
                params![mr_id],
                |row| {
                    Ok(DiscussionSummary {
                        thread_count: row.get::<_, i64>(0)? as u64,
                        note_count: row.get::<_, i64>(1)? as u64,
                        unresolved_count: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(summary.unwrap_or_default())
    }

    pub fn upsert_approvals(
        &self,
        conn: &Connection,
        mr_id: i64,
        summary: &ApprovalSummary,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO mr_approvals (mr_id, approvals_required, approvals_given)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(mr_id) DO UPDATE SET
               approvals_required=excluded.approvals_required,
               approvals_given=excluded.approvals_given",
            params![
                mr_id,
                summary.approvals_required as i64,
                summary.approvals_given as i64,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_pipelines(
        &self,
        conn: &Connection,
        mr_id: i64,
        summary: &PipelineSummary,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO mr_pipelines (mr_id, pipeline_count, failed_count, success_count, retry_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(mr_id) DO UPDATE SET
               pipeline_count=excluded.pipeline_count,
               failed_count=excluded.failed_count,
               success_count=excluded.success_count,
               retry_count=excluded.retry_count",
            params![
                mr_id,
                summary.pipeline_count as i64,
                summary.failed_count as i64,
                summary.success_count as i64,
                summary.retry_count as i64,
            ],
        )?;
        Ok(())
    }

    pub fn load_pipelines(&self, conn: &Connection, mr_id: i64) -> Result<PipelineSummary> {
        let summary = conn
            .query_row(
                "SELECT pipeline_count, failed_count, success_count, retry_count
                 FROM mr_pipelines WHERE mr_id = ?1",
                params![mr_id],
                |row| {
                    Ok(PipelineSummary {
                        pipeline_count: row.get::<_, i64>(0)? as u64,
                        failed_count: row.get::<_, i64>(1)? as u64,
                        success_count: row.get::<_, i64>(2)? as u64,
                        retry_count: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(summary.unwrap_or_default())
    }

    // -- features & classifications ---------------------------------------

    pub fn upsert_features(
        &self,
        conn: &Connection,
        mr_id: i64,
        features: &FeatureVector,
    ) -> Result<()> {
        let feature_json = serde_json::to_string(features)?;
        conn.execute(
            "INSERT INTO mr_features (mr_id, feature_json, extracted_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(mr_id) DO UPDATE SET
               feature_json=excluded.feature_json,
               extracted_at=excluded.extracted_at",
            params![mr_id, feature_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Load a stored feature vector. A row that no longer matches the
    /// `FeatureVector` contract fails fast rather than defaulting fields.
    pub fn load_features(&self, conn: &Connection, mr_id: i64) -> Result<Option<FeatureVector>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT feature_json FROM mr_features WHERE mr_id = ?1",
                params![mr_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => {
                let features = serde_json::from_str(&json).map_err(|e| {
                    Error::validation(format!("stored features for mr {mr_id} are malformed: {e}"))
                })?;
                Ok(Some(features))
            }
            None => Ok(None),
        }
    }

    pub fn upsert_classification(
        &self,
        conn: &Connection,
        mr_id: i64,
        result: &ClassificationResult,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO mr_classifications (
               mr_id, base_type, final_type, is_infra_related, infra_override_applied,
               complexity_level, complexity_score, capability_tags_json, risk_tags_json,
               classification_confidence, confidence_band, needs_review,
               why_needs_review_json, classifier_version, rationale_json, classified_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(mr_id) DO UPDATE SET
               base_type=excluded.base_type,
               final_type=excluded.final_type,
               is_infra_related=excluded.is_infra_related,
               infra_override_applied=excluded.infra_override_applied,
               complexity_level=excluded.complexity_level,
               complexity_score=excluded.complexity_score,
               capability_tags_json=excluded.capability_tags_json,
               risk_tags_json=excluded.risk_tags_json,
               classification_confidence=excluded.classification_confidence,
               confidence_band=excluded.confidence_band,
               needs_review=excluded.needs_review,
               why_needs_review_json=excluded.why_needs_review_json,
               classifier_version=excluded.classifier_version,
               rationale_json=excluded.rationale_json,
               classified_at=excluded.classified_at",
            params![
                mr_id,
                result.base_type.as_str(),
                result.final_type.as_str(),
                result.is_infra_related as i64,
                result.infra_override_applied as i64,
                result.complexity_level.as_str(),
                result.complexity_score,
                serde_json::to_string(&result.capability_tags)?,
                serde_json::to_string(&result.risk_tags)?,
                result.classification_confidence,
                result.confidence_band.as_str(),
                result.needs_review as i64,
                serde_json::to_string(&result.why_needs_review)?,
                result.classifier_version,
                serde_json::to_string(&result.rationale)?,
                result.classified_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn classification_version(
        &self,
        conn: &Connection,
        mr_id: i64,
    ) -> Result<Option<String>> {
        let version = conn
            .query_row(
                "SELECT classifier_version FROM mr_classifications WHERE mr_id = ?1",
                params![mr_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    // -- checkpoints ------------------------------------------------------

    pub fn load_checkpoint(
        &self,
        conn: &Connection,
        project_id: i64,
        source: &str,
    ) -> Result<Option<Checkpoint>> {
        let checkpoint = conn
            .query_row(
                "SELECT watermark_updated_at, last_mr_iid FROM sync_checkpoints
                 WHERE project_id = ?1 AND source = ?2",
                params![project_id, source],
                |row| {
                    Ok(Checkpoint {
                        watermark_updated_at: row.get(0)?,
                        last_mr_iid: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(checkpoint)
    }

    pub fn upsert_checkpoint(
        &self,
        conn: &Connection,
        project_id: i64,
        source: &str,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO sync_checkpoints (project_id, source, watermark_updated_at, last_mr_iid, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id, source) DO UPDATE SET
               watermark_updated_at=excluded.watermark_updated_at,
               last_mr_iid=excluded.last_mr_iid,
               updated_at=excluded.updated_at",
            params![
                project_id,
                source,
                checkpoint.watermark_updated_at,
                checkpoint.last_mr_iid,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // -- export / audit / status ------------------------------------------

    pub fn export_rows(&self, conn: &Connection, with_rationale: bool) -> Result<Vec<ExportRow>> {
        let mut stmt = conn.prepare(
            "SELECT m.project_id, m.iid, m.title, c.base_type, c.final_type,
                    c.is_infra_related, c.infra_override_applied,
                    c.complexity_level, c.complexity_score,
                    c.classification_confidence, c.confidence_band, c.needs_review,
                    c.classifier_version, c.rationale_json
             FROM merge_requests m
             JOIN mr_classifications c ON c.mr_id = m.id
             ORDER BY m.updated_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let rationale_json: String = row.get(13)?;
            Ok(ExportRow {
                project_id: row.get(0)?,
                mr_iid: row.get(1)?,
                title: row.get(2)?,
                base_type: row.get(3)?,
                final_type: row.get(4)?,
                is_infra_related: row.get::<_, i64>(5)? != 0,
                infra_override_applied: row.get::<_, i64>(6)? != 0,
                complexity_level: row.get(7)?,
                complexity_score: row.get(8)?,
                classification_confidence: row.get(9)?,
                confidence_band: row.get(10)?,
                needs_review: row.get::<_, i64>(11)? != 0,
                classifier_version: row.get(12)?,
                rationale: if with_rationale {
                    serde_json::from_str(&rationale_json).ok()
                } else {
                    None
                },
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn audit_sample(&self, conn: &Connection, size: u32) -> Result<Vec<AuditRow>> {
        let mut stmt = conn.prepare(
            "SELECT m.project_id, m.iid, m.title, c.final_type, c.complexity_level
             FROM merge_requests m
             JOIN mr_classifications c ON c.mr_id = m.id
             ORDER BY RANDOM()
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![size], |row| {
            Ok(AuditRow {
                project_id: row.get(0)?,
                mr_iid: row.get(1)?,
                title: row.get(2)?,
                predicted_type: row.get(3)?,
                predicted_complexity: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn type_counts(&self, conn: &Connection) -> Result<Vec<TypeCount>> {
        let mut stmt = conn.prepare(
            "SELECT final_type, COUNT(*), SUM(needs_review)
             FROM mr_classifications
             GROUP BY final_type
             ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TypeCount {
                final_type: row.get(0)?,
                count: row.get(1)?,
                needs_review: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // -- enrichment -------------------------------------------------------

    /// Low-confidence candidates for external enrichment, worst first.
    pub fn enrich_candidates(
        &self,
        conn: &Connection,
        project_id: i64,
        confidence_below: f64,
        limit: u32,
        only_missing: bool,
        tool: &str,
    ) -> Result<Vec<EnrichCandidate>> {
        fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<EnrichCandidate> {
            Ok(EnrichCandidate {
                mr_id: row.get(0)?,
                project_id: row.get(1)?,
                mr_iid: row.get(2)?,
                web_url: row.get(3)?,
                classification_confidence: row.get(4)?,
                needs_review: row.get::<_, i64>(5)? != 0,
            })
        }

        let mut out = Vec::new();
        if only_missing {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.project_id, m.iid, m.web_url,
                        c.classification_confidence, c.needs_review
                 FROM merge_requests m
                 JOIN mr_classifications c ON c.mr_id = m.id
                 LEFT JOIN enrichment_artifacts a ON a.mr_id = m.id AND a.tool = ?4
                 WHERE m.project_id = ?1
                   AND m.web_url IS NOT NULL AND m.web_url != ''
                   AND (c.classification_confidence < ?2 OR c.needs_review = 1)
                   AND a.mr_id IS NULL
                 ORDER BY c.classification_confidence ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![project_id, confidence_below, limit, tool],
                candidate_from_row,
            )?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.project_id, m.iid, m.web_url,
                        c.classification_confidence, c.needs_review
                 FROM merge_requests m
                 JOIN mr_classifications c ON c.mr_id = m.id
                 WHERE m.project_id = ?1
                   AND m.web_url IS NOT NULL AND m.web_url != ''
                   AND (c.classification_confidence < ?2 OR c.needs_review = 1)
                 ORDER BY c.classification_confidence ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![project_id, confidence_below, limit],
                candidate_from_row,
            )?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    pub fn upsert_enrichment_artifact(
        &self,
        conn: &Connection,
        artifact: &EnrichmentArtifact,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO enrichment_artifacts (
               mr_id, project_id, mr_iid, tool, summary, sections_json,
               content_sha256, markdown, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(mr_id, tool) DO UPDATE SET
               summary=excluded.summary,
               sections_json=excluded.sections_json,
               content_sha256=excluded.content_sha256,
               markdown=excluded.markdown,
               updated_at=excluded.updated_at",
            params![
                artifact.mr_id,
                artifact.project_id,
                artifact.mr_iid,
                artifact.tool,
                artifact.summary,
                serde_json::to_string(&artifact.sections)?,
                artifact.content_sha256,
                artifact.markdown,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_enrichment_run(&self, conn: &Connection, run: &EnrichmentRun) -> Result<()> {
        conn.execute(
            "INSERT INTO enrichment_runs (
               mr_id, tool, status, command, exit_code, stderr_excerpt,
               started_at, finished_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.mr_id,
                run.tool,
                run.status,
                run.command,
                run.exit_code,
                run.stderr_excerpt,
                run.started_at,
                run.finished_at,
            ],
        )?;
        Ok(())
    }
}
