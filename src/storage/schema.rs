//! SQLite schema for merge-request records, derived features,
//! classifications, sync checkpoints, and enrichment artifacts.

/// Applied as one batch on startup; every statement is idempotent.
pub const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS merge_requests (
  id INTEGER PRIMARY KEY,
  project_id INTEGER NOT NULL,
  iid INTEGER NOT NULL,
  title TEXT NOT NULL,
  description TEXT,
  state TEXT,
  author_username TEXT,
  labels_json TEXT NOT NULL,
  web_url TEXT,
  created_at TEXT,
  updated_at TEXT,
  merged_at TEXT,
  closed_at TEXT,
  source_branch TEXT,
  target_branch TEXT,
  UNIQUE(project_id, iid)
);

CREATE TABLE IF NOT EXISTS mr_commits (
  id INTEGER PRIMARY KEY,
  mr_id INTEGER NOT NULL,
  commit_sha TEXT NOT NULL,
  title TEXT,
  authored_date TEXT,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE,
  UNIQUE(mr_id, commit_sha)
);

CREATE TABLE IF NOT EXISTS mr_files (
  id INTEGER PRIMARY KEY,
  mr_id INTEGER NOT NULL,
  old_path TEXT,
  new_path TEXT,
  additions INTEGER NOT NULL DEFAULT 0,
  deletions INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS mr_discussions (
  mr_id INTEGER PRIMARY KEY,
  thread_count INTEGER NOT NULL DEFAULT 0,
  note_count INTEGER NOT NULL DEFAULT 0,
  unresolved_count INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS mr_approvals (
  mr_id INTEGER PRIMARY KEY,
  approvals_required INTEGER NOT NULL DEFAULT 0,
  approvals_given INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS mr_pipelines (
  mr_id INTEGER PRIMARY KEY,
  pipeline_count INTEGER NOT NULL DEFAULT 0,
  failed_count INTEGER NOT NULL DEFAULT 0,
  success_count INTEGER NOT NULL DEFAULT 0,
  retry_count INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS mr_features (
  mr_id INTEGER PRIMARY KEY,
  feature_json TEXT NOT NULL,
  extracted_at TEXT NOT NULL,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS mr_classifications (
  mr_id INTEGER PRIMARY KEY,
  base_type TEXT NOT NULL,
  final_type TEXT NOT NULL,
  is_infra_related INTEGER NOT NULL,
  infra_override_applied INTEGER NOT NULL,
  complexity_level TEXT NOT NULL,
  complexity_score REAL NOT NULL,
  capability_tags_json TEXT NOT NULL DEFAULT '[]',
  risk_tags_json TEXT NOT NULL DEFAULT '[]',
  classification_confidence REAL NOT NULL DEFAULT 0.5,
  confidence_band TEXT NOT NULL DEFAULT 'medium',
  needs_review INTEGER NOT NULL DEFAULT 0,
  why_needs_review_json TEXT NOT NULL DEFAULT '[]',
  classifier_version TEXT NOT NULL,
  rationale_json TEXT NOT NULL,
  classified_at TEXT NOT NULL,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sync_checkpoints (
  id INTEGER PRIMARY KEY,
  project_id INTEGER NOT NULL,
  source TEXT NOT NULL,
  watermark_updated_at TEXT,
  last_mr_iid INTEGER,
  updated_at TEXT NOT NULL,
  UNIQUE(project_id, source)
);

CREATE TABLE IF NOT EXISTS enrichment_artifacts (
  mr_id INTEGER NOT NULL,
  project_id INTEGER NOT NULL,
  mr_iid INTEGER NOT NULL,
  tool TEXT NOT NULL,
  summary TEXT,
  sections_json TEXT NOT NULL DEFAULT '{}',
  content_sha256 TEXT NOT NULL,
  markdown TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  PRIMARY KEY (mr_id, tool),
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS enrichment_runs (
  id INTEGER PRIMARY KEY,
  mr_id INTEGER NOT NULL,
  tool TEXT NOT NULL,
  status TEXT NOT NULL,
  command TEXT NOT NULL,
  exit_code INTEGER,
  stderr_excerpt TEXT,
  started_at TEXT NOT NULL,
  finished_at TEXT NOT NULL,
  FOREIGN KEY(mr_id) REFERENCES merge_requests(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_mrs_project_iid ON merge_requests(project_id, iid);
CREATE INDEX IF NOT EXISTS idx_mrs_updated_at ON merge_requests(updated_at);
CREATE INDEX IF NOT EXISTS idx_commits_mr_id ON mr_commits(mr_id);
CREATE INDEX IF NOT EXISTS idx_files_mr_id ON mr_files(mr_id);
CREATE INDEX IF NOT EXISTS idx_classifications_version ON mr_classifications(classifier_version);
CREATE INDEX IF NOT EXISTS idx_enrichment_runs_mr ON enrichment_runs(mr_id, started_at DESC);
"#;
