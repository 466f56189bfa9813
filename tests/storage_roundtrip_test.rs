//! Storage integration: schema init, upserts, staleness detection, and
//! export output against a temporary database.

use tempfile::TempDir;

use mergemap::classify::{
    extract_features, Classifier, DiscussionSummary, PipelineSummary, CLASSIFIER_VERSION,
};
use mergemap::config::{ClassificationConfig, RuleSet};
use mergemap::core::{ChangedFile, MergeRequestSnapshot};
use mergemap::io::{export_csv, export_jsonl};
use mergemap::pipeline::snapshot_from_record;
use mergemap::storage::{CommitRecord, Database, MergeRequestRecord};

fn test_db(dir: &TempDir) -> Database {
    let db = Database::new(dir.path().join("test.db")).unwrap();
    db.init_schema().unwrap();
    db
}

fn sample_record(id: i64, iid: i64) -> MergeRequestRecord {
    MergeRequestRecord {
        id,
        project_id: 42,
        iid,
        title: format!("Fix crash in worker {iid}"),
        description: Some("null deref under load".to_string()),
        labels: vec!["bug".to_string()],
        web_url: Some(format!("https://git.example/mr/{iid}")),
        updated_at: Some(format!("2026-01-0{iid}T00:00:00Z")),
        ..Default::default()
    }
}

fn classify_and_store(db: &Database, record: &MergeRequestRecord, files: &[ChangedFile]) {
    let conn = db.connect().unwrap();
    db.upsert_merge_request(&conn, record).unwrap();
    db.replace_files(&conn, record.id, files).unwrap();
    let commits = vec![CommitRecord {
        sha: format!("sha-{}", record.id),
        title: Some("fix worker crash".to_string()),
        authored_date: None,
    }];
    db.replace_commits(&conn, record.id, &commits).unwrap();

    let engine = Classifier::new(ClassificationConfig::default(), RuleSet::default());
    let snapshot = snapshot_from_record(record, &commits);
    let features = extract_features(
        &snapshot,
        files,
        commits.len() as u64,
        &DiscussionSummary::default(),
        &PipelineSummary::default(),
        engine.rules(),
        engine.config(),
    );
    db.upsert_features(&conn, record.id, &features).unwrap();
    let result = engine.classify(&snapshot, files, &features);
    db.upsert_classification(&conn, record.id, &result).unwrap();
}

#[test]
fn test_merge_request_upsert_roundtrip() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let conn = db.connect().unwrap();

    let record = sample_record(1, 1);
    db.upsert_merge_request(&conn, &record).unwrap();
    // Second upsert with changed title replaces in place.
    let mut updated = record.clone();
    updated.title = "Fix crash in worker 1 (retry)".to_string();
    db.upsert_merge_request(&conn, &updated).unwrap();

    let loaded = db.get_merge_request(&conn, 1).unwrap().unwrap();
    assert_eq!(loaded.title, "Fix crash in worker 1 (retry)");
    assert_eq!(loaded.labels, vec!["bug".to_string()]);
    assert_eq!(db.list_project_ids(&conn).unwrap(), vec![42]);
}

#[test]
fn test_features_roundtrip_and_fail_fast_on_malformed() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let record = sample_record(1, 1);
    let files = vec![ChangedFile::path("src/worker.rs")];
    classify_and_store(&db, &record, &files);

    let conn = db.connect().unwrap();
    let features = db.load_features(&conn, 1).unwrap().unwrap();
    assert_eq!(features.files_changed, 1);
    assert!(features.has_description);

    // Corrupt the stored row: loading must fail, not silently default.
    conn.execute(
        "UPDATE mr_features SET feature_json = '{\"files_changed\": 1}' WHERE mr_id = 1",
        [],
    )
    .unwrap();
    assert!(db.load_features(&conn, 1).is_err());
}

#[test]
fn test_staleness_selection_by_classifier_version() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let files = vec![ChangedFile::path("src/worker.rs")];
    classify_and_store(&db, &sample_record(1, 1), &files);
    classify_and_store(&db, &sample_record(2, 2), &files);

    let conn = db.connect().unwrap();
    // Everything is current, so the stale set is empty.
    let stale = db
        .list_mrs_for_classification(&conn, 42, true, CLASSIFIER_VERSION)
        .unwrap();
    assert!(stale.is_empty());

    // Downgrade one stored version; only that record becomes stale.
    conn.execute(
        "UPDATE mr_classifications SET classifier_version = 'v2.2' WHERE mr_id = 2",
        [],
    )
    .unwrap();
    let stale = db
        .list_mrs_for_classification(&conn, 42, true, CLASSIFIER_VERSION)
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, 2);

    // A full pass still sees both.
    let all = db
        .list_mrs_for_classification(&conn, 42, false, CLASSIFIER_VERSION)
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_checkpoint_roundtrip() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let conn = db.connect().unwrap();

    assert!(db.load_checkpoint(&conn, 42, "refresh").unwrap().is_none());
    db.upsert_checkpoint(
        &conn,
        42,
        "refresh",
        &mergemap::storage::Checkpoint {
            watermark_updated_at: Some("2026-02-01T00:00:00Z".to_string()),
            last_mr_iid: Some(7),
        },
    )
    .unwrap();
    let checkpoint = db.load_checkpoint(&conn, 42, "refresh").unwrap().unwrap();
    assert_eq!(
        checkpoint.watermark_updated_at.as_deref(),
        Some("2026-02-01T00:00:00Z")
    );
    assert_eq!(checkpoint.last_mr_iid, Some(7));
}

#[test]
fn test_export_writes_csv_and_jsonl() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let files = vec![ChangedFile::path("src/worker.rs")];
    classify_and_store(&db, &sample_record(1, 1), &files);

    let out_dir = dir.path().join("exports");
    let csv_path = export_csv(&db, &out_dir).unwrap();
    let jsonl_path = export_jsonl(&db, &out_dir).unwrap();

    let csv = std::fs::read_to_string(csv_path).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("project_id,mr_iid,title"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("42,1,"));
    assert!(row.contains("bugfix"));

    let jsonl = std::fs::read_to_string(jsonl_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    assert_eq!(parsed["final_type"], "bugfix");
    assert_eq!(parsed["classifier_version"], CLASSIFIER_VERSION);
    assert!(parsed["rationale"]["base"]["rule"].is_string());
}

#[test]
fn test_enrich_candidates_prefer_low_confidence() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    // Bare records with no description classify with low confidence.
    let mut bare = sample_record(1, 1);
    bare.description = None;
    bare.labels = vec![];
    bare.title = "x".to_string();
    classify_and_store(&db, &bare, &[ChangedFile::path("src/a.rs")]);

    let conn = db.connect().unwrap();
    let candidates = db
        .enrich_candidates(&conn, 42, 0.95, 10, true, "describe")
        .unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].mr_id, 1);
    assert!(candidates[0].classification_confidence < 0.95);
}
