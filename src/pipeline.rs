//! Acquisition and classification pipelines.
//!
//! Sync pulls merge requests and their details from GitLab into storage,
//! either as a backfill (created-after cutoff) or an incremental refresh
//! driven by the stored checkpoint watermark. Classification derives the
//! feature vector and runs the engine for every stored record, optionally
//! restricted to rows whose stored `classifier_version` is stale.
//! Record-level work parallelizes freely because the engine is pure.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::classify::{
    extract_features, Classifier, DiscussionSummary, PipelineSummary, CLASSIFIER_VERSION,
};
use crate::core::{ChangedFile, MergeRequestSnapshot, Result};
use crate::io::gitlab::{
    ApprovalsPayload, CommitPayload, DiscussionPayload, GitLabClient, MergeRequestPayload,
    PipelinePayload,
};
use crate::storage::{
    ApprovalSummary, Checkpoint, CommitRecord, Database, MergeRequestRecord,
};

/// How a sync pass selects merge requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Everything created after a fixed cutoff.
    Backfill,
    /// Everything updated since the stored checkpoint watermark.
    Refresh,
}

impl SyncMode {
    fn checkpoint_source(&self) -> &'static str {
        match self {
            SyncMode::Backfill => "backfill",
            SyncMode::Refresh => "refresh",
        }
    }
}

/// Options for one sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Backfill cutoff (ISO timestamp); ignored on refresh.
    pub since: Option<String>,
    /// Skip discussions/approvals/pipelines for faster ingestion.
    pub light: bool,
}

/// Counters for one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub skipped_unchanged: usize,
    pub processed: usize,
}

/// Everything fetched per merge request beyond the list payload.
struct DetailBundle {
    commits: Vec<CommitRecord>,
    files: Vec<ChangedFile>,
    discussions: DiscussionSummary,
    approvals: ApprovalSummary,
    pipelines: PipelineSummary,
}

fn summarize_discussions(discussions: &[DiscussionPayload]) -> DiscussionSummary {
    let note_count = discussions.iter().map(|d| d.notes.len() as u64).sum();
    let unresolved_count = discussions
        .iter()
        .filter(|d| d.resolvable && !d.resolved)
        .count() as u64;
    DiscussionSummary {
        thread_count: discussions.len() as u64,
        note_count,
        unresolved_count,
    }
}

fn summarize_approvals(approvals: &ApprovalsPayload) -> ApprovalSummary {
    ApprovalSummary {
        approvals_required: approvals.approvals_required,
        approvals_given: approvals.approved_by.len() as u64,
    }
}

fn summarize_pipelines(pipelines: &[PipelinePayload]) -> PipelineSummary {
    let count_status = |status: &str| {
        pipelines
            .iter()
            .filter(|p| p.status.as_deref() == Some(status))
            .count() as u64
    };
    PipelineSummary {
        pipeline_count: pipelines.len() as u64,
        failed_count: count_status("failed"),
        success_count: count_status("success"),
        retry_count: count_status("canceled"),
    }
}

fn to_record(project_id: i64, payload: &MergeRequestPayload) -> MergeRequestRecord {
    MergeRequestRecord {
        id: payload.id,
        project_id,
        iid: payload.iid,
        title: payload.title.clone(),
        description: payload.description.clone(),
        state: payload.state.clone(),
        author_username: payload.author.as_ref().and_then(|a| a.username.clone()),
        labels: payload.labels.clone(),
        web_url: payload.web_url.clone(),
        created_at: payload.created_at.clone(),
        updated_at: payload.updated_at.clone(),
        merged_at: payload.merged_at.clone(),
        closed_at: payload.closed_at.clone(),
        source_branch: payload.source_branch.clone(),
        target_branch: payload.target_branch.clone(),
    }
}

fn to_commit_records(commits: Vec<CommitPayload>) -> Vec<CommitRecord> {
    commits
        .into_iter()
        .map(|c| CommitRecord {
            sha: c.id,
            title: c.title.or(c.message),
            authored_date: c.authored_date,
        })
        .collect()
}

fn fetch_details(
    client: &GitLabClient,
    project_id: i64,
    mr_iid: i64,
    light: bool,
) -> Result<DetailBundle> {
    let commits = to_commit_records(client.mr_commits(project_id, mr_iid)?);
    let files: Vec<ChangedFile> = client
        .mr_changes(project_id, mr_iid)?
        .into_iter()
        .map(|c| c.into_changed_file())
        .collect();
    if light {
        return Ok(DetailBundle {
            commits,
            files,
            discussions: DiscussionSummary::default(),
            approvals: ApprovalSummary::default(),
            pipelines: PipelineSummary::default(),
        });
    }
    Ok(DetailBundle {
        commits,
        files,
        discussions: summarize_discussions(&client.mr_discussions(project_id, mr_iid)?),
        approvals: summarize_approvals(&client.mr_approvals(project_id, mr_iid)?),
        pipelines: summarize_pipelines(&client.mr_pipelines(project_id, mr_iid)?),
    })
}

fn progress_bar(len: u64, message: String) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message);
    bar
}

/// Sync one project into storage.
pub fn sync_project(
    db: &Database,
    client: &GitLabClient,
    project_id: i64,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let conn = db.connect()?;
    let source = options.mode.checkpoint_source();

    let fetched = match options.mode {
        SyncMode::Backfill => {
            client.list_merge_requests(project_id, None, options.since.as_deref())?
        }
        SyncMode::Refresh => {
            let checkpoint = db.load_checkpoint(&conn, project_id, source)?;
            let watermark = checkpoint.and_then(|c| c.watermark_updated_at);
            client.list_merge_requests(project_id, watermark.as_deref(), None)?
        }
    };

    let existing = db.mr_updated_at_map(&conn, project_id)?;
    let mut watermark: Option<String> = None;
    let mut last_iid: Option<i64> = None;
    let mut to_process: Vec<MergeRequestPayload> = Vec::new();
    let mut skipped = 0usize;

    for payload in fetched.iter() {
        if let Some(updated_at) = payload.updated_at.as_deref() {
            if watermark.as_deref().map(|w| updated_at > w).unwrap_or(true) {
                watermark = Some(updated_at.to_string());
                last_iid = Some(payload.iid);
            }
        }
        let unchanged = options.mode == SyncMode::Refresh
            && payload
                .updated_at
                .as_deref()
                .is_some_and(|u| existing.get(&payload.iid).map(String::as_str) == Some(u));
        if unchanged {
            skipped += 1;
        } else {
            to_process.push(payload.clone());
        }
    }

    log::info!(
        "project {project_id}: fetched={}, skipped_unchanged={skipped}, processing={}",
        fetched.len(),
        to_process.len()
    );

    let bar = progress_bar(to_process.len() as u64, format!("sync {project_id}"));
    let details: Vec<(MergeRequestPayload, Result<DetailBundle>)> = to_process
        .into_par_iter()
        .map(|payload| {
            let bundle = fetch_details(client, project_id, payload.iid, options.light);
            bar.inc(1);
            (payload, bundle)
        })
        .collect();
    bar.finish_and_clear();

    let mut processed = 0usize;
    for (payload, bundle) in details {
        let bundle = bundle?;
        let record = to_record(project_id, &payload);
        let mr_id = db.upsert_merge_request(&conn, &record)?;
        db.replace_commits(&conn, mr_id, &bundle.commits)?;
        db.replace_files(&conn, mr_id, &bundle.files)?;
        db.upsert_discussions(&conn, mr_id, &bundle.discussions)?;
        db.upsert_approvals(&conn, mr_id, &bundle.approvals)?;
        db.upsert_pipelines(&conn, mr_id, &bundle.pipelines)?;
        processed += 1;
    }

    db.upsert_checkpoint(
        &conn,
        project_id,
        source,
        &Checkpoint {
            watermark_updated_at: watermark,
            last_mr_iid: last_iid,
        },
    )?;

    Ok(SyncReport {
        fetched: fetched.len(),
        skipped_unchanged: skipped,
        processed,
    })
}

/// Build the engine snapshot for one stored record.
pub fn snapshot_from_record(
    record: &MergeRequestRecord,
    commits: &[CommitRecord],
) -> MergeRequestSnapshot {
    let commit_message_text = commits
        .iter()
        .filter_map(|c| c.title.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    MergeRequestSnapshot {
        title: record.title.clone(),
        description: record.description.clone(),
        labels: record.labels.clone(),
        source_branch: record.source_branch.clone(),
        target_branch: record.target_branch.clone(),
        commit_message_text,
    }
}

/// Classify every (or every stale) stored record of one project.
///
/// Returns the number of records classified.
pub fn classify_project(
    db: &Database,
    classifier: &Classifier,
    project_id: i64,
    only_stale: bool,
) -> Result<usize> {
    let conn = db.connect()?;
    let records =
        db.list_mrs_for_classification(&conn, project_id, only_stale, CLASSIFIER_VERSION)?;
    let total = records.len();

    // Load everything serially, classify in parallel (the engine is pure),
    // then write back serially.
    struct WorkItem {
        mr_id: i64,
        snapshot: MergeRequestSnapshot,
        files: Vec<ChangedFile>,
        commit_count: u64,
        discussions: DiscussionSummary,
        pipelines: PipelineSummary,
    }

    let mut items = Vec::with_capacity(total);
    for record in &records {
        let commits = db.load_commits(&conn, record.id)?;
        let files = db.load_files(&conn, record.id)?;
        let discussions = db.load_discussions(&conn, record.id)?;
        let pipelines = db.load_pipelines(&conn, record.id)?;
        items.push(WorkItem {
            mr_id: record.id,
            snapshot: snapshot_from_record(record, &commits),
            files,
            commit_count: commits.len() as u64,
            discussions,
            pipelines,
        });
    }

    let bar = progress_bar(total as u64, format!("classify {project_id}"));
    let results: Vec<_> = items
        .par_iter()
        .map(|item| {
            let features = extract_features(
                &item.snapshot,
                &item.files,
                item.commit_count,
                &item.discussions,
                &item.pipelines,
                classifier.rules(),
                classifier.config(),
            );
            let result = classifier.classify(&item.snapshot, &item.files, &features);
            bar.inc(1);
            (item.mr_id, features, result)
        })
        .collect();
    bar.finish_and_clear();

    for (mr_id, features, result) in &results {
        db.upsert_features(&conn, *mr_id, features)?;
        db.upsert_classification(&conn, *mr_id, result)?;
    }

    log::info!("project {project_id}: classified {total} record(s)");
    Ok(total)
}
