//! `mergemap sync` handler.

use anyhow::Result;

use crate::cli::SyncModeArg;
use crate::config::{resolve_project_ids, Settings};
use crate::core::Error;
use crate::io::GitLabClient;
use crate::pipeline::{sync_project, SyncMode, SyncOptions};
use crate::storage::Database;

pub struct SyncConfig {
    pub project_ids: Vec<u64>,
    pub mode: SyncModeArg,
    pub since: Option<String>,
    pub light: bool,
}

pub fn run(settings: &Settings, config: SyncConfig) -> Result<()> {
    let mode = match config.mode {
        SyncModeArg::Backfill => SyncMode::Backfill,
        SyncModeArg::Refresh => SyncMode::Refresh,
    };
    if mode == SyncMode::Backfill && config.since.is_none() {
        return Err(Error::config("--since is required for backfill").into());
    }

    let project_ids = resolve_project_ids(&config.project_ids)?;
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;
    let client = GitLabClient::new(settings)?;

    let options = SyncOptions {
        mode,
        since: config.since,
        light: config.light,
    };
    for project_id in project_ids {
        let report = sync_project(&db, &client, project_id as i64, &options)?;
        println!(
            "project {project_id}: fetched={} skipped={} processed={}",
            report.fetched, report.skipped_unchanged, report.processed
        );
    }
    Ok(())
}
