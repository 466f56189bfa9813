//! `mergemap enrich` handler.

use std::time::Duration;

use anyhow::Result;

use crate::config::{resolve_project_ids, Settings};
use crate::enrich::{enrich_project, EnrichOptions};
use crate::storage::Database;

pub struct EnrichConfig {
    pub project_ids: Vec<u64>,
    pub tool: String,
    pub count: u32,
    pub confidence_below: Option<f64>,
    pub force: bool,
    pub timeout_secs: u64,
}

pub fn run(settings: &Settings, config: EnrichConfig) -> Result<()> {
    let project_ids = resolve_project_ids(&config.project_ids)?;
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;

    let options = EnrichOptions {
        tool: config.tool,
        confidence_below: config
            .confidence_below
            .unwrap_or(settings.needs_review_threshold),
        limit: config.count,
        only_missing: !config.force,
        timeout: Duration::from_secs(config.timeout_secs),
    };

    for project_id in project_ids {
        let report = enrich_project(&db, project_id as i64, &options)?;
        println!(
            "project {project_id}: candidates={} succeeded={} failed={}",
            report.candidates, report.succeeded, report.failed
        );
    }
    Ok(())
}
