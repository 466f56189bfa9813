//! `mergemap classify` handler.

use anyhow::Result;

use crate::classify::Classifier;
use crate::config::{resolve_project_ids, Settings};
use crate::pipeline::classify_project;
use crate::storage::Database;

pub struct ClassifyConfig {
    pub project_ids: Vec<u64>,
    pub only_stale: bool,
    pub all_projects: bool,
}

pub fn run(settings: &Settings, config: ClassifyConfig) -> Result<()> {
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;

    let project_ids: Vec<i64> = if config.all_projects {
        let conn = db.connect()?;
        db.list_project_ids(&conn)?
    } else {
        resolve_project_ids(&config.project_ids)?
            .into_iter()
            .map(|id| id as i64)
            .collect()
    };

    let classifier = Classifier::new(settings.classification_config()?, settings.rule_set()?);
    let mut total = 0usize;
    for project_id in project_ids {
        total += classify_project(&db, &classifier, project_id, config.only_stale)?;
    }
    println!("classified {total} merge request(s)");
    Ok(())
}
