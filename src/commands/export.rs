//! `mergemap export` and `mergemap audit` handlers.

use std::path::Path;

use anyhow::Result;

use crate::cli::ExportFormat;
use crate::config::Settings;
use crate::io::{export_audit_sample, export_csv, export_jsonl};
use crate::storage::Database;

pub fn run(settings: &Settings, format: ExportFormat, out_dir: &Path) -> Result<()> {
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;

    match format {
        ExportFormat::Csv => {
            let path = export_csv(&db, out_dir)?;
            println!("wrote {}", path.display());
        }
        ExportFormat::Jsonl => {
            let path = export_jsonl(&db, out_dir)?;
            println!("wrote {}", path.display());
        }
        ExportFormat::All => {
            let csv = export_csv(&db, out_dir)?;
            let jsonl = export_jsonl(&db, out_dir)?;
            println!("wrote {}", csv.display());
            println!("wrote {}", jsonl.display());
        }
    }
    Ok(())
}

pub fn run_audit(settings: &Settings, size: u32, out_dir: &Path) -> Result<()> {
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;
    let path = export_audit_sample(&db, size, out_dir)?;
    println!("wrote {}", path.display());
    Ok(())
}
