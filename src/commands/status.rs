//! `mergemap status` handler: per-type counts with review totals.

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use crate::config::Settings;
use crate::storage::Database;

pub fn run(settings: &Settings) -> Result<()> {
    let db = Database::new(&settings.db_path)?;
    db.init_schema()?;
    let conn = db.connect()?;
    let counts = db.type_counts(&conn)?;

    if counts.is_empty() {
        println!("no classifications stored yet; run `mergemap classify` first");
        return Ok(());
    }

    let total: i64 = counts.iter().map(|c| c.count).sum();
    let needs_review: i64 = counts.iter().map(|c| c.needs_review).sum();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["final type", "count", "needs review"]);
    for row in &counts {
        table.add_row(vec![
            Cell::new(&row.final_type),
            Cell::new(row.count),
            Cell::new(row.needs_review),
        ]);
    }
    println!("{table}");

    let review_share = if total > 0 {
        needs_review as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let summary = format!(
        "{total} classified, {needs_review} flagged for review ({review_share:.1}%)"
    );
    if needs_review > 0 {
        println!("{}", summary.yellow());
    } else {
        println!("{}", summary.green());
    }
    Ok(())
}
