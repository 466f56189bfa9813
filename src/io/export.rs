//! CSV and JSONL export of classified merge requests.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::storage::{AuditRow, Database};

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_csv_row<W: Write>(writer: &mut W, fields: &[String]) -> Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}")?;
    Ok(())
}

const EXPORT_HEADER: &[&str] = &[
    "project_id",
    "mr_iid",
    "title",
    "base_type",
    "final_type",
    "is_infra_related",
    "infra_override_applied",
    "complexity_level",
    "complexity_score",
    "classification_confidence",
    "confidence_band",
    "needs_review",
    "classifier_version",
];

/// Write `mr_classification.csv` under `out_dir`.
pub fn export_csv(db: &Database, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let target = out_dir.join("mr_classification.csv");
    let conn = db.connect()?;
    let rows = db.export_rows(&conn, false)?;

    let mut writer = BufWriter::new(File::create(&target)?);
    write_csv_row(
        &mut writer,
        &EXPORT_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    )?;
    for row in rows {
        write_csv_row(
            &mut writer,
            &[
                row.project_id.to_string(),
                row.mr_iid.to_string(),
                row.title.clone(),
                row.base_type.clone(),
                row.final_type.clone(),
                row.is_infra_related.to_string(),
                row.infra_override_applied.to_string(),
                row.complexity_level.clone(),
                row.complexity_score.to_string(),
                row.classification_confidence.to_string(),
                row.confidence_band.clone(),
                row.needs_review.to_string(),
                row.classifier_version.clone(),
            ],
        )?;
    }
    writer.flush()?;
    Ok(target)
}

/// Write `mr_classification.jsonl` (one object per row, rationale included).
pub fn export_jsonl(db: &Database, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let target = out_dir.join("mr_classification.jsonl");
    let conn = db.connect()?;
    let rows = db.export_rows(&conn, true)?;

    let mut writer = BufWriter::new(File::create(&target)?);
    for row in rows {
        let line = serde_json::to_string(&row)?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(target)
}

/// Write a random audit sample with empty human-label columns appended.
pub fn export_audit_sample(db: &Database, size: u32, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let target = out_dir.join("audit_sample.csv");
    let conn = db.connect()?;
    let rows: Vec<AuditRow> = db.audit_sample(&conn, size)?;

    let mut writer = BufWriter::new(File::create(&target)?);
    write_csv_row(
        &mut writer,
        &[
            "project_id".to_string(),
            "mr_iid".to_string(),
            "title".to_string(),
            "predicted_type".to_string(),
            "predicted_complexity".to_string(),
            "human_type".to_string(),
            "human_complexity".to_string(),
            "notes".to_string(),
        ],
    )?;
    for row in rows {
        write_csv_row(
            &mut writer,
            &[
                row.project_id.to_string(),
                row.mr_iid.to_string(),
                row.title.clone(),
                row.predicted_type.clone(),
                row.predicted_complexity.clone(),
                String::new(),
                String::new(),
                String::new(),
            ],
        )?;
    }
    writer.flush()?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("with,comma"), "\"with,comma\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }
}
