//! Output formatting and persistence for dashboard reports.
//!
//! Supports pretty-printing, narrative logging, JSON files, and CSV append.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::report::{DashboardReport, SummaryRow};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(report: &DashboardReport) {
    debug!("{:#?}", report);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs the report's narrative, one sentence per event.
pub fn print_narrative(report: &DashboardReport) {
    for line in report.narrative() {
        info!("{}", line);
    }
}

/// Writes `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {path}"))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Appends a [`SummaryRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, row: &SummaryRow) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Record;
    use crate::report::ReportOptions;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn empty_report() -> DashboardReport {
        let records: Vec<Record> = Vec::new();
        DashboardReport::build(&records, &[], &ReportOptions::default())
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&empty_report());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&empty_report()).unwrap();
    }

    #[test]
    fn test_print_narrative_does_not_panic() {
        print_narrative(&empty_report());
    }

    #[test]
    fn test_write_json_creates_directories() {
        let dir = temp_path("getaround_reports_test");
        let path = format!("{dir}/nested/report.json");
        let _ = fs::remove_dir_all(&dir);

        write_json(&path, &empty_report().summary()).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["total_records"], 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("getaround_test_history.csv");
        let _ = fs::remove_file(&path);

        let row = empty_report().summary();
        append_record(&path, &row).unwrap();
        append_record(&path, &row).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content
            .lines()
            .filter(|l| l.contains("generated_at"))
            .count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_appended_rows_read_back() {
        let path = temp_path("getaround_test_history_roundtrip.csv");
        let _ = fs::remove_file(&path);

        let row = empty_report().summary();
        append_record(&path, &row).unwrap();

        let rows: Vec<SummaryRow> =
            crate::records::from_reader(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(rows, vec![row]);

        fs::remove_file(&path).unwrap();
    }
}
