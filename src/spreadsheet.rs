//! Spreadsheet sources (`.xlsx`, `.xls`, `.ods`, ...) read through `calamine`.
//!
//! The first worksheet is re-encoded as CSV so spreadsheets share the CSV
//! decoding path of [`crate::dataset::Table`] and [`crate::records`].

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use tracing::debug;

use crate::error::{AnalyticsError, Result};

const EXTENSIONS: [&str; 6] = [".xlsx", ".xlsm", ".xlsb", ".xls", ".ods", ".xla"];

/// `true` when `source` names a workbook rather than a CSV file.
pub fn is_spreadsheet(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// CSV bytes for `source`: workbooks are converted, anything else passes through.
pub fn csv_bytes(source: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
    if is_spreadsheet(source) {
        first_sheet_to_csv(bytes)
    } else {
        Ok(bytes)
    }
}

/// Re-encodes the first worksheet of a workbook as CSV. The first row is the header.
pub fn first_sheet_to_csv(bytes: Vec<u8>) -> Result<Vec<u8>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AnalyticsError::ParseError(format!("unreadable workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalyticsError::ParseError("workbook has no worksheet".into()))?
        .map_err(|e| AnalyticsError::ParseError(e.to_string()))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in range.rows() {
        writer.write_record(row.iter().map(cell_text))?;
    }
    let out = writer
        .into_inner()
        .map_err(|e| AnalyticsError::ParseError(e.to_string()))?;
    debug!(rows = range.height(), "Worksheet converted");
    Ok(out)
}

/// Error cells such as `#N/A` read as missing, like empty ones.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}
