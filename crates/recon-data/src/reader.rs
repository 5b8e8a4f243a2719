//! Source-file loading for spend and lead exports.
//!
//! CSV files are decoded as UTF-8 (BOM stripped) with a Shift_JIS fallback
//! for exports saved by Japanese Excel; workbooks are read through
//! `calamine`, first sheet only, first row as the header.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use recon_core::error::{ReconError, Result};
use recon_core::models::{CellValue, RawRecord, RawTable};
use tracing::{debug, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a table from `path`, picking the decoder from the file extension.
pub fn load_table(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" | "txt" => load_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => load_workbook(path)?,
        _ => return Err(ReconError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(
        "Loaded {} rows x {} columns from {}",
        table.rows.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

/// Parse CSV text whose first record is the header row.
pub fn parse_csv_text(label: &str, content: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let cells = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        rows.push(RawRecord::new(cells));
    }

    Ok(RawTable::new(label, columns, rows))
}

/// Decode raw CSV bytes: UTF-8 first, then Shift_JIS.
pub fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    let bytes = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes);
            if had_errors {
                return Err(ReconError::Decode {
                    path: path.to_path_buf(),
                    message: "content is neither UTF-8 nor Shift_JIS".to_string(),
                });
            }
            debug!("Decoded {} as Shift_JIS", path.display());
            Ok(decoded.into_owned())
        }
    }
}

// ── Private ───────────────────────────────────────────────────────────────────

fn label_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_csv(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|source| ReconError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(path, bytes)?;
    parse_csv_text(&label_of(path), &text).map_err(|e| match e {
        ReconError::Csv(err) => ReconError::Decode {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
        other => other,
    })
}

fn load_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ReconError::Excel(e.to_string()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(ReconError::Decode {
            path: path.to_path_buf(),
            message: "workbook has no sheets".to_string(),
        });
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReconError::Excel(e.to_string()))?;

    let mut row_iter = range.rows();
    let columns: Vec<String> = match row_iter.next() {
        Some(header) => header
            .iter()
            .map(|cell| data_to_cell(cell).as_text().trim().to_string())
            .collect(),
        None => {
            warn!("Sheet '{}' in {} is empty", sheet_name, path.display());
            Vec::new()
        }
    };

    let rows = row_iter
        .map(|row| RawRecord::new(row.iter().map(data_to_cell).collect()))
        .filter(|record| !record.cells.iter().all(CellValue::is_blank))
        .collect();

    Ok(RawTable::new(label_of(path), columns, rows))
}

fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

/// Convert an Excel 1900-system serial to a datetime.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let secs = (serial.fract() * 86_400.0).round() as i64;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(secs))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
