//! Spreadsheet encoding for tabular buffers.
//!
//! Export writes a single `.xlsx` worksheet; import reads the first worksheet
//! of any workbook format calamine understands.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader};
use rust_xlsxwriter::{Format, Workbook};

use crate::error::{Error, Result};
use crate::transfer::TabularBuffer;
use crate::value::Value;

/// MIME type of exported workbooks.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Largest row count a worksheet holds, header included.
const MAX_ROWS: usize = 1_048_576;
/// Largest column count a worksheet holds.
const MAX_COLUMNS: usize = 16_384;
/// Sheet names are capped at 31 characters.
const MAX_SHEET_NAME: usize = 31;
/// Integers beyond this magnitude lose precision as spreadsheet numbers.
const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Workbook formats accepted for import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Office Open XML workbook.
    Xlsx,
    /// Macro-enabled Office Open XML workbook.
    Xlsm,
    /// Legacy Excel 97-2003 workbook.
    Xls,
    /// OpenDocument spreadsheet.
    Ods,
}

impl SheetFormat {
    /// Determine the format from an upload's filename extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx") => Ok(SheetFormat::Xlsx),
            Some("xlsm") => Ok(SheetFormat::Xlsm),
            Some("xls") => Ok(SheetFormat::Xls),
            Some("ods") => Ok(SheetFormat::Ods),
            _ => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// Download name for an exported object.
pub fn export_filename(object: &str) -> String {
    format!("{}_export.xlsx", object)
}

/// Make a string acceptable as a worksheet name.
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let cleaned: String = cleaned
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Encode a buffer as an `.xlsx` workbook.
pub fn write_workbook(buffer: &TabularBuffer) -> Result<Vec<u8>> {
    if buffer.len() + 1 > MAX_ROWS || buffer.header().len() > MAX_COLUMNS {
        return Err(Error::Tabular(format!(
            "{} rows x {} columns exceeds worksheet limits",
            buffer.len(),
            buffer.header().len()
        )));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(buffer.sheet_name()))?;

    let bold = Format::new().set_bold();
    for (col, name) in buffer.header().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    for (index, cells) in buffer.rows().iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, value) in cells.iter().take(buffer.header().len()).enumerate() {
            let col = col as u16;
            match value {
                Value::Null => {}
                Value::Integer(i) if i.unsigned_abs() <= MAX_EXACT_INTEGER as u64 => {
                    worksheet.write_number(row, col, *i as f64)?;
                }
                Value::Integer(i) => {
                    worksheet.write_string(row, col, i.to_string())?;
                }
                Value::Real(r) if r.is_finite() => {
                    worksheet.write_number(row, col, *r)?;
                }
                Value::Real(r) => {
                    worksheet.write_string(row, col, r.to_string())?;
                }
                Value::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Value::Blob(b) => {
                    worksheet.write_string(row, col, hex::encode(b))?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Integer(*b as i64),
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Whole-valued floats read back as integers.
fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER as f64 {
        Value::Integer(f as i64)
    } else {
        Value::Real(f)
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Decode the first worksheet of a workbook. The first row is the header;
/// fully empty rows are skipped.
pub fn read_workbook(bytes: &[u8], format: SheetFormat) -> Result<TabularBuffer> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::Tabular(format!("cannot read {:?} workbook: {}", format, e)))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(Error::EmptyInput)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(Error::EmptyInput)??;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(header_name).collect(),
        None => return Err(Error::EmptyInput),
    };

    let body: Vec<Vec<Value>> = rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();

    tracing::debug!(sheet = %sheet_name, columns = header.len(), rows = body.len(), "Decoded workbook");
    Ok(TabularBuffer::new(sheet_name, header, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(SheetFormat::from_filename("data.XLSX").unwrap(), SheetFormat::Xlsx);
        assert_eq!(SheetFormat::from_filename("old.xls").unwrap(), SheetFormat::Xls);
        assert_eq!(SheetFormat::from_filename("calc.ods").unwrap(), SheetFormat::Ods);
        assert!(matches!(
            SheetFormat::from_filename("data.csv"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            SheetFormat::from_filename("noextension"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_sheet_name_sanitized() {
        assert_eq!(sheet_name("orders"), "orders");
        assert_eq!(sheet_name("a/b:c"), "abc");
        assert_eq!(sheet_name("'quoted'"), "quoted");
        assert_eq!(sheet_name("[]"), "Sheet1");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename("products"), "products_export.xlsx");
    }

    #[test]
    fn test_workbook_round_trip() {
        let buffer = TabularBuffer::new(
            "people",
            vec!["id".into(), "name".into(), "score".into(), "note".into()],
            vec![
                vec![Value::Integer(1), Value::from("Ann"), Value::Real(9.5), Value::Null],
                vec![
                    Value::Integer(2),
                    Value::from("Bob"),
                    Value::Integer(7),
                    Value::from("late"),
                ],
            ],
        );

        let bytes = write_workbook(&buffer).unwrap();
        let decoded = read_workbook(&bytes, SheetFormat::Xlsx).unwrap();

        assert_eq!(decoded.sheet_name(), "people");
        assert_eq!(decoded.header(), buffer.header());
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.cell(0, 0), &Value::Integer(1));
        assert_eq!(decoded.cell(0, 1), &Value::from("Ann"));
        assert_eq!(decoded.cell(0, 2), &Value::Real(9.5));
        assert_eq!(decoded.cell(0, 3), &Value::Null);
        assert_eq!(decoded.cell(1, 2), &Value::Integer(7));
        assert_eq!(decoded.cell(1, 3), &Value::from("late"));
    }

    #[test]
    fn test_large_integers_written_as_text() {
        let big = i64::MAX;
        let buffer = TabularBuffer::new("n", vec!["v".into()], vec![vec![Value::Integer(big)]]);
        let decoded = read_workbook(&write_workbook(&buffer).unwrap(), SheetFormat::Xlsx).unwrap();
        assert_eq!(decoded.cell(0, 0), &Value::Text(big.to_string()));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(matches!(
            read_workbook(b"not a workbook", SheetFormat::Xlsx),
            Err(Error::Tabular(_))
        ));
    }
}
