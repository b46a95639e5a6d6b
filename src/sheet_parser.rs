//! Tabular reader: spreadsheet buffers, delimited text files and pasted blocks.
//!
//! Workbooks keep numbers as numbers. Delimited text is handed on as one
//! single-cell row per line; `shape::normalize` picks the delimiter afterwards.

use crate::error::ImportError;
use crate::schema::{civil_from_days, row_has_content, Cell, RawMatrix};
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xls, Xlsb, Xlsx};
use std::io::{Cursor, Read, Seek};

/// Source type of the parsed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Delimited,
    Excel,
    Pasted,
}

/// One decoded sheet, before shape repair.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub rows: RawMatrix,
    pub source_type: SourceType,
}

/// Dispatch file parsing by extension.
pub fn parse_file(filename: &str, data: &[u8]) -> Result<Vec<RawSheet>, ImportError> {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();

    let sheets = match ext.as_str() {
        "csv" | "tsv" | "txt" => vec![parse_delimited(filename, data)],
        "xlsx" | "xlsm" => parse_workbook::<Xlsx<_>>(data)?,
        "xlsb" => parse_workbook::<Xlsb<_>>(data)?,
        "xls" => parse_workbook::<Xls<_>>(data)?,
        _ => return Err(ImportError::UnsupportedFormat(ext)),
    };

    let sheets: Vec<RawSheet> = sheets
        .into_iter()
        .filter(|s| s.rows.iter().any(|r| row_has_content(r)))
        .collect();

    if sheets.is_empty() {
        return Err(ImportError::EmptySource);
    }

    Ok(sheets)
}

/// Split a pasted block: tabs first, otherwise runs of two or more spaces.
pub fn parse_pasted(text: &str) -> Result<RawSheet, ImportError> {
    let mut rows = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let cells: Vec<Cell> = if line.contains('\t') {
            line.split('\t').map(|c| Cell::from(c.trim())).collect()
        } else {
            split_on_wide_spaces(line)
                .into_iter()
                .map(Cell::from)
                .collect()
        };
        rows.push(cells);
    }

    if rows.is_empty() {
        return Err(ImportError::EmptySource);
    }

    Ok(RawSheet {
        name: "pasted data".to_string(),
        rows,
        source_type: SourceType::Pasted,
    })
}

/// Split on runs of 2+ spaces. A single space stays inside the cell.
fn split_on_wide_spaces(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut start = 0;
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b' ' && bytes.get(i + 1) == Some(&b' ') {
            let end = i;
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            cells.push(line[start..end].trim());
            start = i;
        } else {
            i += 1;
        }
    }
    cells.push(line[start..].trim());

    cells.retain(|c| !c.is_empty());
    cells
}

/// Decode a delimited text file into single-cell rows.
fn parse_delimited(filename: &str, data: &[u8]) -> RawSheet {
    let text = decode_text(data);
    let rows = text
        .lines()
        .map(|line| vec![Cell::from(line.trim_end_matches('\r'))])
        .collect();

    let name = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename)
        .to_string();

    RawSheet {
        name,
        rows,
        source_type: SourceType::Delimited,
    }
}

/// UTF-8 with a Latin-1 fallback; ad-platform exports from Windows are often
/// Latin-1 encoded.
fn decode_text(data: &[u8]) -> String {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => {
            tracing::debug!("Source is not valid UTF-8, decoding as Latin-1");
            data.iter().map(|&b| b as char).collect()
        }
    }
}

/// Parse every worksheet of a workbook into its own RawSheet.
fn parse_workbook<W>(data: &[u8]) -> Result<Vec<RawSheet>, ImportError>
where
    W: Reader<Cursor<Vec<u8>>>,
{
    let cursor = Cursor::new(data.to_vec());
    let mut workbook: W = open_workbook_from_rs(cursor)
        .map_err(|e| ImportError::Decode(format!("{:?}", e)))?;

    read_sheets(&mut workbook)
}

fn read_sheets<RS, W>(workbook: &mut W) -> Result<Vec<RawSheet>, ImportError>
where
    RS: Read + Seek,
    W: Reader<RS>,
{
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {:?}", name, e);
                continue;
            }
        };

        sheets.push(RawSheet {
            name: name.clone(),
            rows: range_to_matrix(&range),
            source_type: SourceType::Excel,
        });
    }

    Ok(sheets)
}

/// Convert a calamine Range into a matrix, dropping trailing empty cells.
fn range_to_matrix(range: &Range<Data>) -> RawMatrix {
    range
        .rows()
        .map(|row| {
            let mut cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
            while cells.last().map(|c| c.is_blank()).unwrap_or(false) {
                cells.pop();
            }
            cells
        })
        .collect()
}

/// Convert a calamine cell into a raw cell.
fn data_to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial).map_or(Cell::Number(serial), Cell::Text)
        }
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// Serial of 9999-12-31, the last date Excel can represent.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Convert an Excel serial date number to `YYYY-MM-DD`.
/// Excel epoch: 1899-12-30, with the fake Feb 29, 1900 at serial 60.
/// Returns `None` outside Excel's date range.
pub(crate) fn excel_serial_to_date(serial: f64) -> Option<String> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial as i64;
    let adjusted_days = if days > 59 { days } else { days + 1 };
    let (year, month, day) = civil_from_days(adjusted_days - 25569);
    Some(format!("{:04}-{:02}-{:02}", year, month, day))
}
