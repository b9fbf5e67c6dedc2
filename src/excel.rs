//! Cell grid reader: loads the active worksheet of a workbook into a 1-indexed
//! grid of computed cell values (never formula text).

use calamine::{open_workbook_from_rs, Data, Range, Reader, SheetType, SheetVisible, Xls, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Display;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

use crate::error::{PorError, PorResult};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Column index to Excel letter (1→A, 2→B, 27→AA).
pub fn col_index_to_letter(col: u32) -> String {
    let mut n = col.saturating_sub(1);
    let mut s = String::new();
    loop {
        let r = (n % 26) as u8;
        s.insert(0, (b'A' + r) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Empty cells and whitespace-only strings.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True when this is a string cell whose uppercased text contains `needle`
    /// (which is expected to be uppercase already).
    pub fn contains_upper(&self, needle: &str) -> bool {
        self.as_text()
            .map(|s| s.to_uppercase().contains(needle))
            .unwrap_or(false)
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
                Some(value) => CellValue::Date(value),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => match parse_iso_datetime(s) {
                Some(value) => CellValue::Date(value),
                None => CellValue::Text(s.clone()),
            },
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

/// Excel serial day number (1900 date system) to a timestamp.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis))
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Spreadsheet container formats the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Xls,
}

impl SpreadsheetFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => Some(SpreadsheetFormat::Xlsx),
            "xls" => Some(SpreadsheetFormat::Xls),
            _ => None,
        }
    }
}

/// Immutable 2-D view of one worksheet. Rows and columns are 1-indexed;
/// coordinates outside the used area read as `CellValue::Empty`.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
    max_col: u32,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let max_col = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        Grid { rows, max_col }
    }

    /// Place a calamine range at its absolute sheet position, so that a
    /// sheet whose first used cell is B2 still has B2 at (2, 2).
    pub fn from_range(range: &Range<Data>) -> Self {
        let (row0, col0) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let (height, width) = range.get_size();
        if height == 0 || width == 0 {
            return Grid::default();
        }
        let mut rows = vec![vec![CellValue::Empty; col0 + width]; row0 + height];
        for (r, c, cell) in range.cells() {
            rows[row0 + r][col0 + c] = CellValue::from(cell);
        }
        Grid::from_rows(rows)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn col_count(&self) -> u32 {
        self.max_col
    }

    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        if row == 0 || col == 0 {
            return &EMPTY_CELL;
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: u32) -> &[CellValue] {
        if row == 0 {
            return &[];
        }
        self.rows
            .get(row as usize - 1)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// No rows at all, or every cell blank.
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_blank))
    }
}

/// The workbook's active tab is not exposed by the reader, so the first
/// visible worksheet stands in for it (the active tab is always visible, and
/// in a single-sheet form it is the only one).
fn active_sheet<RS, R>(mut workbook: R) -> PorResult<Range<Data>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let index = workbook
        .sheets_metadata()
        .iter()
        .position(|s| {
            matches!(s.typ, SheetType::WorkSheet) && matches!(s.visible, SheetVisible::Visible)
        })
        .unwrap_or(0);
    workbook
        .worksheet_range_at(index)
        .ok_or_else(|| PorError::UnreadableDocument("No active worksheet found".to_string()))?
        .map_err(|e| PorError::UnreadableDocument(format!("Error reading worksheet: {}", e)))
}

/// Read the active worksheet (first visible one) of an in-memory workbook.
pub fn read_grid(bytes: &[u8], format: SpreadsheetFormat) -> PorResult<Grid> {
    let cursor = Cursor::new(bytes);
    let range = match format {
        SpreadsheetFormat::Xlsx => {
            let workbook: Xlsx<_> = open_workbook_from_rs(cursor).map_err(|e| {
                PorError::UnreadableDocument(format!("Error reading Excel file: {}", e))
            })?;
            active_sheet(workbook)?
        }
        SpreadsheetFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(cursor).map_err(|e| {
                PorError::UnreadableDocument(format!("Error reading Excel file: {}", e))
            })?;
            active_sheet(workbook)?
        }
    };
    let grid = Grid::from_range(&range);
    debug!(
        rows = grid.row_count(),
        cols = grid.col_count(),
        "Worksheet loaded"
    );
    Ok(grid)
}

/// Read a workbook from disk, choosing the format from the file extension.
pub fn read_grid_from_path(path: &Path) -> PorResult<Grid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let format = SpreadsheetFormat::from_extension(ext).ok_or_else(|| {
        PorError::UnsupportedFileType {
            extension: ext.to_string(),
        }
    })?;
    let bytes = std::fs::read(path)
        .map_err(|e| PorError::UnreadableDocument(format!("Could not open Excel file: {}", e)))?;
    read_grid(&bytes, format)
}
