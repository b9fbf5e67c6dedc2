//! Scalar field lookup: vertical keyword search and fixed coordinates,
//! plus the string and currency normalisation shared by all extractors.

use crate::excel::{CellValue, Grid};
use crate::models::{CellRef, FieldRule};

/// Dates as `dd/mm/yyyy`, whole numbers without a decimal point, empty as "".
pub fn stringify(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        CellValue::Date(dt) => dt.format("%d/%m/%Y").to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Currency-tolerant float conversion. Never fails: anything unparseable is 0.0.
pub fn to_float(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        CellValue::Text(s) => parse_amount(s),
        CellValue::Empty | CellValue::Date(_) => 0.0,
    }
}

/// Strip `£`, `$` and thousands separators, then parse. "" and junk give 0.0.
pub fn parse_amount(s: &str) -> f64 {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | ','))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Integer-like quantity; `None` when the cell holds nothing numeric.
pub fn to_quantity(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        CellValue::Text(s) => {
            let s = s.trim().replace(',', "");
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
        }
        _ => None,
    }
}

/// Column-major search for a string cell containing `keyword`
/// (case-insensitive), returning the first non-blank value within
/// `lookahead` rows below it in the same column.
///
/// The lowest column wins; within a column the topmost match wins. A match
/// with nothing below it does not stop the search.
pub fn find_vertical(grid: &Grid, keyword: &str, lookahead: u32) -> Option<String> {
    let keyword = keyword.to_lowercase();
    let max_row = grid.row_count();
    for col in 1..=grid.col_count() {
        for row in 1..=max_row {
            let hit = grid
                .cell(row, col)
                .as_text()
                .map(|s| s.to_lowercase().contains(&keyword))
                .unwrap_or(false);
            if !hit {
                continue;
            }
            for offset in 1..=lookahead {
                let below = row + offset;
                if below > max_row {
                    break;
                }
                let value = grid.cell(below, col);
                if !value.is_blank() {
                    return Some(stringify(value));
                }
            }
        }
    }
    None
}

/// Normalised value at a fixed coordinate; `None` when blank.
pub fn fixed_cell(grid: &Grid, at: CellRef) -> Option<String> {
    let value = grid.cell(at.row, at.col);
    if value.is_blank() {
        None
    } else {
        Some(stringify(value))
    }
}

pub fn locate(grid: &Grid, rule: &FieldRule, lookahead: u32) -> Option<String> {
    match rule {
        FieldRule::Keyword { keyword } => find_vertical(grid, keyword, lookahead),
        FieldRule::Cell { row, col } => fixed_cell(grid, CellRef::new(*row, *col)),
    }
}

/// Rough check that a grid is a POR form: at least five rows and at least
/// three of the usual header words in the first ten rows.
pub fn looks_like_por(grid: &Grid) -> bool {
    const KEYWORDS: &[&str] = &["requestor", "material", "quantity", "price", "total"];
    if grid.row_count() < 5 {
        return false;
    }
    let found = grid
        .rows()
        .iter()
        .take(10)
        .flat_map(|row| row.iter())
        .filter_map(CellValue::as_text)
        .filter(|s| {
            let lower = s.to_lowercase();
            KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .count();
    found >= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    #[test]
    fn test_to_float() {
        assert_eq!(to_float(&t("£1,234.50")), 1234.5);
        assert_eq!(to_float(&t("$99")), 99.0);
        assert_eq!(to_float(&t("")), 0.0);
        assert_eq!(to_float(&t("abc")), 0.0);
        assert_eq!(to_float(&CellValue::Empty), 0.0);
        assert_eq!(to_float(&CellValue::Number(12.5)), 12.5);
    }

    #[test]
    fn test_stringify() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(stringify(&CellValue::Date(d)), "31/01/2025");
        assert_eq!(stringify(&CellValue::Empty), "");
        assert_eq!(stringify(&CellValue::Number(5.0)), "5");
        assert_eq!(stringify(&CellValue::Number(2.25)), "2.25");
        assert_eq!(stringify(&t("x")), "x");
    }

    #[test]
    fn test_to_quantity() {
        assert_eq!(to_quantity(&CellValue::Number(3.0)), Some(3));
        assert_eq!(to_quantity(&t(" 12 ")), Some(12));
        assert_eq!(to_quantity(&t("2.0")), Some(2));
        assert_eq!(to_quantity(&t("lots")), None);
        assert_eq!(to_quantity(&CellValue::Empty), None);
    }

    #[test]
    fn test_find_vertical_lowest_column_wins() {
        // column 1 has the keyword at row 2, column 2 at row 1
        let grid = Grid::from_rows(vec![
            vec![CellValue::Empty, t("Requestor Name")],
            vec![t("requestor name"), t("from column two")],
            vec![t("from column one"), CellValue::Empty],
        ]);
        assert_eq!(
            find_vertical(&grid, "Requestor Name", 4).as_deref(),
            Some("from column one")
        );
    }

    #[test]
    fn test_find_vertical_skips_blanks_within_lookahead() {
        let grid = Grid::from_rows(vec![
            vec![t("Date Order Raised")],
            vec![CellValue::Empty],
            vec![t("   ")],
            vec![t("14/02/2025")],
        ]);
        assert_eq!(
            find_vertical(&grid, "date order", 4).as_deref(),
            Some("14/02/2025")
        );
    }

    #[test]
    fn test_find_vertical_lookahead_is_bounded() {
        let mut rows = vec![vec![t("Supplier")]];
        for _ in 0..4 {
            rows.push(vec![CellValue::Empty]);
        }
        rows.push(vec![t("too far")]);
        let grid = Grid::from_rows(rows);
        assert_eq!(find_vertical(&grid, "supplier", 4), None);
    }

    #[test]
    fn test_find_vertical_continues_after_empty_match() {
        let grid = Grid::from_rows(vec![
            vec![t("Requestor Name"), t("Requestor Name")],
            vec![CellValue::Empty, t("J. Smith")],
        ]);
        assert_eq!(
            find_vertical(&grid, "requestor name", 4).as_deref(),
            Some("J. Smith")
        );
    }

    #[test]
    fn test_fixed_cell() {
        let grid = Grid::from_rows(vec![vec![], vec![CellValue::Empty, t("HMS Example")]]);
        assert_eq!(
            fixed_cell(&grid, CellRef::new(2, 2)).as_deref(),
            Some("HMS Example")
        );
        assert_eq!(fixed_cell(&grid, CellRef::new(2, 4)), None);
        assert_eq!(fixed_cell(&grid, CellRef::new(99, 1)), None);
    }

    #[test]
    fn test_looks_like_por() {
        let mut rows = vec![
            vec![t("Requestor Name"), t("Material Description")],
            vec![t("Quantity"), t("Price Each")],
        ];
        rows.extend((0..3).map(|_| vec![CellValue::Empty]));
        assert!(looks_like_por(&Grid::from_rows(rows)));
        assert!(!looks_like_por(&Grid::from_rows(vec![vec![t("Total")]])));
    }
}
