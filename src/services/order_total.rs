use tracing::debug;

use crate::excel::Grid;
use crate::models::OrderTotalRule;

/// Locate the order total: find the first cell (row-major) containing the
/// sentinel phrase, then take the first number to its right on the same
/// row, else the first number within `lookahead` rows below it in the same
/// column. Later sentinel cells are ignored.
pub fn find_order_total(grid: &Grid, rule: &OrderTotalRule) -> Option<f64> {
    let (row, col) = grid.rows().iter().enumerate().find_map(|(r, cells)| {
        cells
            .iter()
            .position(|c| c.contains_upper(&rule.sentinel))
            .map(|c| (r as u32 + 1, c as u32 + 1))
    })?;
    debug!(row, col, "Order total sentinel found");

    let same_row = grid
        .row(row)
        .iter()
        .skip(col as usize)
        .find_map(|c| c.as_number());
    if same_row.is_some() {
        return same_row;
    }

    (1..=rule.lookahead)
        .map(|offset| row + offset)
        .take_while(|r| *r <= grid.row_count())
        .find_map(|r| grid.cell(r, col).as_number())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::CellValue;

    fn grid_with(cells: &[(u32, u32, CellValue)]) -> Grid {
        let max_row = cells.iter().map(|c| c.0).max().unwrap_or(0) as usize;
        let mut rows = vec![vec![CellValue::Empty; 6]; max_row];
        for (r, c, v) in cells {
            rows[*r as usize - 1][*c as usize - 1] = v.clone();
        }
        Grid::from_rows(rows)
    }

    #[test]
    fn test_same_row_value() {
        let grid = grid_with(&[
            (30, 3, CellValue::text("Order Total")),
            (30, 5, CellValue::Number(1500.0)),
        ]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), Some(1500.0));
    }

    #[test]
    fn test_value_below_within_lookahead() {
        let grid = grid_with(&[
            (30, 3, CellValue::text("Order Total")),
            (32, 3, CellValue::Number(1500.0)),
        ]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), Some(1500.0));
    }

    #[test]
    fn test_value_beyond_lookahead() {
        let grid = grid_with(&[
            (30, 3, CellValue::text("Order Total")),
            (36, 3, CellValue::Number(1500.0)),
        ]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), None);
    }

    #[test]
    fn test_text_amounts_are_not_numbers() {
        let grid = grid_with(&[
            (2, 1, CellValue::text("ORDER TOTAL")),
            (2, 2, CellValue::text("£10.00")),
            (3, 1, CellValue::Number(7.0)),
        ]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), Some(7.0));
    }

    #[test]
    fn test_only_first_sentinel_counts() {
        let grid = grid_with(&[
            (2, 1, CellValue::text("order total")),
            (10, 1, CellValue::text("ORDER TOTAL")),
            (10, 2, CellValue::Number(99.0)),
        ]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), None);
    }

    #[test]
    fn test_no_sentinel() {
        let grid = grid_with(&[(1, 1, CellValue::Number(5.0))]);
        assert_eq!(find_order_total(&grid, &OrderTotalRule::default()), None);
    }
}
