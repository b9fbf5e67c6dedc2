//! Line-item table extraction: header detection, column role mapping and
//! the bounded row walk.

use tracing::debug;

use super::field_locator::{stringify, to_float, to_quantity};
use crate::excel::Grid;
use crate::models::{LineItemLayout, RoleColumns};
use crate::types::LineItem;

/// First row (1-indexed) holding a string cell whose uppercased text
/// contains `sentinel`.
pub fn detect_header_row(grid: &Grid, sentinel: &str) -> Option<u32> {
    grid.rows()
        .iter()
        .position(|row| row.iter().any(|c| c.contains_upper(sentinel)))
        .map(|idx| idx as u32 + 1)
}

/// Assign header cells to roles. Each cell takes the first matching role;
/// when several cells match the same role the rightmost one wins. Roles no
/// header names fall back to `defaults`.
pub fn map_columns(grid: &Grid, header_row: u32, defaults: &RoleColumns) -> RoleColumns {
    let mut job = None;
    let mut op = None;
    let mut desc = None;
    let mut qty = None;
    let mut price = None;
    let mut total = None;

    for (idx, cell) in grid.row(header_row).iter().enumerate() {
        let Some(text) = cell.as_text() else {
            continue;
        };
        let header = text.to_uppercase();
        let col = Some(idx as u32 + 1);
        if header.contains("MATERIAL") && header.contains("DESCRIPTION") {
            desc = col;
        } else if header.contains("QUANTITY") {
            qty = col;
        } else if header.contains("PRICE") && header.contains("EACH") {
            price = col;
        } else if header.contains("LINE TOTAL") {
            total = col;
        } else if header.contains("JOB") && header.contains("CONTRACT") {
            job = col;
        } else if header.contains("OP") && header.contains("NO") {
            op = col;
        }
    }

    RoleColumns {
        job_contract_no: job.unwrap_or(defaults.job_contract_no),
        op_no: op.unwrap_or(defaults.op_no),
        description: desc.unwrap_or(defaults.description),
        quantity: qty.unwrap_or(defaults.quantity),
        price_each: price.unwrap_or(defaults.price_each),
        line_total: total.unwrap_or(defaults.line_total),
    }
}

/// Walk the layout's row window, clipped to the sheet, collecting one item
/// per row until the description cell carries the terminator phrase.
///
/// Blank rows inside the window are kept. Header detection only decides
/// the column mapping; the window itself does not move with it.
pub fn extract_line_items(grid: &Grid, header_row: u32, layout: &LineItemLayout) -> Vec<LineItem> {
    if header_row == 0 || header_row > grid.row_count() {
        return Vec::new();
    }
    let cols = map_columns(grid, header_row, &layout.default_columns);
    debug!(header_row, ?cols, "Line item columns mapped");

    let last_row = layout.last_row.min(grid.row_count());
    let mut items = Vec::new();
    for row in layout.first_row..=last_row {
        let desc = grid.cell(row, cols.description);
        if desc.contains_upper(&layout.terminator) {
            debug!(row, "Line item walk reached terminator");
            break;
        }
        items.push(LineItem {
            job_contract_no: stringify(grid.cell(row, cols.job_contract_no)),
            op_no: stringify(grid.cell(row, cols.op_no)),
            description: stringify(desc),
            quantity: to_quantity(grid.cell(row, cols.quantity)),
            price_each: to_float(grid.cell(row, cols.price_each)),
            line_total: to_float(grid.cell(row, cols.line_total)),
        });
    }
    items
}
