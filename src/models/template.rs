//! Document template: where each POR field lives on the source spreadsheet.
//!
//! The default reproduces the standard POR form. Alternate forms are
//! described in TOML and loaded with [`DocumentTemplate::load`]; any header
//! field can be switched between a keyword rule and a fixed coordinate.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PorError, PorResult};

/// 1-indexed (row, column) coordinate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        CellRef { row, col }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Vertical search: the first non-blank cell below a cell containing `keyword`.
    Keyword { keyword: String },
    /// Fixed coordinate.
    Cell { row: u32, col: u32 },
}

impl FieldRule {
    fn keyword(keyword: &str) -> Self {
        FieldRule::Keyword {
            keyword: keyword.to_string(),
        }
    }

    fn cell(row: u32, col: u32) -> Self {
        FieldRule::Cell { row, col }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderFields {
    pub requestor_name: FieldRule,
    pub date_order_raised: FieldRule,
    pub ship_project_name: FieldRule,
    pub supplier: FieldRule,
    pub specification_standards: FieldRule,
    pub supplier_contact_name: FieldRule,
    pub supplier_contact_email: FieldRule,
    pub quote_ref: FieldRule,
    pub quote_date: FieldRule,
}

impl Default for HeaderFields {
    fn default() -> Self {
        HeaderFields {
            requestor_name: FieldRule::keyword("Requestor Name"),
            date_order_raised: FieldRule::keyword("Date Order Raised"),
            ship_project_name: FieldRule::cell(2, 2),
            supplier: FieldRule::cell(2, 4),
            specification_standards: FieldRule::cell(29, 1),
            supplier_contact_name: FieldRule::cell(33, 3),
            supplier_contact_email: FieldRule::cell(34, 3),
            quote_ref: FieldRule::cell(35, 3),
            quote_date: FieldRule::cell(36, 3),
        }
    }
}

/// Column used for each line-item role when the header row does not name it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoleColumns {
    pub job_contract_no: u32,
    pub op_no: u32,
    pub description: u32,
    pub quantity: u32,
    pub price_each: u32,
    pub line_total: u32,
}

impl Default for RoleColumns {
    fn default() -> Self {
        // A, B, C, G, H, I
        RoleColumns {
            job_contract_no: 1,
            op_no: 2,
            description: 3,
            quantity: 7,
            price_each: 8,
            line_total: 9,
        }
    }
}

/// Header detection and the row window walked for line items.
///
/// The window is absolute, not relative to the detected header row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LineItemLayout {
    pub header_sentinel: String,
    pub first_row: u32,
    pub last_row: u32,
    pub terminator: String,
    pub default_columns: RoleColumns,
}

impl Default for LineItemLayout {
    fn default() -> Self {
        LineItemLayout {
            header_sentinel: "MATERIAL".to_string(),
            first_row: 6,
            last_row: 26,
            terminator: "ORDER TOTAL".to_string(),
            default_columns: RoleColumns::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrderTotalRule {
    pub sentinel: String,
    pub lookahead: u32,
}

impl Default for OrderTotalRule {
    fn default() -> Self {
        OrderTotalRule {
            sentinel: "ORDER TOTAL".to_string(),
            lookahead: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocumentTemplate {
    /// Rows probed below a keyword match.
    pub keyword_lookahead: u32,
    pub fields: HeaderFields,
    pub line_items: LineItemLayout,
    pub order_total: OrderTotalRule,
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        DocumentTemplate {
            keyword_lookahead: 4,
            fields: HeaderFields::default(),
            line_items: LineItemLayout::default(),
            order_total: OrderTotalRule::default(),
        }
    }
}

impl DocumentTemplate {
    pub fn from_toml_str(content: &str) -> PorResult<Self> {
        let template: DocumentTemplate = toml::from_str(content)
            .map_err(|e| PorError::Config(format!("Invalid template: {}", e)))?;
        template.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> PorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PorError::Config(format!("Could not read template {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Sentinels are matched against uppercased cell text.
    fn validated(mut self) -> PorResult<Self> {
        self.line_items.header_sentinel = self.line_items.header_sentinel.to_uppercase();
        self.line_items.terminator = self.line_items.terminator.to_uppercase();
        self.order_total.sentinel = self.order_total.sentinel.to_uppercase();

        if self.line_items.first_row == 0 || self.line_items.first_row > self.line_items.last_row {
            return Err(PorError::Config(format!(
                "Invalid line item window {}..={}",
                self.line_items.first_row, self.line_items.last_row
            )));
        }
        let cols = self.line_items.default_columns;
        if [
            cols.job_contract_no,
            cols.op_no,
            cols.description,
            cols.quantity,
            cols.price_each,
            cols.line_total,
        ]
        .contains(&0)
        {
            return Err(PorError::Config("Columns are 1-indexed".to_string()));
        }
        if self.line_items.header_sentinel.is_empty() || self.order_total.sentinel.is_empty() {
            return Err(PorError::Config("Sentinel phrases must not be empty".to_string()));
        }
        Ok(self)
    }
}
