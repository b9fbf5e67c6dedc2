use serde::{Deserialize, Serialize};

/// One row of a POR's item table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub job_contract_no: String,
    pub op_no: String,
    pub description: String,
    pub quantity: Option<i64>,
    pub price_each: f64,
    pub line_total: f64,
}

/// Everything extracted from one document, before a PO number is assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PorFields {
    pub requestor_name: String,
    pub date_order_raised: String,
    pub ship_project_name: String,
    pub supplier: String,
    /// First line item, denormalized for list views.
    pub job_contract_no: String,
    pub op_no: String,
    pub description: String,
    pub quantity: Option<i64>,
    pub price_each: f64,
    pub line_total: f64,
    pub order_total: f64,
    pub specification_standards: String,
    pub supplier_contact_name: String,
    pub supplier_contact_email: String,
    pub quote_ref: String,
    pub quote_date: String,
    pub data_summary: String,
}

impl PorFields {
    pub fn set_first_item(&mut self, item: Option<&LineItem>) {
        let item = item.cloned().unwrap_or_default();
        self.job_contract_no = item.job_contract_no;
        self.op_no = item.op_no;
        self.description = item.description;
        self.quantity = item.quantity;
        self.price_each = item.price_each;
        self.line_total = item.line_total;
    }
}

/// A POR ready to be written: extracted fields plus its allocated number.
#[derive(Debug, Clone)]
pub struct NewPor {
    pub po_number: i64,
    pub filename: String,
    pub created_at: String,
    pub fields: PorFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLineItem {
    pub id: i64,
    pub por_id: i64,
    #[serde(flatten)]
    pub item: LineItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PorFile {
    pub id: i64,
    pub por_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: String,
    pub uploaded_at: String,
}

/// Attachment metadata before it has a row id.
#[derive(Debug, Clone)]
pub struct NewPorFile {
    pub original_filename: String,
    pub stored_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PorRecord {
    pub id: i64,
    pub po_number: i64,
    pub filename: String,
    pub created_at: String,
    #[serde(flatten)]
    pub fields: PorFields,
    pub line_items: Vec<StoredLineItem>,
    pub files: Vec<PorFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_records: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub records_per_page: u32,
}

impl PageInfo {
    pub fn new(current_page: u32, total_records: u32, records_per_page: u32) -> Self {
        let per_page = records_per_page.max(1);
        let total_pages = (total_records + per_page - 1) / per_page;
        PageInfo {
            current_page,
            total_pages,
            total_records,
            has_prev: current_page > 1,
            has_next: current_page < total_pages,
            records_per_page: per_page,
        }
    }
}

/// How the fields of a record were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Spreadsheet,
    Email,
    /// Container format that is not parsed; metadata are placeholders.
    MessageStub,
}

/// Result of an upload as seen by the caller. Failures are reported here,
/// never as a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ExtractionSource>,
}

impl UploadOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        UploadOutcome {
            success: false,
            message: message.into(),
            po_number: None,
            record_id: None,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info() {
        let p = PageInfo::new(1, 25, 10);
        assert_eq!(p.total_pages, 3);
        assert!(!p.has_prev);
        assert!(p.has_next);

        let p = PageInfo::new(3, 25, 10);
        assert!(p.has_prev);
        assert!(!p.has_next);

        let p = PageInfo::new(1, 0, 10);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
    }
}
