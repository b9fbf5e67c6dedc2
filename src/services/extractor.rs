//! Document extraction: turns one uploaded file into POR fields and line
//! items. Spreadsheets go through the grid locators; email containers go
//! through the metadata path.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::email::{self, EmailMetadata};
use super::field_locator::{locate, looks_like_por, stringify};
use super::line_items::{detect_header_row, extract_line_items};
use super::order_total::find_order_total;
use crate::error::{PorError, PorResult};
use crate::excel::{read_grid, Grid, SpreadsheetFormat};
use crate::models::{DocumentTemplate, FieldRule};
use crate::types::{ExtractionSource, LineItem, PorFields};

const SUMMARY_ROWS: usize = 10;
const EMAIL_DESCRIPTION_CHARS: usize = 100;
const EMAIL_BODY_PREVIEW_CHARS: usize = 500;

pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "msg", "eml"];

/// Lowercased extension after the last dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Spreadsheet(SpreadsheetFormat),
    Eml,
    Msg,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> PorResult<Self> {
        let ext = file_extension(file_name).unwrap_or_default();
        if let Some(format) = SpreadsheetFormat::from_extension(&ext) {
            return Ok(DocumentKind::Spreadsheet(format));
        }
        match ext.as_str() {
            "eml" => Ok(DocumentKind::Eml),
            "msg" => Ok(DocumentKind::Msg),
            _ => Err(PorError::UnsupportedFileType { extension: ext }),
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, DocumentKind::Eml | DocumentKind::Msg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub source: ExtractionSource,
    pub fields: PorFields,
    pub line_items: Vec<LineItem>,
}

fn dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn capitalize(s: &str) -> String {
    s.to_uppercase()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub struct Extractor {
    template: DocumentTemplate,
}

impl Extractor {
    pub fn new(template: DocumentTemplate) -> Self {
        Extractor { template }
    }

    /// Extract a document. `today` fills in dates the document does not carry.
    pub fn extract(&self, file_name: &str, bytes: &[u8], today: NaiveDate) -> PorResult<Extraction> {
        match DocumentKind::from_file_name(file_name)? {
            DocumentKind::Spreadsheet(format) => {
                let grid = read_grid(bytes, format)?;
                self.extract_grid(&grid, today)
            }
            DocumentKind::Eml => {
                let meta = email::parse_eml(bytes)?;
                Ok(self.extract_email(&meta, ExtractionSource::Email, today))
            }
            DocumentKind::Msg => {
                if bytes.is_empty() {
                    return Err(PorError::EmptyDocument);
                }
                let meta = email::msg_placeholder(&dmy(today));
                Ok(self.extract_email(&meta, ExtractionSource::MessageStub, today))
            }
        }
    }

    fn field(&self, grid: &Grid, rule: &FieldRule) -> Option<String> {
        locate(grid, rule, self.template.keyword_lookahead)
    }

    pub fn extract_grid(&self, grid: &Grid, today: NaiveDate) -> PorResult<Extraction> {
        if grid.is_blank() {
            return Err(PorError::EmptyDocument);
        }
        if !looks_like_por(grid) {
            warn!("Worksheet does not look like a POR form; extracting anyway");
        }
        let rules = &self.template.fields;
        let text = |rule: &FieldRule| self.field(grid, rule).unwrap_or_default();

        let mut line_items = match detect_header_row(grid, &self.template.line_items.header_sentinel) {
            Some(header_row) => {
                debug!(header_row, "Line item header row detected");
                extract_line_items(grid, header_row, &self.template.line_items)
            }
            None => {
                debug!("No line item header row");
                Vec::new()
            }
        };
        for item in &mut line_items {
            item.job_contract_no = capitalize(&item.job_contract_no);
            item.op_no = capitalize(&item.op_no);
            item.description = capitalize(&item.description);
        }

        let mut fields = PorFields {
            requestor_name: capitalize(
                &self
                    .field(grid, &rules.requestor_name)
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            date_order_raised: self
                .field(grid, &rules.date_order_raised)
                .unwrap_or_else(|| dmy(today)),
            ship_project_name: capitalize(
                &self
                    .field(grid, &rules.ship_project_name)
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            supplier: capitalize(&text(&rules.supplier)),
            specification_standards: capitalize(&text(&rules.specification_standards)),
            supplier_contact_name: capitalize(&text(&rules.supplier_contact_name)),
            supplier_contact_email: text(&rules.supplier_contact_email),
            quote_ref: capitalize(&text(&rules.quote_ref)),
            quote_date: text(&rules.quote_date),
            order_total: find_order_total(grid, &self.template.order_total).unwrap_or(0.0),
            data_summary: grid
                .rows()
                .iter()
                .take(SUMMARY_ROWS)
                .map(|row| row.iter().map(stringify).collect::<Vec<_>>().join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
            ..PorFields::default()
        };
        fields.set_first_item(line_items.first());

        info!(
            requestor = %fields.requestor_name,
            items = line_items.len(),
            order_total = fields.order_total,
            "Spreadsheet extracted"
        );
        Ok(Extraction {
            source: ExtractionSource::Spreadsheet,
            fields,
            line_items,
        })
    }

    fn extract_email(
        &self,
        meta: &EmailMetadata,
        source: ExtractionSource,
        today: NaiveDate,
    ) -> Extraction {
        let supplier = if meta.subject.to_lowercase().contains("supplier") {
            capitalize(&meta.subject)
        } else {
            "Unknown".to_string()
        };
        let item = LineItem {
            description: meta.subject.clone(),
            quantity: Some(1),
            ..LineItem::default()
        };

        let mut fields = PorFields {
            requestor_name: capitalize(meta.sender_name()),
            date_order_raised: meta.sent_on().map(dmy).unwrap_or_else(|| dmy(today)),
            ship_project_name: "Email Upload".to_string(),
            supplier,
            supplier_contact_email: meta.from.clone(),
            data_summary: format!(
                "Email Subject: {}\nFrom: {}\nDate: {}\n\nBody Preview:\n{}...",
                meta.subject,
                meta.from,
                meta.date,
                truncate_chars(&meta.body, EMAIL_BODY_PREVIEW_CHARS)
            ),
            ..PorFields::default()
        };
        fields.set_first_item(Some(&item));
        fields.description = truncate_chars(&meta.subject, EMAIL_DESCRIPTION_CHARS);

        info!(source = ?source, subject = %meta.subject, "Email extracted");
        Extraction {
            source,
            fields,
            line_items: vec![item],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::CellValue;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    fn put(rows: &mut Vec<Vec<CellValue>>, row: usize, col: usize, v: CellValue) {
        while rows.len() < row {
            rows.push(Vec::new());
        }
        let r = &mut rows[row - 1];
        while r.len() < col {
            r.push(CellValue::Empty);
        }
        r[col - 1] = v;
    }

    fn por_grid() -> Grid {
        let mut rows = Vec::new();
        put(&mut rows, 1, 6, CellValue::text("Requestor Name"));
        put(&mut rows, 2, 6, CellValue::text("jane doe"));
        put(&mut rows, 2, 2, CellValue::text("hms example"));
        put(&mut rows, 2, 4, CellValue::text("acme ltd"));
        put(&mut rows, 3, 6, CellValue::text("Date Order Raised"));
        put(&mut rows, 4, 6, CellValue::text("01/03/2025"));
        for (col, h) in ["Job/Contract No", "Op No", "Material Description"].iter().enumerate() {
            put(&mut rows, 5, col + 1, CellValue::text(*h));
        }
        put(&mut rows, 5, 7, CellValue::text("Quantity"));
        put(&mut rows, 5, 8, CellValue::text("Price Each"));
        put(&mut rows, 5, 9, CellValue::text("Line Total"));
        put(&mut rows, 6, 1, CellValue::text("c123"));
        put(&mut rows, 6, 2, CellValue::Number(20.0));
        put(&mut rows, 6, 3, CellValue::text("steel plate"));
        put(&mut rows, 6, 7, CellValue::Number(4.0));
        put(&mut rows, 6, 8, CellValue::text("£25.00"));
        put(&mut rows, 6, 9, CellValue::Number(100.0));
        put(&mut rows, 7, 3, CellValue::text("ORDER TOTAL"));
        put(&mut rows, 7, 9, CellValue::Number(100.0));
        put(&mut rows, 29, 1, CellValue::text("bs en 10025"));
        put(&mut rows, 33, 3, CellValue::text("bob supplier"));
        put(&mut rows, 34, 3, CellValue::text("Bob@Acme.example"));
        put(&mut rows, 35, 3, CellValue::text("q-77"));
        put(
            &mut rows,
            36,
            3,
            CellValue::Date(
                NaiveDate::from_ymd_opt(2025, 2, 14)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        );
        Grid::from_rows(rows)
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(
            DocumentKind::from_file_name("a.XLSX").unwrap(),
            DocumentKind::Spreadsheet(SpreadsheetFormat::Xlsx)
        );
        assert_eq!(DocumentKind::from_file_name("m.eml").unwrap(), DocumentKind::Eml);
        assert!(DocumentKind::from_file_name("m.msg").unwrap().is_email());
        assert!(matches!(
            DocumentKind::from_file_name("notes.pdf"),
            Err(PorError::UnsupportedFileType { .. })
        ));
        assert!(DocumentKind::from_file_name("noext").is_err());
    }

    #[test]
    fn test_grid_extraction() {
        let ex = Extractor::new(DocumentTemplate::default())
            .extract_grid(&por_grid(), today())
            .unwrap();
        let f = &ex.fields;
        assert_eq!(ex.source, ExtractionSource::Spreadsheet);
        assert_eq!(f.requestor_name, "JANE DOE");
        assert_eq!(f.date_order_raised, "01/03/2025");
        assert_eq!(f.ship_project_name, "HMS EXAMPLE");
        assert_eq!(f.supplier, "ACME LTD");
        assert_eq!(f.specification_standards, "BS EN 10025");
        assert_eq!(f.supplier_contact_name, "BOB SUPPLIER");
        assert_eq!(f.supplier_contact_email, "Bob@Acme.example");
        assert_eq!(f.quote_ref, "Q-77");
        assert_eq!(f.quote_date, "14/02/2025");
        assert_eq!(f.order_total, 100.0);

        assert_eq!(ex.line_items.len(), 1);
        assert_eq!(f.job_contract_no, "C123");
        assert_eq!(f.op_no, "20");
        assert_eq!(f.description, "STEEL PLATE");
        assert_eq!(f.quantity, Some(4));
        assert_eq!(f.price_each, 25.0);
        assert_eq!(f.line_total, 100.0);
        assert!(f.data_summary.lines().count() <= 10);
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let grid = Grid::from_rows(vec![vec![CellValue::text("something")]]);
        let ex = Extractor::new(DocumentTemplate::default())
            .extract_grid(&grid, today())
            .unwrap();
        assert_eq!(ex.fields.requestor_name, "UNKNOWN");
        assert_eq!(ex.fields.ship_project_name, "UNKNOWN");
        assert_eq!(ex.fields.date_order_raised, "04/03/2025");
        assert_eq!(ex.fields.order_total, 0.0);
        assert!(ex.line_items.is_empty());
        assert_eq!(ex.fields.quantity, None);
    }

    #[test]
    fn test_blank_grid_is_empty_document() {
        let err = Extractor::new(DocumentTemplate::default())
            .extract_grid(&Grid::default(), today())
            .unwrap_err();
        assert!(matches!(err, PorError::EmptyDocument));
    }

    #[test]
    fn test_eml_extraction() {
        let eml = "From: Ann Lee <ann@example.com>\nSubject: Supplier: new valves\n\nBody text";
        let ex = Extractor::new(DocumentTemplate::default())
            .extract("order.eml", eml.as_bytes(), today())
            .unwrap();
        assert_eq!(ex.source, ExtractionSource::Email);
        assert_eq!(ex.fields.requestor_name, "ANN LEE");
        assert_eq!(ex.fields.supplier, "SUPPLIER: NEW VALVES");
        assert_eq!(ex.fields.supplier_contact_email, "Ann Lee <ann@example.com>");
        assert_eq!(ex.fields.ship_project_name, "Email Upload");
        assert_eq!(ex.fields.date_order_raised, "04/03/2025");
        assert_eq!(ex.line_items.len(), 1);
        assert_eq!(ex.line_items[0].description, "Supplier: new valves");
        assert_eq!(ex.line_items[0].quantity, Some(1));
        assert!(ex.fields.data_summary.contains("Body Preview:\nBody text"));
    }

    #[test]
    fn test_eml_with_encoded_subject_and_body() {
        let eml = "From: =?utf-8?q?Jos=C3=A9_Ruiz?= <jose@example.com>\n\
Subject: =?UTF-8?B?U3VwcGxpZXIgcXVvdGU=?=\n\
Content-Transfer-Encoding: base64\n\
\n\
UGxlYXNlIG9yZGVy\n";
        let ex = Extractor::new(DocumentTemplate::default())
            .extract("quote.eml", eml.as_bytes(), today())
            .unwrap();
        assert_eq!(ex.fields.requestor_name, "JOSÉ RUIZ");
        assert_eq!(ex.fields.supplier, "SUPPLIER QUOTE");
        assert_eq!(ex.line_items[0].description, "Supplier quote");
        assert!(ex.fields.data_summary.contains("Body Preview:\nPlease order"));
    }

    #[test]
    fn test_msg_is_stubbed() {
        let ex = Extractor::new(DocumentTemplate::default())
            .extract("mail.msg", &[0xD0, 0xCF, 0x11, 0xE0], today())
            .unwrap();
        assert_eq!(ex.source, ExtractionSource::MessageStub);
        assert_eq!(ex.fields.description, email::MSG_SUBJECT);
        assert_eq!(ex.fields.requestor_name, "UNKNOWN SENDER");
        assert_eq!(ex.fields.supplier, "Unknown");
    }

    #[test]
    fn test_long_subject_truncated_on_record_only() {
        let subject = "x".repeat(150);
        let eml = format!("From: a@b.c\nSubject: {}\n\n", subject);
        let ex = Extractor::new(DocumentTemplate::default())
            .extract("long.eml", eml.as_bytes(), today())
            .unwrap();
        assert_eq!(ex.fields.description.len(), 100);
        assert_eq!(ex.line_items[0].description.len(), 150);
    }
}
