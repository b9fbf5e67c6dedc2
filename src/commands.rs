use crate::config::AppConfig;
use crate::counter::{CounterStore, FileCounterStore, PoCounter};
use crate::db::Db;
use crate::error::{PorError, PorResult};
use crate::services::email;
use crate::services::extractor::{file_extension, DocumentKind, Extraction, Extractor, ALLOWED_EXTENSIONS};
use crate::storage::{
    attachment_filename, dotted_extension, email_upload_filename, guess_mime, upload_filename, UploadStore,
};
use crate::types::{NewPor, NewPorFile, PageInfo, PorFile, PorRecord, UploadOutcome};
use chrono::{Local, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Extensions accepted as attachments on an existing POR.
pub const ATTACHMENT_EXTENSIONS: &[&str] = &[
    "xlsx", "xls", "msg", "eml", "pdf", "doc", "docx", "jpg", "jpeg", "png",
];

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        ValidationResult { valid: true, error: None }
    }

    fn invalid(message: impl Into<String>) -> Self {
        ValidationResult {
            valid: false,
            error: Some(message.into()),
        }
    }
}

/// Everything the CLI (or any other front end) calls into.
pub struct PorService {
    config: AppConfig,
    db: Arc<Db>,
    counter: PoCounter,
    uploads: UploadStore,
    extractor: Extractor,
}

impl PorService {
    pub fn open(config: AppConfig) -> PorResult<Self> {
        let db = Arc::new(Db::new(config.database_path.clone())?);
        let store: Box<dyn CounterStore> = match &config.po_counter_path {
            Some(path) => {
                info!(path = %path.display(), "Using file-backed PO counter");
                Box::new(FileCounterStore::new(path.clone()))
            }
            None => Box::new(db.clone()),
        };
        let counter = PoCounter::new(store, config.starting_po)?;
        let uploads = UploadStore::new(config.upload_folder.clone())?;
        let extractor = Extractor::new(config.template()?);
        Ok(PorService {
            config,
            db,
            counter,
            uploads,
            extractor,
        })
    }

    pub fn validate_upload(&self, file_name: &str, size: u64) -> ValidationResult {
        if file_name.trim().is_empty() {
            return ValidationResult::invalid("No file selected");
        }
        match file_extension(file_name) {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return ValidationResult::invalid(
                    "Invalid file type. Please upload Excel files (.xlsx, .xls) or email files (.msg, .eml)",
                )
            }
        }
        if size > self.config.max_file_size {
            return ValidationResult::invalid(
                PorError::FileTooLarge {
                    size,
                    max: self.config.max_file_size,
                }
                .to_string(),
            );
        }
        ValidationResult::ok()
    }

    /// Extract, number, store and persist one uploaded document. Never
    /// returns an error: failures are reported in the outcome.
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> UploadOutcome {
        let check = self.validate_upload(file_name, bytes.len() as u64);
        if !check.valid {
            let message = check.error.unwrap_or_else(|| "Invalid upload".to_string());
            warn!(file = %file_name, %message, "Upload rejected");
            return UploadOutcome::failed(message);
        }

        let extraction = match self.extractor.extract(file_name, bytes, Local::now().date_naive()) {
            Ok(extraction) => extraction,
            Err(e) => {
                error!(file = %file_name, error = %e, "Extraction failed");
                return UploadOutcome::failed(format!("Error processing file: {}", e));
            }
        };

        let po_number = match self.counter.next() {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "PO allocation failed");
                return UploadOutcome::failed(format!("Could not allocate a PO number: {}", e));
            }
        };

        match self.store_and_persist(po_number, file_name, bytes, &extraction) {
            Ok(record_id) => UploadOutcome {
                success: true,
                message: format!("Successfully processed PO #{}", po_number),
                po_number: Some(po_number),
                record_id: Some(record_id),
                source: Some(extraction.source),
            },
            Err(e) => {
                error!(po_number, error = %e, "Upload failed after allocation; number skipped");
                UploadOutcome::failed(format!("Error saving PO #{}: {}", po_number, e))
            }
        }
    }

    fn store_and_persist(
        &self,
        po_number: i64,
        file_name: &str,
        bytes: &[u8],
        extraction: &Extraction,
    ) -> PorResult<i64> {
        let fields = &extraction.fields;
        let suggested = match DocumentKind::from_file_name(file_name)? {
            DocumentKind::Spreadsheet(_) => upload_filename(
                po_number,
                &fields.date_order_raised,
                &fields.requestor_name,
                &file_extension(file_name).unwrap_or_default(),
            ),
            DocumentKind::Eml | DocumentKind::Msg => {
                email_upload_filename(po_number, &fields.date_order_raised, file_name)
            }
        };
        let stored = self.uploads.save(&suggested, bytes)?;

        let por = NewPor {
            po_number,
            filename: stored.clone(),
            created_at: Utc::now().to_rfc3339(),
            fields: fields.clone(),
        };
        match self.db.insert_por(&por, &extraction.line_items) {
            Ok(id) => {
                info!(po_number, record_id = id, file = %stored, "Upload complete");
                Ok(id)
            }
            Err(e) => {
                warn!(file = %stored, "Rolling back stored upload");
                self.uploads.remove(&stored);
                Err(e)
            }
        }
    }

    pub fn records(&self, search: Option<&str>, page: u32) -> PorResult<(Vec<PorRecord>, PageInfo)> {
        self.db.query_pors(search, page, self.config.records_per_page)
    }

    pub fn record(&self, id: i64) -> PorResult<PorRecord> {
        self.db.get_por(id)
    }

    pub fn current_po(&self) -> PorResult<i64> {
        self.counter.current()
    }

    /// Display-only value; may be stale.
    pub fn displayed_po(&self) -> Option<i64> {
        self.counter.displayed()
    }

    /// Set the last issued PO number; the next upload gets `value + 1`.
    pub fn change_batch(&self, value: i64) -> PorResult<()> {
        self.counter.set_value(value)
    }

    pub fn update_por_field(&self, id: i64, field: &str, value: &str) -> PorResult<()> {
        self.db.update_por_field(id, field, value)
    }

    pub fn update_line_item_field(&self, id: i64, field: &str, value: &str) -> PorResult<()> {
        self.db.update_line_item_field(id, field, value)
    }

    fn store_attachment(
        &self,
        por_id: i64,
        original_name: &str,
        bytes: &[u8],
        file_type: &str,
        mime_type: &str,
        description: String,
    ) -> PorResult<PorFile> {
        let po_number = self.db.po_number_for(por_id)?;
        let now = Utc::now();
        let suggested = attachment_filename(
            po_number,
            file_type,
            now.naive_utc(),
            &dotted_extension(original_name),
        );
        let stored = self.uploads.save(&suggested, bytes)?;
        let file = NewPorFile {
            original_filename: original_name.to_string(),
            stored_filename: stored.clone(),
            file_type: file_type.to_string(),
            file_size: bytes.len() as i64,
            mime_type: mime_type.to_string(),
            description,
            uploaded_at: now.to_rfc3339(),
        };
        let file_id = match self.db.insert_file(por_id, &file) {
            Ok(id) => id,
            Err(e) => {
                self.uploads.remove(&stored);
                return Err(e);
            }
        };
        info!(po_number, file_id, file = %stored, "Attachment stored");
        self.db.get_file(file_id)
    }

    pub fn attach_file(
        &self,
        por_id: i64,
        original_name: &str,
        bytes: &[u8],
        file_type: &str,
        description: &str,
    ) -> PorResult<PorFile> {
        let ext = file_extension(original_name).unwrap_or_default();
        if !ATTACHMENT_EXTENSIONS.contains(&ext.as_str()) {
            return Err(PorError::UnsupportedFileType { extension: ext });
        }
        if bytes.len() as u64 > self.config.max_file_size {
            return Err(PorError::FileTooLarge {
                size: bytes.len() as u64,
                max: self.config.max_file_size,
            });
        }
        let file_type = if file_type.trim().is_empty() { "other" } else { file_type.trim() };
        self.store_attachment(
            por_id,
            original_name,
            bytes,
            file_type,
            guess_mime(original_name),
            description.to_string(),
        )
    }

    /// Attach a `.eml`/`.msg` file, describing it from its headers.
    pub fn attach_email(&self, por_id: i64, original_name: &str, bytes: &[u8]) -> PorResult<PorFile> {
        let kind = DocumentKind::from_file_name(original_name)?;
        if !kind.is_email() {
            return Err(PorError::UnsupportedFileType {
                extension: file_extension(original_name).unwrap_or_default(),
            });
        }
        let description = match kind {
            DocumentKind::Eml => match email::parse_eml(bytes) {
                Ok(meta) => format!("Email: {} (from {})", meta.subject, meta.from),
                Err(_) => format!("Email: {}", original_name),
            },
            _ => format!("Outlook Message: {}", original_name),
        };
        self.store_attachment(
            por_id,
            original_name,
            bytes,
            "EMAIL",
            guess_mime(original_name),
            description,
        )
    }

    /// Attachment row and the path of its stored bytes.
    pub fn file_path(&self, file_id: i64) -> PorResult<(PorFile, PathBuf)> {
        let file = self.db.get_file(file_id)?;
        let path = self.uploads.path_for(&file.stored_filename);
        if !path.exists() {
            return Err(PorError::NotFound(format!("Stored file {}", file.stored_filename)));
        }
        Ok((file, path))
    }

    pub fn delete_file(&self, file_id: i64) -> PorResult<PorFile> {
        let file = self.db.delete_file(file_id)?;
        self.uploads.remove(&file.stored_filename);
        info!(file_id, "Attachment deleted");
        Ok(file)
    }

    /// Delete a POR, its line items, its attachments and the uploaded file.
    pub fn delete_por(&self, id: i64) -> PorResult<()> {
        let record = self.db.get_por(id)?;
        let files = self.db.delete_por(id)?;
        for file in &files {
            self.uploads.remove(&file.stored_filename);
        }
        self.uploads.remove(&record.filename);
        Ok(())
    }
}
