//! Upload folder: stored file names and the bytes behind them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::{PorError, PorResult};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Reduce a name to `[A-Za-z0-9_.-]`. Path separators and whitespace runs
/// become `_`; leading and trailing dots and underscores are dropped.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `PO_<po>_<date>_<requestor>.<ext>` for spreadsheet uploads.
pub fn upload_filename(po_number: i64, date: &str, requestor: &str, extension: &str) -> String {
    secure_filename(&format!("PO_{}_{}_{}.{}", po_number, date, requestor, extension))
}

/// `PO_<po>_<date>_EMAIL_<original>` for email uploads.
pub fn email_upload_filename(po_number: i64, date: &str, original: &str) -> String {
    secure_filename(&format!("PO_{}_{}_EMAIL_{}", po_number, date, original))
}

/// `POR_<po>_<type>_<YYYYmmdd_HHMMSS><ext>` for attachments. `ext` keeps
/// its dot, or is empty.
pub fn attachment_filename(po_number: i64, file_type: &str, at: NaiveDateTime, ext: &str) -> String {
    secure_filename(&format!(
        "POR_{}_{}_{}{}",
        po_number,
        file_type,
        at.format("%Y%m%d_%H%M%S"),
        ext
    ))
}

/// Extension with its leading dot, or "".
pub fn dotted_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

pub fn guess_mime(name: &str) -> &'static str {
    let ext = dotted_extension(name).to_ascii_lowercase();
    match ext.as_str() {
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xls" => "application/vnd.ms-excel",
        ".eml" => "message/rfc822",
        ".msg" => "application/vnd.ms-outlook",
        ".pdf" => "application/pdf",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> PorResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| PorError::Storage(format!("Failed to create upload folder: {}", e)))?;
        Ok(UploadStore { root })
    }

    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    /// Write `bytes` under `name`, never overwriting: a taken name gets a
    /// `_<n>` suffix before the extension. Returns the name actually used.
    pub fn save(&self, name: &str, bytes: &[u8]) -> PorResult<String> {
        let name = if name.is_empty() { "upload" } else { name };
        let path = Path::new(name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
        let ext = dotted_extension(name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                format!("{}_{}{}", stem, attempt, ext)
            };
            let target = self.path_for(&candidate);
            match fs::OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(bytes) {
                        drop(file);
                        let _ = fs::remove_file(&target);
                        return Err(PorError::Storage(format!("Failed to write {}: {}", candidate, e)));
                    }
                    debug!(file = %candidate, size = bytes.len(), "File stored");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(PorError::Storage(format!("Failed to create {}: {}", candidate, e)));
                }
            }
        }
        Err(PorError::Storage(format!("No free file name for {}", name)))
    }

    /// Best effort; a missing file is not an error.
    pub fn remove(&self, stored_name: &str) {
        let path = self.path_for(stored_name);
        match fs::remove_file(&path) {
            Ok(()) => debug!(file = %stored_name, "File removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %stored_name, error = %e, "Could not remove stored file"),
        }
    }
}
