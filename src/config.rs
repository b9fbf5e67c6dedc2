use std::path::PathBuf;

use crate::error::{PorError, PorResult};
use crate::models::DocumentTemplate;

pub const DEFAULT_STARTING_PO: i64 = 1000;
pub const DEFAULT_RECORDS_PER_PAGE: u32 = 10;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub upload_folder: PathBuf,
    pub database_path: PathBuf,
    /// File-backed counter; `None` keeps the counter in the database.
    pub po_counter_path: Option<PathBuf>,
    pub starting_po: i64,
    pub records_per_page: u32,
    pub max_file_size: u64,
    pub template_path: Option<PathBuf>,
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("por-upload"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> PorResult<T> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map_err(|_| PorError::Config(format!("{} must be a number, got {:?}", name, v))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load `.env` (working directory first, then the data directory) and
    /// read settings from the environment.
    pub fn from_env() -> PorResult<Self> {
        let _ = dotenvy::dotenv();
        let data_env = std::env::var("POR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir())
            .join(".env");
        if data_env.exists() {
            let _ = dotenvy::from_path(&data_env);
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup. Relative defaults hang off the data dir.
    pub fn from_lookup<F>(lookup: F) -> PorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let data_dir = path_var("POR_DATA_DIR").unwrap_or_else(default_data_dir);
        let starting_po = parse_var("STARTING_PO", lookup("STARTING_PO"), DEFAULT_STARTING_PO)?;
        if starting_po < 0 {
            return Err(PorError::Config(format!(
                "STARTING_PO must not be negative, got {}",
                starting_po
            )));
        }
        Ok(AppConfig {
            upload_folder: path_var("UPLOAD_FOLDER").unwrap_or_else(|| data_dir.join("uploads")),
            database_path: path_var("DATABASE_PATH").unwrap_or_else(|| data_dir.join("por.db")),
            po_counter_path: path_var("PO_COUNTER_PATH"),
            starting_po,
            records_per_page: parse_var(
                "RECORDS_PER_PAGE",
                lookup("RECORDS_PER_PAGE"),
                DEFAULT_RECORDS_PER_PAGE,
            )?
            .max(1),
            max_file_size: parse_var("MAX_FILE_SIZE", lookup("MAX_FILE_SIZE"), DEFAULT_MAX_FILE_SIZE)?,
            template_path: path_var("POR_TEMPLATE"),
            log_level: lookup("LOG_LEVEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            data_dir,
        })
    }

    /// All settings rooted in one directory; used by tests and `--data-dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let data_dir = dir.into();
        AppConfig {
            upload_folder: data_dir.join("uploads"),
            database_path: data_dir.join("por.db"),
            po_counter_path: None,
            starting_po: DEFAULT_STARTING_PO,
            records_per_page: DEFAULT_RECORDS_PER_PAGE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            template_path: None,
            log_level: "info".to_string(),
            data_dir,
        }
    }

    pub fn template(&self) -> PorResult<DocumentTemplate> {
        match &self.template_path {
            Some(path) => DocumentTemplate::load(path),
            None => Ok(DocumentTemplate::default()),
        }
    }
}
