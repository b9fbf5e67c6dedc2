use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "por-upload")]
#[command(about = "Extract, number and track Purchase Order Requests", long_about = None)]
pub struct Cli {
    /// Keep every file under this directory (overrides POR_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract a spreadsheet or email and store it under the next PO number
    Upload { file: PathBuf },
    /// List stored PORs, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one POR with its line items and attachments
    Show { id: i64 },
    /// Print the last issued PO number
    CurrentPo,
    /// Set the last issued PO number
    SetPo {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Edit a POR field
    UpdateField { id: i64, field: String, value: String },
    /// Edit a line item field
    UpdateItem { id: i64, field: String, value: String },
    /// Attach a file to a POR
    Attach {
        por_id: i64,
        file: PathBuf,
        #[arg(long = "type", default_value = "other")]
        file_type: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Print the stored path of an attachment
    FilePath { file_id: i64 },
    /// Delete an attachment
    DeleteFile { file_id: i64 },
    /// Delete a POR and everything attached to it
    Delete { id: i64 },
}
