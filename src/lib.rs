pub mod cache;
pub mod commands;
pub mod config;
pub mod counter;
pub mod db;
pub mod error;
pub mod excel;
pub mod models;
pub mod services;
pub mod storage;
pub mod types;

pub use commands::PorService;
pub use config::AppConfig;
pub use error::{PorError, PorResult};
