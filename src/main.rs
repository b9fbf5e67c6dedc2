mod cli;
mod logging;

use std::path::Path;
use std::process;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use por_upload_lib::services::DocumentKind;
use por_upload_lib::{AppConfig, PorError, PorResult, PorService};
use tracing::error;

fn load_config(cli: &Cli) -> PorResult<AppConfig> {
    match &cli.data_dir {
        Some(dir) => {
            let _ = dotenvy::dotenv();
            let dir = dir.display().to_string();
            AppConfig::from_lookup(|name| {
                if name == "POR_DATA_DIR" {
                    Some(dir.clone())
                } else {
                    std::env::var(name).ok()
                }
            })
        }
        None => AppConfig::from_env(),
    }
}

fn read_input(path: &Path) -> PorResult<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_default();
    let bytes = std::fs::read(path)
        .map_err(|e| PorError::Storage(format!("Could not read {}: {}", path.display(), e)))?;
    Ok((name, bytes))
}

fn print_json<T: serde::Serialize>(value: &T) -> PorResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PorError::Storage(format!("Could not render output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn run(service: &PorService, command: Commands) -> PorResult<bool> {
    match command {
        Commands::Upload { file } => {
            let (name, bytes) = read_input(&file)?;
            let outcome = service.upload(&name, &bytes);
            println!("{}", outcome.message);
            return Ok(outcome.success);
        }
        Commands::List { page, search } => {
            let (records, info) = service.records(search.as_deref(), page)?;
            for r in &records {
                println!(
                    "{:>5}  PO {:<8} {:<12} {:<24} {:<24} {:>10.2}",
                    r.id,
                    r.po_number,
                    r.fields.date_order_raised,
                    r.fields.requestor_name,
                    r.fields.supplier,
                    r.fields.order_total
                );
            }
            println!(
                "Page {} of {} ({} records)",
                info.current_page, info.total_pages, info.total_records
            );
        }
        Commands::Show { id } => print_json(&service.record(id)?)?,
        Commands::CurrentPo => println!("Current PO: {}", service.current_po()?),
        Commands::SetPo { value } => {
            service.change_batch(value)?;
            println!("Starting PO set to {}", value);
        }
        Commands::UpdateField { id, field, value } => {
            service.update_por_field(id, &field, &value)?;
            println!("Updated {} on POR {}", field, id);
        }
        Commands::UpdateItem { id, field, value } => {
            service.update_line_item_field(id, &field, &value)?;
            println!("Updated {} on line item {}", field, id);
        }
        Commands::Attach {
            por_id,
            file,
            file_type,
            description,
        } => {
            let (name, bytes) = read_input(&file)?;
            let is_email = DocumentKind::from_file_name(&name)
                .map(|k| k.is_email())
                .unwrap_or(false);
            let stored = if is_email {
                service.attach_email(por_id, &name, &bytes)?
            } else {
                service.attach_file(por_id, &name, &bytes, &file_type, &description)?
            };
            println!("Attached {} as file {} ({})", name, stored.id, stored.stored_filename);
        }
        Commands::FilePath { file_id } => {
            let (_, path) = service.file_path(file_id)?;
            println!("{}", path.display());
        }
        Commands::DeleteFile { file_id } => {
            let file = service.delete_file(file_id)?;
            println!("Deleted {}", file.original_filename);
        }
        Commands::Delete { id } => {
            service.delete_por(id)?;
            println!("Deleted POR {}", id);
        }
    }
    Ok(true)
}

fn main() {
    let args = Cli::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {}", err);
            process::exit(2);
        }
    };
    logging::init_logger(&config.log_level);

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let service = match PorService::open(config) {
        Ok(service) => service,
        Err(err) => {
            error!("Error opening POR store: {}", err);
            process::exit(2);
        }
    };

    match run(&service, command) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("Error: {}", err);
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
