//! Print the active worksheet of a workbook as a 1-indexed grid.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use por_upload_lib::excel::{col_index_to_letter, read_grid_from_path};
use por_upload_lib::services::field_locator::stringify;

#[derive(Debug, Parser)]
#[command(name = "dump_excel")]
#[command(about = "Print every non-blank cell of a POR workbook with its coordinates", long_about = None)]
struct Args {
    /// Workbook to read (.xlsx or .xls)
    file: PathBuf,
}

fn main() {
    let path = Args::parse().file;
    let grid = match read_grid_from_path(&path) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    println!(
        "{}: {} rows x {} columns",
        path.display(),
        grid.row_count(),
        grid.col_count()
    );
    for (r, row) in grid.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.is_blank() {
                continue;
            }
            println!(
                "({}, {}) {}{}: {:?} => {}",
                r + 1,
                c + 1,
                col_index_to_letter(c as u32 + 1),
                r + 1,
                cell,
                stringify(cell)
            );
        }
    }
}
