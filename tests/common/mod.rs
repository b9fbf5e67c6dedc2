#![allow(dead_code)]

use std::path::Path;

use por_upload_lib::{AppConfig, PorService};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

/// The standard POR form: header keywords in column F, line-item table on
/// rows 5-8, supplier block in column C near the bottom. Both dates are real
/// date cells.
pub fn standard_por_xlsx() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let ws = workbook.add_worksheet();

    // rust_xlsxwriter is 0-indexed: (row - 1, col - 1)
    ws.write_string(0, 0, "PURCHASE ORDER REQUEST")?;
    ws.write_string(0, 5, "Requestor Name")?;
    ws.write_string(1, 1, "hms example")?;
    ws.write_string(1, 3, "acme supplies")?;
    ws.write_string(1, 5, "jane doe")?;
    ws.write_string(2, 5, "Date Order Raised")?;
    ws.write_datetime_with_format(3, 5, &ExcelDateTime::from_ymd(2025, 3, 3)?, &date_format)?;

    ws.write_string(4, 0, "Job/Contract No")?;
    ws.write_string(4, 1, "Op No")?;
    ws.write_string(4, 2, "Material Description")?;
    ws.write_string(4, 6, "Quantity")?;
    ws.write_string(4, 7, "Price Each")?;
    ws.write_string(4, 8, "Line Total")?;

    ws.write_string(5, 0, "c-100")?;
    ws.write_number(5, 1, 10)?;
    ws.write_string(5, 2, "steel plate")?;
    ws.write_number(5, 6, 4)?;
    ws.write_string(5, 7, "£25.00")?;
    ws.write_number(5, 8, 100)?;

    ws.write_string(6, 0, "c-100")?;
    ws.write_number(6, 1, 20)?;
    ws.write_string(6, 2, "bolts m12")?;
    ws.write_number(6, 6, 100)?;
    ws.write_number(6, 7, 0.5)?;
    ws.write_number(6, 8, 50)?;

    ws.write_string(7, 2, "ORDER TOTAL")?;
    ws.write_number(7, 8, 150)?;

    ws.write_string(28, 0, "bs en 10025")?;
    ws.write_string(32, 2, "bob smith")?;
    ws.write_string(33, 2, "Bob@Acme.example")?;
    ws.write_string(34, 2, "q-42")?;
    ws.write_datetime_with_format(35, 2, &ExcelDateTime::from_ymd(2025, 2, 12)?, &date_format)?;

    workbook.save_to_buffer()
}

pub fn open_service(dir: &Path) -> PorService {
    PorService::open(AppConfig::in_dir(dir)).expect("service opens")
}
