use crate::counter::CounterStore;
use crate::error::{PorError, PorResult};
use crate::types::{LineItem, NewPor, NewPorFile, PageInfo, PorFields, PorFile, PorRecord, StoredLineItem};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// POR fields editable after upload.
pub const EDITABLE_POR_FIELDS: &[&str] = &[
    "requestor_name",
    "ship_project_name",
    "supplier",
    "job_contract_no",
    "op_no",
    "order_total",
    "quote_ref",
    "quote_date",
];

/// Line item fields editable after upload.
pub const EDITABLE_LINE_ITEM_FIELDS: &[&str] = &[
    "job_contract_no",
    "op_no",
    "description",
    "quantity",
    "price_each",
    "line_total",
];

const POR_COLUMNS: &str = "id, po_number, filename, created_at, requestor_name, date_order_raised,
    ship_project_name, supplier, job_contract_no, op_no, description, quantity, price_each,
    line_total, order_total, specification_standards, supplier_contact_name,
    supplier_contact_email, quote_ref, quote_date, data_summary";

const FILE_COLUMNS: &str = "id, por_id, original_filename, stored_filename, file_type, file_size,
    mime_type, description, uploaded_at";

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> PorResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PorError::Persistence(format!("Failed to create database directory: {}", e)))?;
            }
        }
        let conn = Connection::open(&db_path)
            .map_err(|e| PorError::Persistence(format!("Failed to open {}: {}", db_path.display(), e)))?;
        info!(path = %db_path.display(), "Database opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> PorResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PorResult<Self> {
        // Other processes may hold the write lock while allocating.
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS por (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                po_number INTEGER NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                created_at TEXT NOT NULL,
                requestor_name TEXT NOT NULL,
                date_order_raised TEXT NOT NULL,
                ship_project_name TEXT NOT NULL DEFAULT '',
                supplier TEXT NOT NULL DEFAULT '',
                job_contract_no TEXT NOT NULL DEFAULT '',
                op_no TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                quantity INTEGER,
                price_each REAL NOT NULL DEFAULT 0,
                line_total REAL NOT NULL DEFAULT 0,
                order_total REAL NOT NULL DEFAULT 0,
                specification_standards TEXT NOT NULL DEFAULT '',
                supplier_contact_name TEXT NOT NULL DEFAULT '',
                supplier_contact_email TEXT NOT NULL DEFAULT '',
                quote_ref TEXT NOT NULL DEFAULT '',
                quote_date TEXT NOT NULL DEFAULT '',
                data_summary TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS line_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                por_id INTEGER NOT NULL,
                job_contract_no TEXT NOT NULL DEFAULT '',
                op_no TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                quantity INTEGER,
                price_each REAL NOT NULL DEFAULT 0,
                line_total REAL NOT NULL DEFAULT 0,
                FOREIGN KEY (por_id) REFERENCES por(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS por_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                por_id INTEGER NOT NULL,
                original_filename TEXT NOT NULL,
                stored_filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL DEFAULT 0,
                mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
                description TEXT NOT NULL DEFAULT '',
                uploaded_at TEXT NOT NULL,
                FOREIGN KEY (por_id) REFERENCES por(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS batch_counter (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| PorError::Persistence(format!("Failed to create schema: {}", e)))?;

        // Migration 002: search indexes (run once when version < 2)
        let current_version: i64 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0))
            .unwrap_or(1);
        if current_version < 2 {
            conn.execute_batch(
                "
                CREATE INDEX IF NOT EXISTS idx_por_requestor ON por(po_number, requestor_name);
                CREATE INDEX IF NOT EXISTS idx_por_job_op ON por(job_contract_no, op_no);
                CREATE INDEX IF NOT EXISTS idx_line_items_por ON line_items(por_id);
                CREATE INDEX IF NOT EXISTS idx_por_files_por ON por_files(por_id);
                UPDATE schema_version SET version = 2;
                ",
            )
            .map_err(|e| PorError::Persistence(format!("Failed to migrate schema: {}", e)))?;
            debug!("Schema migrated to version 2");
        }

        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> PorResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PorError::Persistence("Database lock poisoned".to_string()))
    }

    /// Write a POR and its line items in one transaction.
    pub fn insert_por(&self, por: &NewPor, items: &[LineItem]) -> PorResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let f = &por.fields;
        tx.execute(
            "INSERT INTO por (po_number, filename, created_at, requestor_name, date_order_raised,
                ship_project_name, supplier, job_contract_no, op_no, description, quantity,
                price_each, line_total, order_total, specification_standards,
                supplier_contact_name, supplier_contact_email, quote_ref, quote_date, data_summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                por.po_number,
                &por.filename,
                &por.created_at,
                &f.requestor_name,
                &f.date_order_raised,
                &f.ship_project_name,
                &f.supplier,
                &f.job_contract_no,
                &f.op_no,
                &f.description,
                f.quantity,
                f.price_each,
                f.line_total,
                f.order_total,
                &f.specification_standards,
                &f.supplier_contact_name,
                &f.supplier_contact_email,
                &f.quote_ref,
                &f.quote_date,
                &f.data_summary,
            ],
        )
        .map_err(|e| PorError::Persistence(format!("Failed to insert PO {}: {}", por.po_number, e)))?;
        let por_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO line_items (por_id, job_contract_no, op_no, description, quantity, price_each, line_total)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for item in items {
                stmt.execute(params![
                    por_id,
                    &item.job_contract_no,
                    &item.op_no,
                    &item.description,
                    item.quantity,
                    item.price_each,
                    item.line_total,
                ])
                .map_err(|e| PorError::Persistence(format!("Failed to insert line item: {}", e)))?;
            }
        }
        tx.commit()?;
        info!(po_number = por.po_number, por_id, items = items.len(), "POR saved");
        Ok(por_id)
    }

    /// Newest first. `search` matches PO number, requestor, job/contract
    /// no, op no and description by substring.
    pub fn query_pors(
        &self,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> PorResult<(Vec<PorRecord>, PageInfo)> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let filter = "WHERE (?1 IS NULL
                OR CAST(po_number AS TEXT) LIKE ?1
                OR requestor_name LIKE ?1
                OR job_contract_no LIKE ?1
                OR op_no LIKE ?1
                OR description LIKE ?1)";

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM por {}", filter),
            params![pattern],
            |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM por {} ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            POR_COLUMNS, filter
        ))?;
        let offset = (page as i64 - 1) * per_page as i64;
        let mut records = stmt
            .query_map(params![pattern, per_page as i64, offset], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        for record in &mut records {
            record.line_items = line_items_for(&conn, record.id)?;
            record.files = files_for(&conn, record.id)?;
        }
        Ok((records, PageInfo::new(page, total as u32, per_page)))
    }

    pub fn get_por(&self, id: i64) -> PorResult<PorRecord> {
        let conn = self.lock()?;
        let mut record = conn
            .query_row(
                &format!("SELECT {} FROM por WHERE id = ?1", POR_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?
            .ok_or_else(|| PorError::NotFound(format!("POR {}", id)))?;
        record.line_items = line_items_for(&conn, id)?;
        record.files = files_for(&conn, id)?;
        Ok(record)
    }

    pub fn update_por_field(&self, id: i64, field: &str, value: &str) -> PorResult<()> {
        if !EDITABLE_POR_FIELDS.contains(&field) {
            return Err(PorError::InvalidField(field.to_string()));
        }
        let conn = self.lock()?;
        // Column name comes from the allow-list above.
        let sql = format!("UPDATE por SET {} = ?1 WHERE id = ?2", field);
        let changed = if field == "order_total" {
            conn.execute(&sql, params![parse_float(field, value)?, id])?
        } else {
            conn.execute(&sql, params![value, id])?
        };
        if changed == 0 {
            return Err(PorError::NotFound(format!("POR {}", id)));
        }
        debug!(id, field, "POR field updated");
        Ok(())
    }

    pub fn update_line_item_field(&self, id: i64, field: &str, value: &str) -> PorResult<()> {
        if !EDITABLE_LINE_ITEM_FIELDS.contains(&field) {
            return Err(PorError::InvalidField(field.to_string()));
        }
        let conn = self.lock()?;
        let sql = format!("UPDATE line_items SET {} = ?1 WHERE id = ?2", field);
        let changed = match field {
            "quantity" => conn.execute(&sql, params![parse_int(field, value)?, id])?,
            "price_each" | "line_total" => conn.execute(&sql, params![parse_float(field, value)?, id])?,
            _ => conn.execute(&sql, params![value, id])?,
        };
        if changed == 0 {
            return Err(PorError::NotFound(format!("Line item {}", id)));
        }
        debug!(id, field, "Line item field updated");
        Ok(())
    }

    /// Delete a POR with its line items and attachment rows. Returns the
    /// attachment rows so the caller can remove the stored bytes.
    pub fn delete_por(&self, id: i64) -> PorResult<Vec<PorFile>> {
        let conn = self.lock()?;
        let files = files_for(&conn, id)?;
        let changed = conn.execute("DELETE FROM por WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(PorError::NotFound(format!("POR {}", id)));
        }
        info!(id, "POR deleted");
        Ok(files)
    }

    pub fn po_number_for(&self, por_id: i64) -> PorResult<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT po_number FROM por WHERE id = ?1", params![por_id], |r| r.get(0))
            .optional()?
            .ok_or_else(|| PorError::NotFound(format!("POR {}", por_id)))
    }

    pub fn insert_file(&self, por_id: i64, file: &NewPorFile) -> PorResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO por_files (por_id, original_filename, stored_filename, file_type,
                file_size, mime_type, description, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                por_id,
                &file.original_filename,
                &file.stored_filename,
                &file.file_type,
                file.file_size,
                &file.mime_type,
                &file.description,
                &file.uploaded_at,
            ],
        )
        .map_err(|e| PorError::Persistence(format!("Failed to save attachment: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_file(&self, file_id: i64) -> PorResult<PorFile> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM por_files WHERE id = ?1", FILE_COLUMNS),
            params![file_id],
            row_to_file,
        )
        .optional()?
        .ok_or_else(|| PorError::NotFound(format!("File {}", file_id)))
    }

    pub fn delete_file(&self, file_id: i64) -> PorResult<PorFile> {
        let file = self.get_file(file_id)?;
        let conn = self.lock()?;
        conn.execute("DELETE FROM por_files WHERE id = ?1", params![file_id])?;
        Ok(file)
    }

}

const INIT_COUNTER: &str = "INSERT OR IGNORE INTO batch_counter (id, value) VALUES (1, ?1)";

fn counter_error(action: &str, e: rusqlite::Error) -> PorError {
    PorError::Persistence(format!("Failed to {} PO counter: {}", action, e))
}

/// The counter row is only touched inside immediate transactions, which take
/// the database write lock up front, so connections in other processes queue
/// behind each other instead of interleaving a read and a write.
impl CounterStore for Db {
    fn load(&self) -> PorResult<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM batch_counter WHERE id = 1", [], |r| r.get(0))
            .optional()
            .map_err(|e| counter_error("read", e))
    }

    fn save(&self, value: i64) -> PorResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| counter_error("lock", e))?;
        tx.execute(
            "INSERT INTO batch_counter (id, value) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET value = excluded.value",
            params![value],
        )
        .map_err(|e| counter_error("save", e))?;
        tx.commit().map_err(|e| counter_error("save", e))
    }

    fn current_or_init(&self, start: i64) -> PorResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| counter_error("lock", e))?;
        tx.execute(INIT_COUNTER, params![start])
            .map_err(|e| counter_error("initialise", e))?;
        let value: i64 = tx
            .query_row("SELECT value FROM batch_counter WHERE id = 1", [], |r| r.get(0))
            .map_err(|e| counter_error("read", e))?;
        tx.commit().map_err(|e| counter_error("read", e))?;
        Ok(value)
    }

    fn increment(&self, start: i64) -> PorResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| counter_error("lock", e))?;
        tx.execute(INIT_COUNTER, params![start])
            .map_err(|e| counter_error("initialise", e))?;
        let next: i64 = tx
            .query_row(
                "UPDATE batch_counter SET value = value + 1 WHERE id = 1 RETURNING value",
                [],
                |r| r.get(0),
            )
            .map_err(|e| counter_error("advance", e))?;
        tx.commit().map_err(|e| counter_error("advance", e))?;
        debug!(po_number = next, "PO counter advanced");
        Ok(next)
    }
}

/// Empty is 0.0; currency symbols and separators are accepted.
fn parse_float(field: &str, value: &str) -> PorResult<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | ','))
        .collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| PorError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn parse_int(field: &str, value: &str) -> PorResult<i64> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(0);
    }
    v.parse::<i64>().map_err(|_| PorError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PorRecord> {
    Ok(PorRecord {
        id: row.get(0)?,
        po_number: row.get(1)?,
        filename: row.get(2)?,
        created_at: row.get(3)?,
        fields: PorFields {
            requestor_name: row.get(4)?,
            date_order_raised: row.get(5)?,
            ship_project_name: row.get(6)?,
            supplier: row.get(7)?,
            job_contract_no: row.get(8)?,
            op_no: row.get(9)?,
            description: row.get(10)?,
            quantity: row.get(11)?,
            price_each: row.get(12)?,
            line_total: row.get(13)?,
            order_total: row.get(14)?,
            specification_standards: row.get(15)?,
            supplier_contact_name: row.get(16)?,
            supplier_contact_email: row.get(17)?,
            quote_ref: row.get(18)?,
            quote_date: row.get(19)?,
            data_summary: row.get(20)?,
        },
        line_items: Vec::new(),
        files: Vec::new(),
    })
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<PorFile> {
    Ok(PorFile {
        id: row.get(0)?,
        por_id: row.get(1)?,
        original_filename: row.get(2)?,
        stored_filename: row.get(3)?,
        file_type: row.get(4)?,
        file_size: row.get(5)?,
        mime_type: row.get(6)?,
        description: row.get(7)?,
        uploaded_at: row.get(8)?,
    })
}

fn line_items_for(conn: &Connection, por_id: i64) -> PorResult<Vec<StoredLineItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, por_id, job_contract_no, op_no, description, quantity, price_each, line_total
         FROM line_items WHERE por_id = ?1 ORDER BY id",
    )?;
    let items = stmt
        .query_map(params![por_id], |row| {
            Ok(StoredLineItem {
                id: row.get(0)?,
                por_id: row.get(1)?,
                item: LineItem {
                    job_contract_no: row.get(2)?,
                    op_no: row.get(3)?,
                    description: row.get(4)?,
                    quantity: row.get(5)?,
                    price_each: row.get(6)?,
                    line_total: row.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn files_for(conn: &Connection, por_id: i64) -> PorResult<Vec<PorFile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM por_files WHERE por_id = ?1 ORDER BY id",
        FILE_COLUMNS
    ))?;
    let files = stmt
        .query_map(params![por_id], row_to_file)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(files)
}
