use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::row::{Row, Value};
use crate::schema::{self, ColumnType, Table};
use crate::store::BulkStore;

/// Shared handle to the fetcher SQLite database.
///
/// Clones share one connection behind a `parking_lot::Mutex`, so a transaction
/// opened through [`Database::atomic`] holds the lock until it commits or
/// rolls back.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        initialize(&conn)?;

        info!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`; any error
    /// rolls the whole transaction back.
    pub fn atomic<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        // Dropping an uncommitted transaction rolls it back.
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Number of rows stored in `table`.
    pub fn count(&self, table: &Table) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table.name), [], |row| {
                row.get(0)
            })?)
        })
    }

    /// Read back up to `limit` rows of `table` ordered by id, every column
    /// included.
    #[instrument(skip(self), fields(table = table.name))]
    pub fn fetch_rows(&self, table: &Table, limit: u32) -> Result<Vec<Row>, StoreError> {
        let names: Vec<&'static str> = std::iter::once("id")
            .chain(table.columns.iter().map(|c| c.name))
            .collect();
        // Booleans are stored as 0/1 and read back as `Value::Bool`.
        let booleans: Vec<bool> = std::iter::once(false)
            .chain(table.columns.iter().map(|c| c.kind == ColumnType::Boolean))
            .collect();
        let column_list = names
            .iter()
            .map(|n| format!("\"{n}\""))
            .collect::<Vec<_>>()
            .join(", ");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {column_list} FROM \"{}\" ORDER BY id ASC LIMIT ?1",
                table.name
            ))?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let mut out = Row::new();
                for (idx, &name) in names.iter().enumerate() {
                    let value: Value = row.get(idx).map_err(|e| StoreError::CorruptRow {
                        table: table.name,
                        column: name,
                        detail: e.to_string(),
                    })?;
                    let value = match value {
                        Value::Integer(n) if booleans[idx] => Value::Bool(n != 0),
                        other => other,
                    };
                    out.insert(name, value);
                }
                results.push(out);
            }
            Ok(results)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}

impl BulkStore for Database {
    /// Insert every row of `rows` into `table` in one transaction.
    ///
    /// All rows must carry the same field set, and every field must be a
    /// column of `table`. Nothing is written unless every row is.
    #[instrument(skip(self, rows), fields(table = table.name, rows = rows.len()))]
    fn insert_many(&self, table: &Table, rows: &[Row]) -> Result<usize, StoreError> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        if first.is_empty() {
            return Err(StoreError::Shape {
                table: table.name,
                index: 0,
                expected: "at least one field".into(),
                found: String::new(),
            });
        }
        if let Some(field) = first.fields().find(|f| !table.accepts(f)) {
            return Err(StoreError::UnknownField {
                table: table.name,
                field: field.to_owned(),
            });
        }
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| !r.same_fields(first)) {
            return Err(StoreError::Shape {
                table: table.name,
                index,
                expected: first.field_list(),
                found: row.field_list(),
            });
        }

        let columns = first
            .fields()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=first.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({columns}) VALUES ({placeholders})",
            table.name
        );

        let written = self.atomic(|tx| {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                stmt.execute(rusqlite::params_from_iter(row.values()))?;
            }
            Ok(rows.len())
        })?;

        debug!(written, "bulk insert committed");
        Ok(written)
    }
}

fn initialize(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(schema::PRAGMAS)
        .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

    conn.execute_batch(&schema::create_tables_sql())
        .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
    }
    Ok(())
}
