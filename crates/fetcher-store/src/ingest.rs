//! Streaming rows from JSON-lines input into a [`BatchInserter`].
//!
//! Each non-blank line must be one JSON object mapping field names to
//! scalars. Rows are submitted as they are read. [`load_json_lines`] leaves
//! the final flush to the caller; [`load_with_retries`] performs it.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::batch::BatchInserter;
use crate::error::StoreError;
use crate::row::Row;
use crate::store::BulkStore;

/// Outcome of [`load_with_retries`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows parsed from the input.
    pub read: usize,
    /// Rows committed during this load.
    pub written: usize,
    /// Flushes repeated after a retryable failure.
    pub retried: u32,
}

/// Feed every row in `reader` to `inserter` and return how many were read.
///
/// Stops at the first malformed line or failed automatic flush. Rows already
/// submitted stay with the inserter.
pub fn load_json_lines<R, S>(reader: R, inserter: &mut BatchInserter<S>) -> Result<usize, StoreError>
where
    R: BufRead,
    S: BulkStore,
{
    feed(reader, inserter, 0).map(|report| report.read)
}

/// Load all of `reader` and flush the remainder.
///
/// A batch whose write fails with a retryable error is sent again up to
/// `retries` times before loading resumes. Line numbers in `InvalidRow`
/// always count from the start of the input.
pub fn load_with_retries<R, S>(
    reader: R,
    inserter: &mut BatchInserter<S>,
    retries: u32,
) -> Result<LoadReport, StoreError>
where
    R: BufRead,
    S: BulkStore,
{
    let start = inserter.written();
    let mut report = feed(reader, inserter, retries)?;
    if let Err(e) = inserter.flush() {
        report.retried += flush_again(inserter, retries, e)?;
    }
    report.written = inserter.written() - start;
    Ok(report)
}

fn feed<R, S>(reader: R, inserter: &mut BatchInserter<S>, retries: u32) -> Result<LoadReport, StoreError>
where
    R: BufRead,
    S: BulkStore,
{
    let mut report = LoadReport::default();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| StoreError::Io(format!("line {line_no}: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let row: Row = serde_json::from_str(trimmed).map_err(|e| StoreError::InvalidRow {
            line: line_no,
            detail: e.to_string(),
        })?;
        // The row that triggered a failed flush is buffered with the rest.
        if let Err(e) = inserter.insert(row) {
            report.retried += flush_again(inserter, retries, e)?;
        }
        report.read += 1;
    }
    debug!(table = inserter.table().name, read = report.read, "input exhausted");
    Ok(report)
}

/// Resend the buffered batch after `first` failed. Returns the attempts used.
fn flush_again<S: BulkStore>(
    inserter: &mut BatchInserter<S>,
    retries: u32,
    first: StoreError,
) -> Result<u32, StoreError> {
    if !first.is_retryable() {
        return Err(first);
    }
    let mut last = first;
    for attempt in 1..=retries {
        warn!(
            table = inserter.table().name,
            pending = inserter.len(),
            attempt,
            retries,
            error = %last,
            "retrying batch"
        );
        match inserter.flush() {
            Ok(_) => return Ok(attempt),
            Err(e) if e.is_retryable() => last = e,
            Err(e) => return Err(e),
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use crate::schema::{Table, TAG};
    use crate::Database;
    use parking_lot::Mutex;
    use std::io::Cursor;

    /// Fails the first `failures` calls, then writes through to `db`.
    struct FlakyStore {
        db: Database,
        failures: Mutex<usize>,
        calls: Mutex<usize>,
    }

    impl FlakyStore {
        fn new(db: Database, failures: usize) -> Self {
            Self {
                db,
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl BulkStore for FlakyStore {
        fn insert_many(&self, table: &Table, rows: &[Row]) -> Result<usize, StoreError> {
            *self.calls.lock() += 1;
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Database("database is locked".into()));
            }
            self.db.insert_many(table, rows)
        }
    }

    fn tags(n: usize) -> String {
        (0..n)
            .map(|i| format!("{{\"tag_name\": \"t{i}\", \"count\": {i}}}\n"))
            .collect()
    }

    #[test]
    fn loads_rows_and_leaves_remainder_pending() {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db.clone(), &TAG, 2, true).unwrap();
        let input = r#"{"tag_name": "rust", "count": 1}

{"tag_name": "go", "count": 2, "wiki_post_id": 12}
{"tag_name": "zig", "count": 3}
"#;
        let read = load_json_lines(Cursor::new(input), &mut inserter).unwrap();
        assert_eq!(read, 3);
        assert_eq!(db.count(&TAG).unwrap(), 2);
        assert_eq!(inserter.len(), 1);

        inserter.flush().unwrap();
        let rows = db.fetch_rows(&TAG, 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("wiki_post_id"), Some(&Value::Null));
        assert_eq!(rows[1].get("wiki_post_id"), Some(&Value::Integer(12)));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db, &TAG, 10, false).unwrap();
        let input = "{\"tag_name\": \"rust\", \"count\": 1}\n[1, 2]\n";
        let err = load_json_lines(Cursor::new(input), &mut inserter).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { line: 2, .. }));
        assert_eq!(inserter.len(), 1);
    }

    #[test]
    fn nested_values_are_rejected() {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db, &TAG, 10, false).unwrap();
        let input = r#"{"tag_name": {"nested": true}, "count": 1}"#;
        let err = load_json_lines(Cursor::new(input), &mut inserter).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { line: 1, .. }));
        assert!(inserter.is_empty());
    }

    #[test]
    fn failed_automatic_flush_stops_loading() {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db.clone(), &TAG, 2, false).unwrap();
        let input = "{\"tag_name\": \"a\", \"count\": 1}\n{\"tag_name\": \"b\"}\n{\"tag_name\": \"c\", \"count\": 3}\n";
        let err = load_json_lines(Cursor::new(input), &mut inserter).unwrap_err();
        assert!(err.is_write_error());
        assert_eq!(inserter.len(), 2);
        assert_eq!(db.count(&TAG).unwrap(), 0);
    }

    #[test]
    fn line_numbers_survive_a_retried_flush() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db.clone(), 1);
        let mut inserter = BatchInserter::new(&store, &TAG, 2, false).unwrap();
        let input = format!("{}not json\n", tags(3));

        let err = load_with_retries(Cursor::new(input), &mut inserter, 1).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { line: 4, .. }), "{err}");
        assert_eq!(db.count(&TAG).unwrap(), 2);
        assert_eq!(inserter.len(), 1);
    }

    #[test]
    fn retried_batches_are_written_once() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db.clone(), 1);
        let mut inserter = BatchInserter::new(&store, &TAG, 2, false).unwrap();

        let report = load_with_retries(Cursor::new(tags(5)), &mut inserter, 3).unwrap();
        assert_eq!(
            report,
            LoadReport {
                read: 5,
                written: 5,
                retried: 1
            }
        );
        assert_eq!(db.count(&TAG).unwrap(), 5);
        assert!(inserter.is_empty());
        assert_eq!(store.calls(), 4);
    }

    #[test]
    fn final_flush_is_retried() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db.clone(), 2);
        let mut inserter = BatchInserter::new(&store, &TAG, 10, false).unwrap();

        let report = load_with_retries(Cursor::new(tags(3)), &mut inserter, 2).unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(report.retried, 2);
        assert_eq!(db.count(&TAG).unwrap(), 3);
    }

    #[test]
    fn gives_up_after_last_retry() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db.clone(), 5);
        let mut inserter = BatchInserter::new(&store, &TAG, 2, false).unwrap();

        let err = load_with_retries(Cursor::new(tags(3)), &mut inserter, 2).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.calls(), 3);
        assert_eq!(inserter.len(), 2);
        assert_eq!(db.count(&TAG).unwrap(), 0);
    }

    #[test]
    fn rejected_shapes_are_not_retried() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db.clone(), 0);
        let mut inserter = BatchInserter::new(&store, &TAG, 2, false).unwrap();
        let input = "{\"tag_name\": \"a\", \"count\": 1}\n{\"tag_name\": \"b\", \"count\": 2, \"wiki_post_id\": 3}\n";

        let err = load_with_retries(Cursor::new(input), &mut inserter, 5).unwrap_err();
        assert!(matches!(err, StoreError::Shape { index: 1, .. }));
        assert_eq!(store.calls(), 1);
        assert_eq!(inserter.len(), 2);
    }

    #[test]
    fn written_counts_only_this_load() {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db.clone(), &TAG, 2, false).unwrap();
        load_with_retries(Cursor::new(tags(3)), &mut inserter, 0).unwrap();

        let report = load_with_retries(Cursor::new(tags(2)), &mut inserter, 0).unwrap();
        assert_eq!(report.read, 2);
        assert_eq!(report.written, 2);
        assert_eq!(db.count(&TAG).unwrap(), 5);
    }
}
