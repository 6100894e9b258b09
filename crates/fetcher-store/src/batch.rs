use std::collections::BTreeSet;

use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::row::Row;
use crate::schema::Table;
use crate::store::BulkStore;

/// Buffers rows for one table and writes them in atomic batches.
///
/// Rows are written once `batch_size` of them have been inserted. Call
/// [`BatchInserter::flush`] when done to write whatever remains; dropping the
/// inserter discards pending rows.
///
/// A failed flush leaves the buffer untouched so the caller can retry it.
pub struct BatchInserter<S> {
    store: S,
    table: &'static Table,
    batch_size: usize,
    fill_missing_fields: bool,
    rows: Vec<Row>,
    written: usize,
}

impl<S: BulkStore> BatchInserter<S> {
    /// Set `fill_missing_fields` when rows may carry different field sets;
    /// each batch is then padded with nulls to a common shape before writing.
    pub fn new(
        store: S,
        table: &'static Table,
        batch_size: usize,
        fill_missing_fields: bool,
    ) -> Result<Self, StoreError> {
        if batch_size == 0 {
            return Err(StoreError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            store,
            table,
            batch_size,
            fill_missing_fields,
            rows: Vec::with_capacity(batch_size),
            written: 0,
        })
    }

    /// Buffer a row, writing the batch if it is now full.
    pub fn insert(&mut self, row: Row) -> Result<(), StoreError> {
        self.rows.push(row);
        if self.rows.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every buffered row in one transaction and return how many were
    /// written. An empty buffer is a no-op.
    #[instrument(skip(self), fields(table = self.table.name, pending = self.rows.len()))]
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        if self.rows.is_empty() {
            return Ok(0);
        }
        if self.fill_missing_fields {
            normalize(&mut self.rows);
        }

        match self.store.insert_many(self.table, &self.rows) {
            Ok(written) => {
                self.rows.clear();
                self.written += written;
                debug!(written, "batch flushed");
                Ok(written)
            }
            Err(e) => {
                warn!(error = %e, "batch flush failed, rows kept for retry");
                Err(e)
            }
        }
    }

    pub fn table(&self) -> &'static Table {
        self.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn fills_missing_fields(&self) -> bool {
        self.fill_missing_fields
    }

    /// Rows waiting for the next flush, in insertion order.
    pub fn pending(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows committed by every successful flush so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<S> Drop for BatchInserter<S> {
    fn drop(&mut self) {
        if !self.rows.is_empty() {
            warn!(
                table = self.table.name,
                pending = self.rows.len(),
                "batch inserter dropped with unflushed rows"
            );
        }
    }
}

/// Pad every row with nulls so that all rows carry the union of the batch's
/// fields. Existing values are never touched.
///
/// The union has to be taken over the whole batch first: a field that only
/// appears in the last row still pads every earlier row.
pub fn normalize(rows: &mut [Row]) {
    let fields: BTreeSet<String> = rows
        .iter()
        .flat_map(|row| row.fields().map(str::to_owned))
        .collect();

    for row in rows.iter_mut() {
        for field in &fields {
            row.pad(field);
        }
    }
}
