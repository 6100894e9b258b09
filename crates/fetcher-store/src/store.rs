use std::sync::Arc;

use crate::error::StoreError;
use crate::row::Row;
use crate::schema::Table;

/// A transactional store that accepts bulk inserts.
pub trait BulkStore {
    /// Write all `rows` into `table` inside one atomic scope and return the
    /// number written. On error nothing from `rows` may remain visible.
    fn insert_many(&self, table: &Table, rows: &[Row]) -> Result<usize, StoreError>;
}

impl<S: BulkStore + ?Sized> BulkStore for &S {
    fn insert_many(&self, table: &Table, rows: &[Row]) -> Result<usize, StoreError> {
        (**self).insert_many(table, rows)
    }
}

impl<S: BulkStore + ?Sized> BulkStore for Arc<S> {
    fn insert_many(&self, table: &Table, rows: &[Row]) -> Result<usize, StoreError> {
        (**self).insert_many(table, rows)
    }
}
