pub mod batch;
pub mod database;
pub mod error;
pub mod ingest;
pub mod posts;
pub mod row;
pub mod row_helpers;
pub mod schema;
pub mod store;

pub use batch::BatchInserter;
pub use database::Database;
pub use error::StoreError;
pub use row::{Row, Value};
pub use schema::Table;
pub use store::BulkStore;
