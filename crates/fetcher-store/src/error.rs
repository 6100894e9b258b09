#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("database error: {0}")]
    Database(String),

    #[error("table {table} has no field {field}")]
    UnknownField { table: &'static str, field: String },

    #[error("row {index} of batch for {table} has fields [{found}], expected [{expected}]")]
    Shape {
        table: &'static str,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("invalid row on line {line}: {detail}")]
    InvalidRow { line: usize, detail: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl StoreError {
    /// Errors raised while writing a batch. The batch was rolled back.
    pub fn is_write_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::UnknownField { .. } | Self::Shape { .. }
        )
    }

    /// Write failures that may succeed when the same batch is sent again.
    /// A batch rejected for its fields fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_errors_classified() {
        assert!(StoreError::Database("UNIQUE constraint failed".into()).is_write_error());
        assert!(StoreError::UnknownField {
            table: "post",
            field: "nope".into()
        }
        .is_write_error());
        assert!(!StoreError::InvalidBatchSize(0).is_write_error());
        assert!(!StoreError::NotFound("post 1".into()).is_write_error());
    }

    #[test]
    fn only_database_errors_are_retryable() {
        assert!(StoreError::Database("database is locked".into()).is_retryable());
        let shape = StoreError::Shape {
            table: "tag",
            index: 1,
            expected: "a".into(),
            found: "b".into(),
        };
        assert!(shape.is_write_error());
        assert!(!shape.is_retryable());
        assert!(!StoreError::UnknownField {
            table: "tag",
            field: "nope".into()
        }
        .is_retryable());
        assert!(!StoreError::InvalidRow {
            line: 3,
            detail: "eof".into()
        }
        .is_retryable());
    }

    #[test]
    fn shape_message_lists_fields() {
        let err = StoreError::Shape {
            table: "post",
            index: 2,
            expected: "a, b".into(),
            found: "a".into(),
        };
        assert_eq!(
            err.to_string(),
            "row 2 of batch for post has fields [a], expected [a, b]"
        );
    }
}
