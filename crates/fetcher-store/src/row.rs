use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A single scalar stored in a column.
///
/// SQLite has no boolean type: `Bool` is written as 0 or 1. Reading a row
/// back through `Database::fetch_rows` restores `Bool` for boolean columns;
/// a bare `FromSql` read yields `Integer`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Real(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Real(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Timestamps are stored as RFC 3339 text.
impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Text(ts.to_rfc3339())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Self::Integer(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            Self::Real(x) => ToSqlOutput::Borrowed(ValueRef::Real(*x)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::Null),
            ValueRef::Integer(n) => Ok(Self::Integer(n)),
            ValueRef::Real(x) => Ok(Self::Real(x)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_owned()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// A mapping from field name to value, destined for one table.
///
/// Fields are kept sorted by name so that two rows with the same field set
/// bind their parameters in the same order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert `Null` for `field` unless a value is already present.
    pub(crate) fn pad(&mut self, field: &str) {
        if !self.0.contains_key(field) {
            self.0.insert(field.to_owned(), Value::Null);
        }
    }

    pub(crate) fn same_fields(&self, other: &Row) -> bool {
        self.0.len() == other.0.len() && self.0.keys().eq(other.0.keys())
    }

    pub(crate) fn field_list(&self) -> String {
        self.fields().collect::<Vec<_>>().join(", ")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_deserializes_from_json_scalars() {
        let row: Row =
            serde_json::from_str(r#"{"a": 1, "b": 2.5, "c": "x", "d": null, "e": true}"#).unwrap();
        assert_eq!(row.get("a"), Some(&Value::Integer(1)));
        assert_eq!(row.get("b"), Some(&Value::Real(2.5)));
        assert_eq!(row.get("c"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("d"), Some(&Value::Null));
        assert_eq!(row.get("e"), Some(&Value::Bool(true)));
    }

    #[test]
    fn timestamps_become_rfc3339_text() {
        use chrono::TimeZone;
        let ts = Utc.with_ymd_and_hms(2008, 8, 1, 12, 0, 5).unwrap();
        assert_eq!(Value::from(ts), Value::Text("2008-08-01T12:00:05+00:00".into()));
        assert_eq!(Value::from(None::<DateTime<Utc>>), Value::Null);
    }

    #[test]
    fn fields_are_sorted() {
        let row = Row::new().with("zeta", 1).with("alpha", 2).with("mid", 3);
        let fields: Vec<&str> = row.fields().collect();
        assert_eq!(fields, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn pad_keeps_existing_value() {
        let mut row = Row::new().with("a", 7);
        row.pad("a");
        row.pad("b");
        assert_eq!(row.get("a"), Some(&Value::Integer(7)));
        assert_eq!(row.get("b"), Some(&Value::Null));
    }

    #[test]
    fn option_maps_to_null() {
        let missing: Option<i64> = None;
        assert_eq!(Value::from(missing), Value::Null);
        assert_eq!(Value::from(Some("hi")), Value::Text("hi".into()));
    }

    #[test]
    fn same_fields_ignores_values() {
        let a = Row::new().with("x", 1).with("y", 2);
        let b = Row::new().with("y", "other").with("x", Value::Null);
        let c = Row::new().with("x", 1);
        assert!(a.same_fields(&b));
        assert!(!a.same_fields(&c));
    }
}
