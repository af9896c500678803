//! Conversions between wire values and SQLite values.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use sqlwire_protocol::Value;

/// Binds a borrowed [`Value`] as a statement parameter without copying it.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a>(pub &'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self.0 {
            Value::Null => ValueRef::Null,
            Value::Integer(v) => ValueRef::Integer(*v),
            Value::Double(v) => ValueRef::Real(*v),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Parameters for a query's arguments, in order.
pub fn params(args: &[Value]) -> impl Iterator<Item = Param<'_>> {
    args.iter().map(Param)
}

/// Converts a column value read from a result row.
///
/// Text columns holding invalid UTF-8 are converted lossily.
pub fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
