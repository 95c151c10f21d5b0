//! The statement-level seam between the clone logic and a MySQL connection.
//!
//! Components that only issue statements against the destination (the
//! constraint guard, the charset negotiator, the dependency-ordered builder
//! and the batched inserter) work against [`Session`] rather than a concrete
//! connection, so they can be exercised with the scripted session from
//! [`crate::testing`].

use async_trait::async_trait;
use mysql_async::{prelude::*, Conn, Params, Row, Value};

/// Statement execution on one database session.
#[async_trait]
pub trait Session: Send {
    /// Execute a statement over the text protocol, discarding any result.
    async fn execute(&mut self, sql: &str) -> Result<(), mysql_async::Error>;

    /// Execute a statement with positional parameters, discarding any result.
    async fn execute_with(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<(), mysql_async::Error>;

    /// First column of the first row, if any.
    async fn scalar(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<Value>, mysql_async::Error>;
}

#[async_trait]
impl Session for Conn {
    async fn execute(&mut self, sql: &str) -> Result<(), mysql_async::Error> {
        self.query_drop(sql).await
    }

    async fn execute_with(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<(), mysql_async::Error> {
        if params.is_empty() {
            self.exec_drop(sql, Params::Empty).await
        } else {
            self.exec_drop(sql, Params::Positional(params)).await
        }
    }

    async fn scalar(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<Value>, mysql_async::Error> {
        let row: Option<Row> = if params.is_empty() {
            self.query_first(sql).await?
        } else {
            self.exec_first(sql, Params::Positional(params)).await?
        };
        Ok(row.and_then(|row| row.unwrap().into_iter().next()))
    }
}

/// Interpret a scalar as text. Byte values are decoded lossily.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true)),
    }
}

/// Interpret a scalar as an integer, accepting text-protocol digits.
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::UInt(u) => i64::try_from(*u).ok(),
        Value::Bytes(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}
