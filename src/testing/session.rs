//! In-memory [`Session`] for exercising destination-side logic without a server.

use async_trait::async_trait;
use mysql_async::{Error as MySqlError, ServerError, Value};

use crate::session::Session;

type ExecuteHook = Box<dyn FnMut(&str, &[Value]) -> Result<(), MySqlError> + Send>;
type ScalarHook = Box<dyn FnMut(&str, &[Value]) -> Result<Option<Value>, MySqlError> + Send>;

/// One statement seen by a [`ScriptedSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A session that records every statement and answers through hooks.
///
/// Without hooks every statement succeeds and every scalar query returns no
/// row.
pub struct ScriptedSession {
    executed: Vec<Recorded>,
    queried: Vec<Recorded>,
    on_execute: ExecuteHook,
    on_scalar: ScalarHook,
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            executed: Vec::new(),
            queried: Vec::new(),
            on_execute: Box::new(|_, _| Ok(())),
            on_scalar: Box::new(|_, _| Ok(None)),
        }
    }

    pub fn on_execute<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &[Value]) -> Result<(), MySqlError> + Send + 'static,
    {
        self.on_execute = Box::new(hook);
        self
    }

    pub fn on_scalar<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &[Value]) -> Result<Option<Value>, MySqlError> + Send + 'static,
    {
        self.on_scalar = Box::new(hook);
        self
    }

    /// Statements passed to `execute` / `execute_with`, in order.
    pub fn executed(&self) -> &[Recorded] {
        &self.executed
    }

    /// Queries passed to `scalar`, in order.
    pub fn queried(&self) -> &[Recorded] {
        &self.queried
    }

    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|r| r.sql.as_str()).collect()
    }

    /// Number of executed statements starting with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.executed
            .iter()
            .filter(|r| r.sql.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, sql: &str) -> Result<(), MySqlError> {
        self.execute_with(sql, Vec::new()).await
    }

    async fn execute_with(&mut self, sql: &str, params: Vec<Value>) -> Result<(), MySqlError> {
        let result = (self.on_execute)(sql, &params);
        self.executed.push(Recorded {
            sql: sql.to_string(),
            params,
        });
        result
    }

    async fn scalar(&mut self, sql: &str, params: Vec<Value>) -> Result<Option<Value>, MySqlError> {
        let result = (self.on_scalar)(sql, &params);
        self.queried.push(Recorded {
            sql: sql.to_string(),
            params,
        });
        result
    }
}

/// A server error with the given code, as the driver would report it.
pub fn server_error(code: u16, message: impl Into<String>) -> MySqlError {
    MySqlError::Server(ServerError {
        code,
        message: message.into(),
        state: "HY000".to_string(),
    })
}

/// Text-protocol scalar, as a server returns for `SELECT @@var`.
pub fn text(value: &str) -> Value {
    Value::Bytes(value.as_bytes().to_vec())
}
