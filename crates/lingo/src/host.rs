//! Host capability interfaces.
//!
//! The host runtime supplies these at construction (constructor injection;
//! there is no runtime provider registry). The engine owns no database
//! driver, chat transport, or thread scheduler of its own — it only
//! composes work against these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// A database failure reported by the host's SQL capability.
#[derive(Debug, Clone, Error)]
#[error("database error: {message}")]
pub struct DbError {
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A parameter or column value crossing the SQL boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(value.into())
    }

    /// NULL-preserving text: `None` maps to `Null`.
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(v) => SqlValue::Text(v.to_string()),
            None => SqlValue::Null,
        }
    }

    pub fn opt_timestamp(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(v) => SqlValue::Timestamp(v),
            None => SqlValue::Null,
        }
    }
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: HashMap<String, SqlValue>,
}

impl Row {
    pub fn new(columns: HashMap<String, SqlValue>) -> Self {
        Self { columns }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.columns.get(column)? {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.columns.get(column)? {
            SqlValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, column: &str) -> Option<bool> {
        match self.columns.get(column)? {
            SqlValue::Bool(b) => Some(*b),
            // Drivers without a boolean type round-trip through integers.
            SqlValue::Integer(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match self.columns.get(column)? {
            SqlValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// The host's SQL capability: statements run on a worker, results come back
/// asynchronously. Statement text uses `?` positional parameters.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement; returns the affected-row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    /// Run a query; returns all rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError>;
}

/// The host's chat transport.
///
/// Implementations are responsible for re-entering the host's primary
/// thread before touching player state; the engine calls these from worker
/// contexts.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Deliver a resolved message to one player.
    async fn send_to(&self, player: Uuid, message: &str);

    /// Deliver a resolved message to everyone, optionally gated by a
    /// permission node.
    async fn broadcast(&self, message: &str, permission: Option<&str>);
}

/// Out-of-band notifications for operators (sync summaries, failures).
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, message: &str);
}
