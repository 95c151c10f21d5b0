//! Catalog queries against the source's current database.
//!
//! Results are collected into `Vec`s: every caller issues a follow-up
//! `SHOW CREATE ...` on the same connection, which cannot run while a result
//! set is still being read.

use mysql_async::{prelude::*, Conn, Row, Value};
use mysql_ddl::quote_ident;
use tracing::debug;

use crate::error::{CloneError, Result};
use crate::object::{
    ObjectDefinition, ObjectKind, RoutineDescriptor, RoutineKind, TableDescriptor,
    TriggerDescriptor,
};
use crate::session::{value_to_string, Session};

/// The connection's configured database, or `SELECT DATABASE()` when none
/// was configured.
pub async fn current_database(conn: &mut Conn) -> Result<Option<String>> {
    if let Some(db) = conn.opts().db_name() {
        return Ok(Some(db.to_string()));
    }
    let current: Option<Option<String>> = conn.query_first("SELECT DATABASE()").await?;
    Ok(current.flatten())
}

/// Every table-like entry (base tables and views) in the current database.
pub async fn list_tables(conn: &mut Conn) -> Result<Vec<TableDescriptor>> {
    let query = "
        SELECT TABLE_NAME, TABLE_TYPE
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
    ";
    let rows: Vec<(String, String)> = conn.query(query).await?;
    Ok(rows
        .into_iter()
        .map(|(name, table_type)| TableDescriptor::from_catalog(name, &table_type))
        .collect())
}

/// Base-table names of the current database in byte-wise lexicographic order.
pub async fn list_base_tables(conn: &mut Conn) -> Result<Vec<String>> {
    let mut names: Vec<String> = list_tables(conn)
        .await?
        .into_iter()
        .filter(|t| t.is_base_table)
        .map(|t| t.name)
        .collect();
    // collation-independent ordering
    names.sort();
    Ok(names)
}

/// Views of the current database with their create-statements.
pub async fn list_views(conn: &mut Conn) -> Result<Vec<ObjectDefinition>> {
    let query = "
        SELECT TABLE_NAME
        FROM information_schema.VIEWS
        WHERE TABLE_SCHEMA = DATABASE()
        ORDER BY TABLE_NAME
    ";
    let names: Vec<String> = conn.query(query).await?;
    debug!("Found {} views", names.len());

    let mut views = Vec::with_capacity(names.len());
    for name in names {
        let sql = format!("SHOW CREATE VIEW {}", quote_ident(&name));
        let statement = show_create(conn, ObjectKind::View, &name, &sql, 1).await?;
        views.push(ObjectDefinition::new(name, statement));
    }
    Ok(views)
}

/// Triggers of the current database as discrete catalog fields.
pub async fn list_triggers(conn: &mut Conn) -> Result<Vec<TriggerDescriptor>> {
    let query = "
        SELECT TRIGGER_NAME, EVENT_OBJECT_SCHEMA, EVENT_OBJECT_TABLE,
               ACTION_TIMING, EVENT_MANIPULATION, ACTION_STATEMENT
        FROM information_schema.TRIGGERS
        WHERE TRIGGER_SCHEMA = DATABASE()
        ORDER BY EVENT_OBJECT_TABLE, ACTION_ORDER
    ";
    let rows: Vec<Row> = conn.query(query).await?;

    let mut triggers = Vec::with_capacity(rows.len());
    for mut row in rows {
        let field = |row: &mut Row, index: usize| -> Option<String> {
            row.take::<Value, _>(index).as_ref().and_then(value_to_string)
        };
        let (Some(name), Some(table), Some(timing), Some(event), Some(body)) = (
            field(&mut row, 0),
            field(&mut row, 2),
            field(&mut row, 3),
            field(&mut row, 4),
            field(&mut row, 5),
        ) else {
            continue;
        };
        triggers.push(TriggerDescriptor {
            name,
            schema: field(&mut row, 1),
            table,
            timing,
            event,
            body,
        });
    }
    debug!("Found {} triggers", triggers.len());
    Ok(triggers)
}

/// Stored functions and procedures of the current database.
pub async fn list_routines(conn: &mut Conn) -> Result<Vec<RoutineDescriptor>> {
    let query = "
        SELECT ROUTINE_NAME, ROUTINE_TYPE
        FROM information_schema.ROUTINES
        WHERE ROUTINE_SCHEMA = DATABASE()
        ORDER BY ROUTINE_TYPE, ROUTINE_NAME
    ";
    let rows: Vec<(String, String)> = conn.query(query).await?;
    Ok(rows
        .into_iter()
        .map(|(name, routine_type)| RoutineDescriptor {
            name,
            kind: RoutineKind::from_catalog(&routine_type),
        })
        .collect())
}

/// A column as listed in `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Lower-case `DATA_TYPE`, e.g. `int`, `bit`, `geometry`.
    pub data_type: String,
}

/// Columns of `table` in ordinal order.
pub async fn list_columns(conn: &mut Conn, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let query = "
        SELECT COLUMN_NAME, DATA_TYPE
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    ";
    let rows: Vec<(String, String)> = conn.exec(query, (table,)).await?;
    Ok(rows
        .into_iter()
        .map(|(name, data_type)| ColumnDescriptor {
            name,
            data_type: data_type.to_ascii_lowercase(),
        })
        .collect())
}

pub async fn show_create_table(conn: &mut Conn, name: &str) -> Result<String> {
    let sql = format!("SHOW CREATE TABLE {}", quote_ident(name));
    show_create(conn, ObjectKind::Table, name, &sql, 1).await
}

/// `SHOW CREATE FUNCTION|PROCEDURE`. The statement column is NULL when the
/// account lacks privileges on the routine.
pub async fn show_create_routine(conn: &mut Conn, routine: &RoutineDescriptor) -> Result<String> {
    let kind = routine.kind.object_kind();
    let sql = format!("SHOW CREATE {} {}", kind.keyword(), quote_ident(&routine.name));
    show_create(conn, kind, &routine.name, &sql, 2).await
}

async fn show_create(
    conn: &mut Conn,
    kind: ObjectKind,
    name: &str,
    sql: &str,
    column: usize,
) -> Result<String> {
    let row: Option<Row> = conn
        .query_first(sql)
        .await
        .map_err(|e| CloneError::statement(kind, name, e))?;
    row.and_then(|mut row| row.take::<Value, _>(column))
        .as_ref()
        .and_then(value_to_string)
        .ok_or_else(|| CloneError::MissingDefinition {
            kind,
            name: name.to_string(),
        })
}

/// The encoding the source session returns results in.
pub async fn active_charset<S: Session + ?Sized>(conn: &mut S) -> Result<Option<String>> {
    let charset = conn
        .scalar(
            "SELECT COALESCE(@@character_set_results, @@character_set_connection)",
            Vec::new(),
        )
        .await?;
    Ok(charset.as_ref().and_then(value_to_string))
}
