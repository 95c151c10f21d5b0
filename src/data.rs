//! Row data transfer between the two servers.
//!
//! [`CopyStrategy::Auto`] tries the bulk-load path first and falls back to
//! batched inserts whenever the destination side of the load fails or the
//! accepted row count does not match. [`CopyStrategy::Batched`] goes
//! straight to batched inserts.

pub mod batched;
pub mod bulk;

use clap::ValueEnum;
use mysql_async::Conn;
use mysql_ddl::quote_ident;
use serde::Deserialize;
use tracing::info;

use crate::charset::{self, CharsetPreference};
use crate::error::{CloneError, Result};
use crate::metadata;
use crate::object::ObjectKind;
use crate::progress::CloneContext;
use crate::session::Session;

pub use batched::{InsertBatcher, DEFAULT_BATCH_SIZE};

/// Charset requested when the source session reports none.
const FALLBACK_CHARSET: &str = "utf8mb4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStrategy {
    /// Bulk load, falling back to batched inserts.
    #[default]
    #[value(alias = "fast")]
    #[serde(alias = "fast")]
    Auto,
    /// Batched multi-row inserts only.
    Batched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPath {
    BulkLoad,
    Batched,
}

/// Outcome of copying one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub table: String,
    pub rows: u64,
    pub path: TransferPath,
    /// Statements that wrote rows.
    pub statements: usize,
}

/// Copies table data for one clone operation.
///
/// Charset negotiation happens once, the first time the bulk path gets past
/// its column check.
#[derive(Debug)]
pub struct DataMover {
    strategy: CopyStrategy,
    batch_size: usize,
    charset: Option<CharsetPreference>,
}

impl DataMover {
    pub fn new(strategy: CopyStrategy, batch_size: usize) -> Self {
        Self {
            strategy,
            batch_size,
            charset: None,
        }
    }

    pub fn charset(&self) -> Option<&CharsetPreference> {
        self.charset.as_ref()
    }

    /// Copy every row of `table` from `source` to `dest`.
    pub async fn copy(
        &mut self,
        source: &mut Conn,
        dest: &mut Conn,
        table: &str,
        ctx: &CloneContext,
    ) -> Result<CopyReport> {
        if self.strategy == CopyStrategy::Auto {
            match self.try_bulk(source, dest, table, ctx).await {
                Ok(rows) => {
                    info!("Loaded {} rows into `{}`", rows, table);
                    return Ok(CopyReport {
                        table: table.to_string(),
                        rows,
                        path: TransferPath::BulkLoad,
                        statements: 1,
                    });
                }
                Err(bulk::BulkError::Source(e)) => return Err(e),
                Err(bulk::BulkError::Skipped(reason)) => {
                    ctx.notify(format!(
                        "Using batched inserts for `{table}`: {reason}"
                    ));
                }
                Err(bulk::BulkError::Destination(reason)) => {
                    ctx.notify(format!(
                        "Bulk load of `{table}` failed ({reason}); falling back to batched inserts"
                    ));
                    clear_table(dest, table).await?;
                }
            }
        }

        let (rows, statements) = batched::copy_batched(source, dest, table, self.batch_size).await?;
        info!(
            "Inserted {} rows into `{}` with {} statement(s)",
            rows, table, statements
        );
        Ok(CopyReport {
            table: table.to_string(),
            rows,
            path: TransferPath::Batched,
            statements,
        })
    }

    async fn try_bulk(
        &mut self,
        source: &mut Conn,
        dest: &mut Conn,
        table: &str,
        ctx: &CloneContext,
    ) -> std::result::Result<u64, bulk::BulkError> {
        let columns = metadata::list_columns(source, table)
            .await
            .map_err(bulk::BulkError::Source)?;
        if let Some(column) = bulk::text_unsafe_column(&columns) {
            return Err(bulk::BulkError::Skipped(format!(
                "column `{}` has type {}",
                column.name, column.data_type
            )));
        }

        let charset = match &self.charset {
            Some(charset) => charset.clone(),
            None => {
                let requested = requested_charset(source).await?;
                let charset = apply_charset(dest, &requested, ctx)
                    .await
                    .map_err(|e| bulk::BulkError::Destination(e.to_string()))?;
                self.charset = Some(charset.clone());
                charset
            }
        };
        bulk::copy_bulk(source, dest, table, &charset).await
    }
}

/// The source session's charset, which the load should reproduce.
async fn requested_charset<S: Session + ?Sized>(
    source: &mut S,
) -> std::result::Result<String, bulk::BulkError> {
    let active = metadata::active_charset(source)
        .await
        .map_err(bulk::BulkError::Source)?;
    Ok(active.unwrap_or_else(|| FALLBACK_CHARSET.to_string()))
}

/// Negotiate `requested` with the destination and switch its session over.
/// Without a compatible charset the load runs without one, with a notice.
async fn apply_charset<S: Session + ?Sized>(
    dest: &mut S,
    requested: &str,
    ctx: &CloneContext,
) -> Result<CharsetPreference> {
    let preference = charset::negotiate(dest, requested).await?;
    match preference.set_names_statement() {
        Some(set_names) => dest.execute(&set_names).await?,
        None => ctx.notify(format!(
            "No character set compatible with '{requested}' on destination; loading without an explicit character set"
        )),
    }
    Ok(preference)
}

/// Remove rows a failed bulk load may have left behind.
async fn clear_table<S: Session + ?Sized>(dest: &mut S, table: &str) -> Result<()> {
    dest.execute(&format!("DELETE FROM {}", quote_ident(table)))
        .await
        .map_err(|e| CloneError::statement(ObjectKind::Table, table, e))
}
