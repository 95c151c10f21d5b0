//! Batched multi-row `INSERT` transfer.

use mysql_async::{prelude::*, Conn, Value};
use mysql_ddl::quote_ident;
use tracing::debug;

use crate::error::{CloneError, Result};
use crate::object::ObjectKind;
use crate::session::Session;

/// Rows per `INSERT` statement.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Placeholder limit of one prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// Rows in one statement for a table with `columns` columns.
pub fn rows_per_batch(batch_size: usize, columns: usize) -> usize {
    let cap = (MAX_PLACEHOLDERS / columns.max(1)).max(1);
    batch_size.max(1).min(cap)
}

/// Buffers rows as positional parameters and flushes them as multi-row inserts.
#[derive(Debug)]
pub struct InsertBatcher {
    table: String,
    /// `INSERT INTO `t` (`a`, `b`) VALUES `
    prefix: String,
    /// `(?, ?)`
    row_template: String,
    /// Statement text for a full batch.
    full_statement: String,
    columns: usize,
    rows_per_batch: usize,
    buffered: usize,
    params: Vec<Value>,
    rows: u64,
    statements: usize,
}

impl InsertBatcher {
    pub fn new(table: &str, columns: &[String], batch_size: usize) -> Self {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let row_template = format!("({})", placeholders.join(", "));
        let prefix = format!("INSERT INTO {} ({}) VALUES ", quote_ident(table), column_list);
        let rows_per_batch = rows_per_batch(batch_size, columns.len());

        let mut batcher = Self {
            table: table.to_string(),
            prefix,
            row_template,
            full_statement: String::new(),
            columns: columns.len(),
            rows_per_batch,
            buffered: 0,
            params: Vec::with_capacity(rows_per_batch * columns.len()),
            rows: 0,
            statements: 0,
        };
        batcher.full_statement = batcher.statement_for(rows_per_batch);
        batcher
    }

    fn statement_for(&self, rows: usize) -> String {
        let rows_template: Vec<&str> = (0..rows).map(|_| self.row_template.as_str()).collect();
        format!("{}{}", self.prefix, rows_template.join(", "))
    }

    pub fn rows_per_batch(&self) -> usize {
        self.rows_per_batch
    }

    /// Buffer one row, flushing when the batch is full.
    pub async fn push<S: Session + ?Sized>(&mut self, dest: &mut S, row: Vec<Value>) -> Result<()> {
        debug_assert_eq!(row.len(), self.columns);
        self.params.extend(row);
        self.buffered += 1;
        if self.buffered >= self.rows_per_batch {
            self.flush(dest).await?;
        }
        Ok(())
    }

    /// Execute whatever is buffered. No-op when nothing is.
    pub async fn flush<S: Session + ?Sized>(&mut self, dest: &mut S) -> Result<()> {
        if self.buffered == 0 {
            return Ok(());
        }

        let sql = if self.buffered == self.rows_per_batch {
            self.full_statement.clone()
        } else {
            self.statement_for(self.buffered)
        };
        let params = std::mem::replace(
            &mut self.params,
            Vec::with_capacity(self.rows_per_batch * self.columns),
        );

        dest.execute_with(&sql, params)
            .await
            .map_err(|e| CloneError::statement(ObjectKind::Table, self.table.as_str(), e))?;

        self.rows += self.buffered as u64;
        self.statements += 1;
        self.buffered = 0;
        Ok(())
    }

    /// Flush the remainder and return `(rows, statements)`.
    pub async fn finish<S: Session + ?Sized>(mut self, dest: &mut S) -> Result<(u64, usize)> {
        self.flush(dest).await?;
        Ok((self.rows, self.statements))
    }
}

/// Copy every row of `table` with the binary protocol into batched inserts.
pub async fn copy_batched<S: Session + ?Sized>(
    source: &mut Conn,
    dest: &mut S,
    table: &str,
    batch_size: usize,
) -> Result<(u64, usize)> {
    let select = format!("SELECT * FROM {}", quote_ident(table));
    let mut result = source.exec_iter(select.as_str(), ()).await?;

    let columns: Vec<String> = result
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let mut batcher = InsertBatcher::new(table, &columns, batch_size);
    debug!(
        "Batched copy of `{}`: {} columns, {} rows per statement",
        table,
        columns.len(),
        batcher.rows_per_batch()
    );

    loop {
        match result.next().await {
            Ok(Some(row)) => batcher.push(dest, row.unwrap()).await?,
            Ok(None) => break,
            Err(e) => {
                // keep what was already read, then surface the read error
                batcher.flush(dest).await?;
                return Err(e.into());
            }
        }
    }

    batcher.finish(dest).await
}
