//! `LOAD DATA LOCAL INFILE` fed from a source result set.
//!
//! The source rows are encoded as tab-separated text and pushed through a
//! bounded channel whose receiving end becomes the destination connection's
//! local-infile stream. Reading the source and running the load are polled
//! together on the current task.

use std::io;
use std::sync::{Arc, Mutex};

use bytes::{BufMut, Bytes, BytesMut};
use mysql_async::{prelude::*, Conn, InfileData, TextProtocol, Value};
use mysql_ddl::quote_ident;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::charset::CharsetPreference;
use crate::error::CloneError;
use crate::metadata::ColumnDescriptor;

/// Encoded bytes buffered before a chunk is handed to the destination.
const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks in flight between the source reader and the load.
const CHANNEL_DEPTH: usize = 8;

/// Column types whose text form does not load back losslessly.
const TEXT_UNSAFE_TYPES: &[&str] = &[
    "bit",
    "geometry",
    "point",
    "linestring",
    "polygon",
    "multipoint",
    "multilinestring",
    "multipolygon",
    "geometrycollection",
    "geomcollection",
];

/// Why the bulk path did not finish a table.
#[derive(Debug)]
pub enum BulkError {
    /// Not attempted; nothing was written.
    Skipped(String),
    /// The destination rejected or altered the load; rows may have been written.
    Destination(String),
    /// Reading the source failed.
    Source(CloneError),
}

/// The first column whose type cannot take the text round trip.
pub fn text_unsafe_column(columns: &[ColumnDescriptor]) -> Option<&ColumnDescriptor> {
    columns
        .iter()
        .find(|c| TEXT_UNSAFE_TYPES.contains(&c.data_type.as_str()))
}

/// The `LOAD DATA` statement for `table`.
pub fn load_statement(table: &str, columns: &[String], charset: &CharsetPreference) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r"LOAD DATA LOCAL INFILE 'mysql-clone-stream' INTO TABLE {}{} FIELDS TERMINATED BY '\t' ESCAPED BY '\\' LINES TERMINATED BY '\n' ({})",
        quote_ident(table),
        charset.load_clause().unwrap_or_default(),
        column_list
    )
}

fn escape_into(out: &mut BytesMut, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'\\' => out.put_slice(b"\\\\"),
            b'\t' => out.put_slice(b"\\t"),
            b'\n' => out.put_slice(b"\\n"),
            b'\r' => out.put_slice(b"\\r"),
            0 => out.put_slice(b"\\0"),
            other => out.put_u8(other),
        }
    }
}

/// Append one row as a tab-separated, backslash-escaped line. NULL is `\N`.
pub fn encode_row(out: &mut BytesMut, values: &[Value]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.put_u8(b'\t');
        }
        match value {
            Value::NULL => out.put_slice(b"\\N"),
            Value::Bytes(bytes) => escape_into(out, bytes),
            Value::Int(v) => out.put_slice(v.to_string().as_bytes()),
            Value::UInt(v) => out.put_slice(v.to_string().as_bytes()),
            Value::Float(v) => out.put_slice(v.to_string().as_bytes()),
            Value::Double(v) => out.put_slice(v.to_string().as_bytes()),
            // text-protocol rows only carry the variants above
            other => escape_into(out, other.as_sql(true).trim_matches('\'').as_bytes()),
        }
    }
    out.put_u8(b'\n');
}

/// Read every row from `result` into `tx`. Stops early, without error, once
/// the destination stops reading.
async fn stream_rows(
    result: &mut mysql_async::QueryResult<'_, '_, TextProtocol>,
    tx: mpsc::Sender<io::Result<Bytes>>,
) -> Result<u64, mysql_async::Error> {
    let mut rows = 0u64;
    let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);

    while let Some(row) = result.next().await? {
        encode_row(&mut chunk, &row.unwrap());
        rows += 1;
        if chunk.len() >= CHUNK_SIZE && tx.send(Ok(chunk.split().freeze())).await.is_err() {
            return Ok(rows);
        }
    }
    if !chunk.is_empty() {
        let _ = tx.send(Ok(chunk.freeze())).await;
    }
    Ok(rows)
}

/// Load every row of `table` from `source` into `dest`.
///
/// Succeeds only when the destination accepted exactly the rows streamed
/// without warnings. Returns the row count.
pub async fn copy_bulk(
    source: &mut Conn,
    dest: &mut Conn,
    table: &str,
    charset: &CharsetPreference,
) -> Result<u64, BulkError> {
    let select = format!("SELECT * FROM {}", quote_ident(table));
    let mut result = source
        .query_iter(select)
        .await
        .map_err(|e| BulkError::Source(e.into()))?;
    let columns: Vec<String> = result
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let load = load_statement(table, &columns, charset);

    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);
    let slot = Arc::new(Mutex::new(Some(rx)));
    let handler_slot = slot.clone();
    dest.set_infile_handler(async move {
        let rx = handler_slot.lock().ok().and_then(|mut rx| rx.take());
        let data: InfileData = match rx {
            Some(rx) => Box::pin(ReceiverStream::new(rx)),
            None => Box::pin(futures::stream::empty()),
        };
        Ok(data)
    });

    let producer = stream_rows(&mut result, tx);
    let consumer = async {
        let outcome = dest.query_drop(load.as_str()).await;
        // unblock the producer if the server never asked for the file
        if let Ok(mut rx) = slot.lock() {
            drop(rx.take());
        }
        outcome.map(|()| (dest.affected_rows(), dest.get_warnings()))
    };
    let (streamed, loaded) = tokio::join!(producer, consumer);

    let rows = streamed.map_err(|e| BulkError::Source(e.into()))?;
    let (accepted, warnings) = loaded.map_err(|e| BulkError::Destination(e.to_string()))?;
    debug!(
        "LOAD DATA into `{}`: {} rows streamed, {} accepted, {} warnings",
        table, rows, accepted, warnings
    );

    if accepted != rows {
        return Err(BulkError::Destination(format!(
            "destination accepted {accepted} of {rows} rows"
        )));
    }
    if warnings > 0 {
        return Err(BulkError::Destination(format!(
            "load reported {warnings} warning(s)"
        )));
    }
    Ok(rows)
}
