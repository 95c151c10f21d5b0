//! Row transfer through the bulk-load and batched paths.

use std::sync::{Arc, Mutex};

use mysql_async::{prelude::*, Conn};
use mysql_clone::data::{CopyStrategy, DataMover, TransferPath};
use mysql_clone::progress::{CloneContext, Progress};
use mysql_clone::schema::clone_table;
use mysql_clone::testing::{connect_destination, connect_source, reset_database};

use crate::count;

async fn seed_rows(conn: &mut Conn, rows: u32) -> anyhow::Result<()> {
    conn.query_drop(
        "CREATE TABLE big (id INT PRIMARY KEY, payload VARCHAR(64), data BLOB, amount DECIMAL(10,2))",
    )
    .await?;
    conn.exec_batch(
        "INSERT INTO big (id, payload, data, amount) VALUES (?, ?, ?, ?)",
        (1..=rows).map(|i| {
            let payload = if i % 7 == 0 {
                None
            } else {
                Some(format!("row {i}\twith\\escapes\n"))
            };
            (i, payload, vec![0u8, 9, 10, 13, 92, (i % 256) as u8], format!("{i}.25"))
        }),
    )
    .await?;
    Ok(())
}

/// Set the server's `local_infile`, returning the previous setting.
async fn set_local_infile(conn: &mut Conn, enabled: bool) -> anyhow::Result<bool> {
    let previous: Option<i64> = conn.query_first("SELECT @@GLOBAL.local_infile").await?;
    conn.query_drop(format!("SET GLOBAL local_infile = {}", u8::from(enabled)))
        .await?;
    Ok(previous.unwrap_or_default() != 0)
}

fn recording_context() -> (CloneContext, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let ctx = CloneContext::new(
        Progress::new(Some(Arc::new(move |message: &str| {
            sink.lock().unwrap().push(message.to_string());
        }))),
        Default::default(),
    );
    (ctx, seen)
}

fn fallback_notice(seen: &Mutex<Vec<String>>, table: &str) -> Option<String> {
    let prefix = format!("Bulk load of `{table}` failed (");
    seen.lock()
        .unwrap()
        .iter()
        .find(|m| m.starts_with(&prefix) && m.ends_with("falling back to batched inserts"))
        .cloned()
}

async fn assert_same_rows(source: &mut Conn, dest: &mut Conn) -> anyhow::Result<()> {
    let query = "SELECT id, payload, data, CAST(amount AS CHAR) FROM big ORDER BY id";
    let expected: Vec<(u32, Option<String>, Vec<u8>, String)> = source.query(query).await?;
    let actual: Vec<(u32, Option<String>, Vec<u8>, String)> = dest.query(query).await?;
    assert_eq!(actual, expected);
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_batched_copy_preserves_rows() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    seed_rows(&mut source, 501).await?;

    clone_table(&mut source, &mut dest, "big").await?;
    let mut mover = DataMover::new(CopyStrategy::Batched, 500);
    let report = mover
        .copy(&mut source, &mut dest, "big", &CloneContext::default())
        .await?;

    assert_eq!(report.path, TransferPath::Batched);
    assert_eq!(report.rows, 501);
    assert_eq!(report.statements, 2);
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM big").await?, 501);
    assert_same_rows(&mut source, &mut dest).await?;

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_auto_copy_preserves_rows() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    seed_rows(&mut source, 1200).await?;

    clone_table(&mut source, &mut dest, "big").await?;
    let mut mover = DataMover::new(CopyStrategy::Auto, 500);
    let report = mover
        .copy(&mut source, &mut dest, "big", &CloneContext::default())
        .await?;

    // either path is acceptable (local_infile may be disabled); the rows are not
    assert_eq!(report.rows, 1200);
    assert!(mover.charset().is_some() || report.path == TransferPath::Batched);
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM big").await?, 1200);
    assert_same_rows(&mut source, &mut dest).await?;

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_bit_column_goes_to_batched_path() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source
        .query_drop("CREATE TABLE flags (id INT PRIMARY KEY, bits BIT(8))")
        .await?;
    source
        .query_drop("INSERT INTO flags VALUES (1, b'00000101'), (2, NULL)")
        .await?;

    clone_table(&mut source, &mut dest, "flags").await?;
    let mut mover = DataMover::new(CopyStrategy::Auto, 500);
    let report = mover
        .copy(&mut source, &mut dest, "flags", &CloneContext::default())
        .await?;

    assert_eq!(report.path, TransferPath::Batched);
    assert_eq!(report.rows, 2);
    let bits: Option<Option<u8>> = dest
        .query_first("SELECT bits + 0 FROM flags WHERE id = 1")
        .await?;
    assert_eq!(bits.flatten(), Some(5));

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_empty_table_is_noop() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source.query_drop("CREATE TABLE empty_t (id INT)").await?;

    clone_table(&mut source, &mut dest, "empty_t").await?;
    let mut mover = DataMover::new(CopyStrategy::Batched, 500);
    let report = mover
        .copy(&mut source, &mut dest, "empty_t", &CloneContext::default())
        .await?;

    assert_eq!(report.rows, 0);
    assert_eq!(report.statements, 0);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL) and SUPER for SET GLOBAL"]
async fn test_rejected_bulk_load_falls_back_to_batched() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    seed_rows(&mut source, 50).await?;
    clone_table(&mut source, &mut dest, "big").await?;

    let previous = set_local_infile(&mut dest, false).await?;
    let (ctx, seen) = recording_context();
    let mut mover = DataMover::new(CopyStrategy::Auto, 500);
    let report = mover.copy(&mut source, &mut dest, "big", &ctx).await;
    set_local_infile(&mut dest, previous).await?;
    let report = report?;

    assert_eq!(report.path, TransferPath::Batched);
    assert_eq!(report.rows, 50);
    assert!(fallback_notice(&seen, "big").is_some(), "{:?}", seen.lock().unwrap());
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM big").await?, 50);
    assert_same_rows(&mut source, &mut dest).await?;

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL) and SUPER for SET GLOBAL"]
async fn test_load_with_warnings_is_not_accepted() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source
        .query_drop("CREATE TABLE notes (id INT PRIMARY KEY, note VARCHAR(16))")
        .await?;
    source
        .query_drop("INSERT INTO notes VALUES (1, 'abcdefgh'), (2, 'ijklmnop')")
        .await?;
    // narrower than the source: LOAD DATA LOCAL truncates with warnings,
    // strict-mode inserts refuse the rows
    dest.query_drop("CREATE TABLE notes (id INT PRIMARY KEY, note VARCHAR(3))")
        .await?;
    dest.query_drop("SET SESSION sql_mode = 'STRICT_ALL_TABLES'")
        .await?;

    let previous = set_local_infile(&mut dest, true).await?;
    let (ctx, seen) = recording_context();
    let mut mover = DataMover::new(CopyStrategy::Auto, 500);
    let result = mover.copy(&mut source, &mut dest, "notes", &ctx).await;
    set_local_infile(&mut dest, previous).await?;

    assert!(result.is_err());
    let notice = fallback_notice(&seen, "notes").expect("fallback notice");
    assert!(notice.contains("warning(s)"), "{notice}");
    // truncated rows from the load were cleared before the batched attempt
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM notes").await?, 0);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL) and SUPER for SET GLOBAL"]
async fn test_load_with_skipped_rows_is_not_accepted() -> anyhow::Result<()> {
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source
        .query_drop("CREATE TABLE tags (id INT PRIMARY KEY, tag VARCHAR(16))")
        .await?;
    source
        .query_drop("INSERT INTO tags VALUES (1, 'red'), (2, 'red'), (3, 'blue')")
        .await?;
    // the destination's unique key makes the load skip a duplicate row
    dest.query_drop("CREATE TABLE tags (id INT PRIMARY KEY, tag VARCHAR(16) UNIQUE)")
        .await?;

    let previous = set_local_infile(&mut dest, true).await?;
    let (ctx, seen) = recording_context();
    let mut mover = DataMover::new(CopyStrategy::Auto, 500);
    let result = mover.copy(&mut source, &mut dest, "tags", &ctx).await;
    set_local_infile(&mut dest, previous).await?;

    assert!(result.is_err());
    let notice = fallback_notice(&seen, "tags").expect("fallback notice");
    assert!(notice.contains("accepted 2 of 3 rows"), "{notice}");
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM tags").await?, 0);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}
