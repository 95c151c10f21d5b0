//! Library-level clone tests.

use mysql_async::prelude::*;
use mysql_clone::testing::mysql::foreign_key_checks;
use mysql_clone::testing::{connect_destination, connect_source, reset_database};
use mysql_clone::{clone_database, CloneError, CloneRequest, TableCloneOption};

use crate::count;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("mysql_clone=debug")
        .try_init()
        .ok();
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_clone_table_view_and_trigger() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;

    source
        .query_drop("CREATE TABLE t (id INT PRIMARY KEY, note VARCHAR(32))")
        .await?;
    source
        .query_drop("INSERT INTO t (id, note) VALUES (1, 'one'), (2, NULL), (3, 'tab\there')")
        .await?;
    source
        .query_drop("CREATE VIEW v_t AS SELECT id FROM t WHERE id > 1")
        .await?;
    source
        .query_drop(
            "CREATE TRIGGER t_bi BEFORE INSERT ON t FOR EACH ROW SET NEW.note = CONCAT('trg-', NEW.id)",
        )
        .await?;

    let before = foreign_key_checks(&mut dest).await?;
    let request = CloneRequest {
        tables: vec![TableCloneOption::new("t", true)],
        copy_views: true,
        copy_triggers: true,
        copy_routines: true,
        ..Default::default()
    };
    let summary = clone_database(&mut source, &mut dest, &request).await?;

    assert_eq!(summary.tables_cloned, 1);
    assert_eq!(summary.rows_copied, 3);
    assert_eq!(summary.views_created, 1);
    assert_eq!(summary.triggers_created, 1);
    assert_eq!(foreign_key_checks(&mut dest).await?, before);

    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM t").await?, 3);
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM v_t").await?, 2);
    let notes: Vec<Option<String>> = dest.query("SELECT note FROM t ORDER BY id").await?;
    assert_eq!(
        notes,
        vec![
            Some("one".to_string()),
            None,
            Some("tab\there".to_string())
        ]
    );

    dest.query_drop("INSERT INTO t (id) VALUES (10)").await?;
    let note: Option<String> = dest.query_first("SELECT note FROM t WHERE id = 10").await?;
    assert_eq!(note.as_deref(), Some("trg-10"));

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_views_created_in_dependency_order() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;

    source.query_drop("CREATE TABLE base (id INT)").await?;
    source.query_drop("INSERT INTO base VALUES (1), (2), (3)").await?;
    // listed alphabetically, a_top comes before the views it depends on
    source.query_drop("CREATE VIEW z_first AS SELECT id FROM base").await?;
    source.query_drop("CREATE VIEW m_second AS SELECT id FROM z_first WHERE id > 1").await?;
    source.query_drop("CREATE VIEW a_top AS SELECT id FROM m_second WHERE id > 2").await?;

    let request = CloneRequest {
        tables: vec![TableCloneOption::new("base", true)],
        copy_views: true,
        ..Default::default()
    };
    let summary = clone_database(&mut source, &mut dest, &request).await?;

    assert_eq!(summary.views_created, 3);
    assert_eq!(count(&mut dest, "SELECT COUNT(*) FROM a_top").await?, 1);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_foreign_key_checks_restored_after_failure() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;

    source.query_drop("CREATE TABLE kept (id INT)").await?;
    source.query_drop("CREATE TABLE not_cloned (id INT)").await?;
    source
        .query_drop("CREATE VIEW v_orphan AS SELECT id FROM not_cloned")
        .await?;

    let before = foreign_key_checks(&mut dest).await?;
    let request = CloneRequest {
        tables: vec![TableCloneOption::new("kept", true)],
        copy_views: true,
        ..Default::default()
    };
    let err = clone_database(&mut source, &mut dest, &request)
        .await
        .unwrap_err();

    match err {
        CloneError::UnresolvedDependencies { pending, .. } => {
            assert_eq!(pending, vec!["v_orphan"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(foreign_key_checks(&mut dest).await?, before);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_cancelled_clone_restores_flag_and_changes_nothing() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source.query_drop("CREATE TABLE t (id INT)").await?;

    let before = foreign_key_checks(&mut dest).await?;
    let request = CloneRequest {
        tables: vec![TableCloneOption::new("t", true)],
        ..Default::default()
    };
    request.cancel.cancel();

    let err = clone_database(&mut source, &mut dest, &request)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(foreign_key_checks(&mut dest).await?, before);
    assert!(mysql_clone::list_base_tables(&mut dest).await?.is_empty());

    reset_database(&mut source).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_duplicate_and_unknown_tables_rejected() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source.query_drop("CREATE TABLE t (id INT)").await?;

    let duplicate = CloneRequest {
        tables: vec![TableCloneOption::new("t", true), TableCloneOption::new("t", false)],
        ..Default::default()
    };
    let err = clone_database(&mut source, &mut dest, &duplicate)
        .await
        .unwrap_err();
    assert!(matches!(err, CloneError::DuplicateTable(ref name) if name == "t"));
    assert!(mysql_clone::list_base_tables(&mut dest).await?.is_empty());

    let unknown = CloneRequest {
        tables: vec![TableCloneOption::new("missing", true)],
        ..Default::default()
    };
    let err = clone_database(&mut source, &mut dest, &unknown)
        .await
        .unwrap_err();
    assert!(matches!(err, CloneError::UnknownTable(ref name) if name == "missing"));

    reset_database(&mut source).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_view_in_table_list_is_skipped() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    source.query_drop("CREATE TABLE t (id INT)").await?;
    source.query_drop("CREATE VIEW v AS SELECT id FROM t").await?;

    let request = CloneRequest {
        tables: vec![TableCloneOption::new("v", true), TableCloneOption::new("t", true)],
        ..Default::default()
    };
    let summary = clone_database(&mut source, &mut dest, &request).await?;

    assert_eq!(summary.skipped, vec!["v"]);
    assert_eq!(summary.tables_cloned, 1);

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires MySQL (MYSQL_TEST_URL, MYSQL_TEST_DEST_URL)"]
async fn test_routines_cloned() -> anyhow::Result<()> {
    init_tracing();
    let mut source = connect_source().await?;
    let mut dest = connect_destination().await?;
    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;

    source
        .query_drop("CREATE FUNCTION twice(x INT) RETURNS INT DETERMINISTIC RETURN x * 2")
        .await?;
    source
        .query_drop("CREATE PROCEDURE answer(OUT result INT) BEGIN SET result = 42; END")
        .await?;

    let request = CloneRequest {
        copy_routines: true,
        ..Default::default()
    };
    let summary = clone_database(&mut source, &mut dest, &request).await?;
    assert_eq!(summary.routines_created, 2);

    let doubled: Option<i64> = dest.query_first("SELECT twice(21)").await?;
    assert_eq!(doubled, Some(42));
    dest.query_drop("CALL answer(@r)").await?;
    let answer: Option<i64> = dest.query_first("SELECT @r").await?;
    assert_eq!(answer, Some(42));

    reset_database(&mut source).await?;
    reset_database(&mut dest).await?;
    Ok(())
}
