//! Foreach materialization when a table fails mid-batch, checked against a
//! recording driver.

mod common;

use std::sync::Arc;

use common::RecordingDriver;
use crossdb::error::DbError;
use crossdb::models::DatabaseType;
use crossdb::{ConnectionHandle, PaginationRequest};

async fn open_handle(driver: &RecordingDriver) -> ConnectionHandle {
    let mut handle = ConnectionHandle::with_driver(Arc::new(driver.clone()), "sqlite:fake.db");
    handle.open().await.unwrap();
    handle
}

#[tokio::test]
async fn test_failed_batch_leaves_results_untouched() {
    let driver = RecordingDriver::new(DatabaseType::SQLite).with_tables(&["A", "B"]);
    driver.catalog.fail_table(Some("B"));
    let mut handle = open_handle(&driver).await;

    let mut it = handle.foreach(["A", "B"]).unwrap();
    it.begin()
        .unwrap()
        .data_page(PaginationRequest::limit_offset("Id", 10))
        .unwrap()
        .columns()
        .unwrap()
        .end()
        .unwrap();

    let err = it.materialize().await.unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));
    assert!(it.results().is_empty());

    // The batch is still pending, so the next call fails the same way
    let err = it.materialize().await.unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));
    assert!(it.results().is_empty());
}

#[tokio::test]
async fn test_failed_batch_reruns_once_table_recovers() {
    let driver = RecordingDriver::new(DatabaseType::SQLite).with_tables(&["A", "B"]);
    driver.catalog.fail_table(Some("B"));
    let mut handle = open_handle(&driver).await;

    let mut it = handle.foreach(["A", "B"]).unwrap();
    it.begin().unwrap().columns().unwrap().end().unwrap();
    assert!(it.materialize().await.is_err());

    driver.catalog.fail_table(None);
    let results = it.materialize().await.unwrap().unwrap();
    assert_eq!(results["A"].columns, Some(Vec::new()));
    assert_eq!(results["B"].columns, Some(Vec::new()));
}

#[tokio::test]
async fn test_failed_cycle_keeps_earlier_cycle() {
    let driver = RecordingDriver::new(DatabaseType::SQLite).with_tables(&["A", "B"]);
    let mut handle = open_handle(&driver).await;

    let mut it = handle.foreach(["A", "B"]).unwrap();
    it.begin().unwrap().triggers().unwrap().end().unwrap();
    it.materialize().await.unwrap().unwrap();

    driver.catalog.fail_table(Some("B"));
    it.begin().unwrap().columns().unwrap().end().unwrap();
    assert!(it.materialize().await.is_err());

    // Cycle one survives and no table got a partial cycle two
    for table in ["A", "B"] {
        let entry = &it.results()[table];
        assert_eq!(entry.triggers, Some(Vec::new()));
        assert!(entry.columns.is_none(), "{table}");
    }
}
