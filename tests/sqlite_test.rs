//! End-to-end tests against SQLite database files in temp directories.

mod common;

use common::SqliteFixture;
use crossdb::blocking;
use crossdb::db::ForeachPhase;
use crossdb::error::DbError;
use crossdb::models::{ConnectionState, DatabaseType, LogicalType, QueryParam, TableRef};
use crossdb::{ConnectionHandle, PaginationRequest};
use serde_json::json;

const SCHEMA: &[&str] = &[
    "CREATE TABLE TestModels (
        Id INTEGER PRIMARY KEY,
        Name VARCHAR(50) NOT NULL DEFAULT 'none',
        Price NUMERIC(10, 2)
    )",
    "CREATE TABLE Orders (
        OrderId INTEGER PRIMARY KEY,
        ModelId INTEGER REFERENCES TestModels(Id),
        Owner INTEGER REFERENCES TestModels
    )",
    "CREATE TRIGGER trg_orders_insert AFTER INSERT ON Orders
     BEGIN
        UPDATE TestModels SET Name = Name WHERE Id = NEW.ModelId;
     END",
];

async fn seeded(fixture: &SqliteFixture) -> ConnectionHandle {
    let mut handle = ConnectionHandle::new(DatabaseType::SQLite, fixture.url());
    handle.open().await.unwrap();
    for sql in SCHEMA {
        handle.execute(sql, &[]).await.unwrap();
    }
    for id in 1..=8i64 {
        handle
            .execute(
                "INSERT INTO TestModels (Id, Name) VALUES (?, ?)",
                &[QueryParam::Int(id), QueryParam::from(format!("model {}", id))],
            )
            .await
            .unwrap();
    }
    handle
}

fn ids(rows: &[crossdb::models::Row], key: &str) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get(key)?.as_i64()).collect()
}

#[tokio::test]
async fn test_tables_listed() {
    let fixture = SqliteFixture::new("catalog.db");
    let mut handle = seeded(&fixture).await;

    let tables = handle.tables().await.unwrap();
    assert_eq!(tables, vec![TableRef::new("Orders"), TableRef::new("TestModels")]);
    handle.close().await;
}

#[tokio::test]
async fn test_columns_for_every_spelling() {
    let fixture = SqliteFixture::new("columns.db");
    let mut handle = seeded(&fixture).await;

    let expected = handle.columns("TestModels").await.unwrap();
    assert_eq!(expected.len(), 3);

    for spelling in ["testmodels", "TESTMODELS", "\"TestModels\"", "main.TestModels"] {
        let columns = handle.columns(spelling).await.unwrap();
        assert_eq!(columns, expected, "spelling {}", spelling);
    }

    let id = &expected[0];
    assert_eq!(id.name, "Id");
    assert_eq!(id.logical_type, LogicalType::Int);
    assert!(id.is_primary_key);

    let name = &expected[1];
    assert_eq!(name.logical_type, LogicalType::String);
    assert_eq!(name.native_type, "varchar(50)");
    assert_eq!(name.char_max_length, Some(50));
    assert_eq!(name.default_value.as_deref(), Some("'none'"));
    assert!(!name.is_nullable);

    let price = &expected[2];
    assert_eq!(price.logical_type, LogicalType::Decimal);
    assert_eq!(price.numeric_precision, Some(10));
    assert_eq!(price.numeric_scale, Some(2));
    assert!(price.is_nullable);
    assert_eq!(price.default_value, None);
}

#[tokio::test]
async fn test_missing_table_gives_empty_results() {
    let fixture = SqliteFixture::new("missing.db");
    let mut handle = seeded(&fixture).await;

    assert!(handle.columns("Nope").await.unwrap().is_empty());
    assert!(handle.foreign_keys("Nope").await.unwrap().is_empty());
    assert!(handle.triggers("Nope").await.unwrap().is_empty());
    assert_eq!(handle.table_definition("Nope").await.unwrap(), None);

    let rows = handle
        .query_page("Nope", &PaginationRequest::limit_offset("Id", 5))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_blank_table_name_is_configuration_error() {
    let fixture = SqliteFixture::new("blank.db");
    let mut handle = seeded(&fixture).await;

    let err = handle.columns("  ").await.unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));
}

#[tokio::test]
async fn test_limit_offset_pages() {
    let fixture = SqliteFixture::new("pages.db");
    let mut handle = seeded(&fixture).await;

    let first = handle
        .query_page("TestModels", &PaginationRequest::limit_offset("Id", 7))
        .await
        .unwrap();
    assert_eq!(ids(&first, "Id"), vec![1, 2, 3, 4, 5, 6, 7]);

    let second = handle
        .query_page(
            "testmodels",
            &PaginationRequest::limit_offset("Id", 4).at_index(1),
        )
        .await
        .unwrap();
    assert_eq!(ids(&second, "Id"), vec![5, 6, 7, 8]);

    let past_end = handle
        .query_page(
            "TestModels",
            &PaginationRequest::limit_offset("Id", 4).at_offset(20),
        )
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_keyset_pages() {
    let fixture = SqliteFixture::new("keyset.db");
    let mut handle = seeded(&fixture).await;

    let first = handle
        .query_page("TestModels", &PaginationRequest::keyset("Id", 7))
        .await
        .unwrap();
    assert_eq!(ids(&first, "Id"), vec![1, 2, 3, 4, 5, 6, 7]);

    let second = handle
        .query_page("TestModels", &PaginationRequest::keyset("Id", 4).at_index(1))
        .await
        .unwrap();
    assert_eq!(ids(&second, "Id"), vec![5, 6, 7, 8]);

    let after = handle
        .query_page("TestModels", &PaginationRequest::keyset("Id", 3).after(6i64))
        .await
        .unwrap();
    assert_eq!(ids(&after, "Id"), vec![7, 8]);
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let fixture = SqliteFixture::new("zero.db");
    let mut handle = seeded(&fixture).await;

    let err = handle
        .query_page("TestModels", &PaginationRequest::limit_offset("Id", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));
}

#[tokio::test]
async fn test_foreign_keys() {
    let fixture = SqliteFixture::new("fks.db");
    let mut handle = seeded(&fixture).await;

    let mut keys = handle.foreign_keys("orders").await.unwrap();
    keys.sort_by_key(|k| k.from_column.clone());
    assert_eq!(keys.len(), 2);

    assert_eq!(keys[0].from_column, "ModelId");
    assert_eq!(keys[0].to_table, "TestModels");
    assert_eq!(keys[0].to_column, "Id");
    assert!(keys[0].constraint_name.starts_with("fk_Orders_"));

    // The column was left out of the REFERENCES clause
    assert_eq!(keys[1].from_column, "Owner");
    assert_eq!(keys[1].to_column, "Id");

    assert!(handle.foreign_keys("TestModels").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_triggers() {
    let fixture = SqliteFixture::new("triggers.db");
    let mut handle = seeded(&fixture).await;

    let triggers = handle.triggers("Orders").await.unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].name, "trg_orders_insert");
    assert_eq!(triggers[0].schema.as_deref(), Some("main"));
    assert!(triggers[0].sql_definition.contains("AFTER INSERT ON Orders"));

    assert!(handle.triggers("TestModels").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_table_definition() {
    let fixture = SqliteFixture::new("ddl.db");
    let mut handle = seeded(&fixture).await;

    let ddl = handle.table_definition("testmodels").await.unwrap().unwrap();
    assert!(ddl.starts_with("CREATE TABLE TestModels"));
    assert!(ddl.contains("Name VARCHAR(50) NOT NULL DEFAULT 'none'"));
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let fixture = SqliteFixture::new("tx.db");
    let mut handle = seeded(&fixture).await;

    handle.begin_transaction().await.unwrap();
    handle
        .execute("DELETE FROM TestModels WHERE Id > ?", &[QueryParam::Int(4)])
        .await
        .unwrap();
    handle.rollback().await.unwrap();

    let count = handle
        .query_scalar("SELECT COUNT(*) FROM TestModels", &[])
        .await
        .unwrap();
    assert_eq!(count, Some(json!(8)));

    handle.begin_transaction().await.unwrap();
    handle
        .execute("DELETE FROM TestModels WHERE Id > ?", &[QueryParam::Int(4)])
        .await
        .unwrap();
    handle.commit().await.unwrap();

    let count = handle
        .query_scalar("SELECT COUNT(*) FROM TestModels", &[])
        .await
        .unwrap();
    assert_eq!(count, Some(json!(4)));
}

#[tokio::test]
async fn test_commit_and_rollback_without_begin() {
    let fixture = SqliteFixture::new("nobegin.db");
    let mut handle = seeded(&fixture).await;

    assert!(matches!(
        handle.commit().await.unwrap_err(),
        DbError::TransactionState { .. }
    ));
    assert!(matches!(
        handle.rollback().await.unwrap_err(),
        DbError::TransactionState { .. }
    ));
    assert_eq!(handle.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_close_twice_and_reopen() {
    let fixture = SqliteFixture::new("reopen.db");
    let mut handle = seeded(&fixture).await;

    handle.close().await.close().await;
    assert_eq!(handle.state(), ConnectionState::Closed);

    // Data survives on disk and reads work through an ephemeral connection
    let first = handle
        .query_first("SELECT Name FROM TestModels WHERE Id = ?", &[QueryParam::Int(3)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get("Name"), Some(&json!("model 3")));
    assert_eq!(handle.state(), ConnectionState::Closed);

    handle.open().await.unwrap();
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_foreach_merges_across_cycles() {
    let fixture = SqliteFixture::new("foreach.db");
    let mut handle = seeded(&fixture).await;

    let mut it = handle.foreach(["TestModels", "Orders"]).unwrap();
    assert_eq!(it.phase(), ForeachPhase::NotStarted);

    it.begin().unwrap().columns().unwrap().foreign_keys().unwrap().end().unwrap();
    let results = it.materialize().await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results["TestModels"].columns.as_ref().unwrap().len(), 3);
    assert_eq!(results["Orders"].foreign_keys.as_ref().unwrap().len(), 2);
    assert!(results["Orders"].triggers.is_none());

    it.begin().unwrap().triggers().unwrap().sql_definition().unwrap().end().unwrap();
    let results = it.materialize().await.unwrap().unwrap();

    // Cycle two adds fields and keeps what cycle one collected
    let orders = &results["Orders"];
    assert_eq!(orders.columns.as_ref().unwrap().len(), 3);
    assert_eq!(orders.triggers.as_ref().unwrap().len(), 1);
    assert!(orders.sql_definition.as_ref().unwrap().is_some());
    assert_eq!(results["TestModels"].triggers.as_ref().unwrap().len(), 0);
}

#[tokio::test]
async fn test_foreach_data_page() {
    let fixture = SqliteFixture::new("foreach_data.db");
    let mut handle = seeded(&fixture).await;

    let mut it = handle.foreach(["TestModels"]).unwrap();
    it.begin()
        .unwrap()
        .data_page(PaginationRequest::keyset("Id", 4).at_index(1))
        .unwrap()
        .end()
        .unwrap();
    let results = it.materialize().await.unwrap().unwrap();
    let rows = results["TestModels"].data.as_ref().unwrap();
    assert_eq!(ids(rows, "Id"), vec![5, 6, 7, 8]);
}

#[tokio::test]
async fn test_foreach_empty_cycle_and_phase_errors() {
    let fixture = SqliteFixture::new("foreach_phase.db");
    let mut handle = seeded(&fixture).await;

    let mut it = handle.foreach(["TestModels"]).unwrap();
    assert!(matches!(it.columns().unwrap_err(), DbError::InvalidState { .. }));
    assert!(matches!(
        it.materialize().await.unwrap_err(),
        DbError::InvalidState { .. }
    ));

    it.begin().unwrap();
    assert!(matches!(it.begin().unwrap_err(), DbError::InvalidState { .. }));
    it.end().unwrap();
    assert!(it.materialize().await.unwrap().is_none());
}

#[tokio::test]
async fn test_foreach_requires_open_handle() {
    let fixture = SqliteFixture::new("foreach_closed.db");
    let mut handle = seeded(&fixture).await;
    handle.close().await;

    let err = handle.foreach(["TestModels"]).unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));
}

#[tokio::test]
async fn test_change_and_create_database() {
    let fixture = SqliteFixture::new("primary.db");
    let mut handle = seeded(&fixture).await;
    assert_eq!(handle.database_name().as_deref(), Some("primary"));

    handle.create_database("secondary").await.unwrap();
    assert!(fixture.dir.path().join("secondary.db").exists());

    handle.change_database("secondary").await.unwrap();
    assert!(handle.is_connected());
    assert_eq!(handle.database_name().as_deref(), Some("secondary"));
    assert!(handle.tables().await.unwrap().is_empty());

    let err = handle.change_database("not valid").await.unwrap_err();
    assert!(matches!(err, DbError::DatabaseName { .. }));
}

#[tokio::test]
async fn test_server_version() {
    let fixture = SqliteFixture::new("version.db");
    let mut handle = ConnectionHandle::new(DatabaseType::SQLite, fixture.url());

    let version = handle.server_version().await.unwrap().unwrap();
    assert!(version.starts_with('3'));
}

#[test]
fn test_blocking_facade() {
    let fixture = SqliteFixture::new("blocking.db");
    let mut handle = blocking::ConnectionHandle::new(DatabaseType::SQLite, fixture.url()).unwrap();

    handle.open().unwrap();
    for sql in SCHEMA {
        handle.execute(sql, &[]).unwrap();
    }
    handle
        .execute("INSERT INTO TestModels (Id, Name) VALUES (1, 'a'), (2, 'b')", &[])
        .unwrap();

    assert_eq!(handle.columns("TESTMODELS").unwrap().len(), 3);
    let rows = handle
        .query_page("TestModels", &PaginationRequest::limit_offset("Id", 1).at_index(1))
        .unwrap();
    assert_eq!(ids(&rows, "Id"), vec![2]);

    let mut it = handle.foreach(["Orders"]).unwrap();
    it.begin().unwrap().triggers().unwrap().end().unwrap();
    let results = it.materialize().unwrap().unwrap();
    assert_eq!(results["Orders"].triggers.as_ref().unwrap().len(), 1);

    handle.close();
    assert_eq!(handle.state(), ConnectionState::Closed);
}
