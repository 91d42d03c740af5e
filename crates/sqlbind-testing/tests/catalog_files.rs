//! Statement catalogs read from disk.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::Path;

use sqlbind_client::{
    CatalogError, DirectorySource, Error, RegistryConfig, StatementRegistry, Value,
};
use sqlbind_testing::{MockConnection, init_tracing};

struct OrderDao;
struct CustomerDao;
struct GenericDao<T>(std::marker::PhantomData<T>);

const ORDER_DAO: &str = r#"{
    "datasource": "main",
    "statements": [
        {
            "name": "openOrders",
            "sql": [
                "select id, total",
                "  from orders",
                " where customer = :customer",
                "   and status in (:status)",
                " order by $orderclause"
            ]
        },
        {
            "name": "archive",
            "datasource": "archive",
            "sql": "insert into orders_archive select * from orders where id = :id"
        },
        { "sql": "select 'nameless'" }
    ]
}"#;

fn write_catalog(dir: &Path, caller: &str, json: &str) {
    std::fs::write(dir.join(format!("{caller}.json")), json).unwrap();
}

#[tokio::test]
async fn test_lookup_bind_execute() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path(), "OrderDao", ORDER_DAO);
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    let mut stmt = registry.lookup::<OrderDao>("openOrders").unwrap();
    assert_eq!(stmt.datasource(), Some("main"));
    assert_eq!(
        stmt.template().sql(),
        "select id, total from orders where customer = :customer and status in (:status) order by $orderclause"
    );

    stmt.bind("customer", 42_i64)
        .unwrap()
        .bind_seq("status", ["NEW", "HELD"])
        .unwrap()
        .bind_literal("orderclause", "total desc")
        .unwrap();

    let mut conn = MockConnection::new();
    stmt.execute_query(&mut conn).await.unwrap();
    assert_eq!(
        conn.recorder().prepared_sql(),
        ["select id, total from orders where customer = ? and status in (?,?) order by total desc"]
    );
    assert_eq!(
        conn.recorder().executions(),
        [vec![Value::Long(42), Value::from("NEW"), Value::from("HELD")]]
    );
}

#[test]
fn test_independent_lookups() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path(), "OrderDao", ORDER_DAO);
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    let mut first = registry.lookup::<OrderDao>("archive").unwrap();
    let second = registry.lookup::<OrderDao>("archive").unwrap();
    first.bind("id", 1).unwrap();

    assert_eq!(first.bindings().len(), 1);
    assert!(second.bindings().is_empty());
    assert_eq!(second.datasource(), Some("archive"));
}

#[test]
fn test_nameless_statement_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path(), "OrderDao", ORDER_DAO);
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    let catalog = registry.catalog::<OrderDao>().unwrap();
    assert_eq!(catalog.ids(), ["archive", "openOrders"]);
    assert_eq!(catalog.datasource(), Some("main"));
}

#[test]
fn test_catalog_read_once() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path(), "OrderDao", ORDER_DAO);
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    registry.lookup::<OrderDao>("archive").unwrap();
    std::fs::remove_file(dir.path().join("OrderDao.json")).unwrap();

    // Already loaded: the file is not read again.
    registry.lookup::<OrderDao>("openOrders").unwrap();
    assert_eq!(registry.loaded(), ["OrderDao"]);
}

#[test]
fn test_generic_caller_uses_simple_name() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(
        dir.path(),
        "GenericDao",
        r#"{ "statements": [ { "name": "one", "sql": "select 1" } ] }"#,
    );
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    let stmt = registry.lookup::<GenericDao<String>>("one").unwrap();
    assert_eq!(stmt.datasource(), None);
}

#[test]
fn test_missing_file_lenient() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StatementRegistry::new(DirectorySource::new(dir.path()));

    let err = registry.lookup::<CustomerDao>("find").unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownStatement { ref catalog, ref statement }
            if catalog == "CustomerDao" && statement == "find"
    ));
}

#[test]
fn test_strict_registry_reports_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path(), "CustomerDao", "{ \"statements\": [ ");
    let registry = StatementRegistry::with_config(
        DirectorySource::new(dir.path()),
        RegistryConfig::default().strict(true),
    );

    let err = registry.lookup::<CustomerDao>("find").unwrap_err();
    assert!(matches!(
        err,
        Error::Catalog { source: CatalogError::Parse(_), .. }
    ));

    write_catalog(
        dir.path(),
        "CustomerDao",
        r#"{ "statements": [ { "name": "find", "sql": "select * from customers where id = :id" } ] }"#,
    );
    assert!(registry.lookup::<CustomerDao>("find").is_ok());
}
