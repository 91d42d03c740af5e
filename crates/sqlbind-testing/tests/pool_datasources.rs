//! Pools and datasources backed by the mock driver.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use sqlbind_client::{
    BoundStatement, MemorySource, PlaceholderStyle, StatementRegistry, Template, Value,
    commit_and_close, rollback_and_close,
};
use sqlbind_pool::{DataSourceConfig, DataSources, DataSourcesConfig, Pool, PoolConfig, PoolError};
use sqlbind_testing::{MockEvent, MockFactory, init_tracing};

const PROPS: &str = "\
jdbc.pools=main,audit
jdbc.url.main=mock://main
pool.min.main=0
pool.max.main=2
pool.timeout.main=1
jdbc.url.audit=mock://audit
pool.min.audit=0
";

struct AuditDao;

async fn datasources() -> DataSources<MockFactory> {
    let config = DataSourcesConfig::from_properties(PROPS).unwrap();
    DataSources::new(config, MockFactory::new()).await.unwrap()
}

#[tokio::test]
async fn test_acquire_by_name() {
    init_tracing();
    let datasources = datasources().await;
    assert_eq!(datasources.names(), ["audit", "main"]);
    assert_eq!(datasources.default_name(), Some("main"));

    let conn = datasources.acquire("audit").await.unwrap();
    assert_eq!(conn.datasource(), "audit");

    let err = datasources.acquire("reporting").await.unwrap_err();
    assert!(matches!(err, PoolError::UnknownDataSource(ref n) if n == "reporting"));
}

#[tokio::test]
async fn test_acquire_for_statement_datasource() {
    let datasources = datasources().await;
    let registry = StatementRegistry::new(MemorySource::new().with_json(
        "AuditDao",
        r#"{ "datasource": "audit", "statements": [
            { "name": "record", "sql": "insert into audit (what) values (:what)" }
        ] }"#,
    ));

    let mut stmt = registry.lookup::<AuditDao>("record").unwrap();
    stmt.bind("what", "login").unwrap();

    let mut conn = datasources.acquire_for(&stmt).await.unwrap();
    assert_eq!(conn.datasource(), "audit");
    stmt.execute(&mut conn).await.unwrap();

    let adhoc = BoundStatement::from_sql("adhoc", "select 1");
    let conn = datasources.acquire_for(&adhoc).await.unwrap();
    assert_eq!(conn.datasource(), "main");
}

#[tokio::test]
async fn test_statement_cache_follows_pooled_connection() {
    let factory = Arc::new(MockFactory::new());
    let pool = Pool::builder(Arc::clone(&factory), DataSourceConfig::new("main", "mock://main"))
        .min_connections(0)
        .max_connections(1)
        .build()
        .await
        .unwrap();

    let mut stmt = BoundStatement::new(Arc::new(
        Template::new("byId", "select * from t where id = :id").with_datasource("main"),
    ));

    for id in 1..=3 {
        let mut conn = pool.get().await.unwrap();
        stmt.bind("id", id).unwrap();
        stmt.execute_query(&mut conn).await.unwrap();
    }

    assert_eq!(factory.opened(), 1);
    let recorder = &factory.recorders()[0];
    assert_eq!(recorder.prepare_count(), 1);
    assert_eq!(
        recorder.executions(),
        [vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]
    );
}

#[tokio::test]
async fn test_pool_bounds_concurrent_checkouts() {
    let datasources = Arc::new(datasources().await);

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let datasources = Arc::clone(&datasources);
            tokio::spawn(async move {
                let mut conn = datasources.acquire("main").await.unwrap();
                let mut stmt = BoundStatement::from_sql("touch", "update t set n = n + 1 where id = :id");
                stmt.bind("id", i).unwrap();
                stmt.execute(&mut conn).await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let status = datasources.pool("main").unwrap().status();
    assert!(status.total <= 2);
    assert_eq!(status.in_use, 0);
    assert_eq!(datasources.pool("main").unwrap().metrics().checkouts_successful, 6);
}

#[tokio::test]
async fn test_connect_failure_surfaces() {
    let factory = Arc::new(MockFactory::new());
    let pool = Pool::new(
        PoolConfig::new().min_connections(0),
        Arc::clone(&factory),
        DataSourceConfig::new("main", "mock://main"),
    )
    .await
    .unwrap();

    factory.fail_connect(Some("network unreachable"));
    let err = pool.get().await.unwrap_err();
    assert!(matches!(err, PoolError::Connection { ref datasource, .. } if datasource == "main"));
    assert!(err.is_transient());

    factory.fail_connect(None);
    assert!(pool.get().await.is_ok());
}

#[tokio::test]
async fn test_marker_style_from_factory() {
    let factory = Arc::new(MockFactory::with_style(PlaceholderStyle::DollarNumbered));
    let pool = Pool::new(
        PoolConfig::new().min_connections(0),
        Arc::clone(&factory),
        DataSourceConfig::new("pg", "mock://pg"),
    )
    .await
    .unwrap();

    let mut stmt = BoundStatement::from_sql("pg", "select * from t where a = :a and b in (:b)");
    stmt.bind("a", 1).unwrap().bind_seq("b", [2, 3]).unwrap();
    let mut conn = pool.get().await.unwrap();
    stmt.execute_query(&mut conn).await.unwrap();

    assert_eq!(
        factory.recorders()[0].prepared_sql(),
        ["select * from t where a = $1 and b in ($2,$3)"]
    );
}

#[tokio::test]
async fn test_transaction_helpers_swallow_errors() {
    let factory = Arc::new(MockFactory::new());
    let pool = Pool::new(
        PoolConfig::new().min_connections(0),
        Arc::clone(&factory),
        DataSourceConfig::new("main", "mock://main"),
    )
    .await
    .unwrap();

    let mut conn = pool.get().await.unwrap();
    let recorder = factory.recorders()[0].clone();
    recorder.fail_commit("serialization failure");
    commit_and_close(&mut conn).await;
    assert_eq!(recorder.events(), [MockEvent::Commit, MockEvent::Close]);
    drop(conn);

    // The closed connection is not requeued, so a new one is opened.
    let mut conn = pool.get().await.unwrap();
    assert_eq!(factory.opened(), 2);
    rollback_and_close(&mut conn).await;
    assert_eq!(
        factory.recorders()[1].events(),
        [MockEvent::Rollback, MockEvent::Close]
    );
}

#[tokio::test]
async fn test_close_all() {
    let config = DataSourcesConfig::from_properties(
        "jdbc.pools=main\njdbc.url.main=mock://main\npool.min.main=2\npool.max.main=4",
    )
    .unwrap();
    let datasources = DataSources::new(config, MockFactory::new()).await.unwrap();
    assert_eq!(datasources.pool("main").unwrap().status().available, 2);

    datasources.close_all().await;
    let pool = datasources.pool("main").unwrap();
    assert!(pool.is_closed());
    assert_eq!(pool.metrics().connections_closed, 2);
    assert!(matches!(
        datasources.acquire("main").await.unwrap_err(),
        PoolError::PoolClosed
    ));
}
