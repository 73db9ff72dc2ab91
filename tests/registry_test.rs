//! Integration tests for the registry using in-memory pools.

mod common;

use common::{FakeConnector, RecordingHook};
use mysql_registry::{DbError, PoolConfig, QueryContext, Registry, SqlError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_keeps_one_pool() {
    const TASKS: usize = 16;

    let connector = FakeConnector::default().with_build_delay(Duration::from_millis(2));
    let registry = Arc::new(Registry::with_connector(connector.clone()).with_env(HashMap::new()));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.register("orders", PoolConfig::default()).await })
        })
        .collect();

    let mut dbs = Vec::with_capacity(TASKS);
    for handle in handles {
        dbs.push(handle.await.unwrap().unwrap());
    }

    // Every caller got the same pool.
    let stored = registry.client("orders").unwrap();
    assert!(dbs.iter().all(|db| db.same_pool(&stored)));
    assert_eq!(registry.len(), 1);

    // Exactly one constructed pool survives; every other one was closed once.
    let pools = connector.pools();
    let open: Vec<_> = pools
        .iter()
        .filter(|p| p.closes.load(Ordering::SeqCst) == 0)
        .collect();
    assert_eq!(open.len(), 1);
    assert!(
        pools
            .iter()
            .all(|p| p.closes.load(Ordering::SeqCst) <= 1)
    );

    registry.close_all().await.unwrap();
    assert!(
        pools
            .iter()
            .all(|p| p.closes.load(Ordering::SeqCst) == 1)
    );
}

#[tokio::test]
async fn test_health_check_names_only_unreachable_pool() {
    let connector = FakeConnector::default().with_unreachable("billing");
    let registry = Registry::with_connector(connector.clone()).with_env(HashMap::new());

    for name in ["orders", "billing", "users"] {
        registry.register(name, PoolConfig::default()).await.unwrap();
    }

    let err = registry.health_check().await.unwrap_err();
    match &err {
        DbError::Unhealthy { failures } => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures.get("billing"), Some(SqlError::Transport { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("billing"));
    assert!(!err.to_string().contains("orders"));

    // All three were probed despite the failure.
    for pool in connector.pools() {
        assert_eq!(pool.pings.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_instrumented_pool_runs_hooks_in_order() {
    let hook = RecordingHook::default();
    let registry = Registry::with_connector(FakeConnector::default())
        .with_hook(hook.clone())
        .with_env(HashMap::new());

    let db = registry
        .register("orders", PoolConfig {
            instrument: true,
            ..PoolConfig::default()
        })
        .await
        .unwrap();

    let ctx = QueryContext::new().with_request_id("req-1");
    db.execute(&ctx, "UPDATE orders SET paid = 1", &[]).await.unwrap();
    let err = db.execute(&ctx, "FAIL please", &[]).await.unwrap_err();
    assert_eq!(err, SqlError::transport("boom"));

    assert_eq!(
        hook.calls(),
        vec![
            "before UPDATE orders SET paid = 1",
            "after UPDATE orders SET paid = 1",
            "before FAIL please",
            "on_error FAIL please",
        ]
    );

    // Pings are not statements.
    db.ping().await.unwrap();
    assert_eq!(hook.calls().len(), 4);
}

#[tokio::test]
async fn test_uninstrumented_pool_skips_hooks() {
    let hook = RecordingHook::default();
    let registry = Registry::with_connector(FakeConnector::default())
        .with_hook(hook.clone())
        .with_env(HashMap::new());

    let db = registry.register("orders", PoolConfig::default()).await.unwrap();
    db.execute(&QueryContext::new(), "UPDATE orders SET paid = 1", &[])
        .await
        .unwrap();
    assert!(hook.calls().is_empty());
}

#[tokio::test]
async fn test_env_enables_instrumentation() {
    let hook = RecordingHook::default();
    let registry = Registry::with_connector(FakeConnector::default())
        .with_hook(hook.clone())
        .with_env(env(&[("MYSQL_HOOK_ORDERS", "1")]));

    let db = registry.register("orders", PoolConfig::default()).await.unwrap();
    assert!(db.config().instrument);
    db.execute(&QueryContext::new(), "DELETE FROM carts", &[])
        .await
        .unwrap();
    assert_eq!(hook.calls(), vec!["before DELETE FROM carts", "after DELETE FROM carts"]);
}

#[tokio::test]
async fn test_env_max_open_override_and_fallback() {
    let registry = Registry::with_connector(FakeConnector::default()).with_env(env(&[
        ("MYSQL_MAXOPEN_ORDERS", "7"),
        ("MYSQL_MAXOPEN_USERS", "lots"),
    ]));

    let orders = registry
        .register("ORDERS", PoolConfig {
            max_open_conns: 100,
            ..PoolConfig::default()
        })
        .await
        .unwrap();
    let users = registry
        .register("users", PoolConfig {
            max_open_conns: 100,
            ..PoolConfig::default()
        })
        .await
        .unwrap();

    assert_eq!(orders.config().max_open_conns, 7);
    assert_eq!(users.config().max_open_conns, 100);
}

#[tokio::test]
async fn test_fetch_one_on_empty_result_is_no_rows() {
    let registry = Registry::with_connector(FakeConnector::default()).with_env(HashMap::new());
    let db = registry.register("orders", PoolConfig::default()).await.unwrap();

    let err = db
        .fetch_one(&QueryContext::new(), "SELECT * FROM orders WHERE id = ?", &[1.into()])
        .await
        .unwrap_err();
    assert!(mysql_registry::is_no_rows(&err));

    let rows: Vec<serde_json::Value> = db
        .select(&QueryContext::new(), "SELECT * FROM orders", &[])
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_close_all_empties_registry() {
    let connector = FakeConnector::default();
    let registry = Registry::with_connector(connector.clone()).with_env(HashMap::new());
    registry.register("orders", PoolConfig::default()).await.unwrap();
    registry.register("users", PoolConfig::default()).await.unwrap();
    assert_eq!(registry.names(), vec!["orders", "users"]);

    registry.close_all().await.unwrap();
    assert!(registry.is_empty());
    assert!(matches!(
        registry.client("orders"),
        Err(DbError::NotRegistered { .. })
    ));
    for pool in connector.pools() {
        assert_eq!(pool.closes.load(Ordering::SeqCst), 1);
    }
}
