//! Smoke test against a real Firebird server.
//!
//! Set TEST_FIREBIRD_HOST to run it. The other settings default to a stock
//! installation:
//! TEST_FIREBIRD_HOST=localhost TEST_FIREBIRD_DATABASE=employee cargo test --test firebird_live_test

use firebird_mcp_server::config::FirebirdConfig;
use firebird_mcp_server::db::{FirebirdConnector, Pool, PoolOptions, QueryExecutor, SchemaInspector};
use firebird_mcp_server::tools::{ExecuteQueryInput, QueryToolHandler};
use std::sync::Arc;
use std::time::Duration;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::test]
async fn test_live_catalog_and_query() {
    let host = match std::env::var("TEST_FIREBIRD_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("Skipping test: TEST_FIREBIRD_HOST not set");
            return;
        }
    };

    let config = FirebirdConfig {
        host,
        port: env_or("TEST_FIREBIRD_PORT", "3050").parse().unwrap(),
        database: env_or("TEST_FIREBIRD_DATABASE", "employee"),
        user: env_or("TEST_FIREBIRD_USER", "SYSDBA"),
        password: env_or("TEST_FIREBIRD_PASSWORD", "masterkey"),
        role: None,
        lowercase_keys: false,
        page_size: 4096,
    };

    let pool = Pool::open(
        Arc::new(FirebirdConnector::new(config)),
        PoolOptions {
            size: 2,
            acquire_timeout: Duration::from_secs(10),
        },
    )
    .await
    .unwrap();
    let executor = Arc::new(QueryExecutor::new(pool, Duration::from_secs(30)));

    SchemaInspector::ping(&executor).await.unwrap();

    let tables = SchemaInspector::list_tables(&executor).await.unwrap();
    assert!(tables.iter().all(|t| !t.starts_with("RDB$")));

    let handler = QueryToolHandler::new(executor.clone());
    let output = handler
        .execute_query(ExecuteQueryInput {
            query: "SELECT RDB$RELATION_NAME FROM RDB$RELATIONS".to_string(),
            limit: 3,
        })
        .await
        .unwrap();
    assert!(output.rows.len() <= 3);

    let rejected = handler
        .execute_query(ExecuteQueryInput {
            query: "DELETE FROM RDB$RELATIONS".to_string(),
            limit: 3,
        })
        .await;
    assert!(rejected.is_err());

    executor.pool().close().await;
}
