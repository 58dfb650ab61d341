//! Firebird MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to inspect and query a Firebird database.

use firebird_mcp_server::config::{Config, TransportMode};
use firebird_mcp_server::db::{FirebirdConnector, Pool, PoolOptions, QueryExecutor};
use firebird_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    let firebird = match config.firebird_config() {
        Ok(firebird) => firebird,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            eprintln!("Usage: firebird-mcp-server --host <host> --port <port> --database <path> \\");
            eprintln!("           --user <user> --password <password> [--role <role>] \\");
            eprintln!("           [--lowercase_keys true] [--pageSize 4096] [--transport stdio|http]");
            eprintln!();
            eprintln!("Each option can also be set with FIREBIRD_<NAME>, e.g. FIREBIRD_PASSWORD.");
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        host = %firebird.host,
        port = firebird.port,
        database = %firebird.database,
        "Starting Firebird MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let firebird = Arc::new(firebird);
    let connector = Arc::new(FirebirdConnector::new(firebird.as_ref().clone()));
    let options = PoolOptions {
        size: config.pool_size,
        acquire_timeout: config.acquire_timeout_duration(),
    };
    let pool = match Pool::open(connector, options).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Could not open connection pool");
            return Err(e.into());
        }
    };

    let executor = Arc::new(
        QueryExecutor::new(pool, config.query_timeout_duration())
            .with_lowercase_keys(firebird.lowercase_keys),
    );

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            let transport = StdioTransport::new(executor, firebird);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                executor,
                firebird,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
