//! Stdio transport: one MCP session over stdin/stdout.

use crate::config::FirebirdConfig;
use crate::db::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::mcp::FirebirdService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport {
    executor: Arc<QueryExecutor>,
    config: Arc<FirebirdConfig>,
}

impl StdioTransport {
    pub fn new(executor: Arc<QueryExecutor>, config: Arc<FirebirdConfig>) -> Self {
        Self { executor, config }
    }
}

/// Why the stdio session ended.
enum Exit {
    ClientClosed,
    Signal,
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!(database = %self.config.database, "Serving Firebird MCP over stdio");

        let running = FirebirdService::new(self.executor.clone(), self.config.clone())
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let exit = tokio::select! {
            result = running.waiting() => match result {
                Ok(reason) => {
                    info!(?reason, "Client closed the stdio session");
                    Exit::ClientClosed
                }
                Err(e) => {
                    warn!(error = %e, "Stdio transport error");
                    self.executor.pool().close().await;
                    return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                }
            },
            _ = wait_for_signal() => Exit::Signal,
        };

        if let Exit::Signal = exit {
            info!("Shutting down, signal again to exit now");
            tokio::spawn(async {
                wait_for_signal().await;
                std::process::exit(1);
            });
        }

        self.executor.pool().close().await;
        info!("Connection pool closed");

        // A blocked stdin read cannot be cancelled from here
        if let Exit::Signal = exit {
            std::process::exit(0);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
