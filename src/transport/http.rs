//! Streamable HTTP transport. Also serves `--transport sse`.

use crate::config::FirebirdConfig;
use crate::db::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::mcp::FirebirdService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// How long open SSE streams get to finish after the first shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
///
/// Every MCP session gets its own [`FirebirdService`]; all of them share one
/// connection pool.
pub struct HttpTransport {
    executor: Arc<QueryExecutor>,
    config: Arc<FirebirdConfig>,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        executor: Arc<QueryExecutor>,
        config: Arc<FirebirdConfig>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            config,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl HttpTransport {
    /// Routes `endpoint` to a streamable HTTP service that builds one
    /// [`FirebirdService`] per MCP session.
    fn router(&self) -> axum::Router {
        let executor = self.executor.clone();
        let config = self.config.clone();
        let service = StreamableHttpService::new(
            move || Ok(FirebirdService::new(executor.clone(), config.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/"
        if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        }
    }
}

/// Resolves once `notify` fires and then either the drain window elapses or a
/// second signal arrives.
async fn forced_exit(notify: Arc<Notify>) {
    notify.notified().await;
    info!(
        drain_secs = DRAIN_TIMEOUT.as_secs(),
        "Draining MCP sessions, signal again to exit now"
    );
    tokio::select! {
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => warn!("Drain window elapsed, exiting"),
        _ = wait_for_signal() => warn!("Second signal received, exiting"),
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available or pass --http-port",
            )
        })?;
        info!(
            addr = %bind_addr,
            endpoint = %self.endpoint,
            database = %self.config.database,
            "Firebird MCP server listening over HTTP"
        );

        let shutdown = Arc::new(Notify::new());
        let trigger = shutdown.clone();
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            wait_for_signal().await;
            trigger.notify_one();
        });

        let outcome = tokio::select! {
            result = server => result.map_err(|e| {
                error!(error = %e, "HTTP server failed");
                DbError::internal(format!("HTTP server error: {}", e))
            }),
            _ = forced_exit(shutdown) => Ok(()),
        };

        info!("Closing connection pool");
        self.executor.pool().close().await;
        outcome
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
