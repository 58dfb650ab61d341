//! Connection pool management.
//!
//! Pooling itself is `r2d2`'s: [`Pool::open`] builds an `r2d2::Pool` whose
//! minimum idle count equals its maximum size, so every connection is opened
//! before the server starts answering. `r2d2` wakes waiters in no particular
//! order, so a fair tokio semaphore with one permit per connection sits in
//! front of it. Holding a permit guarantees an idle connection, waiters are
//! served in arrival order, and they give up after the acquire timeout.

use crate::config::{DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_POOL_SIZE};
use crate::db::driver::{Connection, Connector};
use crate::db::schema::queries;
use crate::error::{DbError, DbResult};
use r2d2::{HandleError, ManageConnection};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Pool sizing and acquisition options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of connections opened at startup; also the concurrency bound.
    pub size: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

/// Point-in-time pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
    pub in_use: usize,
}

/// Adapts a [`Connector`] to `r2d2`.
struct ConnectorManager {
    connector: Arc<dyn Connector>,
}

impl ManageConnection for ConnectorManager {
    type Connection = Box<dyn Connection>;
    type Error = DbError;

    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        self.connector.connect()
    }

    fn is_valid(&self, conn: &mut Box<dyn Connection>) -> DbResult<()> {
        conn.query(queries::PING, &[]).map(drop)
    }

    fn has_broken(&self, _conn: &mut Box<dyn Connection>) -> bool {
        false
    }
}

/// Routes `r2d2`'s background connection errors to tracing.
#[derive(Debug)]
struct LogConnectionErrors;

impl HandleError<DbError> for LogConnectionErrors {
    fn handle_error(&self, error: DbError) {
        warn!(error = %error, suggestion = ?error.suggestion(), "Pooled connection error");
    }
}

type Inner = r2d2::Pool<ConnectorManager>;

struct Shared {
    /// `None` once the pool is closed.
    inner: Mutex<Option<Inner>>,
    /// One permit per pooled connection. Tokio's semaphore is fair.
    permits: Arc<Semaphore>,
    options: PoolOptions,
    target: String,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Option<Inner>> {
        // The guarded value is a handle; a poisoned lock leaves it intact.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed-size pool of database connections.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("target", &self.shared.target)
            .field("options", &self.shared.options)
            .field("status", &self.status())
            .finish()
    }
}

fn closed_error() -> DbError {
    DbError::connection("Connection pool is closed", "The server is shutting down")
}

impl Pool {
    /// Open `options.size` connections and build the pool.
    ///
    /// Fails with a connection error if the connections cannot all be opened
    /// within the acquire timeout.
    pub async fn open(connector: Arc<dyn Connector>, options: PoolOptions) -> DbResult<Self> {
        if options.size == 0 {
            return Err(DbError::invalid_input("Pool size must be greater than 0"));
        }
        if options.acquire_timeout.is_zero() {
            return Err(DbError::invalid_input(
                "Acquire timeout must be greater than 0",
            ));
        }

        let target = connector.describe();
        info!(target_db = %target, size = options.size, "Opening connection pool");

        let manager = ConnectorManager { connector };
        let inner = tokio::task::spawn_blocking(move || {
            r2d2::Pool::builder()
                .max_size(options.size)
                .min_idle(Some(options.size))
                .connection_timeout(options.acquire_timeout)
                .idle_timeout(None)
                .test_on_check_out(false)
                .error_handler(Box::new(LogConnectionErrors))
                .build(manager)
        })
        .await
        .map_err(|e| DbError::internal(format!("Connection worker failed: {}", e)))?
        .map_err(|e| {
            DbError::connection(
                format!("Failed to open connection pool: {}", e),
                "Check that the Firebird server is running and the credentials are valid",
            )
        })?;

        info!(target_db = %target, size = options.size, "Connection pool ready");

        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Some(inner)),
                permits: Arc::new(Semaphore::new(options.size as usize)),
                options,
                target,
            }),
        })
    }

    /// Check out a connection, waiting up to the acquire timeout.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        let wait = self.shared.options.acquire_timeout;
        let start = Instant::now();
        let permit = match timeout(wait, self.shared.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(closed_error()),
            Err(_) => {
                warn!(
                    timeout_secs = wait.as_secs_f64(),
                    size = self.shared.options.size,
                    "Timed out waiting for a pooled connection"
                );
                return Err(DbError::connection(
                    format!(
                        "Timed out after {:.1}s waiting for a pooled connection",
                        wait.as_secs_f64()
                    ),
                    "All connections are busy. Retry later or increase --pool-size",
                ));
            }
        };

        let inner = self.shared.inner().as_ref().cloned().ok_or_else(closed_error)?;
        let remaining = wait.saturating_sub(start.elapsed());
        let conn = tokio::task::spawn_blocking(move || inner.get_timeout(remaining))
            .await
            .map_err(|e| DbError::internal(format!("Connection worker failed: {}", e)))?
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to check out a connection: {}", e),
                    "The database may be unreachable; check the server log",
                )
            })?;

        debug!(in_use = self.status().in_use, "Connection checked out");
        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Current usage counters.
    pub fn status(&self) -> PoolStatus {
        let size = self.shared.options.size;
        let idle = self
            .shared
            .inner()
            .as_ref()
            .map_or(0, |inner| inner.state().idle_connections as usize);
        PoolStatus {
            size,
            idle,
            in_use: (size as usize).saturating_sub(self.shared.permits.available_permits()),
        }
    }

    /// Stop handing out connections and drop the idle ones.
    ///
    /// Connections still checked out are dropped when their guards are.
    pub async fn close(&self) {
        self.shared.permits.close();
        let Some(inner) = self.shared.inner().take() else {
            return;
        };
        let idle = inner.state().idle_connections;
        // Dropping a connection detaches from the server, which blocks.
        let _ = tokio::task::spawn_blocking(move || drop(inner)).await;
        info!(target_db = %self.shared.target, closed = idle, "Connection pool closed");
    }
}

/// A checked-out connection.
///
/// Dropping it, including during unwinding, hands the connection back to
/// `r2d2` and then releases the permit, so a waiter woken by the permit
/// always finds an idle connection.
pub struct PooledConnection {
    conn: r2d2::PooledConnection<ConnectorManager>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut **self.conn
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}
