//! Pool gateway.
//!
//! Every database call made by the tools goes through [`QueryExecutor`]: it
//! borrows a connection from the [`Pool`], runs the work on a blocking worker
//! thread and returns the connection afterwards. The shapes offered:
//!
//! - [`QueryExecutor::run_query`]: one statement, result rows returned
//! - [`QueryExecutor::run_query_limited`]: the same, fetching at most N rows
//! - [`QueryExecutor::run_statement`]: one statement, no result set
//! - [`QueryExecutor::run_transaction`]: a closure run between BEGIN and
//!   COMMIT, rolled back if it fails
//!
//! The pooled connection guard moves into the worker closure. If the caller
//! stops waiting (timeout or cancellation) the driver call still runs to
//! completion and the connection goes back to the pool when it does. A
//! transaction whose caller has given up is rolled back instead of committed.

use crate::db::driver::Connection;
use crate::db::pool::{Pool, PoolStatus};
use crate::db::types::{Row, SqlValue};
use crate::error::{DbError, DbResult};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Shared gateway to the connection pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: Pool,
    query_timeout: Duration,
    lowercase_keys: bool,
}

impl QueryExecutor {
    pub fn new(pool: Pool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
            lowercase_keys: false,
        }
    }

    /// Report result column names in lower case.
    pub fn with_lowercase_keys(mut self, lowercase_keys: bool) -> Self {
        self.lowercase_keys = lowercase_keys;
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Run a statement and return its rows.
    pub async fn run_query(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> DbResult<Vec<Row>> {
        let sql = sql.into();
        let lowercase_keys = self.lowercase_keys;
        debug!(sql = %sql, params = params.len(), "Executing query");

        self.with_connection("query", move |conn| {
            let rows = conn.query(&sql, &params)?;
            Ok(normalize_rows(rows, lowercase_keys))
        })
        .await
    }

    /// Run a statement and return at most `max_rows` of its rows. The rest
    /// of the result set is never fetched.
    pub async fn run_query_limited(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
        max_rows: usize,
    ) -> DbResult<Vec<Row>> {
        let sql = sql.into();
        let lowercase_keys = self.lowercase_keys;
        debug!(sql = %sql, params = params.len(), max_rows, "Executing limited query");

        self.with_connection("query", move |conn| {
            let rows = conn.query_capped(&sql, &params, max_rows)?;
            Ok(normalize_rows(rows, lowercase_keys))
        })
        .await
    }

    /// Run a statement that produces no result set.
    pub async fn run_statement(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> DbResult<()> {
        let sql = sql.into();
        debug!(sql = %sql, params = params.len(), "Executing statement");

        self.with_connection("statement", move |conn| {
            let affected = conn.execute(&sql, &params)?;
            debug!(affected, "Statement executed");
            Ok(())
        })
        .await
    }

    /// Run `work` inside one transaction on one connection.
    ///
    /// The transaction commits when `work` returns `Ok`. When it returns an
    /// error (or panics) the transaction is rolled back and the original
    /// error is returned; a failing rollback is logged, not reported.
    ///
    /// If the caller times out or is dropped before the commit starts, the
    /// transaction is rolled back. A commit already under way when the
    /// timeout fires is waited for, so `Ok` is returned exactly when the
    /// transaction committed.
    pub async fn run_transaction<T, F>(&self, work: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Transaction<'_>) -> DbResult<T> + Send + 'static,
    {
        let lowercase_keys = self.lowercase_keys;
        let gate = Arc::new(CommitGate::default());
        let _abandon_on_drop = AbandonOnDrop(Arc::clone(&gate));
        let worker_gate = Arc::clone(&gate);

        let start = Instant::now();
        let mut handle = self
            .spawn_on_connection(move |conn| {
                conn.begin().map_err(|e| {
                    DbError::transaction(format!("Failed to begin transaction: {}", e))
                })?;

                let mut tx = Transaction {
                    conn: &mut *conn,
                    lowercase_keys,
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| work(&mut tx)));

                match outcome {
                    Ok(Ok(value)) => {
                        if !worker_gate.start_commit() {
                            warn!("Transaction caller gave up before commit, rolling back");
                            rollback_quietly(conn);
                            return Err(DbError::transaction("Abandoned before commit"));
                        }
                        match conn.commit() {
                            Ok(()) => Ok(value),
                            Err(e) => {
                                rollback_quietly(conn);
                                Err(DbError::transaction(format!(
                                    "Failed to commit transaction: {}",
                                    e
                                )))
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        debug!(error = %e, "Transaction work failed, rolling back");
                        rollback_quietly(conn);
                        Err(e)
                    }
                    Err(panic) => {
                        rollback_quietly(conn);
                        resume_unwind(panic)
                    }
                }
            })
            .await?;

        match timeout(self.query_timeout, &mut handle).await {
            Ok(joined) => finish("transaction", start, joined),
            Err(_) if gate.abandon() => Err(self.timed_out("transaction")),
            Err(_) => {
                debug!("Timeout fired during commit, waiting for its outcome");
                finish("transaction", start, handle.await)
            }
        }
    }

    /// Borrow a connection and run `work` on a blocking worker thread.
    async fn with_connection<T, F>(&self, operation: &'static str, work: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Connection) -> DbResult<T> + Send + 'static,
    {
        let start = Instant::now();
        let handle = self.spawn_on_connection(work).await?;

        match timeout(self.query_timeout, handle).await {
            Ok(joined) => finish(operation, start, joined),
            Err(_) => Err(self.timed_out(operation)),
        }
    }

    /// Acquire a connection and move it, with `work`, onto a blocking worker.
    async fn spawn_on_connection<T, F>(&self, work: F) -> DbResult<JoinHandle<DbResult<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Connection) -> DbResult<T> + Send + 'static,
    {
        let mut guard = self.pool.acquire().await?;
        Ok(tokio::task::spawn_blocking(move || work(guard.connection())))
    }

    fn timed_out(&self, operation: &'static str) -> DbError {
        warn!(
            operation,
            timeout_secs = self.query_timeout.as_secs_f64(),
            in_use = self.status().in_use,
            "Database call timed out; connection returns to the pool when it finishes"
        );
        DbError::timeout(operation, self.query_timeout)
    }
}

fn finish<T>(
    operation: &'static str,
    start: Instant,
    joined: Result<DbResult<T>, JoinError>,
) -> DbResult<T> {
    match joined {
        Ok(result) => {
            debug!(
                operation,
                elapsed_ms = start.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Database call finished"
            );
            result
        }
        Err(join_err) => Err(DbError::internal(format!(
            "Database worker failed: {}",
            join_err
        ))),
    }
}

const GATE_OPEN: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// Decides, once, whether a transaction commits or its caller gives up.
#[derive(Debug, Default)]
struct CommitGate(AtomicU8);

impl CommitGate {
    /// Worker side. False if the caller already gave up.
    fn start_commit(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Caller side. False if the commit has already started.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Abandons the transaction when the caller's future is dropped early.
struct AbandonOnDrop(Arc<CommitGate>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// Handle passed to [`QueryExecutor::run_transaction`] work.
///
/// Statements run on the transaction's connection. Committing and rolling
/// back are left to the executor.
pub struct Transaction<'c> {
    conn: &'c mut dyn Connection,
    lowercase_keys: bool,
}

impl Transaction<'_> {
    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let rows = self.conn.query(sql, params)?;
        Ok(normalize_rows(rows, self.lowercase_keys))
    }

    /// Run a statement without a result set. Returns the affected row count.
    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.conn.execute(sql, params)
    }
}

fn rollback_quietly(conn: &mut dyn Connection) {
    if let Err(e) = conn.rollback() {
        warn!(error = %e, "Rollback failed");
    }
}

fn normalize_rows(rows: Vec<Row>, lowercase_keys: bool) -> Vec<Row> {
    if lowercase_keys {
        rows.into_iter().map(Row::into_lowercase_keys).collect()
    } else {
        rows
    }
}
