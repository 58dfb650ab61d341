//! Driver abstraction used by the connection pool.
//!
//! The vendor driver is synchronous, so these traits are too: every call runs
//! on a blocking worker thread owned by the pool gateway. Keeping the seam
//! object-safe lets the pool hold `Box<dyn Connection>` and lets tests swap in
//! a scripted driver.

use crate::db::types::{Row, SqlValue};
use crate::error::DbResult;

/// One open database connection.
///
/// Statements run inside the connection's current transaction when one was
/// started with [`Connection::begin`], and in auto-commit mode otherwise.
pub trait Connection: Send + 'static {
    /// Run a statement that returns rows.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>>;

    /// Like [`Connection::query`], but stops fetching after `max_rows` rows.
    fn query_capped(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        max_rows: usize,
    ) -> DbResult<Vec<Row>>;

    /// Run a statement without a result set. Returns the affected row count.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    fn begin(&mut self) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;
}

/// Opens connections to one database.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> DbResult<Box<dyn Connection>>;

    /// Human-readable target for logs (never includes credentials).
    fn describe(&self) -> String;
}
