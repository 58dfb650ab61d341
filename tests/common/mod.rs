//! Scripted in-memory database shared by the integration tests.
//!
//! `MockDatabase` answers statements by substring match against scripted
//! responses and records every driver call, so tests can assert on the exact
//! SQL, parameters and transaction calls the server produced.

#![allow(dead_code)]

use firebird_mcp_server::db::{
    Connection, Connector, Pool, PoolOptions, QueryExecutor, Row, SqlValue,
};
use firebird_mcp_server::error::{DbError, DbResult};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Query { sql: String, params: Vec<SqlValue> },
    Execute { sql: String, params: Vec<SqlValue> },
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone)]
pub enum Response {
    Rows(Vec<Row>),
    Fail(String),
    Panic,
}

#[derive(Default)]
struct State {
    script: Vec<(String, Response)>,
    events: Vec<Event>,
    delay: Duration,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    in_flight: usize,
    max_in_flight: usize,
    opened: usize,
    last_row_cap: Option<usize>,
}

#[derive(Default)]
pub struct MockDatabase {
    state: Mutex<State>,
}

impl MockDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer statements containing `pattern` with `rows`.
    pub fn respond(&self, pattern: &str, rows: Vec<Row>) {
        self.state()
            .script
            .push((pattern.to_string(), Response::Rows(rows)));
    }

    /// Fail statements containing `pattern` with a driver error.
    pub fn fail(&self, pattern: &str, message: &str) {
        self.state()
            .script
            .push((pattern.to_string(), Response::Fail(message.to_string())));
    }

    /// Panic inside the driver for statements containing `pattern`.
    pub fn panic_on(&self, pattern: &str) {
        self.state()
            .script
            .push((pattern.to_string(), Response::Panic));
    }

    /// Every statement takes at least this long.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    pub fn fail_begin(&self) {
        self.state().fail_begin = true;
    }

    pub fn fail_commit(&self) {
        self.state().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.state().fail_rollback = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    /// SQL text of every query and execute call, in order.
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Query { sql, .. } | Event::Execute { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn last_params(&self) -> Vec<SqlValue> {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Event::Query { params, .. } | Event::Execute { params, .. } => Some(params),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    pub fn opened(&self) -> usize {
        self.state().opened
    }

    /// Row cap passed with the most recent capped query.
    pub fn last_row_cap(&self) -> Option<usize> {
        self.state().last_row_cap
    }

    fn run(&self, event: Event, sql: &str) -> DbResult<Vec<Row>> {
        let (response, delay) = {
            let mut state = self.state();
            state.events.push(event);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            let response = state
                .script
                .iter()
                .find(|(pattern, _)| sql.contains(pattern.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or(Response::Rows(Vec::new()));
            (response, state.delay)
        };

        std::thread::sleep(delay);
        self.state().in_flight -= 1;

        match response {
            Response::Rows(rows) => Ok(rows),
            Response::Fail(message) => Err(DbError::query(message)),
            Response::Panic => panic!("scripted driver panic"),
        }
    }

    fn record(&self, event: Event) {
        self.state().events.push(event);
    }
}

pub struct MockConnector {
    db: Arc<MockDatabase>,
}

impl MockConnector {
    pub fn new(db: Arc<MockDatabase>) -> Self {
        Self { db }
    }
}

impl Connector for MockConnector {
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        self.db.state().opened += 1;
        Ok(Box::new(MockConnection {
            db: Arc::clone(&self.db),
        }))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct MockConnection {
    db: Arc<MockDatabase>,
}

impl Connection for MockConnection {
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let event = Event::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        self.db.run(event, sql)
    }

    fn query_capped(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        max_rows: usize,
    ) -> DbResult<Vec<Row>> {
        self.db.state().last_row_cap = Some(max_rows);
        let mut rows = self.query(sql, params)?;
        rows.truncate(max_rows);
        Ok(rows)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let event = Event::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        self.db.run(event, sql).map(|rows| rows.len())
    }

    fn begin(&mut self) -> DbResult<()> {
        if self.db.state().fail_begin {
            return Err(DbError::query("begin refused"));
        }
        self.db.record(Event::Begin);
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        if self.db.state().fail_commit {
            return Err(DbError::query("deadlock on commit"));
        }
        self.db.record(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.db.record(Event::Rollback);
        if self.db.state().fail_rollback {
            return Err(DbError::query("connection lost"));
        }
        Ok(())
    }
}

/// Gateway over a pool of `size` mock connections.
pub async fn executor_with(
    db: &Arc<MockDatabase>,
    size: u32,
    acquire_timeout: Duration,
    query_timeout: Duration,
) -> Arc<QueryExecutor> {
    let pool = Pool::open(
        Arc::new(MockConnector::new(Arc::clone(db))),
        PoolOptions {
            size,
            acquire_timeout,
        },
    )
    .await
    .expect("mock pool opens");
    Arc::new(QueryExecutor::new(pool, query_timeout))
}

/// Gateway with generous timeouts.
pub async fn executor(db: &Arc<MockDatabase>, size: u32) -> Arc<QueryExecutor> {
    executor_with(db, size, Duration::from_secs(5), Duration::from_secs(5)).await
}

/// Wait until every pooled connection is idle again.
pub async fn wait_until_idle(executor: &QueryExecutor) {
    for _ in 0..200 {
        let status = executor.status();
        if status.in_use == 0 && status.idle == status.size as usize {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pool never became idle: {:?}", executor.status());
}
