//! Firebird driver binding.
//!
//! Wraps `rsfbclient`'s pure-Rust wire protocol client behind the
//! [`Connector`]/[`Connection`] seam.

use crate::config::FirebirdConfig;
use crate::db::driver::{Connection, Connector};
use crate::db::types::{Row, SqlValue};
use crate::error::{DbError, DbResult};
use rsfbclient::prelude::*;
use rsfbclient::{FbError, SimpleConnection, SqlType};
use tracing::debug;

/// Opens pure-Rust Firebird connections from a validated configuration.
#[derive(Debug, Clone)]
pub struct FirebirdConnector {
    config: FirebirdConfig,
}

impl FirebirdConnector {
    pub fn new(config: FirebirdConfig) -> Self {
        Self { config }
    }
}

impl Connector for FirebirdConnector {
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        let cfg = &self.config;
        let mut builder = rsfbclient::builder_pure_rust();
        builder
            .host(cfg.host.as_str())
            .port(cfg.port)
            .db_name(cfg.database.as_str())
            .user(cfg.user.as_str())
            .pass(cfg.password.as_str())
            .page_size(cfg.page_size);
        if let Some(role) = &cfg.role {
            builder.role(role.as_str());
        }

        let inner: SimpleConnection = builder
            .connect()
            .map_err(|e| DbError::connection(e.to_string(), connection_suggestion(&e)))?
            .into();

        debug!(target_db = %self.describe(), "Opened Firebird connection");
        Ok(Box::new(FirebirdConnection { inner }))
    }

    fn describe(&self) -> String {
        format!(
            "{}:{}/{}",
            self.config.host, self.config.port, self.config.database
        )
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(error: &FbError) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("network") {
        return "Check that the Firebird server is running and the host/port are reachable"
            .to_string();
    }
    if error_str.contains("password") || error_str.contains("login") {
        return "Verify the user name and password".to_string();
    }
    if error_str.contains("i/o error") || error_str.contains("no such file") {
        return "Check that the database path or alias exists on the server".to_string();
    }
    "Verify --host, --port, --database, --user and --password".to_string()
}

struct FirebirdConnection {
    inner: SimpleConnection,
}

impl Connection for FirebirdConnection {
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let rows: Vec<rsfbclient::Row> = self.inner.query(sql, to_params(params))?;
        Ok(rows.into_iter().map(from_fb_row).collect())
    }

    fn query_capped(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        max_rows: usize,
    ) -> DbResult<Vec<Row>> {
        // Rows past the cap are never fetched from the server
        let mut rows = Vec::new();
        for row in self.inner.query_iter(sql, to_params(params))?.take(max_rows) {
            let row: rsfbclient::Row = row?;
            rows.push(from_fb_row(row));
        }
        Ok(rows)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        Ok(self.inner.execute(sql, to_params(params))?)
    }

    fn begin(&mut self) -> DbResult<()> {
        Ok(self.inner.begin_transaction()?)
    }

    fn commit(&mut self) -> DbResult<()> {
        Ok(self.inner.commit()?)
    }

    fn rollback(&mut self) -> DbResult<()> {
        Ok(self.inner.rollback()?)
    }
}

fn to_params(params: &[SqlValue]) -> Vec<SqlType> {
    params.iter().map(to_fb_value).collect()
}

fn to_fb_value(value: &SqlValue) -> SqlType {
    match value {
        SqlValue::Null => SqlType::Null,
        SqlValue::Bool(b) => SqlType::Boolean(*b),
        SqlValue::Int(v) => SqlType::Integer(*v),
        SqlValue::Float(v) => SqlType::Floating(*v),
        SqlValue::Text(s) => SqlType::Text(s.clone()),
        SqlValue::Timestamp(ts) => SqlType::Timestamp(*ts),
        SqlValue::Binary(bytes) => SqlType::Binary(bytes.clone()),
    }
}

fn from_fb_row(row: rsfbclient::Row) -> Row {
    let mut out = Row::new();
    for col in row.cols {
        out.push(col.name, from_fb_value(col.value));
    }
    out
}

fn from_fb_value(value: SqlType) -> SqlValue {
    match value {
        SqlType::Null => SqlValue::Null,
        SqlType::Boolean(b) => SqlValue::Bool(b),
        SqlType::Integer(v) => SqlValue::Int(v),
        SqlType::Floating(v) => SqlValue::Float(v),
        SqlType::Text(s) => SqlValue::Text(s),
        SqlType::Timestamp(ts) => SqlValue::Timestamp(ts),
        SqlType::Binary(bytes) => SqlValue::Binary(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FirebirdConfig {
        FirebirdConfig {
            host: "db.local".to_string(),
            port: 3050,
            database: "employee".to_string(),
            user: "SYSDBA".to_string(),
            password: "masterkey".to_string(),
            role: None,
            lowercase_keys: false,
            page_size: 4096,
        }
    }

    #[test]
    fn test_describe_hides_credentials() {
        let connector = FirebirdConnector::new(config());
        let target = connector.describe();
        assert_eq!(target, "db.local:3050/employee");
        assert!(!target.contains("masterkey"));
    }

    #[test]
    fn test_value_conversion_both_ways() {
        let values = vec![
            SqlValue::Null,
            SqlValue::Bool(true),
            SqlValue::Int(-7),
            SqlValue::Float(2.5),
            SqlValue::Text("RDB$DATABASE".to_string()),
            SqlValue::Binary(vec![1, 2, 3]),
        ];
        for value in values {
            assert_eq!(from_fb_value(to_fb_value(&value)), value);
        }
    }
}
