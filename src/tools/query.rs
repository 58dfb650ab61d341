//! Query execution tool.
//!
//! This module implements the `execute_query` MCP tool. Only read queries are
//! accepted; the row count is capped by the requested limit.

use crate::db::types::rows_to_pretty_json;
use crate::db::{QueryExecutor, Row};
use crate::error::DbResult;
use crate::tools::ToolText;
use crate::tools::sql_validator::{self, DEFAULT_ROW_LIMIT};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const ERROR_PREFIX: &str = "❌ Error executing query:";

fn default_limit() -> i64 {
    DEFAULT_ROW_LIMIT
}

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// The SQL query to be executed (only read queries are allowed)
    pub query: String,
    /// The maximum number of rows to be returned. Default: 10, max: 10000
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct ExecuteQueryOutput {
    /// The statement as the caller sent it.
    pub query: String,
    /// The statement actually sent to the database.
    pub executed_sql: String,
    pub rows: Vec<Row>,
    /// True if the statement produced more rows than the limit.
    pub truncated: bool,
}

impl ToolText for ExecuteQueryOutput {
    fn contents(&self) -> Vec<String> {
        let mut contents = vec![
            format!("Query:\n{}", self.query),
            format!("Query result:\n{}", rows_to_pretty_json(&self.rows)),
        ];
        if self.truncated {
            contents.push(format!(
                "(truncated to {} rows; raise `limit` to see more)",
                self.rows.len()
            ));
        }
        contents
    }
}

/// Handler for query execution.
pub struct QueryToolHandler {
    executor: Arc<QueryExecutor>,
}

impl QueryToolHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn execute_query(&self, input: ExecuteQueryInput) -> DbResult<ExecuteQueryOutput> {
        sql_validator::validate_readonly(&input.query)?;

        let limit = sql_validator::clamp_limit(input.limit);
        let limited = sql_validator::apply_row_limit(&input.query, limit);
        debug!(
            rewritten = limited.is_rewritten(),
            limit,
            "Prepared read query"
        );

        // One extra row tells whether anything was cut off
        let limit = limit as usize;
        let mut rows = self
            .executor
            .run_query_limited(limited.sql(), Vec::new(), limit + 1)
            .await?;

        let truncated = rows.len() > limit;
        rows.truncate(limit);

        info!(rows = rows.len(), truncated, "Query executed");

        Ok(ExecuteQueryOutput {
            executed_sql: limited.sql().to_string(),
            query: input.query,
            rows,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_limit_defaults_to_ten() {
        let input: ExecuteQueryInput =
            serde_json::from_str(r#"{"query":"SELECT 1 FROM RDB$DATABASE"}"#).unwrap();
        assert_eq!(input.limit, 10);
    }

    #[test]
    fn test_output_text_blocks() {
        let output = ExecuteQueryOutput {
            query: "select id from t".into(),
            executed_sql: "SELECT FIRST 10 id from t".into(),
            rows: vec![Row::new().with("ID", 1i64)],
            truncated: false,
        };
        let contents = output.contents();
        assert_eq!(contents[0], "Query:\nselect id from t");
        assert_eq!(contents[1], "Query result:\n[\n  {\n    \"ID\": 1\n  }\n]");
        assert_eq!(contents.len(), 2);
    }

    #[test]
    fn test_truncated_output_says_so() {
        let output = ExecuteQueryOutput {
            query: "WITH X AS (SELECT 1 AS ID FROM RDB$DATABASE) SELECT ID FROM X".into(),
            executed_sql: "WITH X AS (SELECT 1 AS ID FROM RDB$DATABASE) SELECT ID FROM X".into(),
            rows: vec![Row::new().with("ID", 1i64)],
            truncated: true,
        };
        let contents = output.contents();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2], "(truncated to 1 rows; raise `limit` to see more)");
    }
}
