//! Catalog tools.
//!
//! This module implements the `list_tables`, `tables_details` and
//! `search_columns` MCP tools.

use crate::db::types::rows_to_pretty_json;
use crate::db::{ColumnDefinition, QueryExecutor, Row, SchemaInspector};
use crate::db::schema::queries;
use crate::error::DbResult;
use crate::tools::ToolText;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const LIST_TABLES_ERROR_PREFIX: &str = "❌ Error listing tables:";
pub const TABLES_DETAILS_ERROR_PREFIX: &str = "❌ Error listing table details:";
pub const SEARCH_COLUMNS_ERROR_PREFIX: &str = "❌ Error searching columns:";

const DETAILS_RULE: &str = "----------------------------------------";

/// Input for the tables_details tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TablesDetailsInput {
    /// Table name to get details
    pub table_name: String,
}

/// Input for the search_columns tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchColumnsInput {
    /// The table name to search columns
    #[serde(default)]
    pub table: Option<String>,
    /// The column name to search (can be partial)
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTablesOutput {
    pub tables: Vec<String>,
}

impl ToolText for ListTablesOutput {
    fn contents(&self) -> Vec<String> {
        let mut text = String::from("Tables found in the Firebird database:\n\n");
        for table in &self.tables {
            text.push_str(table);
            text.push('\n');
        }
        vec![text]
    }
}

/// Result of `tables_details`. An unknown table is an ordinary outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDetails {
    Found {
        table: String,
        columns: Vec<ColumnDefinition>,
    },
    NotFound {
        table: String,
    },
}

impl ToolText for TableDetails {
    fn contents(&self) -> Vec<String> {
        match self {
            Self::NotFound { table } => vec![format!("❌ Table \"{}\" not found.", table)],
            Self::Found { table, columns } => {
                let mut output = format!("Table Details: {}\n{}\n\n", table, DETAILS_RULE);
                for column in columns {
                    output.push_str(&column.to_string());
                    output.push('\n');
                }
                vec![output]
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchColumnsOutput {
    pub rows: Vec<Row>,
}

impl ToolText for SearchColumnsOutput {
    fn contents(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return vec!["No columns found with the specified criteria.".to_string()];
        }
        vec![
            format!("Query:\n{}", queries::SEARCH_COLUMNS),
            format!("Columns found:\n{}", rows_to_pretty_json(&self.rows)),
        ]
    }
}

pub struct SchemaToolHandler {
    executor: Arc<QueryExecutor>,
}

impl SchemaToolHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn list_tables(&self) -> DbResult<ListTablesOutput> {
        let tables = SchemaInspector::list_tables(&self.executor).await?;
        info!(count = tables.len(), "Listed tables");
        Ok(ListTablesOutput { tables })
    }

    pub async fn tables_details(&self, input: TablesDetailsInput) -> DbResult<TableDetails> {
        let table = input.table_name;
        let columns = SchemaInspector::table_columns(&self.executor, table.trim()).await?;

        if columns.is_empty() {
            info!(table = %table, "Table not found");
            return Ok(TableDetails::NotFound { table });
        }

        info!(table = %table, columns = columns.len(), "Described table");
        Ok(TableDetails::Found { table, columns })
    }

    pub async fn search_columns(&self, input: SearchColumnsInput) -> DbResult<SearchColumnsOutput> {
        let rows =
            SchemaInspector::search_columns(&self.executor, input.table.as_deref(), &input.column)
                .await?;
        info!(matches = rows.len(), "Searched columns");
        Ok(SearchColumnsOutput { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tables_text() {
        let output = ListTablesOutput {
            tables: vec!["COUNTRY".into(), "CUSTOMER".into()],
        };
        assert_eq!(
            output.contents(),
            vec!["Tables found in the Firebird database:\n\nCOUNTRY\nCUSTOMER\n".to_string()]
        );
    }

    #[test]
    fn test_not_found_text() {
        let details = TableDetails::NotFound {
            table: "NOPE".into(),
        };
        assert_eq!(details.contents(), vec!["❌ Table \"NOPE\" not found.".to_string()]);
    }

    #[test]
    fn test_details_text() {
        let details = TableDetails::Found {
            table: "COUNTRY".into(),
            columns: vec![
                ColumnDefinition {
                    name: "COUNTRY".into(),
                    data_type: Some(37),
                    length: Some(15),
                    not_null: true,
                    description: None,
                },
                ColumnDefinition {
                    name: "CURRENCY".into(),
                    data_type: Some(37),
                    length: Some(10),
                    not_null: false,
                    description: Some("ISO code".into()),
                },
            ],
        };
        assert_eq!(
            details.contents()[0],
            "Table Details: COUNTRY\n\
             ----------------------------------------\n\n\
             COUNTRY (37, 15) NOT NULL\n\
             CURRENCY (37, 10) NULL - ISO code\n"
        );
    }

    #[test]
    fn test_search_columns_input_table_is_optional() {
        let input: SearchColumnsInput = serde_json::from_str(r#"{"column":"id"}"#).unwrap();
        assert!(input.table.is_none());
        assert_eq!(input.column, "id");
    }

    #[test]
    fn test_empty_search_text() {
        let output = SearchColumnsOutput { rows: Vec::new() };
        assert_eq!(
            output.contents(),
            vec!["No columns found with the specified criteria.".to_string()]
        );
    }
}
