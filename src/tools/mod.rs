//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `ping`: Check that the database answers
//! - `schema`: `list_tables`, `tables_details`, `search_columns`
//! - `query`: Execute read-only queries (`execute_query`)
//! - `sql_validator`: Read-only policy and row limiting

pub mod ping;
pub mod query;
pub mod schema;
pub mod sql_validator;

pub use ping::{PingOutput, PingToolHandler};
pub use query::{ExecuteQueryInput, ExecuteQueryOutput, QueryToolHandler};
pub use schema::{
    ListTablesOutput, SchemaToolHandler, SearchColumnsInput, SearchColumnsOutput, TableDetails,
    TablesDetailsInput,
};

/// Text rendering of a successful tool result, one string per content block.
pub trait ToolText {
    fn contents(&self) -> Vec<String>;
}
