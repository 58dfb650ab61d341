//! MCP service implementation using rmcp.
//!
//! This module defines the FirebirdService struct with all database tools
//! exposed via the MCP protocol using the rmcp framework's macros.
//! Tool failures are answered with text flagged as an error, never as a
//! protocol fault.

use crate::config::FirebirdConfig;
use crate::db::QueryExecutor;
use crate::error::DbResult;
use crate::mcp::prompts;
use crate::tools::ToolText;
use crate::tools::ping::{self, PingToolHandler};
use crate::tools::query::{self, ExecuteQueryInput, QueryToolHandler};
use crate::tools::schema::{
    LIST_TABLES_ERROR_PREFIX, SEARCH_COLUMNS_ERROR_PREFIX, SchemaToolHandler, SearchColumnsInput,
    TABLES_DETAILS_ERROR_PREFIX, TablesDetailsInput,
};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, GetPromptRequestParam, GetPromptResult, Implementation,
        ListPromptsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities,
        ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct FirebirdService {
    /// Shared pool gateway for all database operations
    executor: Arc<QueryExecutor>,
    config: Arc<FirebirdConfig>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl FirebirdService {
    pub fn new(executor: Arc<QueryExecutor>, config: Arc<FirebirdConfig>) -> Self {
        Self {
            executor,
            config,
            tool_router: Self::tool_router(),
        }
    }
}

/// Turn a tool outcome into MCP content.
///
/// Errors become a single text block `"<prefix>\n<message>"` with
/// `is_error` set.
pub fn tool_response<T: ToolText>(
    tool: &'static str,
    result: DbResult<T>,
    error_prefix: &str,
) -> CallToolResult {
    match result {
        Ok(output) => {
            CallToolResult::success(output.contents().into_iter().map(Content::text).collect())
        }
        Err(e) => {
            warn!(tool, error = %e, suggestion = ?e.suggestion(), "Tool call failed");
            CallToolResult::error(vec![Content::text(format!("{}\n{}", error_prefix, e))])
        }
    }
}

#[tool_router]
impl FirebirdService {
    #[tool(description = "Check the connection to the Firebird database.")]
    async fn ping(&self) -> Result<CallToolResult, McpError> {
        let handler = PingToolHandler::new(self.executor.clone(), self.config.clone());
        Ok(tool_response("ping", handler.ping().await, ping::ERROR_PREFIX))
    }

    #[tool(description = "List all user tables in the Firebird database (system tables and views excluded).")]
    async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.executor.clone());
        Ok(tool_response(
            "list_tables",
            handler.list_tables().await,
            LIST_TABLES_ERROR_PREFIX,
        ))
    }

    #[tool(
        description = "Show the columns of a table: name, Firebird type code, length, nullability and description."
    )]
    async fn tables_details(
        &self,
        Parameters(input): Parameters<TablesDetailsInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.executor.clone());
        Ok(tool_response(
            "tables_details",
            handler.tables_details(input).await,
            TABLES_DETAILS_ERROR_PREFIX,
        ))
    }

    #[tool(
        description = "Execute a read-only SQL query and return the rows as JSON.\nINSERT, UPDATE, DELETE, CREATE, ALTER, DROP and TRUNCATE are rejected.\nA leading SELECT is limited with FIRST <limit> (default 10, max 10000)."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = QueryToolHandler::new(self.executor.clone());
        Ok(tool_response(
            "execute_query",
            handler.execute_query(input).await,
            query::ERROR_PREFIX,
        ))
    }

    #[tool(
        description = "Search columns by (partial) name across tables, optionally restricted to tables whose name contains `table`. Matching ignores case."
    )]
    async fn search_columns(
        &self,
        Parameters(input): Parameters<SearchColumnsInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = SchemaToolHandler::new(self.executor.clone());
        Ok(tool_response(
            "search_columns",
            handler.search_columns(input).await,
            SEARCH_COLUMNS_ERROR_PREFIX,
        ))
    }
}

#[tool_handler]
impl ServerHandler for FirebirdService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "firebird-mcp-server".to_owned(),
                title: Some("Firebird MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for exploring and querying a Firebird database.\n\
                \n\
                ## Workflow\n\
                1. Call `ping` to confirm the database is reachable\n\
                2. Call `list_tables`, then `tables_details` for the tables you need\n\
                3. Use `search_columns` to find where a column lives\n\
                4. Run read-only SQL with `execute_query`\n\
                \n\
                ## Firebird Notes\n\
                - Unquoted identifiers are stored in upper case (`CUSTOMER`, not `customer`)\n\
                - Row limits use `SELECT FIRST n`, not `LIMIT n`\n\
                - A single-row dummy table is available as `RDB$DATABASE`"
                    .to_string(),
            ),
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: prompts::list(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        info!(prompt = %request.name, "Getting prompt");
        prompts::get(&request.name, request.arguments.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;

    struct Lines(Vec<String>);

    impl ToolText for Lines {
        fn contents(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    fn texts(result: &CallToolResult) -> Vec<String> {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    #[test]
    fn test_success_keeps_blocks() {
        let result = tool_response(
            "t",
            Ok(Lines(vec!["a".into(), "b".into()])),
            "❌ Error:",
        );
        assert_eq!(result.is_error, Some(false));
        assert_eq!(texts(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_error_is_text_with_prefix() {
        let result = tool_response::<Lines>(
            "execute_query",
            Err(DbError::query("Dynamic SQL Error")),
            query::ERROR_PREFIX,
        );
        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            texts(&result),
            vec!["❌ Error executing query:\nDynamic SQL Error"]
        );
    }
}
