//! Prompt templates exposed over MCP.

use rmcp::ErrorData as McpError;
use rmcp::model::{
    GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};

pub const SQL_QUERY: &str = "sql_query";

/// All prompts this server offers.
pub fn list() -> Vec<Prompt> {
    vec![Prompt::new(
        SQL_QUERY,
        Some("Present a SQL query to run against the Firebird database"),
        Some(vec![PromptArgument {
            name: "query".to_string(),
            title: None,
            description: Some("The SQL query to run".to_string()),
            required: Some(true),
        }]),
    )]
}

/// Instantiate a prompt by name.
pub fn get(name: &str, arguments: Option<&JsonObject>) -> Result<GetPromptResult, McpError> {
    match name {
        SQL_QUERY => {
            let query = arguments
                .and_then(|args| args.get("query"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    McpError::invalid_params("Missing required argument: query", None)
                })?;
            Ok(GetPromptResult {
                description: Some("SQL query".to_string()),
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::Assistant,
                    format!("Query:\n{}", query),
                )],
            })
        }
        other => Err(McpError::invalid_params(
            format!("Prompt not found: {}", other),
            None,
        )),
    }
}
