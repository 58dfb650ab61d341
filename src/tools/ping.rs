//! Connectivity check tool.

use crate::config::FirebirdConfig;
use crate::db::{QueryExecutor, SchemaInspector};
use crate::error::DbResult;
use crate::tools::ToolText;
use std::sync::Arc;
use tracing::info;

pub const ERROR_PREFIX: &str = "❌ Error connecting to Firebird:";

/// Successful ping: where the server is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingOutput {
    pub host: String,
    pub database: String,
}

impl ToolText for PingOutput {
    fn contents(&self) -> Vec<String> {
        vec![format!(
            "✅ Connection to Firebird established successfully!\nHost: {}\nDatabase: {}",
            self.host, self.database
        )]
    }
}

pub struct PingToolHandler {
    executor: Arc<QueryExecutor>,
    config: Arc<FirebirdConfig>,
}

impl PingToolHandler {
    pub fn new(executor: Arc<QueryExecutor>, config: Arc<FirebirdConfig>) -> Self {
        Self { executor, config }
    }

    pub async fn ping(&self) -> DbResult<PingOutput> {
        SchemaInspector::ping(&self.executor).await?;
        info!(host = %self.config.host, database = %self.config.database, "Ping succeeded");
        Ok(PingOutput {
            host: self.config.host.clone(),
            database: self.config.database.clone(),
        })
    }
}
