//! Error types for the Firebird MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Database errors never reach the MCP transport as protocol faults: the tool layer
//! renders them as text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// Driver-reported failure. The message is the driver's, unchanged.
    #[error("{message}")]
    Query { message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Only read queries (SELECT) are allowed: found {keyword}")]
    PolicyViolation { keyword: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error carrying the driver message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a read-only policy violation.
    pub fn policy_violation(keyword: impl Into<String>) -> Self {
        Self::PolicyViolation {
            keyword: keyword.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Timeout { .. } => {
                Some("Consider increasing the timeout or optimizing the operation")
            }
            _ => None,
        }
    }
}

impl From<rsfbclient::FbError> for DbError {
    fn from(err: rsfbclient::FbError) -> Self {
        DbError::query(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// A single invalid or missing configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigViolation {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- {}: {}", self.field, self.message)
    }
}

/// Startup-fatal configuration error listing every violation found.
#[derive(Error, Debug)]
#[error("Invalid Firebird configuration:\n{}", format_violations(.violations))]
pub struct ConfigError {
    pub violations: Vec<ConfigViolation>,
}

impl ConfigError {
    /// Names of the offending fields, in the order they were checked.
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
