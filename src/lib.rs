//! Firebird MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to inspect and query a Firebird database through a small connection pool.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::FirebirdService;
