//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver seam and the Firebird binding
//! - Connection pool management
//! - Pool gateway (queries, statements, transactions)
//! - Catalog introspection
//! - Result row types

pub mod driver;
pub mod executor;
pub mod firebird;
pub mod pool;
pub mod schema;
pub mod types;

pub use driver::{Connection, Connector};
pub use executor::{QueryExecutor, Transaction};
pub use firebird::FirebirdConnector;
pub use pool::{Pool, PoolOptions, PoolStatus, PooledConnection};
pub use schema::{ColumnDefinition, SchemaInspector};
pub use types::{Row, SqlValue};
