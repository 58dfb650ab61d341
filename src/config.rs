//! Configuration handling for the Firebird MCP Server.
//!
//! Connection parameters and server options come from `--key value` command line
//! pairs (or `FIREBIRD_*` / `MCP_*` environment variables) overlaying static
//! defaults. Firebird connection fields are validated as a whole so that every
//! missing or malformed field is reported at once.

use crate::error::{ConfigError, ConfigViolation};
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8765;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_PAGE_SIZE: u32 = 4096;
pub const DEFAULT_POOL_SIZE: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const MIN_PAGE_SIZE: u32 = 1024;
const MAX_PAGE_SIZE: u32 = 32768;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events (for web clients)
    #[value(alias = "sse")]
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Validated Firebird connection parameters.
///
/// Built once at startup by [`Config::firebird_config`] and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct FirebirdConfig {
    pub host: String,
    pub port: u16,
    /// Database path or alias on the server.
    pub database: String,
    pub user: String,
    pub password: String,
    pub role: Option<String>,
    /// Lower-case column names in query results.
    pub lowercase_keys: bool,
    /// Only used when creating a database.
    pub page_size: u32,
}

impl std::fmt::Debug for FirebirdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebirdConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("role", &self.role)
            .field("lowercase_keys", &self.lowercase_keys)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Configuration for the Firebird MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "firebird-mcp-server",
    about = "MCP server for Firebird databases - lets AI assistants inspect and query a Firebird database",
    version,
    author
)]
pub struct Config {
    /// Firebird server host
    #[arg(long, env = "FIREBIRD_HOST")]
    pub host: Option<String>,

    /// Firebird server port
    #[arg(long, env = "FIREBIRD_PORT")]
    pub port: Option<String>,

    /// Database path or alias on the server
    #[arg(long, env = "FIREBIRD_DATABASE")]
    pub database: Option<String>,

    /// User name
    #[arg(long, env = "FIREBIRD_USER")]
    pub user: Option<String>,

    /// Password (prefer the FIREBIRD_PASSWORD environment variable)
    #[arg(long, env = "FIREBIRD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SQL role to connect with
    #[arg(long, env = "FIREBIRD_ROLE")]
    pub role: Option<String>,

    /// Lower-case column names in query results (true or false)
    #[arg(
        long = "lowercase_keys",
        alias = "lowercase-keys",
        value_name = "BOOL",
        env = "FIREBIRD_LOWERCASE_KEYS"
    )]
    pub lowercase_keys: Option<String>,

    /// Database page size (used only when creating a database)
    #[arg(
        long = "pageSize",
        alias = "page-size",
        value_name = "BYTES",
        env = "FIREBIRD_PAGE_SIZE"
    )]
    pub page_size: Option<String>,

    /// Transport mode (stdio or http; "sse" is accepted for http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Number of pooled database connections
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "MCP_POOL_SIZE")]
    pub pool_size: u32,

    /// Seconds to wait for a free pooled connection
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "MCP_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout: u64,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            role: None,
            lowercase_keys: None,
            page_size: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the Firebird connection fields.
    ///
    /// Every violation is collected before failing, so the error names all
    /// missing or malformed fields at once.
    pub fn firebird_config(&self) -> Result<FirebirdConfig, ConfigError> {
        let mut violations = Vec::new();

        let host = required_string("host", &self.host, &mut violations);
        let port = match self.port.as_deref().map(str::trim) {
            None => {
                violations.push(violation("port", "is required"));
                0
            }
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    violations.push(violation(
                        "port",
                        format!("must be a number between 1 and 65535, got {:?}", raw),
                    ));
                    0
                }
            },
        };
        let database = required_string("database", &self.database, &mut violations);
        let user = required_string("user", &self.user, &mut violations);
        let password = required_string("password", &self.password, &mut violations);

        let role = match self.role.as_deref().map(str::trim) {
            Some("") => {
                violations.push(violation("role", "must not be empty when given"));
                None
            }
            Some(role) => Some(role.to_string()),
            None => None,
        };

        let page_size = match self.page_size.as_deref().map(str::trim) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => match raw.parse::<u32>() {
                Ok(size) if is_valid_page_size(size) => size,
                _ => {
                    violations.push(violation(
                        "pageSize",
                        format!(
                            "must be a power of two between {} and {}, got {:?}",
                            MIN_PAGE_SIZE, MAX_PAGE_SIZE, raw
                        ),
                    ));
                    DEFAULT_PAGE_SIZE
                }
            },
        };

        let lowercase_keys = match self.lowercase_keys.as_deref().map(str::trim) {
            None => false,
            Some(raw) if raw.eq_ignore_ascii_case("true") => true,
            Some(raw) if raw.eq_ignore_ascii_case("false") => false,
            Some(raw) => {
                violations.push(violation(
                    "lowercase_keys",
                    format!("must be true or false, got {:?}", raw),
                ));
                false
            }
        };

        if self.pool_size == 0 {
            violations.push(violation("pool_size", "must be greater than 0"));
        }
        if self.acquire_timeout == 0 {
            violations.push(violation("acquire_timeout", "must be greater than 0"));
        }
        if self.query_timeout == 0 {
            violations.push(violation("query_timeout", "must be greater than 0"));
        }

        if !violations.is_empty() {
            return Err(ConfigError { violations });
        }

        Ok(FirebirdConfig {
            host,
            port,
            database,
            user,
            password,
            role,
            lowercase_keys,
            page_size,
        })
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the acquire timeout as a Duration.
    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn violation(field: &'static str, message: impl Into<String>) -> ConfigViolation {
    ConfigViolation {
        field,
        message: message.into(),
    }
}

fn required_string(
    field: &'static str,
    value: &Option<String>,
    violations: &mut Vec<ConfigViolation>,
) -> String {
    match value.as_deref().map(str::trim) {
        None => {
            violations.push(violation(field, "is required"));
            String::new()
        }
        Some("") => {
            violations.push(violation(field, "must not be empty"));
            String::new()
        }
        Some(v) => v.to_string(),
    }
}

fn is_valid_page_size(size: u32) -> bool {
    (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) && size.is_power_of_two()
}
