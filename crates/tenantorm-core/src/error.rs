//! Error types for tenantorm operations.

use crate::tenant::TenantId;
use std::fmt;

/// The primary error type for all tenantorm operations.
///
/// Not-found is never represented here: reads return `Option`, `bool` or an
/// empty `Vec` instead.
#[derive(Debug)]
pub enum Error {
    /// Misuse of the API: unknown field path, closed session, bad model metadata
    Config(ConfigError),
    /// Tenant authorization failed before a write reached the backend
    Unauthorized(AuthorizationError),
    /// Backend query execution errors
    Query(QueryError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Type conversion errors
    Type(TypeError),
    /// Custom error with message (typically raised from a lifecycle hook)
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

/// A write was rejected by the tenant authorization policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    pub table: &'static str,
    pub operation: &'static str,
    pub entity_tenant: Option<TenantId>,
    pub session_tenant: Option<TenantId>,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub table: Option<String>,
    pub statement: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Table or column not known to the backend
    NotFound,
    /// Constraint violation (duplicate key, missing row on update)
    Constraint,
    /// Raw statement has no registered handler
    Unsupported,
    /// Other backend error
    Database,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            statement: None,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// begin() while a transaction is already active
    AlreadyActive,
    /// commit()/rollback() without an active transaction
    NotActive,
    /// Nested transaction not supported
    NestedNotSupported,
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }

    /// Is this a tenant authorization failure?
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// Is this an API misuse error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Is this a backend failure?
    pub fn is_query(&self) -> bool {
        matches!(self, Error::Query(_))
    }
}

fn fmt_tenant(tenant: Option<TenantId>) -> String {
    tenant.map_or_else(|| "none".to_string(), |t| t.to_string())
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Unauthorized(e) => write!(f, "Authorization error: {}", e),
            Error::Query(e) => {
                if let Some(table) = &e.table {
                    write!(f, "Query error on '{}': {}", table, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on '{}' denied: entity tenant {} is not authorized for session tenant {}",
            self.operation,
            self.table,
            fmt_tenant(self.entity_tenant),
            fmt_tenant(self.session_tenant)
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<AuthorizationError> for Error {
    fn from(err: AuthorizationError) -> Self {
        Error::Unauthorized(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError {
            message: format!("invalid configuration: {}", err),
            source: Some(Box::new(err)),
        })
    }
}

/// Result type alias for tenantorm operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_display_names_both_tenants() {
        let err = Error::Unauthorized(AuthorizationError {
            table: "orders",
            operation: "save",
            entity_tenant: Some(TenantId(2)),
            session_tenant: Some(TenantId(1)),
        });
        assert!(err.is_authorization());
        let msg = err.to_string();
        assert!(msg.contains("orders"));
        assert!(msg.contains("tenant 2"));
        assert!(msg.contains("tenant 1"));
    }

    #[test]
    fn query_error_builder() {
        let err: Error = QueryError::new(QueryErrorKind::NotFound, "no such column 'x'")
            .with_table("users")
            .into();
        assert!(err.is_query());
        assert_eq!(err.to_string(), "Query error on 'users': no such column 'x'");
    }

    #[test]
    fn serde_errors_become_config_errors() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(err.is_config());
        assert!(std::error::Error::source(&err).is_some());
    }
}
