//! Error types for the MySQL registry.
//!
//! Two families live here:
//! - [`DbError`]: registry and lifecycle failures (registration, lookup,
//!   health check, shutdown). Returned to the immediate caller, never logged
//!   automatically.
//! - [`SqlError`]: statement outcomes. These are owned types converted from the
//!   driver's errors at the boundary so the public contract does not expose
//!   `sqlx` types.
//!
//! The classification helpers ([`check_affected`], [`is_duplicate_key`],
//! [`is_no_rows`], [`as_engine_error`]) operate on [`SqlError`].

use crate::models::ExecResult;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// MySQL `ER_DUP_ENTRY`.
pub const DUPLICATE_KEY_CODE: u16 = 1062;

/// Synthesized code for a statement that ran but changed nothing.
pub const ZERO_ROWS_AFFECTED_CODE: u16 = 1404;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database '{name}' is not registered")]
    NotRegistered { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Health check failed: {}", FailureList(failures))]
    Unhealthy {
        /// Per-pool probe failures, keyed by logical name.
        failures: BTreeMap<String, SqlError>,
    },

    #[error("Failed to close: {}", FailureList(failures))]
    Close { failures: BTreeMap<String, SqlError> },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a not-registered error.
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::NotRegistered { name: name.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Names of the pools that failed, for aggregate errors.
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            Self::Unhealthy { failures } | Self::Close { failures } => {
                failures.keys().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Renders `name: error; name: error` in name order.
struct FailureList<'a>(&'a BTreeMap<String, SqlError>);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{name}: {err}")?;
        }
        Ok(())
    }
}

/// Result type alias for registry operations.
pub type DbResult<T> = Result<T, DbError>;

/// An error reported by the MySQL server itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error {code}: {message}")]
pub struct EngineError {
    /// Server error number, e.g. 1062.
    pub code: u16,
    /// Five-character SQLSTATE, when the server sent one.
    pub sql_state: Option<String>,
    pub message: String,
}

impl EngineError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            sql_state: None,
            message: message.into(),
        }
    }
}

/// Outcome of a failed statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    /// The driver declined the fast path; the caller should fall back.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// The connection is unusable and must be discarded.
    #[error("driver: bad connection")]
    BadConn,

    #[error("no rows in result set")]
    NoRows,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("[{}]RowsAffected is 0", ZERO_ROWS_AFFECTED_CODE)]
    ZeroRowsAffected,

    #[error("statement exceeded its deadline")]
    Timeout,

    #[error("statement cancelled before it ran")]
    Cancelled,

    /// No connection could be taken from the pool in time.
    #[error("failed to acquire a connection: {message}")]
    Acquire { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl SqlError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn acquire(message: impl Into<String>) -> Self {
        Self::Acquire {
            message: message.into(),
        }
    }

    /// True for the two driver-protocol signals that must pass through the
    /// instrumentation layer untouched and unlogged.
    pub fn is_driver_signal(&self) -> bool {
        matches!(self, Self::Skip | Self::BadConn)
    }

    /// Narrow to the server-reported error, if this is one.
    pub fn as_engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }

    /// Classify this error into one of the typed outcomes callers branch on.
    pub fn classify(&self) -> ClassifiedError {
        let kind = if is_duplicate_key(self) {
            ErrorKind::DuplicateKey
        } else {
            match self {
                Self::NoRows => ErrorKind::NoRows,
                Self::ZeroRowsAffected => ErrorKind::ZeroRowsAffected,
                _ => ErrorKind::Unclassified,
            }
        };
        let code = match self {
            Self::Engine(e) => u32::from(e.code),
            Self::ZeroRowsAffected => u32::from(ZERO_ROWS_AFFECTED_CODE),
            _ => 0,
        };
        let message = match self {
            Self::Engine(e) => e.message.clone(),
            Self::ZeroRowsAffected => "RowsAffected is 0".to_string(),
            other => other.to_string(),
        };
        ClassifiedError {
            kind,
            code,
            message,
        }
    }
}

/// Typed outcome categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateKey,
    NoRows,
    ZeroRowsAffected,
    Unclassified,
}

/// An immutable classification of a [`SqlError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    kind: ErrorKind,
    code: u32,
    message: String,
}

impl ClassifiedError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Engine error number, 1404 for zero rows affected, 0 otherwise.
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.code, self.message)
    }
}

impl From<&SqlError> for ClassifiedError {
    fn from(err: &SqlError) -> Self {
        err.classify()
    }
}

/// Convert sqlx errors to SqlError.
impl From<sqlx::Error> for SqlError {
    fn from(err: sqlx::Error) -> Self {
        use std::io::ErrorKind as Io;

        match err {
            sqlx::Error::RowNotFound => SqlError::NoRows,
            sqlx::Error::Database(db_err) => {
                match db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                    Some(mysql_err) => SqlError::Engine(EngineError {
                        code: mysql_err.number(),
                        sql_state: mysql_err.code().map(str::to_string),
                        message: mysql_err.message().to_string(),
                    }),
                    None => SqlError::transport(db_err.message()),
                }
            }
            sqlx::Error::Io(io_err)
                if matches!(
                    io_err.kind(),
                    Io::BrokenPipe | Io::ConnectionReset | Io::ConnectionAborted | Io::UnexpectedEof
                ) =>
            {
                SqlError::BadConn
            }
            sqlx::Error::PoolTimedOut => SqlError::acquire("pool timed out"),
            sqlx::Error::ColumnDecode { index, source } => {
                SqlError::decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => SqlError::decode(source.to_string()),
            other => SqlError::transport(other.to_string()),
        }
    }
}

/// Turn a successful statement that changed nothing into
/// [`SqlError::ZeroRowsAffected`].
///
/// Errors pass through unchanged, so callers can tell "ran and changed
/// nothing" apart from "failed to run".
pub fn check_affected(result: Result<ExecResult, SqlError>) -> Result<ExecResult, SqlError> {
    let result = result?;
    if result.rows_affected == 0 {
        return Err(SqlError::ZeroRowsAffected);
    }
    Ok(result)
}

/// True iff `err` is a server error with code 1062 (`ER_DUP_ENTRY`).
pub fn is_duplicate_key(err: &SqlError) -> bool {
    err.as_engine().is_some_and(|e| e.code == DUPLICATE_KEY_CODE)
}

/// True iff `err` is the "no rows" outcome.
pub fn is_no_rows(err: &SqlError) -> bool {
    matches!(err, SqlError::NoRows)
}

/// Narrow an optional error to the server-reported error.
pub fn as_engine_error(err: Option<&SqlError>) -> Option<&EngineError> {
    err.and_then(SqlError::as_engine)
}
