//! Error types for zero-mariadb.

use thiserror::Error;

use crate::completion::{Completion, Reply};

/// Result type for zero-mariadb operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Update count reported for a batch row whose outcome is unknown.
pub const SUCCESS_NO_INFO: i64 = -2;

/// SQLSTATE reported for bind-position errors.
pub const SQLSTATE_PARAMETER_NOT_SET: &str = "07004";

/// Error reported by the server in an ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Server error number (e.g. 1062 for a duplicate key)
    pub code: u16,
    /// SQLSTATE (5 characters), `HY000` when the server sent none
    pub sql_state: String,
    /// Human readable message
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) [{}] {}", self.code, self.sql_state, self.message)
    }
}

/// Aggregate failure of `execute_batch`.
///
/// The first error encountered is kept as the source. `completions` holds the
/// outcomes that are known to have succeeded, in submission order.
#[derive(Debug)]
pub struct BatchError {
    completions: Vec<Completion>,
    batch_size: usize,
    failed_rows: Vec<usize>,
    source: Box<Error>,
}

impl BatchError {
    pub(crate) fn new(
        completions: Vec<Completion>,
        batch_size: usize,
        failed_rows: Vec<usize>,
        source: Error,
    ) -> Self {
        Self {
            completions,
            batch_size,
            failed_rows,
            source: Box::new(source),
        }
    }

    /// Completions gathered before (and after, for continue-on-error) the failure.
    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    /// Number of parameter sets in the failed batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Zero-based rows known to have failed. Empty when the failure cannot be
    /// attributed to a row (pipelined and bulk exchanges).
    pub fn failed_rows(&self) -> &[usize] {
        &self.failed_rows
    }

    /// The first underlying error.
    pub fn cause(&self) -> &Error {
        &self.source
    }

    /// Take the partial completions and the first underlying error.
    pub fn into_parts(self) -> (Vec<Completion>, Error) {
        (self.completions, *self.source)
    }

    /// Per-row outcome vector, always `batch_size` long.
    ///
    /// Rows with a known update completion report their affected row count.
    /// Failed rows, row-producing rows, and rows that cannot be attributed
    /// report [`SUCCESS_NO_INFO`].
    pub fn update_counts(&self) -> Vec<i64> {
        let mut counts = vec![SUCCESS_NO_INFO; self.batch_size];
        if self.completions.len() + self.failed_rows.len() != self.batch_size {
            return counts;
        }
        let mut completions = self.completions.iter();
        for (idx, slot) in counts.iter_mut().enumerate() {
            if self.failed_rows.contains(&idx) {
                continue;
            }
            if let Some(completion) = completions.next() {
                *slot = completion.update_count();
            }
        }
        counts
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} batch rows completed: {}",
            self.completions.len(),
            self.batch_size,
            self.source
        )
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Server error in an exchange that also produced replies.
///
/// The server acted on every command that did not fail, so replies such as a
/// prepared statement id are kept and handed back with the error.
#[derive(Debug)]
pub struct ExchangeError {
    replies: Vec<Reply>,
    source: Box<Error>,
}

impl ExchangeError {
    pub(crate) fn new(replies: Vec<Reply>, source: Error) -> Self {
        Self {
            replies,
            source: Box::new(source),
        }
    }

    /// Replies read from the exchange, in send order.
    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    /// The first server error.
    pub fn cause(&self) -> &Error {
        &self.source
    }

    /// Take the replies and the first server error.
    pub fn into_parts(self) -> (Vec<Reply>, Error) {
        (self.replies, *self.source)
    }
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Error type for zero-mariadb.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("MariaDB error: {0}")]
    Server(ServerError),

    /// Protocol error (malformed message, unexpected response, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation on a statement that was already closed
    #[error("Statement is already closed")]
    AlreadyClosed,

    /// Missing, unset or extra bind parameter
    #[error("Parameter binding error: {0}")]
    ParameterBinding(String),

    /// Server error with the replies read alongside it
    #[error("{0}")]
    Exchange(ExchangeError),

    /// Aggregate failure of a batch execution
    #[error("Batch error: {0}")]
    Batch(BatchError),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Invalid usage (e.g., malformed options)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionBroken => true,
            Error::Batch(batch) => batch.cause().is_connection_broken(),
            Error::Exchange(exchange) => exchange.cause().is_connection_broken(),
            _ => false,
        }
    }

    /// Returns true if the server answered with an ERR packet. The reply
    /// stream was read to the end, so the session is still in sync.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Server(_) => true,
            Error::Exchange(exchange) => exchange.cause().is_server_error(),
            _ => false,
        }
    }

    /// Get the SQLSTATE code if the error carries one.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(err) => Some(&err.sql_state),
            Error::ParameterBinding(_) => Some(SQLSTATE_PARAMETER_NOT_SET),
            Error::Batch(batch) => batch.cause().sqlstate(),
            Error::Exchange(exchange) => exchange.cause().sqlstate(),
            _ => None,
        }
    }

    /// Get the server error number if this is a server error.
    pub fn error_code(&self) -> Option<u16> {
        match self {
            Error::Server(err) => Some(err.code),
            Error::Batch(batch) => batch.cause().error_code(),
            Error::Exchange(exchange) => exchange.cause().error_code(),
            _ => None,
        }
    }

    /// Get the aggregate batch error, if any.
    pub fn as_batch(&self) -> Option<&BatchError> {
        match self {
            Error::Batch(batch) => Some(batch),
            _ => None,
        }
    }
}

impl From<BatchError> for Error {
    fn from(err: BatchError) -> Self {
        Error::Batch(err)
    }
}

impl From<ExchangeError> for Error {
    fn from(err: ExchangeError) -> Self {
        Error::Exchange(err)
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
