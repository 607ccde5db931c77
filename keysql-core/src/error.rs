use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Grammar errors
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // Field / option errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    // Transaction protocol errors
    #[error("there is an ongoing transaction, new transaction/statement or fetching result is not allowed")]
    TransactionInProgress,

    #[error("no transaction is in progress")]
    NoTransaction,

    #[error("invalid transaction stage")]
    InvalidTransactionStage,

    #[error("transaction is being committed")]
    TransactionCommitting,

    #[error("transaction is being rolled back")]
    TransactionRollingBack,

    // Remote errors
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource in use: {0}")]
    ResourceInUse(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    #[error("Transaction canceled: {0}")]
    TransactionCanceled(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Remote error: {0}")]
    Remote(String),

    // Codec errors
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidQuery(_) => "INVALID_QUERY",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Unsupported(_) => "UNSUPPORTED",
            Error::TransactionInProgress => "TRANSACTION_IN_PROGRESS",
            Error::NoTransaction => "NO_TRANSACTION",
            Error::InvalidTransactionStage => "INVALID_TRANSACTION_STAGE",
            Error::TransactionCommitting => "TRANSACTION_COMMITTING",
            Error::TransactionRollingBack => "TRANSACTION_ROLLING_BACK",
            Error::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            Error::ResourceInUse(_) => "RESOURCE_IN_USE",
            Error::Throttled(_) => "THROTTLED",
            Error::ConditionalCheckFailed(_) => "CONDITIONAL_CHECK_FAILED",
            Error::TransactionCanceled(_) => "TRANSACTION_CANCELED",
            Error::Connection(_) => "CONNECTION_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Remote(_) => "REMOTE_ERROR",
            Error::Codec(_) => "CODEC_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error is potentially retryable.
    ///
    /// Nothing in this workspace retries; the classification is for callers
    /// that layer their own retry policy on top of a connection.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Throttled(_) => true,
            Error::Connection(_) => true,
            Error::Timeout(_) => true,
            Error::TransactionCanceled(_) => true,

            Error::InvalidQuery(_)
            | Error::InvalidArgument(_)
            | Error::Unsupported(_)
            | Error::TransactionInProgress
            | Error::NoTransaction
            | Error::InvalidTransactionStage
            | Error::TransactionCommitting
            | Error::TransactionRollingBack
            | Error::ResourceNotFound(_)
            | Error::ResourceInUse(_)
            | Error::ConditionalCheckFailed(_)
            | Error::Remote(_)
            | Error::Codec(_)
            | Error::Internal(_) => false,
        }
    }

    /// True for errors raised by the remote executor rather than detected locally.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::ResourceNotFound(_)
                | Error::ResourceInUse(_)
                | Error::Throttled(_)
                | Error::ConditionalCheckFailed(_)
                | Error::TransactionCanceled(_)
                | Error::Connection(_)
                | Error::Timeout(_)
                | Error::Remote(_)
        )
    }

    /// The remote "resource not found" condition, masked by `IF EXISTS`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ResourceNotFound(_))
    }

    /// The remote "resource already exists" condition, masked by `IF NOT EXISTS`.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::ResourceInUse(_))
    }

    /// Adds context to an error by wrapping it in an Internal error.
    ///
    /// # Examples
    ///
    /// ```
    /// use keysql_core::Error;
    ///
    /// let err = Error::Remote("socket closed".into()).with_context("fetching page");
    /// assert_eq!(err.to_string(), "Internal error: fetching page: Remote error: socket closed");
    /// ```
    pub fn with_context(self, context: &str) -> Error {
        Error::Internal(format!("{}: {}", context, self))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidQuery("q".into()).code(), "INVALID_QUERY");
        assert_eq!(Error::NoTransaction.code(), "NO_TRANSACTION");
        assert_eq!(Error::ResourceInUse("t".into()).code(), "RESOURCE_IN_USE");
        assert_eq!(Error::Codec("c".into()).code(), "CODEC_ERROR");
    }

    #[test]
    fn test_idempotency_conditions() {
        assert!(Error::ResourceNotFound("t".into()).is_not_found());
        assert!(!Error::ResourceNotFound("t".into()).is_already_exists());
        assert!(Error::ResourceInUse("t".into()).is_already_exists());
        assert!(!Error::Throttled("t".into()).is_not_found());
    }

    #[test]
    fn test_local_errors_are_not_remote() {
        assert!(!Error::InvalidQuery("x".into()).is_remote());
        assert!(!Error::TransactionInProgress.is_remote());
        assert!(!Error::Codec("x".into()).is_remote());
        assert!(Error::Throttled("x".into()).is_remote());
        assert!(Error::Throttled("x".into()).is_retryable());
        assert!(!Error::ConditionalCheckFailed("x".into()).is_retryable());
    }
}
