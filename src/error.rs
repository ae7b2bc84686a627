//! Error types for the order lookup service

use thiserror::Error;

use crate::domain::ValidationError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the order lookup service
#[derive(Error, Debug)]
pub enum Error {
    /// No order stored under the requested identifier
    #[error("order not found")]
    OrderNotFound,

    /// The store holds no orders at all
    #[error("orders not found")]
    OrdersNotFound,

    /// The operation observed a cancelled token
    #[error("{0} cancelled")]
    Cancelled(&'static str),

    /// Order failed structural validation
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// Payload could not be decoded into an order
    #[error("failed to decode order: {0}")]
    Decode(#[from] serde_json::Error),

    /// PostgreSQL error
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error wrapped with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the name of the failing operation.
    pub fn context(self, context: &'static str) -> Self {
        Error::Context {
            context,
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers stripped.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when the order (or the whole order set) is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::OrderNotFound | Error::OrdersNotFound)
    }

    /// True when the operation stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Error::Cancelled(_))
    }
}
