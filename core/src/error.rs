//! Error types for the webservice client.
//!
//! # Design
//! Every failure of a request reaches the caller through the one `Err`
//! channel handed to its completion callback. `RequestConstruction` covers
//! problems found before anything is dispatched, `Transport` covers the
//! network round-trip (timeouts included), and `Parse` wraps whatever the
//! resource's parser returned.

use thiserror::Error;

use crate::transport::TransportError;

/// Boxed error returned by parsers and third-party transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a request: `Ok` is success, `Err` is failure.
pub type Result<T> = std::result::Result<T, WebserviceError>;

#[derive(Debug, Error)]
pub enum WebserviceError {
    /// The request could not be built: invalid URL or unserializable body.
    #[error("request construction failed: {0}")]
    RequestConstruction(String),

    /// The round-trip failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response arrived but the resource's parser rejected it.
    #[error("failed to parse response: {0}")]
    Parse(#[source] BoxError),

    /// The default callback thread could not be started.
    #[error("failed to start callback queue: {0}")]
    CallbackQueue(#[source] std::io::Error),

    /// The default transport's worker threads could not be started.
    #[error("failed to start transport workers: {0}")]
    TransportWorkers(#[source] std::io::Error),
}

impl WebserviceError {
    pub fn is_transport(&self) -> bool {
        matches!(self, WebserviceError::Transport(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, WebserviceError::Parse(_))
    }
}
