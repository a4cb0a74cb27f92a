use std::error::Error;
use std::io;
use thiserror::Error;

/// Boxed error returned by inner handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("no acceptable content-encoding for: {accept_encoding:?}")]
    NotAcceptable { accept_encoding: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("handler error: {source}")]
    Handler { source: BoxError },
}

impl BufferError {
    pub fn not_acceptable<S: ToString>(accept_encoding: S) -> Self {
        Self::NotAcceptable { accept_encoding: accept_encoding.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    /// Returns true when the request was rejected during negotiation.
    pub fn is_not_acceptable(&self) -> bool {
        matches!(self, Self::NotAcceptable { .. })
    }
}
