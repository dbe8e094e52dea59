//! Unified error handling for the client.

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, auth or server-side failure. The operation may succeed later.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Table, range or sheet identifier is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote refused the request itself. Retrying will not help.
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Engine error: {0}")]
    Engine(#[from] tabula_engine::Error),

    /// The remote answered with a body we could not understand.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// A request outlived the configured request timeout.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// True for failures caused by connectivity rather than by the request.
    ///
    /// Transport failures are queued for retry; everything else fails the
    /// operation outright.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transport_classification() {
        assert!(Error::Transport("connection refused".into()).is_transport());
        assert!(Error::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!Error::NotFound("Products".into()).is_transport());
        assert!(!Error::Decode("bad json".into()).is_transport());
        assert!(!Error::Engine(tabula_engine::Error::InvalidRow(0)).is_transport());
    }
}
