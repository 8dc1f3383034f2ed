//! Error types for pgsync.

use thiserror::Error;

/// Result type for pgsync operations.
pub type Result<T> = core::result::Result<T, Error>;

/// A structured error or notice reported by the backend.
///
/// Populated from the field-coded payload of an ErrorResponse or
/// NoticeResponse message. Fields the server did not send are `None`.
#[derive(Debug, Clone, Default)]
pub struct ServerError {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// SQLSTATE code (5 characters)
    pub code: Option<String>,
    /// Primary human-readable message
    pub message: Option<String>,
    /// Detailed explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the problem
    pub hint: Option<String>,
    /// 1-based cursor position in the query text
    pub position: Option<u32>,
    /// Remaining fields, keyed by the protocol field-type byte
    pub other: Vec<(u8, String)>,
}

impl ServerError {
    /// True for severities after which the backend tears the session down.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity.as_deref(), Some("FATAL") | Some("PANIC"))
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for pgsync.
#[derive(Debug, Error)]
pub enum Error {
    /// ErrorResponse from the backend
    #[error("server error: {0}")]
    Server(ServerError),

    /// Malformed frame, or a message the current state cannot accept
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket-layer failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials rejected, or authentication method unsupported
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Socket read deadline expired
    #[error("read timeout expired")]
    Timeout,

    /// Caller violated the API contract
    #[error("invalid usage: {0}")]
    Usage(String),

    /// A field value could not be decoded into the requested Rust type
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Returns true if the connection cannot be used after this error.
    ///
    /// Server errors are recoverable (the backend drains to ReadyForQuery)
    /// unless the reported severity is FATAL or PANIC.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Io(_) | Error::Timeout | Error::Protocol(_) | Error::Auth(_) => true,
            Error::Server(fields) => fields.is_fatal(),
            Error::Usage(_) | Error::Decode(_) => false,
        }
    }

    /// The SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => fields.code.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError {
            severity: Some("ERROR".into()),
            code: Some("42P01".into()),
            message: Some("relation \"nosuchtable\" does not exist".into()),
            ..Default::default()
        };
        let s = err.to_string();
        assert!(s.starts_with("ERROR: "));
        assert!(s.contains("42P01"));
    }

    #[test]
    fn fatal_classification() {
        let fatal = Error::Server(ServerError {
            severity: Some("FATAL".into()),
            ..Default::default()
        });
        assert!(fatal.is_fatal());

        let plain = Error::Server(ServerError {
            severity: Some("ERROR".into()),
            ..Default::default()
        });
        assert!(!plain.is_fatal());

        assert!(Error::Timeout.is_fatal());
        assert!(!Error::Usage("nope".into()).is_fatal());
    }

    #[test]
    fn timeout_from_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline");
        assert!(matches!(Error::from_io(io), Error::Timeout));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(Error::from_io(io), Error::Io(_)));
    }
}
