//! Remote helper error types.

use thiserror::Error;

/// Boxed error returned by [`Helper`](crate::Helper) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that end a remote helper session.
#[derive(Debug, Error)]
pub enum Error {
    /// A line violated the grammar of the current decoder state.
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// The input stream ended in the middle of a command.
    #[error("unexpected end of command stream")]
    UnexpectedEof,

    /// The helper failed to carry out a command.
    #[error("helper failed: {0}")]
    Helper(#[source] BoxError),

    /// The helper does not implement a command.
    #[error("unsupported command: {0}")]
    Unsupported(String),

    /// The session was cancelled before the command stream ended.
    #[error("session cancelled")]
    Cancelled,

    /// I/O error on the session streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a rejected `option` command.
///
/// Neither variant ends the session; both are reported to git on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// The option is not recognized (`unsupported`).
    #[error("unsupported option")]
    Unsupported,

    /// The option is known but the value is not valid (`error <message>`).
    #[error("{0}")]
    Invalid(String),
}

/// A specialized Result type for remote helper operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_command_display_quotes_line() {
        let err = Error::InvalidCommand("bogus line".to_string());
        assert_eq!(err.to_string(), "invalid command: \"bogus line\"");
    }

    #[test]
    fn test_helper_error_keeps_source() {
        let err = Error::Helper("remote hung up".into());
        assert_eq!(err.to_string(), "helper failed: remote hung up");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_option_error_display() {
        assert_eq!(OptionError::Unsupported.to_string(), "unsupported option");
        assert_eq!(
            OptionError::Invalid("expected a number".to_string()).to_string(),
            "expected a number"
        );
    }
}
