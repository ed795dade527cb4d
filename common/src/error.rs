//! Negotiation error types.

use std::{fmt, io};

use thiserror::Error;

use crate::line::format_line;

/// Result type alias for negotiation entry points.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that is reported to the controlling process as a control line.
///
/// `Display` renders the exact line that is written for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Missing or malformed configuration (`ENV-ERROR`)
    Env(String),

    /// No mutually supported protocol version (`VERSION-ERROR`)
    Version(String),

    /// A client transport failed to start (`CMETHOD-ERROR`)
    ClientMethod {
        /// Transport method name
        method:  String,
        /// Human-readable reason
        message: String,
    },

    /// A server transport failed to start (`SMETHOD-ERROR`)
    ServerMethod {
        /// Transport method name
        method:  String,
        /// Human-readable reason
        message: String,
    },
}

impl NegotiationError {
    /// Creates an `ENV-ERROR`
    pub fn env(message: impl Into<String>) -> Self {
        Self::Env(message.into())
    }

    /// Creates a `VERSION-ERROR`
    pub fn version(message: impl Into<String>) -> Self {
        Self::Version(message.into())
    }

    /// The control-line keyword for this error
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Env(_) => "ENV-ERROR",
            Self::Version(_) => "VERSION-ERROR",
            Self::ClientMethod { .. } => "CMETHOD-ERROR",
            Self::ServerMethod { .. } => "SMETHOD-ERROR",
        }
    }

    /// The unescaped control-line arguments for this error
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::Env(msg) | Self::Version(msg) => vec![msg.as_str()],
            Self::ClientMethod { method, message } | Self::ServerMethod { method, message } => {
                vec![method.as_str(), message.as_str()]
            }
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_line(self.keyword(), &self.args()))
    }
}

impl std::error::Error for NegotiationError {}

/// Failure of a negotiation step.
///
/// Either the step itself failed (and its error line was written), or the
/// control channel could not be written at all.
#[derive(Debug, Error)]
pub enum Error {
    /// The negotiation step failed; the matching line was emitted
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// Writing or flushing the control channel failed
    #[error("failed to write control line: {0}")]
    Control(#[from] io::Error),
}

impl Error {
    /// The negotiation error, if this failure carries one
    pub fn negotiation(&self) -> Option<&NegotiationError> {
        match self {
            Self::Negotiation(err) => Some(err),
            Self::Control(_) => None,
        }
    }
}
