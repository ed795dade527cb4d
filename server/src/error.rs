//! Error types for relay framing, authentication and setup.

use std::{io, net::SocketAddr};

use thiserror::Error;

/// Errors encoding or decoding a relay command
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("body length {0} exceeds maximum of 65535")]
    BodyTooLong(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// SAFE_COOKIE handshake failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("read 256 auth types without seeing \\x00")]
    NoTerminator,

    #[error("server didn't offer auth type 1")]
    MethodNotOffered,

    #[error("failed to generate client nonce: {0}")]
    Nonce(String),

    #[error("mismatch in server hash")]
    ServerHashMismatch,

    #[error("server rejected authentication (status {0})")]
    Rejected(u8),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// USERADDR/TRANSPORT/DONE exchange failures
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("server returned DENY after our USERADDR and DONE")]
    Denied,

    #[error("server returned unknown command 0x{0:04x} after our USERADDR and DONE")]
    UnexpectedCommand(u16),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failure to obtain a ready relay connection
#[derive(Error, Debug)]
pub enum DialError {
    #[error("no ORPort or authenticated extended ORPort configured")]
    NoRelay,

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr:   SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("extended ORPort authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("extended ORPort setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
