//! RCON module - authenticated command execution over TCP
//!
//! Provides the client side of the Source RCON protocol: connect,
//! authenticate once, then execute commands one at a time.

mod client;

pub use client::*;

use thiserror::Error;

use crate::protocol::CodecError;

/// RCON client errors
#[derive(Error, Debug)]
pub enum RconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timeout")]
    Timeout,

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("authentication rejected by server")]
    AuthenticationFailed,

    #[error("malformed frame: {0}")]
    Codec(#[from] CodecError),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("already authenticated")]
    AlreadyAuthenticated,

    #[error("command in progress")]
    CommandInProgress,

    #[error("session closed")]
    SessionClosed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type RconResult<T> = Result<T, RconError>;
