//! Error types for the request and script tasks.
//!
//! # Design
//! Every failure terminates the current invocation; nothing here is retried.
//! `Configuration` covers everything detected before a side effect happens
//! (bad parameters, unknown encodings, malformed URLs, unreadable trust
//! stores). `Remote` is a completed exchange with a non-2xx status.
//! Transport and I/O failures keep their original cause as `source()`.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the request executor and the script runner.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter is missing or invalid.
    #[error("{message}")]
    Configuration { message: String },

    /// Connecting, sending or receiving failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// Reading the response body or writing a destination failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a status outside 200..300.
    #[error("Response error: {status}, {reason}")]
    Remote { status: u16, reason: String },

    /// The script could not be compiled; it never ran.
    #[error("Failed to compile script file: {}: {message}", path.display())]
    ScriptCompilation { path: PathBuf, message: String },

    /// The script ran and failed.
    #[error("Script failed with {kind}: {message}")]
    ScriptRuntime { kind: String, message: String },
}

/// Coarse classification of [`Error`] for hosts that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Remote,
    ScriptCompilation,
    ScriptRuntime,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Transport(_) | Error::Io(_) => ErrorKind::Transport,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::ScriptCompilation { .. } => ErrorKind::ScriptCompilation,
            Error::ScriptRuntime { .. } => ErrorKind::ScriptRuntime,
        }
    }
}
