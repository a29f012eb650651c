// Domain error types

use std::time::Duration;

/// A single telemetry sub-query failed. Always recovered by degrading the field group.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{probe} query failed: {message}")]
    Query {
        probe: &'static str,
        message: String,
    },
    #[error("{probe} timed out after {timeout:?}")]
    Timeout {
        probe: &'static str,
        timeout: Duration,
    },
    #[error("command `{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command `{command}` exited with {status}")]
    CommandStatus { command: String, status: String },
    #[error("{probe} task join: {source}")]
    Join {
        probe: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ProbeError {
    pub fn query(probe: &'static str, message: impl Into<String>) -> Self {
        ProbeError::Query {
            probe,
            message: message.into(),
        }
    }
}

/// Failure of one registry resolution step. Triggers the next step of the fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("not authenticated with the directory service")]
    NotAuthenticated,
    #[error("directory service rejected the session token (HTTP {0})")]
    Unauthorized(u16),
    #[error("directory service returned HTTP {0}")]
    Status(u16),
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cache file {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file {path} is not a valid application list: {source}")]
    CacheParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
