//! Error taxonomy shared by the HTTP client and the upload engine.

use reqwest::StatusCode;
use std::io;
use thiserror::Error;

/// Everything that can go wrong while talking to Shock.
#[derive(Debug, Error)]
pub enum ShockError {
    /// A required construction parameter is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store answered with a non-2xx status.
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<StatusCode>,
        message: String,
    },

    /// The request never produced a response (connect, TLS, body read...).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response did not have the expected shape.
    #[error("unexpected response from store: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading the local file failed.
    #[error("error during upload at chunk {chunk}: {source}")]
    FileRead {
        chunk: u64,
        #[source]
        source: io::Error,
    },
}

pub type ShockResult<T> = Result<T, ShockError>;

impl ShockError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(status: Option<StatusCode>, msg: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: msg.into(),
        }
    }

    /// True for failures of the network round trip itself, as opposed to
    /// local problems (configuration, file reads).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Http(_) | Self::Decode(_))
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}

fn transport_message(status: &Option<StatusCode>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {}: {}", status.as_u16(), message),
        None => message.to_string(),
    }
}
