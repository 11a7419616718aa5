use std::io;
use std::path::PathBuf;

use thiserror::Error;

// Fatal errors surfaced to the session driver
#[derive(Debug, Error)]
pub enum Error {
    #[error("error reading from stdin")]
    Input(#[source] io::Error),

    #[error(transparent)]
    PartialRead(#[from] PartialRead),

    #[error("error writing to stdout")]
    Output(#[source] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("stdin reader task failed")]
    Reader(#[source] tokio::task::JoinError),
}

// Bulk read failed midway; keeps whatever was read before the failure
#[derive(Debug, Error)]
#[error("error reading from stdin after {} lines", .lines.len())]
pub struct PartialRead {
    pub lines: Vec<String>,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("error reading response body")]
    Body(#[source] reqwest::Error),

    #[error("fragment consumer went away before the exchange finished")]
    RelayClosed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown preset {index}, {available} presets configured")]
    UnknownPreset { index: usize, available: usize },

    #[error("buffer time must be at least 1 second when following input")]
    ZeroBufferWindow,

    #[error("invalid model url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
