use std::error::Error as StdError;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Coarse classification of a [`DownloadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, DNS, TLS or protocol failure, including a body stream that broke mid-transfer.
    Transport,
    /// The server answered with something other than `200 OK`.
    HttpStatus,
    /// Local filesystem failure while creating or writing the destination.
    Io,
    /// The run was cancelled while waiting on the network, a pacing sleep or the workers.
    Interrupted,
    /// The batch could not start: bad settings or an unusable output directory.
    Config,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("connection to {url} broke while reading the body: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download interrupted")]
    Interrupted,

    #[error("output directory {path} is unusable: {reason}")]
    OutputDir { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl DownloadError {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn body(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Body {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(url: impl Into<String>, status: StatusCode) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Body { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::Io { .. } => ErrorKind::Io,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::OutputDir { .. } | Self::InvalidConfig(_) | Self::Client(_) => ErrorKind::Config,
        }
    }

    /// Whether the error belongs to a single link and should become a failure outcome
    /// instead of aborting the batch.
    pub fn is_per_link(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::HttpStatus | ErrorKind::Io
        )
    }
}

/// Errors raised while loading a link file.
#[derive(Debug, Error)]
pub enum LinkFileError {
    #[error("failed to read link file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("link file {path} has invalid format at line {line}: expected `<url> <file_name>`")]
    InvalidStructure { path: PathBuf, line: usize },
}

/// Walks the `source()` chain down to the innermost error.
pub fn root_cause<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let status = DownloadError::http_status("http://x/a", StatusCode::NOT_FOUND);
        assert_eq!(status.kind(), ErrorKind::HttpStatus);
        assert!(status.is_per_link());

        let io = DownloadError::io("/tmp/a", std::io::Error::other("disk full"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(io.is_per_link());

        let body = DownloadError::body("http://x/a", std::io::Error::other("reset"));
        assert_eq!(body.kind(), ErrorKind::Transport);

        assert_eq!(DownloadError::Interrupted.kind(), ErrorKind::Interrupted);
        assert!(!DownloadError::Interrupted.is_per_link());
        assert!(!DownloadError::InvalidConfig("zero workers".into()).is_per_link());
    }

    #[test]
    fn test_status_message_carries_code() {
        let err = DownloadError::http_status("http://x/a", StatusCode::INTERNAL_SERVER_ERROR);
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("Internal Server Error"), "{msg}");
    }

    #[test]
    fn test_root_cause_unwraps_source_chain() {
        let err = DownloadError::io("/tmp/a", std::io::Error::other("disk full"));
        assert_eq!(root_cause(&err).to_string(), "disk full");

        let leaf = DownloadError::Interrupted;
        assert_eq!(root_cause(&leaf).to_string(), "download interrupted");
    }
}
