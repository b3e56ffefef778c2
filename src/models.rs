use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, root_cause};

/// One download: where to fetch from and the file name to store it under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub file_name: String,
}

impl LinkRecord {
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
        }
    }
}

/// Result of processing a single [`LinkRecord`].
#[derive(Debug)]
pub enum DownloadOutcome {
    Success { link: LinkRecord, bytes_written: u64 },
    Failure { link: LinkRecord, cause: DownloadError },
}

impl DownloadOutcome {
    pub fn link(&self) -> &LinkRecord {
        match self {
            Self::Success { link, .. } | Self::Failure { link, .. } => link,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn bytes_written(&self) -> Option<u64> {
        match self {
            Self::Success { bytes_written, .. } => Some(*bytes_written),
            Self::Failure { .. } => None,
        }
    }

    pub fn cause(&self) -> Option<&DownloadError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { cause, .. } => Some(cause),
        }
    }

    /// Innermost error message of a failure, e.g. `Connection refused` instead of the
    /// whole reqwest chain. HTTP status failures keep their own message.
    pub fn cause_message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure {
                cause: cause @ DownloadError::HttpStatus { .. },
                ..
            } => Some(cause.to_string()),
            Self::Failure { cause, .. } => Some(root_cause(cause).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::collections::HashSet;

    #[test]
    fn test_link_identity_is_url_and_file_name() {
        let mut set = HashSet::new();
        set.insert(LinkRecord::new("http://a/1", "one.bin"));
        set.insert(LinkRecord::new("http://a/1", "one.bin"));
        set.insert(LinkRecord::new("http://a/1", "other.bin"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_outcome_accessors() {
        let link = LinkRecord::new("http://a/1", "one.bin");
        let ok = DownloadOutcome::Success {
            link: link.clone(),
            bytes_written: 42,
        };
        assert!(ok.is_success());
        assert_eq!(ok.bytes_written(), Some(42));
        assert_eq!(ok.link(), &link);
        assert!(ok.cause_message().is_none());

        let failed = DownloadOutcome::Failure {
            link: link.clone(),
            cause: DownloadError::http_status("http://a/1", StatusCode::NOT_FOUND),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.bytes_written(), None);
        assert_eq!(failed.link(), &link);
        assert!(failed.cause_message().unwrap().contains("404"));
    }

    #[test]
    fn test_cause_message_unwraps_io_source() {
        let failed = DownloadOutcome::Failure {
            link: LinkRecord::new("http://a/1", "one.bin"),
            cause: DownloadError::io("/out/one.bin", std::io::Error::other("read-only filesystem")),
        };
        assert_eq!(failed.cause_message().as_deref(), Some("read-only filesystem"));
    }
}
