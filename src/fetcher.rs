use std::path::Path;

use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::BufWriter;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::error::DownloadError;
use crate::throttle::{CopyError, copy_throttled};

/// Streams a single GET response into a file under a byte-rate ceiling.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    client: Client,
}

impl RateLimitedFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            client: http.build_client()?,
        })
    }

    /// Downloads `url` into `dest` at no more than `ceiling` bytes per second and returns
    /// the number of bytes written.
    ///
    /// The destination is only created after a `200 OK`. Any failure after that removes
    /// the partial file.
    pub async fn fetch(
        &self,
        url: &str,
        ceiling: u64,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Interrupted),
            sent = self.client.get(url).send() => {
                sent.map_err(|e| DownloadError::transport(url, e))?
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status));
        }
        debug!(url, content_length = ?response.content_length(), "response accepted");

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        tokio::pin!(body);

        let copied = copy_throttled(&mut body, &mut writer, ceiling, cancel).await;
        drop(writer);

        match copied {
            Ok(bytes) => {
                info!(url, path = %dest.display(), bytes, "download complete");
                Ok(bytes)
            }
            Err(e) => {
                debug!(path = %dest.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(dest).await;
                Err(match e {
                    CopyError::Read(source) => DownloadError::body(url, source),
                    CopyError::Write(source) => DownloadError::io(dest, source),
                    CopyError::Cancelled => DownloadError::Interrupted,
                })
            }
        }
    }
}
