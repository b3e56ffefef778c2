use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::error::DownloadError;

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one batch run. Built once and handed to the coordinator.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub workers: usize,
    /// Total bytes per second shared out evenly between workers.
    pub total_rate: u64,
    pub output_dir: PathBuf,
    /// How long the coordinator waits for the whole batch.
    pub deadline: Duration,
    pub http: HttpConfig,
}

impl DownloadConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            total_rate: u64::MAX,
            output_dir: output_dir.into(),
            deadline: DEFAULT_DEADLINE,
            http: HttpConfig::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_total_rate(mut self, bytes_per_sec: u64) -> Self {
        self.total_rate = bytes_per_sec;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Static share of the total rate for each worker. Integer division, so it can be
    /// zero when there are more workers than bytes per second.
    pub fn per_worker_ceiling(&self) -> u64 {
        self.total_rate / self.workers.max(1) as u64
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.workers == 0 {
            return Err(DownloadError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            proxy: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl HttpConfig {
    pub fn build_client(&self) -> Result<Client, DownloadError> {
        // No whole-request timeout: a throttled body may take longer than any fixed value.
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str());

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url).map_err(DownloadError::Client)?);
        }

        builder.build().map_err(DownloadError::Client)
    }
}
