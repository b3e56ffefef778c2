//! Batch HTTP downloader with a fixed pool of workers, each held to a static share of a
//! total byte-rate limit.
//!
//! [`DownloadCoordinator`] loads every [`LinkRecord`] into a shared queue, spawns the
//! workers and collects one [`DownloadOutcome`] per link until the queue is drained or the
//! batch deadline passes.

pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod models;
pub mod report;
pub mod throttle;
pub mod worker;

pub use config::{DownloadConfig, HttpConfig};
pub use downloader::DownloadCoordinator;
pub use error::{DownloadError, ErrorKind, LinkFileError};
pub use fetcher::RateLimitedFetcher;
pub use links::load_links;
pub use models::{DownloadOutcome, LinkRecord};
