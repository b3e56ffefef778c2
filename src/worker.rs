use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetcher::RateLimitedFetcher;
use crate::models::{DownloadOutcome, LinkRecord};

/// Shared queue of pending links. Every record is handed to exactly one caller of
/// [`TaskQueue::next`]; once the queue is drained it stays drained.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<LinkRecord>>>,
}

impl TaskQueue {
    /// Builds a closed queue holding `links`.
    pub fn from_links(links: impl IntoIterator<Item = LinkRecord>) -> (Self, usize) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut count = 0;
        for link in links {
            // The receiver is alive until the end of this function.
            let _ = tx.send(link);
            count += 1;
        }
        (
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
            count,
        )
    }

    /// Next pending link, or `None` when the queue is exhausted.
    pub async fn next(&self) -> Option<LinkRecord> {
        self.rx.lock().await.recv().await
    }
}

pub type ResultSink = mpsc::UnboundedSender<DownloadOutcome>;

pub struct Worker {
    id: usize,
    tasks: TaskQueue,
    results: ResultSink,
    fetcher: RateLimitedFetcher,
    ceiling: u64,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        id: usize,
        tasks: TaskQueue,
        results: ResultSink,
        fetcher: RateLimitedFetcher,
        ceiling: u64,
        output_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            tasks,
            results,
            fetcher,
            ceiling,
            output_dir,
            cancel,
        }
    }

    /// Drains the task queue and returns how many outcomes this worker published.
    pub async fn run(self) -> usize {
        let mut published = 0;

        loop {
            if self.cancel.is_cancelled() {
                debug!(worker = self.id, "worker cancelled");
                break;
            }
            let Some(link) = self.tasks.next().await else {
                debug!(worker = self.id, "task queue exhausted");
                break;
            };

            let Some(outcome) = self.process(link).await else {
                break;
            };
            if self.results.send(outcome).is_err() {
                // Coordinator stopped listening (deadline or interrupt).
                break;
            }
            published += 1;
        }

        debug!(worker = self.id, published, "worker finished");
        published
    }

    /// Downloads one link. `None` means the run was interrupted and the link has no outcome.
    async fn process(&self, link: LinkRecord) -> Option<DownloadOutcome> {
        let dest = self.output_dir.join(&link.file_name);
        info!(worker = self.id, url = %link.url, file = %link.file_name, "starting download");

        match self
            .fetcher
            .fetch(&link.url, self.ceiling, &dest, &self.cancel)
            .await
        {
            Ok(bytes_written) => Some(DownloadOutcome::Success {
                link,
                bytes_written,
            }),
            Err(cause) if !cause.is_per_link() => {
                debug!(worker = self.id, file = %link.file_name, error = %cause, "download stopped");
                None
            }
            Err(cause) => {
                warn!(worker = self.id, file = %link.file_name, error = %cause, "download failed");
                Some(DownloadOutcome::Failure { link, cause })
            }
        }
    }
}
