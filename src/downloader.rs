use std::time::Duration;

use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::fetcher::RateLimitedFetcher;
use crate::models::{DownloadOutcome, LinkRecord};
use crate::worker::{TaskQueue, Worker};

// Stand-in for deadlines too large to add to `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// How long cancelled workers get to stop before they are aborted.
const WIND_DOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Every worker finished and dropped its sender.
    Drained,
    Deadline,
    Interrupted,
}

/// Runs a batch of links through a fixed pool of rate-limited workers.
pub struct DownloadCoordinator {
    config: DownloadConfig,
    fetcher: RateLimitedFetcher,
    progress: Option<ProgressBar>,
}

impl DownloadCoordinator {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        let fetcher = RateLimitedFetcher::new(&config.http)?;
        Ok(Self {
            config,
            fetcher,
            progress: None,
        })
    }

    /// Advances `pb` by one for every outcome received.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub async fn run(&self, links: Vec<LinkRecord>) -> Result<Vec<DownloadOutcome>, DownloadError> {
        self.run_until(links, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but fails with [`DownloadError::Interrupted`] as soon as
    /// `shutdown` is cancelled.
    ///
    /// If the configured deadline passes first, the outcomes gathered so far are returned
    /// and links that were still in flight or never picked up are left out.
    pub async fn run_until(
        &self,
        links: Vec<LinkRecord>,
        shutdown: CancellationToken,
    ) -> Result<Vec<DownloadOutcome>, DownloadError> {
        self.check_output_dir().await?;

        let workers = self.config.workers;
        let ceiling = self.config.per_worker_ceiling();
        let (tasks, total) = TaskQueue::from_links(links);
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let cancel = shutdown.child_token();

        info!(links = total, workers, per_worker_ceiling = ceiling, "starting batch");

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let worker = Worker::new(
                id,
                tasks.clone(),
                results_tx.clone(),
                self.fetcher.clone(),
                ceiling,
                self.config.output_dir.clone(),
                cancel.clone(),
            );
            pool.spawn(worker.run());
        }
        drop(results_tx);

        let now = Instant::now();
        let deadline = now
            .checked_add(self.config.deadline)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut outcomes = Vec::with_capacity(total);
        let stop = receive_until(
            &mut results_rx,
            &mut outcomes,
            deadline,
            &shutdown,
            self.progress.as_ref(),
        )
        .await;

        match stop {
            Stop::Interrupted => warn!(received = outcomes.len(), "batch interrupted"),
            Stop::Deadline => {
                warn!(
                    received = outcomes.len(),
                    pending = total - outcomes.len(),
                    deadline_secs = self.config.deadline.as_secs(),
                    "deadline reached, cancelling in-flight downloads"
                );
                cancel.cancel();
            }
            Stop::Drained => {}
        }

        wind_down(
            pool,
            results_rx,
            &mut outcomes,
            self.progress.as_ref(),
            WIND_DOWN_GRACE,
        )
        .await;

        if stop == Stop::Interrupted {
            return Err(DownloadError::Interrupted);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            succeeded,
            failed = outcomes.len() - succeeded,
            missing = total - outcomes.len(),
            "batch finished"
        );
        Ok(outcomes)
    }

    async fn check_output_dir(&self) -> Result<(), DownloadError> {
        let path = &self.config.output_dir;
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| DownloadError::OutputDir {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if !meta.is_dir() {
            return Err(DownloadError::OutputDir {
                path: path.clone(),
                reason: "not a directory".into(),
            });
        }
        Ok(())
    }
}

fn record(outcomes: &mut Vec<DownloadOutcome>, outcome: DownloadOutcome, progress: Option<&ProgressBar>) {
    if let Some(pb) = progress {
        pb.inc(1);
    }
    outcomes.push(outcome);
}

async fn receive_until(
    results: &mut mpsc::UnboundedReceiver<DownloadOutcome>,
    outcomes: &mut Vec<DownloadOutcome>,
    deadline: Instant,
    shutdown: &CancellationToken,
    progress: Option<&ProgressBar>,
) -> Stop {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Stop::Interrupted,
            _ = sleep_until(deadline) => return Stop::Deadline,
            received = results.recv() => match received {
                Some(outcome) => record(outcomes, outcome, progress),
                None => return Stop::Drained,
            },
        }
    }
}

/// Joins the pool, aborting whatever is still running after `grace`, then collects every
/// outcome that was published but not yet received.
async fn wind_down(
    mut pool: JoinSet<usize>,
    mut results: mpsc::UnboundedReceiver<DownloadOutcome>,
    outcomes: &mut Vec<DownloadOutcome>,
    progress: Option<&ProgressBar>,
    grace: Duration,
) {
    let joined = timeout(grace, async {
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }
    })
    .await;

    if joined.is_err() {
        warn!(remaining = pool.len(), "workers did not stop in time, aborting");
        pool.abort_all();
    }

    while let Ok(outcome) = results.try_recv() {
        record(outcomes, outcome, progress);
    }
}
