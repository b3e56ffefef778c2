use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use throttle_dl::report::{render_footer, render_header, write_json_report};
use throttle_dl::{DownloadConfig, DownloadCoordinator, HttpConfig, load_links};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    let started = Instant::now();

    if !args.output.is_dir() {
        return Err(anyhow!(
            "Output directory not found: {}",
            args.output.display()
        ));
    }
    if !args.links.exists() {
        return Err(anyhow!("Link file not found: {}", args.links.display()));
    }

    let links = load_links(&args.links)?;
    if links.is_empty() {
        warn!(file = %args.links.display(), "no entries found in link file");
    }
    info!(count = links.len(), file = %args.links.display(), "loaded links");

    let config = DownloadConfig::new(&args.output)
        .with_workers(args.threads as usize)
        .with_total_rate(args.limit.unwrap_or(u64::MAX))
        .with_deadline(Duration::from_secs(args.deadline_secs))
        .with_http(HttpConfig {
            proxy: args.proxy.clone(),
            ..HttpConfig::default()
        });

    let pb = ProgressBar::new(links.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {bar:40} {pos}/{len}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    pb.set_message("Overall");

    let coordinator = DownloadCoordinator::new(config)?.with_progress(pb.clone());
    println!("{}", render_header(coordinator.config(), &args.links));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received, stopping downloads");
                shutdown.cancel();
            }
        });
    }

    let outcomes = coordinator
        .run_until(links, shutdown)
        .await
        .context("Download batch aborted")?;
    pb.finish_and_clear();

    let elapsed = started.elapsed();
    println!("{}", render_footer(&outcomes, elapsed));

    if let Some(path) = &args.report {
        write_json_report(path, &outcomes, elapsed)?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}
