use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::DownloadConfig;
use crate::models::DownloadOutcome;

const ONE_KILOBYTE: u64 = 1024;
const ONE_MEGABYTE: u64 = ONE_KILOBYTE * ONE_KILOBYTE;

/// `< 1 MiB` as kilobytes, otherwise megabytes, two decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < ONE_MEGABYTE {
        format!("{:.2} Kb", bytes as f64 / ONE_KILOBYTE as f64)
    } else {
        format!("{:.2} Mb", bytes as f64 / ONE_MEGABYTE as f64)
    }
}

pub fn format_rate(bytes_per_sec: u64) -> String {
    if bytes_per_sec == u64::MAX {
        "unlimited".to_string()
    } else {
        format!("{}/sec", format_bytes(bytes_per_sec))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, outcome| {
            match outcome {
                DownloadOutcome::Success { bytes_written, .. } => {
                    acc.succeeded += 1;
                    acc.total_bytes += bytes_written;
                }
                DownloadOutcome::Failure { .. } => acc.failed += 1,
            }
            acc
        })
    }
}

pub fn render_header(config: &DownloadConfig, links_file: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "----------------------");
    let _ = writeln!(out, "Run parameters:");
    let _ = writeln!(out, "  - Concurrent workers: {}", config.workers);
    let _ = writeln!(out, "  - Total speed limit: {}", format_rate(config.total_rate));
    let _ = writeln!(out, "  - Links file: {}", links_file.display());
    let _ = writeln!(out, "  - Output directory: {}", config.output_dir.display());
    let _ = write!(out, "----------------------");
    out
}

pub fn render_outcome(outcome: &DownloadOutcome) -> String {
    match outcome {
        DownloadOutcome::Success {
            link,
            bytes_written,
        } => format!(
            "Download of [{}] ({} bytes) completed successfully.",
            link.file_name, bytes_written
        ),
        DownloadOutcome::Failure { link, .. } => format!(
            "Download of [{}] failed: [{}]",
            link.file_name,
            outcome.cause_message().unwrap_or_default()
        ),
    }
}

pub fn render_footer(outcomes: &[DownloadOutcome], elapsed: Duration) -> String {
    let summary = Summary::from_outcomes(outcomes);
    let mut out = String::new();
    let _ = writeln!(out, "----------------------");
    let _ = writeln!(out, "Statistics:");
    for outcome in outcomes {
        let _ = writeln!(out, "{}", render_outcome(outcome));
    }
    let _ = writeln!(
        out,
        "Processed [{}] files ({} ok, {} failed), total size: [{}]",
        outcomes.len(),
        summary.succeeded,
        summary.failed,
        format_bytes(summary.total_bytes)
    );
    let _ = writeln!(out, "----------------------");
    let _ = write!(out, "Total run time: {} s", elapsed.as_secs());
    out
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    url: &'a str,
    file_name: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes_written: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    summary: Summary,
    elapsed_secs: u64,
    outcomes: Vec<ReportEntry<'a>>,
}

fn build_report(outcomes: &[DownloadOutcome], elapsed: Duration) -> Report<'_> {
    let entries = outcomes
        .iter()
        .map(|outcome| {
            let link = outcome.link();
            ReportEntry {
                url: &link.url,
                file_name: &link.file_name,
                status: if outcome.is_success() { "success" } else { "failure" },
                bytes_written: outcome.bytes_written(),
                error: outcome.cause_message(),
            }
        })
        .collect();

    Report {
        summary: Summary::from_outcomes(outcomes),
        elapsed_secs: elapsed.as_secs(),
        outcomes: entries,
    }
}

pub fn write_json_report(path: &Path, outcomes: &[DownloadOutcome], elapsed: Duration) -> Result<()> {
    let content = serde_json::to_string_pretty(&build_report(outcomes, elapsed))
        .context("Failed to serialize report")?;

    std::fs::write(path, content).context("Failed to write report file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::models::LinkRecord;
    use reqwest::StatusCode;
    use tempfile::TempDir;

    fn sample() -> Vec<DownloadOutcome> {
        vec![
            DownloadOutcome::Success {
                link: LinkRecord::new("http://a/1", "one.bin"),
                bytes_written: 2048,
            },
            DownloadOutcome::Failure {
                link: LinkRecord::new("http://a/2", "two.bin"),
                cause: DownloadError::http_status("http://a/2", StatusCode::INTERNAL_SERVER_ERROR),
            },
        ]
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 Kb");
        assert_eq!(format_bytes(1536), "1.50 Kb");
        assert_eq!(format_bytes(ONE_MEGABYTE), "1.00 Mb");
        assert_eq!(format_bytes(5 * ONE_MEGABYTE / 2), "2.50 Mb");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(u64::MAX), "unlimited");
        assert_eq!(format_rate(1024), "1.00 Kb/sec");
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_outcomes(&sample());
        assert_eq!(
            summary,
            Summary {
                succeeded: 1,
                failed: 1,
                total_bytes: 2048
            }
        );
    }

    #[test]
    fn test_footer_lists_each_outcome() {
        let footer = render_footer(&sample(), Duration::from_secs(3));
        assert!(footer.contains("[one.bin] (2048 bytes) completed"));
        assert!(footer.contains("[two.bin] failed"));
        assert!(footer.contains("500"));
        assert!(footer.contains("Processed [2] files (1 ok, 1 failed), total size: [2.00 Kb]"));
        assert!(footer.ends_with("Total run time: 3 s"));
    }

    #[test]
    fn test_footer_for_empty_batch() {
        let footer = render_footer(&[], Duration::ZERO);
        assert!(footer.contains("Processed [0] files (0 ok, 0 failed), total size: [0.00 Kb]"));
        assert!(footer.ends_with("Total run time: 0 s"));
    }

    #[test]
    fn test_header_shows_parameters() {
        let config = DownloadConfig::new("/tmp/out")
            .with_workers(3)
            .with_total_rate(2048);
        let header = render_header(&config, Path::new("links.txt"));
        assert!(header.contains("Concurrent workers: 3"));
        assert!(header.contains("2.00 Kb/sec"));
        assert!(header.contains("links.txt"));
    }

    #[test]
    fn test_json_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&path, &sample(), Duration::from_secs(1)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["succeeded"], 1);
        assert_eq!(value["summary"]["total_bytes"], 2048);
        assert_eq!(value["outcomes"][0]["status"], "success");
        assert_eq!(value["outcomes"][0]["bytes_written"], 2048);
        assert_eq!(value["outcomes"][1]["status"], "failure");
        assert!(value["outcomes"][1].get("bytes_written").is_none());
        assert!(
            value["outcomes"][1]["error"]
                .as_str()
                .unwrap()
                .contains("500")
        );
    }
}
