use std::path::PathBuf;

use clap::Parser;

const ONE_KILOBYTE: f64 = 1024.0;
const ONE_MEGABYTE: f64 = ONE_KILOBYTE * ONE_KILOBYTE;

#[derive(Parser, Debug)]
#[command(name = "throttle-dl")]
#[command(author, version, about = "Download a list of links with a bounded, rate-limited worker pool", long_about = None)]
pub struct Args {
    /// Link file: one `<url> <file_name>` pair per line
    #[arg(short = 'f', long = "links")]
    pub links: PathBuf,

    /// Existing directory to save downloaded files into
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of concurrent workers
    #[arg(short = 'n', long, default_value = "2", value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: u32,

    /// Total speed limit in bytes/sec, `k` and `m` suffixes allowed (e.g. 512k, 1.5m)
    #[arg(short, long, value_parser = parse_rate)]
    pub limit: Option<u64>,

    /// Give up waiting for the batch after this many seconds
    #[arg(long, default_value = "1800")]
    pub deadline_secs: u64,

    /// HTTP proxy (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Write a JSON report of every outcome to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parses `1000`, `100k` or `1.5m` into bytes per second.
pub fn parse_rate(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (number, multiplier) = if let Some(n) = value.strip_suffix(['k', 'K']) {
        (n, ONE_KILOBYTE)
    } else if let Some(n) = value.strip_suffix(['m', 'M']) {
        (n, ONE_MEGABYTE)
    } else {
        return value
            .parse::<u64>()
            .map_err(|e| format!("invalid speed limit `{value}`: {e}"));
    };

    let number: f64 = number
        .parse()
        .map_err(|e| format!("invalid speed limit `{value}`: {e}"))?;
    if !number.is_finite() || number < 0.0 {
        return Err(format!("invalid speed limit `{value}`"));
    }
    Ok((number * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_plain_and_suffixed() {
        assert_eq!(parse_rate("512"), Ok(512));
        assert_eq!(parse_rate("100k"), Ok(102_400));
        assert_eq!(parse_rate("1.5m"), Ok(1_572_864));
        assert_eq!(parse_rate("2M"), Ok(2_097_152));
        assert_eq!(parse_rate("0"), Ok(0));
    }

    #[test]
    fn test_parse_rate_rejects_garbage() {
        assert!(parse_rate("fast").is_err());
        assert!(parse_rate("-1k").is_err());
        assert!(parse_rate("k").is_err());
        assert!(parse_rate("1.5").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "throttle-dl", "-f", "links.txt", "-o", "out", "-n", "4", "-l", "1m",
        ])
        .unwrap();
        assert_eq!(args.threads, 4);
        assert_eq!(args.limit, Some(1_048_576));
        assert_eq!(args.deadline_secs, 1800);
        assert!(args.report.is_none());
    }

    #[test]
    fn test_args_require_links_and_output() {
        assert!(Args::try_parse_from(["throttle-dl", "-o", "out"]).is_err());
        assert!(Args::try_parse_from(["throttle-dl", "-f", "links.txt"]).is_err());
        assert!(Args::try_parse_from(["throttle-dl", "-f", "l", "-o", "o", "-n", "0"]).is_err());
    }
}
