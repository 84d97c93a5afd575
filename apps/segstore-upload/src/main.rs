//! Uploads a local file to a SegStore service.
//!
//! Usage: `segstore-upload <url> <file> [segment_size]`

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use segstore_client::StoreClient;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: segstore-upload <url> <file> [segment_size]";

/// Parsed command line.
#[derive(Debug, PartialEq)]
struct Args {
    url: String,
    file: PathBuf,
    /// 0 selects the client default.
    segment_size: usize,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    match args {
        [url, file] => Ok(Args {
            url: url.clone(),
            file: PathBuf::from(file),
            segment_size: 0,
        }),
        [url, file, size] => {
            let segment_size = size
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("invalid segment_size: {size}\n{USAGE}"))?;
            Ok(Args {
                url: url.clone(),
                file: PathBuf::from(file),
                segment_size,
            })
        }
        _ => anyhow::bail!(USAGE),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(upload(args))
}

async fn upload(args: Args) -> anyhow::Result<()> {
    let client = StoreClient::connect(&args.url)
        .await
        .with_context(|| format!("connecting to {}", args.url))?;

    let result = client
        .upload_file(&args.file, args.segment_size, |p| {
            print!("\r{:.0}% complete", p.percent());
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    client.close().await;

    let resp = result.with_context(|| format!("uploading {}", args.file.display()))?;
    println!(
        "stored {} as {} ({} segments)",
        args.file.display(),
        resp.file_id,
        resp.segments_received
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_url_and_file() {
        let args = parse_args(&argv(&["ws://host:9876", "a.bin"])).unwrap();
        assert_eq!(args.url, "ws://host:9876");
        assert_eq!(args.file, PathBuf::from("a.bin"));
        assert_eq!(args.segment_size, 0);
    }

    #[test]
    fn parses_segment_size() {
        let args = parse_args(&argv(&["ws://h", "a.bin", "1024"])).unwrap();
        assert_eq!(args.segment_size, 1024);
    }

    #[test]
    fn rejects_bad_segment_size() {
        assert!(parse_args(&argv(&["ws://h", "a.bin", "0"])).is_err());
        assert!(parse_args(&argv(&["ws://h", "a.bin", "big"])).is_err());
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_args(&argv(&["ws://h"])).is_err());
        assert!(parse_args(&argv(&["ws://h", "a", "1", "extra"])).is_err());
    }
}
