//! rgw-dl CLI
//!
//! Anonymous lister and downloader for public Ceph RGW buckets.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rgw_dl::config::{
    DEFAULT_BUCKET, DEFAULT_CONCURRENCY, DEFAULT_DEST, DEFAULT_ENDPOINT, DEFAULT_REGION, DEFAULT_TENANT,
};
use rgw_dl::download::{Dispatcher, DownloadSummary, TaskOutcome};
use rgw_dl::error::{Error, ValueError};
use rgw_dl::retry::RetryPolicy;
use rgw_dl::tree::{Glyphs, RenderOptions};
use rgw_dl::{build_tree, human_bytes, render_tree, Client, Config};

const EXIT_USAGE: u8 = 1;
const EXIT_FAILED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "rgw-dl", version, about = "Public downloader for Ceph RGW buckets (unsigned HTTP).")]
struct Cli {
    /// RGW endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Unused for unsigned requests, kept for reference
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// Bucket, without tenant
    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Tenant, required for anonymous access to tenanted buckets ("" for none)
    #[arg(long, default_value = DEFAULT_TENANT)]
    tenant: String,

    /// Destination directory
    #[arg(long, default_value = DEFAULT_DEST)]
    dest: PathBuf,

    /// Subfolder to scope listing or downloading, e.g. 'SDC3/'
    #[arg(long)]
    prefix: Option<String>,

    /// Download the entire bucket
    #[arg(long)]
    all: bool,

    /// Draw a directory tree with file count and total size per folder
    #[arg(long)]
    tree: bool,

    /// Recursively list all files
    #[arg(long)]
    list: bool,

    /// List sub-folders and files directly under the prefix
    #[arg(long)]
    list_top: bool,

    /// Use ASCII characters for the tree instead of box drawing
    #[arg(long)]
    ascii: bool,

    /// Show files in the tree, not only folders
    #[arg(long)]
    files: bool,

    /// Parallel downloads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Attempts per request, the first one included
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Base delay between attempts, doubled after each one
    #[arg(long, default_value_t = 200)]
    retry_delay_ms: u64,

    /// Seconds of server silence before a request is abandoned and retried
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    List,
    ListTop,
    Tree,
    Download,
}

fn resolve_operation(cli: &Cli) -> Result<Operation, String> {
    let selected: Vec<(&str, Operation)> = [
        ("--list", cli.list, Operation::List),
        ("--list-top", cli.list_top, Operation::ListTop),
        ("--tree", cli.tree, Operation::Tree),
        ("--all", cli.all, Operation::Download),
    ]
    .into_iter()
    .filter(|(_, set, _)| *set)
    .map(|(flag, _, op)| (flag, op))
    .collect();

    match selected.as_slice() {
        [] if cli.prefix.is_some() => Ok(Operation::Download),
        [] => Err("No action selected. Use --list (recursive), --list-top (top-level), --tree, \
                   --all (download) or --prefix (download subtree)."
            .to_string()),
        [(_, Operation::Download)] if cli.prefix.is_some() => {
            Err("--all downloads the whole bucket and cannot be combined with --prefix.".to_string())
        }
        [(_, op)] => Ok(*op),
        many => {
            let flags: Vec<&str> = many.iter().map(|(flag, _)| *flag).collect();
            Err(format!("{} cannot be used together.", flags.join(", ")))
        }
    }
}

fn build_config(cli: &Cli) -> Result<Config, ValueError> {
    let retry = RetryPolicy::new()
        .with_max_attempts(cli.retries)
        .with_base_delay(Duration::from_millis(cli.retry_delay_ms));
    Config::builder()
        .endpoint(cli.endpoint.as_str())
        .region(cli.region.as_str())
        .bucket(cli.bucket.as_str())
        .tenant(cli.tenant.as_str())
        .dest(cli.dest.clone())
        .prefix(cli.prefix.as_deref())
        .retry(retry)
        .concurrency(cli.concurrency)
        .idle_timeout(Duration::from_secs(cli.timeout_secs))
        .build()
}

/// Logs go to stderr so stdout stays clean for listings.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_listing_failure(action: &str, base_url: &str, err: &Error, scope_hint: &str) {
    eprintln!("Failed to {} at {}: {}\n", action, base_url, err);
    eprintln!("Hints:");
    eprintln!("  - Ensure --tenant is correct.");
    if err.is_access_denied() {
        eprintln!("  - The bucket refused anonymous listing (403): s3:ListBucket is not granted.");
    } else {
        eprintln!("  - Anonymous listing requires s3:ListBucket (403 if disabled).");
    }
    eprintln!("  - {}", scope_hint);
}

fn scope_label(config: &Config) -> &str {
    config.prefix().unwrap_or("/")
}

async fn list(client: &Client, base_url: &str) -> ExitCode {
    let config = client.config();
    println!("Listing all objects under '{}' from {} ...\n", scope_label(config), base_url);
    let mut records = client.list_objects_stream(config.scope());
    let mut count: u64 = 0;
    let mut total: u64 = 0;
    while let Some(record) = records.next().await {
        match record {
            Ok(record) => {
                println!("{:>12}  {}", record.size, record.key);
                count += 1;
                total += record.size;
            }
            Err(e) => {
                print_listing_failure(
                    "list recursively",
                    base_url,
                    &e,
                    "To list just known paths, use --prefix or publish a manifest.",
                );
                return ExitCode::from(EXIT_FAILED);
            }
        }
    }
    println!("\nTotal objects: {} | Total size: {}", count, human_bytes(total));
    ExitCode::SUCCESS
}

async fn list_top(client: &Client, base_url: &str) -> ExitCode {
    let config = client.config();
    let (folders, files) = match client.list_top_level(config.scope()).await {
        Ok(found) => found,
        Err(e) => {
            print_listing_failure(
                "list top level",
                base_url,
                &e,
                "To look inside a folder, pass --prefix (e.g., 'SDC3/').",
            );
            return ExitCode::from(EXIT_FAILED);
        }
    };
    println!("Top level of '{}' at {}:\n", scope_label(config), base_url);
    for folder in &folders {
        println!("  [dir ] {}", folder);
    }
    for file in &files {
        println!("  [file] {}  ({})", file.key, human_bytes(file.size));
    }
    println!("\n{} folders, {} files", folders.len(), files.len());
    ExitCode::SUCCESS
}

async fn tree(client: &Client, base_url: &str, options: RenderOptions) -> ExitCode {
    let config = client.config();
    let root = match build_tree(client.list_objects_stream(config.scope()), config.scope()).await {
        Ok(root) => root,
        Err(e) => {
            print_listing_failure(
                "build tree",
                base_url,
                &e,
                "To scope the tree, pass --prefix (e.g., 'SDC3/').",
            );
            return ExitCode::from(EXIT_FAILED);
        }
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = render_tree(&root, &config.label(), &options, &mut out) {
        warn!(error = %e, "cannot write tree");
        return ExitCode::from(EXIT_FAILED);
    }
    ExitCode::SUCCESS
}

async fn download(client: Client, base_url: &str, cancel: CancellationToken) -> ExitCode {
    let config = client.config().clone();
    if let Err(e) = tokio::fs::create_dir_all(config.dest()).await {
        eprintln!("Cannot create {}: {}", config.dest().display(), e);
        return ExitCode::from(EXIT_FAILED);
    }
    println!(
        "\nDownloading '{}' from {} -> {} ...",
        config.prefix().unwrap_or("(entire bucket)"),
        base_url,
        config.dest().display()
    );

    let started = Instant::now();
    let records = client.list_objects_stream(config.scope());
    let mut batch = Dispatcher::new(client).cancellation_token(cancel.clone()).run(records);
    let mut summary = DownloadSummary::default();
    while let Some(report) = batch.next().await {
        match &report.outcome {
            TaskOutcome::Fetched(_) => println!("[get ] {}  ->  {}", report.key, report.destination.display()),
            TaskOutcome::Skipped => println!("[skip] {}  (exists, size matches)", report.key),
            TaskOutcome::Failed(reason) => println!("[fail] {}  ({})", report.key, reason),
        }
        summary.record(&report);
    }
    let finished = batch.finish().await;

    println!(
        "\nDone. Total: {}, downloaded: {}, skipped: {}, failed: {}  ({}, elapsed {:.1}s)",
        summary.total,
        summary.fetched,
        summary.skipped,
        summary.failed,
        human_bytes(summary.bytes_fetched),
        started.elapsed().as_secs_f64()
    );

    match finished {
        Err(Error::Cancelled) => {
            eprintln!("Interrupted; partial files were removed.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            print_listing_failure(
                "list objects",
                base_url,
                &e,
                "Re-run to resume: complete files are skipped.",
            );
            ExitCode::from(EXIT_FAILED)
        }
        Ok(()) if summary.is_success() => ExitCode::SUCCESS,
        Ok(()) => ExitCode::from(EXIT_FAILED),
    }
}

async fn run(cli: Cli, op: Operation, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let config = build_config(&cli).context("invalid configuration")?;
    let base_url = format!("{}/{}", config.endpoint(), config.bucket_path());
    let client = Client::new(config).context("cannot set up the HTTP client")?;

    let options = RenderOptions {
        glyphs: if cli.ascii { Glyphs::ASCII } else { Glyphs::UNICODE },
        show_files: cli.files,
    };
    let work = async {
        match op {
            Operation::List => list(&client, &base_url).await,
            Operation::ListTop => list_top(&client, &base_url).await,
            Operation::Tree => tree(&client, &base_url, options).await,
            Operation::Download => download(client.clone(), &base_url, cancel.clone()).await,
        }
    };
    let code = tokio::select! {
        code = work => code,
        _ = cancel.cancelled(), if op != Operation::Download => ExitCode::from(EXIT_INTERRUPTED),
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    let op = match resolve_operation(&cli) {
        Ok(op) => op,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            on_interrupt.cancel();
        }
    });

    match run(cli, op, cancel).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rgw-dl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_single_modes() {
        assert_eq!(resolve_operation(&parse(&["--list"])), Ok(Operation::List));
        assert_eq!(resolve_operation(&parse(&["--list-top"])), Ok(Operation::ListTop));
        assert_eq!(resolve_operation(&parse(&["--tree", "--prefix", "SDC3/"])), Ok(Operation::Tree));
        assert_eq!(resolve_operation(&parse(&["--all"])), Ok(Operation::Download));
    }

    #[test]
    fn test_bare_prefix_downloads_subtree() {
        assert_eq!(resolve_operation(&parse(&["--prefix", "SDC3/image"])), Ok(Operation::Download));
    }

    #[test]
    fn test_rejected_combinations() {
        assert!(resolve_operation(&parse(&[])).is_err());
        assert!(resolve_operation(&parse(&["--all", "--prefix", "SDC3/"])).is_err());
        let err = resolve_operation(&parse(&["--list", "--tree"])).unwrap_err();
        assert!(err.contains("--list, --tree"));
    }

    #[test]
    fn test_config_from_flags() {
        let cli = parse(&["--prefix", "/SDC3", "--tenant", "", "--retries", "5", "--concurrency", "8", "--timeout-secs", "15"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.prefix(), Some("SDC3/"));
        assert_eq!(config.bucket_path(), "sdc3-simdata");
        assert_eq!(config.retry().max_attempts, 5);
        assert_eq!(config.concurrency(), 8);
        assert_eq!(config.idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.dest(), std::path::Path::new("./download"));
    }

    #[test]
    fn test_invalid_flags() {
        assert!(build_config(&parse(&["--endpoint", "rgw.cscs.ch"])).is_err());
        assert!(build_config(&parse(&["--concurrency", "0"])).is_err());
        assert!(build_config(&parse(&["--timeout-secs", "0"])).is_err());
    }
}
