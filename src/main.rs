use std::fs::OpenOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use takeout_catalog::scan::run_scan;
use takeout_catalog::settings::{LogFormat, Settings};

#[derive(Debug, Parser)]
#[command(
    name = "takeout-catalog",
    version,
    about = "Scan a Google Takeout photo export into a local catalog"
)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Media root to scan (overrides the config)
    #[arg(long)]
    target: Option<Utf8PathBuf>,

    /// Catalog database file (overrides the config)
    #[arg(long)]
    database: Option<Utf8PathBuf>,

    /// Fail on missing tools and exit non-zero when any per-file error was
    /// recorded
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(target) = cli.target {
        settings.scanner.target_media_path = target;
    }
    if let Some(database) = cli.database {
        settings.scanner.database_path = database;
    }
    settings.validate()?;

    init_logging(&settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(
            settings.scanner.worker_threads + settings.scanner.worker_processes + 2,
        )
        .build()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, draining in-flight work");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let summary = match runtime.block_on(run_scan(&settings, cli.strict, stop)) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("scan failed: {e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "scan {} {}: {} files, {} bytes, {} errors, {} albums, {:.1}s",
        summary.scan_run_id,
        summary.status,
        summary.files_processed,
        summary.bytes_processed,
        summary.errors,
        summary.albums_seen,
        summary.duration_seconds
    );

    if summary.status != "completed" || (cli.strict && summary.errors > 0) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::builder().parse(
        ["TAKEOUT_LOG", "RUST_LOG"] // prefer the tool-specific variable
            .iter()
            .find_map(|key| std::env::var(key).ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| settings.logging.level.as_filter().to_owned()),
    )?;

    macro_rules! init_with_writer {
        ($builder:expr) => {
            match &settings.logging.file {
                Some(path) => {
                    let file = OpenOptions::new().create(true).append(true).open(path)?;
                    $builder.with_writer(Arc::new(file)).init();
                }
                None => $builder.init(),
            }
        };
    }

    match settings.logging.format {
        LogFormat::Simple => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .compact();
            init_with_writer!(builder);
        }
        LogFormat::Detailed => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);
            init_with_writer!(builder);
        }
        LogFormat::Json => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter).json();
            init_with_writer!(builder);
        }
    }

    Ok(())
}
