// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use driftd::config::DaemonConfig;
use driftd::events::EventBroadcaster;
use driftd::expectations::ExpectationTable;
use driftd::monitor::Monitor;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "driftd",
    about = "driftd — configuration-drift reconciliation daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the monitor config file (default: {data_dir}/driftd.toml)
    #[arg(long, env = "DRIFTD_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Data directory holding the default config location
    #[arg(long, env = "DRIFTD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DRIFTD_LOG")]
    log: Option<String>,

    /// Seconds between reconciliation cycles (overrides poll_interval_secs)
    #[arg(long, env = "DRIFTD_INTERVAL")]
    interval: Option<u64>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "DRIFTD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the monitor loop in the foreground (default when no subcommand given).
    ///
    /// Examples:
    ///   driftd serve
    ///   driftd
    Serve,
    /// Run exactly one reconciliation cycle now and exit.
    ///
    /// Exit code 0 when everything is stable, 1 when drift, errors, or
    /// missing files were found, 2 on a config error.
    ///
    /// Examples:
    ///   driftd check
    ///   driftd check --dry-run --json
    Check {
        /// Detect and report drift without patching files or writing backups.
        #[arg(long)]
        dry_run: bool,
        /// Print the cycle summary as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match DaemonConfig::load(args.config, args.data_dir, args.log, args.interval) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };

    let _log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    let table = match ExpectationTable::from_specs(&config.files) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: invalid expectation table: {e}");
            std::process::exit(2);
        }
    };

    let broadcaster = EventBroadcaster::new();
    let monitor = Monitor::new(table, broadcaster);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(monitor, &config).await,
        Command::Check { dry_run, json } => {
            let code = check(monitor, dry_run, json).await;
            std::process::exit(code);
        }
    }
}

/// Foreground daemon loop; SIGINT / ctrl-c requests an orderly shutdown.
async fn serve(monitor: Monitor, config: &DaemonConfig) {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down after current entry");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not register interrupt handler");
                // Keep the sender alive so the loop does not see a closed
                // channel as a shutdown request.
                std::future::pending::<()>().await;
            }
        }
    });

    monitor
        .run(
            config.poll_interval,
            config.stable_report_cycles,
            shutdown_rx,
        )
        .await;
}

/// One-shot cycle for terminals and scripts. Returns the process exit code.
async fn check(monitor: Monitor, dry_run: bool, json: bool) -> i32 {
    let summary = monitor.run_cycle(dry_run, None).await;

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: failed to serialize summary: {e}");
                return 2;
            }
        }
    } else {
        println!(
            "checked {} entr{}: {} drifted ({} fixed), {} errors, {} missing files",
            summary.checked,
            if summary.checked == 1 { "y" } else { "ies" },
            summary.drift_found,
            summary.drift_fixed,
            summary.errors,
            summary.missing_files
        );
    }

    if summary.is_clean() {
        0
    } else {
        1
    }
}

/// Initialize tracing: pretty or JSON console output, plus an optional
/// daily-rolling log file. The returned guard must stay alive for the
/// non-blocking file writer to flush.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("driftd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}
