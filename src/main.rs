use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cctop::config::{default_log_path, Config, Settings};
use cctop::ui::App;
use cctop_core::SessionMonitor;

/// Where log output goes
enum LogSink {
    /// Headless runs own stderr
    Stderr,
    /// The TUI owns the terminal, so interactive runs log to a file
    File(PathBuf),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    let sink = if cli.once {
        LogSink::Stderr
    } else {
        match cli.log_file.clone().or_else(default_log_path) {
            Some(path) => LogSink::File(path),
            None => LogSink::Stderr,
        }
    };
    setup_logging(cli.debug, sink);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    if cli.once {
        return print_once(&settings);
    }

    // Run the application
    let mut app = App::new(settings);
    app.run().await
}

/// One full scan, printed as JSON
fn print_once(settings: &Settings) -> Result<()> {
    let mut monitor = SessionMonitor::new(&settings.monitor);
    let rows = monitor.full_scan();
    let json = serde_json::to_string_pretty(&rows).context("Failed to serialize sessions")?;
    println!("{}", json);
    Ok(())
}

fn setup_logging(debug: bool, sink: LogSink) {
    let filter = if debug {
        EnvFilter::new("cctop=debug,cctop_core=debug")
    } else {
        EnvFilter::new("cctop=info,cctop_core=info")
    };

    let registry = tracing_subscriber::registry().with(filter);

    match sink {
        LogSink::Stderr => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogSink::File(path) => match open_log_file(&path) {
            Ok(file) => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init(),
            Err(e) => {
                // Nothing is logged, but the TUI still runs
                eprintln!("cctop: logging disabled: {:#}", e);
                registry.init();
            }
        },
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))
}
