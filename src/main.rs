use anyhow::Result;
use clap::{Parser, Subcommand};
use lovesportsd::{config::ServerConfig, rest, AppContext};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "lovesportsd",
    about = "Love Sports — wearable pairing, telemetry ingestion, and match results server",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST server port
    #[arg(long, env = "LOVESPORTS_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "LOVESPORTS_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOVESPORTS_LOG")]
    log: Option<String>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 to accept device traffic from the LAN)
    #[arg(long, env = "LOVESPORTS_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "LOVESPORTS_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server (default when no subcommand given).
    ///
    /// Runs lovesportsd in the foreground.
    ///
    /// Examples:
    ///   lovesportsd serve
    ///   lovesportsd
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Some(Command::Serve) | None => {
            run_server(
                args.port,
                args.data_dir,
                args.log,
                args.bind_address,
                args.log_file,
            )
            .await
        }
    }
}

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
    log_file: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = Arc::new(ServerConfig::new(port, data_dir, log, bind_address));
    let _log_guard = setup_logging(&config.log, log_file.as_deref(), &config.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "lovesportsd starting");
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        bind = %config.bind_address,
        "config loaded"
    );

    let ctx = Arc::new(AppContext::new(config).await?);
    rest::start_rest_server(ctx).await
}

/// Initialise the tracing subscriber: pretty or JSON output, optionally
/// duplicated to a daily-rotated log file. Returns the appender guard that
/// must stay alive for file logging to flush.
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
            .unwrap_or_else(|| std::ffi::OsStr::new("lovesportsd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(non_blocking))
                .with(fmt::layer().json())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_ansi(false).with_writer(non_blocking))
                .with(fmt::layer().compact())
                .init();
        }
        Some(guard)
    } else {
        if use_json {
            tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        } else {
            tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        }
        None
    }
}
