use std::path::PathBuf;

use clap::{Parser, Subcommand};

use blocklens_querylog::{EntryClass, LogFilter, StatsPeriod};

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(
    name = "blocklens",
    about = "Blocklens — offline inspection of Blocky metrics and query logs",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to a blocklens.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a Prometheus exposition dump into a metrics snapshot
    Snapshot {
        /// File containing the /metrics payload
        file: PathBuf,
    },
    /// Derive the per-interval activity series from a sequence of dumps.
    ///
    /// Dumps are pushed in the order given; capture times are taken from
    /// file modification times.
    Activity {
        /// Exposition dumps in capture order
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
    /// Aggregate query-log statistics for a date range
    Stats {
        /// Query-log directory (overrides the config file)
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
        /// Reporting period: today, yesterday, 7d or 30d
        #[arg(short, long, default_value = "today")]
        range: StatsPeriod,
    },
    /// Bucket query activity into a timeline
    Timeline {
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "today")]
        range: StatsPeriod,
        /// Bucket width: 5m, 15m, 1h or 1d
        #[arg(short, long, default_value = "15m")]
        interval: String,
    },
    /// List query-log entries, newest first
    Logs {
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
        /// Reporting period; defaults to today plus yesterday
        #[arg(short, long)]
        range: Option<StatsPeriod>,
        /// Substring match on client IP, name or resolved hostname
        #[arg(long)]
        client: Option<String>,
        /// Substring match on the queried domain
        #[arg(long)]
        domain: Option<String>,
        /// Only entries of this class: blocked, cached or resolved
        #[arg(long)]
        class: Option<EntryClass>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blocklens=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Snapshot { file } => commands::metrics::snapshot(&file),
        Commands::Activity { files } => commands::metrics::activity(&files),
        Commands::Stats { log_dir, range } => {
            commands::stats::stats(&config.resolve_log_dir(log_dir), range)
        }
        Commands::Timeline {
            log_dir,
            range,
            interval,
        } => commands::stats::timeline(&config.resolve_log_dir(log_dir), range, &interval),
        Commands::Logs {
            log_dir,
            range,
            client,
            domain,
            class,
            limit,
            offset,
        } => {
            let filter = LogFilter {
                client,
                domain,
                class,
            };
            commands::logs::logs(&config.resolve_log_dir(log_dir), range, filter, limit, offset)
        }
    }
}
