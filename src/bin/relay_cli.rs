use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use transcript_relay::{
    config::RelayConfig,
    delivery::{Collector, DeliveryClient},
    protocol::Record,
    queue::PendingQueue,
    sync::SyncCoordinator,
};

/// CLI for inspecting and flushing the transcript relay queue
#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Operator CLI for the transcript relay delivery queue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (JSON); missing file falls back to defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the collector base URL
    #[arg(long)]
    collector_url: Option<String>,

    /// Override the durable queue slot path
    #[arg(long)]
    queue: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the pending backlog size
    Status,

    /// List pending records as JSON lines
    List,

    /// Drop all pending records without delivering them
    Clear,

    /// Deliver the pending backlog to the collector as one batch
    Drain,

    /// Deliver one record now, queuing it on failure
    Send {
        /// Transcribed text
        #[arg(long)]
        text: String,

        /// Speaker label
        #[arg(long)]
        speaker: Option<String>,

        /// Language tag
        #[arg(long)]
        language: Option<String>,

        /// Session identifier
        #[arg(long)]
        session: Option<String>,
    },

    /// Probe collector reachability
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(cli.log_level))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load(path),
        None => RelayConfig::default(),
    };
    if let Some(url) = cli.collector_url {
        config.collector_url = url;
    }
    if let Some(slot) = cli.queue {
        config.queue_slot = slot;
    }

    let queue = PendingQueue::open(config.queue_slot.clone()).await?;

    match cli.command {
        Commands::Status => {
            println!("{} pending record(s) in {}", queue.len().await, queue.slot().display());
        }

        Commands::List => {
            for record in queue.snapshot().await {
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        Commands::Clear => {
            let count = queue.len().await;
            queue.clear().await?;
            println!("Cleared {} record(s)", count);
        }

        Commands::Drain => {
            let client = DeliveryClient::new(&config)?;
            let coordinator = SyncCoordinator::new(queue, client);
            let report = coordinator.drain().await;
            println!(
                "{} (delivered {}, pending {})",
                report.message, report.delivered, report.pending
            );
            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::Send {
            text,
            speaker,
            language,
            session,
        } => {
            let mut record = Record::new(text);
            if let Some(speaker) = speaker {
                record = record.speaker(speaker);
            }
            if let Some(language) = language {
                record = record.language(language);
            }
            if let Some(session) = session {
                record = record.session(session);
            }

            let client = DeliveryClient::new(&config)?;
            let coordinator = SyncCoordinator::new(queue, client);
            let report = coordinator.deliver_now(record).await;
            println!("{}", report.message);
            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::Health => {
            let client = DeliveryClient::new(&config)?;
            if client.check_health().await {
                println!("Collector is reachable");
            } else {
                println!("Collector is unreachable");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
