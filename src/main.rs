//! cmap: concurrent asset search across cyberspace search engines
//!
//! This is the main entry point for the command line tool.

use anyhow::Result;
use clap::Parser;
use cmap_rs::{
    config::{self, Settings},
    engines::EngineLoader,
    network::Session,
    results::{report, ResultContainer},
    FaviconHash, Search, SearchKeys,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Query fofa, hunter, quake and shodan in parallel for network assets
#[derive(Debug, Parser)]
#[command(name = "cmap", version, about)]
struct Cli {
    /// Providers to query, e.g. fofa,quake,hunter,shodan (defaults to settings)
    #[arg(long, value_delimiter = ',')]
    agent: Vec<String>,

    /// IP addresses or CIDR ranges
    #[arg(long, value_delimiter = ',')]
    ip: Vec<String>,

    /// Domains
    #[arg(long, value_delimiter = ',')]
    domain: Vec<String>,

    /// Favicon md5 hashes, paired by position with --mmh3
    #[arg(long, value_delimiter = ',')]
    md5: Vec<String>,

    /// Favicon mmh3 hashes, paired by position with --md5
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    mmh3: Vec<String>,

    /// Certificate keywords
    #[arg(long, value_delimiter = ',')]
    cert: Vec<String>,

    /// Path to the settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report file, .xlsx or .json (defaults to result_<unix time>.xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print records as JSON lines
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn keys(&self) -> SearchKeys {
        let mut keys = SearchKeys::new();
        keys.ip = self.ip.clone();
        keys.domain = self.domain.clone();
        keys.cert = self.cert.clone();

        let icons = self.md5.len().max(self.mmh3.len());
        keys.icon = (0..icons)
            .map(|i| {
                FaviconHash::new(
                    self.md5.get(i).cloned().unwrap_or_default(),
                    self.mmh3.get(i).cloned().unwrap_or_default(),
                )
            })
            .filter(|icon| !icon.is_empty())
            .collect();
        keys
    }

    fn output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!("result_{}.xlsx", chrono::Utc::now().timestamp()))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting cmap v{}", cmap_rs::VERSION);

    // Load configuration
    let path = cli.config.clone().unwrap_or_else(config::locate);
    let (mut settings, created) = Settings::load_or_init(&path)?;
    if created {
        warn!(
            "Add provider credentials to {} and run again",
            path.display()
        );
        return Ok(());
    }
    settings.merge_env();
    settings.validate()?;

    // Build the run
    let session = Arc::new(Session::from_settings(&settings)?);
    let registry = EngineLoader::load(&settings);
    let names = if cli.agent.is_empty() {
        settings.search.providers.clone()
    } else {
        cli.agent.clone()
    };
    let sources = EngineLoader::sources(&settings, &registry, &names);
    let search =
        Search::new(session, sources, cli.keys()).with_buffer(settings.search.channel_buffer);

    let cancel = CancellationToken::new();
    spawn_interrupt(cancel.clone());
    if let Some(secs) = cli.timeout {
        spawn_timeout(cancel.clone(), Duration::from_secs(secs));
    }

    // Consume records as they arrive
    let mut container = ResultContainer::new();
    let json = cli.json;
    search
        .execute_with_callback(cancel, |record| {
            if let Some(ref error) = record.error {
                warn!("[{}] {}", record.source, error);
                container.add(record);
                return;
            }
            let line = if json {
                record.to_json()
            } else {
                format!("[{}]\t{}", record.source, record.pretty_print())
            };
            if container.add(record) {
                println!("{}", line);
            }
        })
        .await?;

    info!(
        "Found {} services on {} hosts ({} duplicates, {} provider errors)",
        container.len(),
        container.ip_count(),
        container.duplicates(),
        container.errors().len()
    );
    if !container.is_empty() {
        report::write(cli.output(), &container)?;
    }

    Ok(())
}

/// Cancel the run on Ctrl-C
fn spawn_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping search");
            cancel.cancel();
        }
    });
}

/// Cancel the run once `timeout` elapses
fn spawn_timeout(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!("Run timeout of {:?} reached, stopping search", timeout);
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}
