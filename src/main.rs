use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use brook::storage::FileBackend;
use brook::{Config, SyncEngine};

/// Resolve and create the default config directory (~/.config/brook/).
///
/// Only called when a default path is needed, so invocations with explicit
/// `--config` and `--snapshot` paths never touch $HOME.
fn ensure_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let dir = PathBuf::from(home).join(".config").join("brook");
    std::fs::create_dir_all(&dir).context("Failed to create config directory")?;
    Ok(dir)
}

#[derive(Parser, Debug)]
#[command(name = "brook", about = "Feed synchronization engine with deduplicating snapshot storage")]
struct Args {
    /// Config file (default: ~/.config/brook/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Snapshot file (default: ~/.config/brook/snapshot.json)
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync cycle over the feeds most overdue for a refresh
    Sync {
        /// Maximum feeds to refresh this cycle (default: from config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List stored articles, newest first
    List {
        #[arg(long, default_value_t = 80)]
        limit: usize,
    },
    /// Subscribe a feed and fetch its articles
    Add { url: String },
    /// Show store counters and the last sync completion
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => ensure_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let snapshot_path = match args.snapshot.or_else(|| config.snapshot_path.clone()) {
        Some(path) => path,
        None => ensure_config_dir()?.join("snapshot.json"),
    };

    let batch_limit = config.batch_limit;
    let backend = Arc::new(FileBackend::new(snapshot_path));
    let engine = Arc::new(SyncEngine::new(config, backend));
    engine
        .initialize_or_load()
        .await
        .context("Failed to initialize store")?;

    match args.command {
        Command::Sync { limit } => {
            let report = engine.run_sync_cycle(limit.unwrap_or(batch_limit)).await;
            println!(
                "Inserted {} new articles ({} feeds selected, {} failed).",
                report.inserted, report.feeds_selected, report.feeds_failed
            );
            if let Some(e) = report.persist_error {
                anyhow::bail!("Sync completed but snapshot write failed: {e}");
            }
        }
        Command::List { limit } => {
            for article in engine.list_recent_articles(limit).await {
                let date = article
                    .published
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                println!("{}  {}  {}", date, article.title, article.link);
            }
        }
        Command::Add { url } => {
            let feed = engine.add_feed(&url).await;
            // Deferred persistence: don't make the subscriber wait on disk,
            // but the CLI is short-lived so await completion before exit
            engine.persist_in_background().await.ok();
            println!("Subscribed: {} ({})", feed.url, feed.id);
        }
        Command::Status => {
            let stats = engine.stats().await;
            println!("Feeds:    {}", stats.feed_count);
            println!("Articles: {}", stats.article_count);
            match stats.last_sync {
                Some(meta) => println!("Last sync: {} ({} articles)", meta.time_stamp, meta.article_count),
                None => println!("Last sync: never"),
            }
        }
    }

    Ok(())
}
