//! MuseCatch client - command-line entry point
//!
//! Drives the sync core against a running backend: submit a download and
//! follow its progress, watch the queue, batch-add songs, delete rows and
//! browse the library.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use musecatch_client::api::{ApiClient, QueueBackend, SongQuery};
use musecatch_client::sync::{DownloadPointer, QueueSyncCoordinator, RowView};
use musecatch_common::api::SourceType;
use musecatch_common::config::{ClientConfig, ConfigResolver};
use musecatch_common::events::{EventBus, Notice};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for musecatch
#[derive(Parser, Debug)]
#[command(name = "musecatch")]
#[command(about = "MuseCatch download queue client")]
#[command(version)]
struct Args {
    /// Backend API base URL
    #[arg(long, env = "MUSECATCH_API_URL")]
    api_url: Option<String>,

    /// TOML config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download one song and follow its progress
    Download {
        /// Song name to search for
        name: String,
        #[arg(short, long)]
        source: Option<SourceType>,
    },
    /// Follow the queue until no download is active
    Watch,
    /// Add songs (one per line) from a file, or `-` for stdin
    Add {
        file: String,
        #[arg(short, long)]
        source: Option<SourceType>,
        /// Queue ahead of normal-priority songs
        #[arg(long)]
        high: bool,
    },
    /// Delete a queue row
    Delete { id: i64 },
    /// List downloaded songs
    Songs {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "20")]
        limit: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musecatch=info,musecatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = ConfigResolver::new()
        .with_cli_api_url(args.api_url.clone())
        .with_config_file(args.config.clone())
        .resolve();
    info!("Backend: {}", config.api_base_url);

    let client = Arc::new(ApiClient::new(&config).context("Failed to build HTTP client")?);

    match args.command {
        Command::Download { name, source } => {
            let mut coordinator = coordinator(&client, &config);
            let notices = coordinator.subscribe_notices();
            coordinator.mount().await;
            coordinator
                .submit(&name, source)
                .await
                .context("Failed to start download")?;
            follow(&mut coordinator, notices).await;
        }
        Command::Watch => {
            let mut coordinator = coordinator(&client, &config);
            let notices = coordinator.subscribe_notices();
            coordinator.mount().await;
            print_rows(&coordinator.rows());
            follow(&mut coordinator, notices).await;
        }
        Command::Add { file, source, high } => {
            let text = read_input(&file)?;
            let mut coordinator = coordinator(&client, &config);
            let notices = coordinator.subscribe_notices();
            let added = coordinator
                .add_batch(&text, source, high)
                .await
                .context("Failed to add songs")?;
            println!("Added {} song(s)", added.count);
            follow(&mut coordinator, notices).await;
        }
        Command::Delete { id } => {
            let mut coordinator = coordinator(&client, &config);
            coordinator
                .delete(id)
                .await
                .with_context(|| format!("Failed to delete queue item {}", id))?;
            println!("Deleted queue item {}", id);
            print_rows(&coordinator.rows());
        }
        Command::Songs { search, limit } => {
            let query = SongQuery {
                limit: Some(limit),
                search,
                ..SongQuery::default()
            };
            let page = client
                .list_songs(&query)
                .await
                .context("Failed to list songs")?;
            for song in &page.items {
                println!("{:>6}  {:<8}  {}", song.id, song.source.to_string(), song.title);
            }
            println!("{} of {} song(s)", page.items.len(), page.total_count());
        }
    }

    Ok(())
}

fn coordinator(client: &Arc<ApiClient>, config: &ClientConfig) -> QueueSyncCoordinator {
    let backend: Arc<dyn QueueBackend> = client.clone();
    QueueSyncCoordinator::new(backend, config.clone(), Arc::new(EventBus::default()))
}

/// Apply producer messages until nothing is in flight or Ctrl+C
async fn follow(coordinator: &mut QueueSyncCoordinator, mut notices: broadcast::Receiver<Notice>) {
    drain_notices(&mut notices);

    let mut last_rows = coordinator.rows();
    let mut last_pointer = None;
    while coordinator.is_busy() {
        tokio::select! {
            message = coordinator.next_message() => {
                let Some(message) = message else { break };
                coordinator.handle(message).await;
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }

        drain_notices(&mut notices);

        let pointer = coordinator.unmatched_progress().cloned();
        if pointer != last_pointer {
            if let Some(pointer) = &pointer {
                print_pointer(pointer);
            }
            last_pointer = pointer;
        }

        let rows = coordinator.rows();
        if rows != last_rows {
            print_rows(&rows);
            last_rows = rows;
        }
    }

    coordinator.shutdown();
    debug!("Follow loop finished");
}

fn drain_notices(notices: &mut broadcast::Receiver<Notice>) {
    loop {
        match notices.try_recv() {
            Ok(notice) => {
                let marker = if notice.is_error() { "!" } else { "*" };
                println!("{} {}", marker, notice.message());
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "Notice receiver lagged");
            }
            Err(_) => break,
        }
    }
}

fn print_pointer(pointer: &DownloadPointer) {
    println!(
        "  {} {:5.1}% {}",
        pointer.song_name.as_deref().unwrap_or("(unknown)"),
        pointer.percent,
        pointer.status_text
    );
}

fn print_rows(rows: &[RowView]) {
    println!("{:-<60}", "");
    for row in rows {
        let progress = row
            .progress
            .as_ref()
            .map(|p| format!("{:5.1}% {}", p.percent, p.status_text))
            .unwrap_or_default();
        let source = row.source.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "{:>6}  {:<11}  {:<8}  {:<24}  {}",
            row.id, row.status.to_string(), source, row.name, progress
        );
        if let Some(error) = &row.error_message {
            println!("        {}", error);
        }
    }
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
    }
}
