//! songvault-ingest - content library ingestion tool
//!
//! Thin inbound boundary over the ingestion core: resolves the content
//! root, opens the database, and maps CLI subcommands onto the
//! orchestrator's entry points.

use anyhow::Result;
use clap::{Parser, Subcommand};
use songvault_common::{AssetType, ContentLayout};
use songvault_ingest::{ContentRepository, IngestionOrchestrator};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "songvault-ingest", about = "SongVault content ingestion", version)]
struct Cli {
    /// Content root folder (overrides SONGVAULT_CONTENT_DIR and config file)
    #[arg(long, global = true)]
    content_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a song archive (.zip or .rar containing song.ini descriptors)
    IngestSong {
        /// Path to the archive
        archive: PathBuf,
    },
    /// Ingest a cosmetic asset (file or archive)
    IngestAsset {
        /// Path to the asset file or archive
        path: PathBuf,
        /// Asset type: backgrounds, colors, or highways
        #[arg(long = "type")]
        asset_type: String,
    },
    /// Generate a chart skeleton from a raw audio file
    GenerateChart {
        /// Path to the audio file (.mp3, .ogg, .wav, .flac)
        audio: PathBuf,
        /// Song name for the chart header (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// List stored content records, newest first
    List {
        /// Case-insensitive substring filter over title/artist/album
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Delete a content record by identifier (files are kept)
    Delete {
        /// Record identifier
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let root = songvault_common::config::resolve_content_root(cli.content_dir.as_deref());
    let layout = ContentLayout::new(root)?;
    info!("Content root: {}", layout.root().display());

    let db = songvault_common::db::init_database(&layout.database_path()).await?;
    let repository = ContentRepository::new(db, layout.clone());
    let orchestrator = IngestionOrchestrator::new(repository.clone(), layout);

    match cli.command {
        Command::IngestSong { archive } => {
            let records = orchestrator.ingest_song(&archive).await?;
            if records.is_empty() {
                println!("No usable song descriptors found");
            }
            for record in records {
                println!(
                    "{}  {} - {} ({})",
                    record.guid, record.artist, record.title, record.album
                );
            }
        }
        Command::IngestAsset { path, asset_type } => {
            let asset_type: AssetType = asset_type.parse()?;
            let outcome = orchestrator.ingest_asset(&path, asset_type).await?;
            for stored in outcome.stored {
                println!("{}", stored.display());
            }
        }
        Command::GenerateChart { audio, name } => {
            let chart = orchestrator
                .ingest_raw_audio(&audio, name.as_deref())
                .await?;
            println!(
                "{:.2} BPM, {} sync events -> {}",
                chart.tempo_bpm,
                chart.document.sync_events_ms.len(),
                chart.chart_path.display()
            );
        }
        Command::List {
            search,
            limit,
            offset,
        } => {
            let page = repository.list(search.as_deref(), limit, offset).await?;
            println!("{} record(s) total", page.total);
            for record in page.records {
                println!(
                    "{}  {} - {} ({})",
                    record.guid, record.artist, record.title, record.album
                );
            }
        }
        Command::Delete { id } => {
            if repository.delete(id).await? {
                println!("Deleted {id}");
            } else {
                println!("No record with id {id}");
            }
        }
    }

    Ok(())
}
