//! songvault-ingest library interface
//!
//! Core ingestion pipeline for the SongVault content library: safe archive
//! extraction, descriptor parsing, deduplicated storage, and chart skeleton
//! generation from raw audio.

pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use crate::error::{IngestError, IngestResult};
pub use crate::models::{AudioAnalysis, ChartDocument, ContentPage, ContentRecord, ParsedSong};
pub use crate::repository::{ContentRepository, StoreOutcome};
pub use crate::services::analyzer::AudioAnalyzer;
pub use crate::services::extractor::{ArchiveExtractor, ScratchDir};
pub use crate::services::orchestrator::{AssetOutcome, GeneratedChart, IngestionOrchestrator};
pub use crate::services::parser::{parse_descriptor, ParseOutcome};
pub use crate::services::synthesizer::ChartSynthesizer;
