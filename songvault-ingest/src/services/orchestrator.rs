//! Ingestion orchestration
//!
//! Drives extraction, parsing, storage, and chart generation per content
//! type. The orchestrator is constructed from an explicit repository and
//! layout handle; scratch directories are RAII-owned, so cleanup happens
//! on every exit path, including errors and abandoned requests.

use crate::error::{IngestError, IngestResult};
use crate::models::{ChartDocument, ContentRecord};
use crate::repository::{move_dir, sanitize_component, ContentRepository};
use crate::services::analyzer::AudioAnalyzer;
use crate::services::decoder::{decode_audio, is_supported_audio};
use crate::services::extractor::ArchiveExtractor;
use crate::services::parser::{parse_descriptor, ParseOutcome};
use crate::services::synthesizer::ChartSynthesizer;
use songvault_common::{AssetType, ContentLayout};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of a cosmetic asset ingestion
#[derive(Debug, Clone)]
pub struct AssetOutcome {
    /// Final paths of the stored asset files
    pub stored: Vec<PathBuf>,
}

/// Result of raw-audio ingestion
#[derive(Debug, Clone)]
pub struct GeneratedChart {
    pub chart_path: PathBuf,
    pub tempo_bpm: f32,
    pub document: ChartDocument,
}

/// Per-request ingestion driver
pub struct IngestionOrchestrator {
    extractor: ArchiveExtractor,
    repository: ContentRepository,
    analyzer: AudioAnalyzer,
    synthesizer: ChartSynthesizer,
    layout: ContentLayout,
}

impl IngestionOrchestrator {
    pub fn new(repository: ContentRepository, layout: ContentLayout) -> Self {
        Self {
            extractor: ArchiveExtractor::new(layout.temp_dir()),
            repository,
            analyzer: AudioAnalyzer::new(),
            synthesizer: ChartSynthesizer::new(),
            layout,
        }
    }

    /// Ingest a song archive: extract, parse every descriptor found, and
    /// store each valid song. Descriptor failures are isolated; duplicates
    /// collapse to the existing record. Zero usable descriptors yields an
    /// empty list, not an error.
    pub async fn ingest_song(&self, archive_path: &Path) -> IngestResult<Vec<ContentRecord>> {
        if !ArchiveExtractor::is_archive(archive_path) {
            return Err(IngestError::UnsupportedFormat(format!(
                "Song uploads must be a .zip or .rar archive: {}",
                archive_path.display()
            )));
        }

        let scratch = self.extractor.extract(archive_path)?;

        let descriptors: Vec<PathBuf> = WalkDir::new(scratch.path())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_string_lossy()
                        .eq_ignore_ascii_case("song.ini")
            })
            .map(|entry| entry.path().to_path_buf())
            .collect();

        tracing::info!(
            "Found {} descriptor(s) in {}",
            descriptors.len(),
            archive_path.display()
        );

        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for descriptor in descriptors {
            let parsed = match parse_descriptor(&descriptor) {
                ParseOutcome::Parsed(song) => song,
                ParseOutcome::Skip => continue,
            };

            // The descriptor's folder holds the song's assets
            let source_dir = descriptor
                .parent()
                .unwrap_or_else(|| scratch.path())
                .to_path_buf();

            let outcome = self
                .repository
                .store(
                    &parsed.title,
                    &parsed.artist,
                    &parsed.album,
                    &source_dir,
                    parsed.metadata,
                )
                .await?;

            if seen.insert(outcome.record.guid) {
                records.push(outcome.record);
            }
        }

        // scratch dropped here: unconditional cleanup
        Ok(records)
    }

    /// Ingest a cosmetic asset: archives are extracted and every regular
    /// file moved into the asset folder; single files move directly.
    /// Re-uploading a same-named asset overwrites — dedup is a song-only
    /// concept.
    pub async fn ingest_asset(
        &self,
        path: &Path,
        asset_type: AssetType,
    ) -> IngestResult<AssetOutcome> {
        let asset_dir = self.layout.asset_dir(asset_type);
        std::fs::create_dir_all(&asset_dir)?;

        if ArchiveExtractor::is_archive(path) {
            let scratch = self.extractor.extract(path)?;

            let mut stored = Vec::new();
            let files: Vec<PathBuf> = WalkDir::new(scratch.path())
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.path().to_path_buf())
                .collect();

            for file in files {
                let Some(file_name) = file.file_name() else {
                    continue;
                };
                let dest = asset_dir.join(file_name);
                if dest.exists() {
                    std::fs::remove_file(&dest)?;
                }
                move_dir(&file, &dest)?;
                stored.push(dest);
            }

            tracing::info!(
                "Stored {} {} asset file(s)",
                stored.len(),
                asset_type.folder()
            );
            return Ok(AssetOutcome { stored });
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| {
                IngestError::UnsupportedFormat(format!("Not a file: {}", path.display()))
            })?
            .to_owned();
        let dest = asset_dir.join(file_name);
        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        move_dir(path, &dest)?;
        tracing::info!("Stored asset file: {}", dest.display());
        Ok(AssetOutcome { stored: vec![dest] })
    }

    /// Ingest a raw audio file: decode, detect tempo and beats, synthesize
    /// a chart skeleton, and persist it under the generator folder.
    pub async fn ingest_raw_audio(
        &self,
        audio_path: &Path,
        display_name: Option<&str>,
    ) -> IngestResult<GeneratedChart> {
        if !is_supported_audio(audio_path) {
            return Err(IngestError::UnsupportedFormat(format!(
                "Unsupported audio format: {}",
                audio_path.display()
            )));
        }

        let song_name = display_name
            .map(str::to_string)
            .or_else(|| {
                audio_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "untitled".to_string());

        let decoded = decode_audio(audio_path)?;
        let analysis = self.analyzer.analyze(&decoded.samples, decoded.sample_rate)?;
        let document = self.synthesizer.synthesize(&song_name, &analysis.beat_times);

        let output_dir = self
            .layout
            .generator_dir()
            .join(sanitize_component(&song_name));
        let chart_path = output_dir.join("notes.chart");
        self.synthesizer.write(&document, &chart_path)?;

        tracing::info!(
            "Generated chart for '{}': {:.2} BPM, {} sync events",
            song_name,
            analysis.tempo_bpm,
            document.sync_events_ms.len()
        );

        Ok(GeneratedChart {
            chart_path,
            tempo_bpm: analysis.tempo_bpm,
            document,
        })
    }
}
