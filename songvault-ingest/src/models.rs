//! Core data model for the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A durable content record, created once by the repository and never
/// mutated except deletion by identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub guid: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Canonical storage folder under `<root>/songs/<artist>/`
    pub folder_path: String,
    /// Open key set: optional and unrecognized descriptor keys, verbatim
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// One page of repository listing results, newest first
#[derive(Debug, Clone, Serialize)]
pub struct ContentPage {
    /// Total records matching the filter, ignoring pagination
    pub total: i64,
    pub records: Vec<ContentRecord>,
}

/// Validated song descriptor: required fields plus the open metadata bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSong {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub metadata: BTreeMap<String, String>,
}

/// Result of tempo/beat analysis of a decoded waveform. Transient:
/// produced and consumed within a single ingestion request.
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    /// Single scalar tempo estimate; 0.0 for silence / no periodicity
    pub tempo_bpm: f32,
    /// Beat timestamps in seconds, strictly increasing, first >= 0
    pub beat_times: Vec<f32>,
    /// Sample rate of the analyzed waveform
    pub sample_rate: u32,
}

/// A playable chart skeleton: header plus a synchronization track of
/// strictly increasing, duplicate-free millisecond events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDocument {
    pub song_name: String,
    pub artist: String,
    pub charter: String,
    pub sync_events_ms: Vec<u64>,
}
