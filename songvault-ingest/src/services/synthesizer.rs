//! Chart skeleton synthesis
//!
//! Renders a beat timeline into the chart document consumed by the game
//! client. Output carries tempo/sync markers only; note-lane data is
//! left for a human charter.

use crate::error::IngestResult;
use crate::models::ChartDocument;
use std::path::Path;

/// Placeholder artist emitted into the chart header
const PLACEHOLDER_ARTIST: &str = "Unknown";

/// Fixed charter tag emitted into the chart header
const CHARTER_TAG: &str = "AI";

/// Beat timeline to chart document renderer
pub struct ChartSynthesizer {
    /// Events within this many milliseconds of the previous kept event
    /// are collapsed, keeping the sync track strictly increasing
    epsilon_ms: u64,
}

impl ChartSynthesizer {
    pub fn new() -> Self {
        Self { epsilon_ms: 1 }
    }

    /// Build a chart document from beat timestamps in seconds.
    ///
    /// Each beat becomes one sync event at its time rounded to the nearest
    /// millisecond; negative times clamp to 0, and events inside the
    /// epsilon of the previous kept event are dropped.
    pub fn synthesize(&self, song_name: &str, beat_times: &[f32]) -> ChartDocument {
        let mut sync_events_ms: Vec<u64> = Vec::with_capacity(beat_times.len());

        for &t in beat_times {
            let ms = (f64::from(t.max(0.0)) * 1000.0).round() as u64;
            match sync_events_ms.last() {
                Some(&last) if ms <= last + self.epsilon_ms => continue,
                _ => sync_events_ms.push(ms),
            }
        }

        ChartDocument {
            song_name: song_name.to_string(),
            artist: PLACEHOLDER_ARTIST.to_string(),
            charter: CHARTER_TAG.to_string(),
            sync_events_ms,
        }
    }

    /// Render the on-disk chart format. Byte-exact contract with the
    /// consuming client; do not reformat.
    pub fn render(&self, doc: &ChartDocument) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "[Song]\n{{\n  Name = {}\n  Artist = {}\n  Charter = {}\n}}\n",
            doc.song_name, doc.artist, doc.charter
        ));
        out.push_str("\n[SyncTrack]\n{\n");
        for ms in &doc.sync_events_ms {
            out.push_str(&format!("  {ms} = TS {ms}\n"));
        }
        out.push_str("}\n");
        out
    }

    /// Write the rendered chart document to `path`
    pub fn write(&self, doc: &ChartDocument, path: &Path) -> IngestResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render(doc))?;
        tracing::info!("Wrote chart: {}", path.display());
        Ok(())
    }
}

impl Default for ChartSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}
