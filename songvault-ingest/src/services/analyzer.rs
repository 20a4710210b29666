//! Tempo and beat detection
//!
//! Estimates a single scalar tempo and a phase-aligned beat grid from a
//! decoded mono waveform. The pipeline is a short-time energy-flux onset
//! envelope followed by autocorrelation over the plausible tempo range,
//! with parabolic interpolation around the winning lag. Tempo is modeled
//! as a single global value; tempo changes are not tracked.

use crate::error::{IngestError, IngestResult};
use crate::models::AudioAnalysis;

/// Minimum analyzable duration in seconds
const MIN_DURATION_SECS: f32 = 1.0;

/// Peak amplitude below which input is treated as silence
const SILENCE_PEAK: f32 = 1e-4;

/// Tempo and beat-grid estimator
pub struct AudioAnalyzer {
    frame_size: usize,
    hop_size: usize,
    min_bpm: f32,
    max_bpm: f32,
}

impl AudioAnalyzer {
    pub fn new() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            min_bpm: 40.0,
            max_bpm: 240.0,
        }
    }

    /// Analyze a mono waveform.
    ///
    /// Silence or aperiodic input yields tempo 0 and an empty beat
    /// sequence (not an error); input shorter than one second fails with
    /// `InsufficientAudio`.
    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> IngestResult<AudioAnalysis> {
        if sample_rate == 0 {
            return Err(IngestError::AnalysisFailure(
                "Sample rate must be non-zero".to_string(),
            ));
        }

        let duration = samples.len() as f32 / sample_rate as f32;
        if duration < MIN_DURATION_SECS {
            return Err(IngestError::InsufficientAudio {
                got: duration,
                min: MIN_DURATION_SECS,
            });
        }

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak < SILENCE_PEAK {
            tracing::debug!("Near-silent input (peak {peak:.2e}), no tempo");
            return Ok(AudioAnalysis {
                tempo_bpm: 0.0,
                beat_times: Vec::new(),
                sample_rate,
            });
        }

        let envelope = self.onset_envelope(samples);
        if envelope.iter().sum::<f32>() <= f32::EPSILON {
            tracing::debug!("Flat onset envelope, no tempo");
            return Ok(AudioAnalysis {
                tempo_bpm: 0.0,
                beat_times: Vec::new(),
                sample_rate,
            });
        }

        let (tempo_bpm, period_frames) = match self.estimate_period(&envelope, sample_rate) {
            Some(estimate) => estimate,
            None => {
                tracing::debug!("No dominant periodicity in tempo range");
                return Ok(AudioAnalysis {
                    tempo_bpm: 0.0,
                    beat_times: Vec::new(),
                    sample_rate,
                });
            }
        };

        let beat_times = self.beat_grid(&envelope, period_frames, duration, sample_rate);
        tracing::debug!(
            "Estimated tempo {:.2} BPM, {} beats over {:.2}s",
            tempo_bpm,
            beat_times.len(),
            duration
        );

        Ok(AudioAnalysis {
            tempo_bpm,
            beat_times,
            sample_rate,
        })
    }

    /// Short-time onset-strength envelope: half-wave rectified difference
    /// of successive log frame energies.
    fn onset_envelope(&self, samples: &[f32]) -> Vec<f32> {
        if samples.len() < self.frame_size {
            return Vec::new();
        }

        let frame_count = (samples.len() - self.frame_size) / self.hop_size + 1;
        let mut log_energy = Vec::with_capacity(frame_count);
        for i in 0..frame_count {
            let start = i * self.hop_size;
            let frame = &samples[start..start + self.frame_size];
            let energy: f32 =
                frame.iter().map(|s| s * s).sum::<f32>() / self.frame_size as f32;
            log_energy.push((1.0 + 1000.0 * energy).ln());
        }

        let mut envelope = vec![0.0f32; log_energy.len()];
        for i in 1..log_energy.len() {
            envelope[i] = (log_energy[i] - log_energy[i - 1]).max(0.0);
        }
        envelope
    }

    /// Dominant periodicity of the envelope within [min_bpm, max_bpm],
    /// via autocorrelation with parabolic peak refinement.
    ///
    /// Returns (tempo in BPM, period in envelope frames), or None when no
    /// lag in range shows positive correlation.
    fn estimate_period(&self, envelope: &[f32], sample_rate: u32) -> Option<(f32, f32)> {
        let frames_per_second = sample_rate as f32 / self.hop_size as f32;
        let lag_min = ((60.0 / self.max_bpm) * frames_per_second).floor().max(1.0) as usize;
        let lag_max = (((60.0 / self.min_bpm) * frames_per_second).ceil() as usize)
            .min(envelope.len().saturating_sub(1));

        if lag_min >= lag_max {
            return None;
        }

        // Length-normalized autocorrelation so long lags are not penalized.
        let score = |lag: usize| -> f32 {
            let n = envelope.len() - lag;
            if n == 0 {
                return 0.0;
            }
            let sum: f32 = (0..n).map(|i| envelope[i] * envelope[i + lag]).sum();
            sum / n as f32
        };

        let mut best_lag = 0usize;
        let mut best_score = 0.0f32;
        for lag in lag_min..=lag_max {
            let s = score(lag);
            if s > best_score {
                best_score = s;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_score <= 0.0 {
            return None;
        }

        // Parabolic interpolation around the winning integer lag.
        let refined = if best_lag > lag_min && best_lag < lag_max {
            let (s_prev, s_here, s_next) = (
                score(best_lag - 1),
                score(best_lag),
                score(best_lag + 1),
            );
            let denom = s_prev - 2.0 * s_here + s_next;
            if denom.abs() > f32::EPSILON {
                let delta = 0.5 * (s_prev - s_next) / denom;
                best_lag as f32 + delta.clamp(-0.5, 0.5)
            } else {
                best_lag as f32
            }
        } else {
            best_lag as f32
        };

        let tempo = 60.0 * frames_per_second / refined;
        Some((tempo, refined))
    }

    /// Align a beat grid of the given period in phase with the strongest
    /// onsets, emitting timestamps across the signal duration.
    fn beat_grid(
        &self,
        envelope: &[f32],
        period_frames: f32,
        duration: f32,
        sample_rate: u32,
    ) -> Vec<f32> {
        let seconds_per_frame = self.hop_size as f32 / sample_rate as f32;

        // Phase with maximum envelope energy at the grid points.
        let phase_candidates = period_frames.floor().max(1.0) as usize;
        let mut best_phase = 0usize;
        let mut best_energy = f32::MIN;
        for phase in 0..phase_candidates {
            let mut energy = 0.0f32;
            let mut pos = phase as f32;
            while (pos as usize) < envelope.len() {
                let idx = (pos.round() as usize).min(envelope.len() - 1);
                energy += envelope[idx];
                pos += period_frames;
            }
            if energy > best_energy {
                best_energy = energy;
                best_phase = phase;
            }
        }

        let period_secs = period_frames * seconds_per_frame;
        let mut beats = Vec::new();
        let mut t = best_phase as f32 * seconds_per_frame;
        while t <= duration {
            beats.push(t);
            t += period_secs;
        }
        beats
    }
}

impl Default for AudioAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    /// Synthetic waveform with a short click every `interval` seconds
    fn click_track(duration_secs: f32, interval: f32) -> Vec<f32> {
        let len = (duration_secs * SR as f32) as usize;
        let mut samples = vec![0.0f32; len];
        let mut t = 0.0f32;
        while t < duration_secs {
            let start = (t * SR as f32) as usize;
            for i in 0..((SR / 200) as usize) {
                if start + i < len {
                    samples[start + i] = 0.9;
                }
            }
            t += interval;
        }
        samples
    }

    #[test]
    fn test_silence_yields_zero_tempo_and_no_beats() {
        let analyzer = AudioAnalyzer::new();
        let silence = vec![0.0f32; SR as usize * 5];
        let analysis = analyzer.analyze(&silence, SR).unwrap();
        assert_eq!(analysis.tempo_bpm, 0.0);
        assert!(analysis.beat_times.is_empty());
        assert_eq!(analysis.sample_rate, SR);
    }

    #[test]
    fn test_short_input_is_insufficient() {
        let analyzer = AudioAnalyzer::new();
        let short = vec![0.5f32; (SR / 2) as usize];
        match analyzer.analyze(&short, SR) {
            Err(IngestError::InsufficientAudio { .. }) => {}
            other => panic!("Expected InsufficientAudio, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_sample_rate_fails() {
        let analyzer = AudioAnalyzer::new();
        assert!(analyzer.analyze(&[0.1; 1000], 0).is_err());
    }

    #[test]
    fn test_click_track_tempo_within_tolerance() {
        let analyzer = AudioAnalyzer::new();
        // Clicks every 0.5s => 120 BPM
        let samples = click_track(10.0, 0.5);
        let analysis = analyzer.analyze(&samples, SR).unwrap();

        assert!(
            (analysis.tempo_bpm - 120.0).abs() < 3.0,
            "Expected ~120 BPM, got {}",
            analysis.tempo_bpm
        );
    }

    #[test]
    fn test_beat_grid_is_strictly_increasing_and_nonnegative() {
        let analyzer = AudioAnalyzer::new();
        let samples = click_track(8.0, 0.4);
        let analysis = analyzer.analyze(&samples, SR).unwrap();

        assert!(!analysis.beat_times.is_empty());
        assert!(analysis.beat_times[0] >= 0.0);
        for pair in analysis.beat_times.windows(2) {
            assert!(pair[1] > pair[0], "Beats not strictly increasing: {pair:?}");
        }
        // Grid spans the signal duration
        let last = *analysis.beat_times.last().unwrap();
        assert!(last <= 8.0 + f32::EPSILON);
        assert!(last > 6.0);
    }

    #[test]
    fn test_slow_click_track() {
        let analyzer = AudioAnalyzer::new();
        // Clicks every 1.0s => 60 BPM
        let samples = click_track(12.0, 1.0);
        let analysis = analyzer.analyze(&samples, SR).unwrap();
        assert!(
            (analysis.tempo_bpm - 60.0).abs() < 2.0,
            "Expected ~60 BPM, got {}",
            analysis.tempo_bpm
        );
    }
}
