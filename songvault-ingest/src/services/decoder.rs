//! Audio decoding
//!
//! Decodes an uploaded audio file to a mono f32 waveform at its native
//! sample rate using symphonia. Multi-channel sources are downmixed by
//! channel average; no resampling is performed, the analyzer works at the
//! source rate.

use crate::error::{IngestError, IngestResult};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio formats accepted for raw-audio ingestion
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "ogg", "wav", "flac"];

/// Decoded waveform: mono samples plus the source sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// True when the path carries a supported audio extension
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .map(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Decode an audio file to mono PCM
pub fn decode_audio(path: &Path) -> IngestResult<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| IngestError::AnalysisFailure(format!("Failed to probe audio format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| IngestError::AnalysisFailure("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| IngestError::AnalysisFailure("Sample rate not specified".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| IngestError::AnalysisFailure(format!("Failed to create decoder: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(IngestError::AnalysisFailure(format!("Decode error: {e}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Recoverable per-packet decode errors are skipped
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => {
                return Err(IngestError::AnalysisFailure(format!("Decode error: {e}")));
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let capacity = decoded.capacity() as u64;

        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::<f32>::new(capacity, spec));
        buf.copy_interleaved_ref(decoded);

        // Downmix interleaved frames to mono by channel average
        for frame in buf.samples().chunks_exact(channels) {
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if samples.is_empty() {
        return Err(IngestError::AnalysisFailure(
            "Decoded zero audio samples".to_string(),
        ));
    }

    tracing::debug!(
        "Decoded {}: {} mono samples at {} Hz",
        path.display(),
        samples.len(),
        sample_rate
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("song.mp3")));
        assert!(is_supported_audio(Path::new("song.WAV")));
        assert!(is_supported_audio(Path::new("song.flac")));
        assert!(!is_supported_audio(Path::new("song.m4a")));
        assert!(!is_supported_audio(Path::new("song")));
    }

    #[test]
    fn test_decodes_wav_clicks() {
        let temp = tempfile::tempdir().unwrap();
        let wav_path = temp.path().join("clicks.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
        for i in 0..44100 * 2 {
            let value = if i % 22050 < 200 { i16::MAX / 2 } else { 0 };
            // Two identical channels
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_audio(&wav_path).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        // Stereo downmixed to mono
        assert_eq!(decoded.samples.len(), 44100 * 2);
        assert!(decoded.samples.iter().any(|s| s.abs() > 0.3));
    }

    #[test]
    fn test_garbage_input_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(
            decode_audio(&path),
            Err(IngestError::AnalysisFailure(_))
        ));
    }
}
