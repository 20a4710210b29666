//! Song descriptor parsing
//!
//! Reads a `song.ini` descriptor: a plain-text, case-insensitive `[song]`
//! section of `key = value` lines, UTF-8 with an optional leading BOM.
//! Required fields are `name`, `artist`, and `album`; a descriptor missing
//! any of them is skipped, never a request failure, so a bad descriptor in
//! a multi-song pack does not abort its siblings.

use crate::models::ParsedSong;
use std::collections::BTreeMap;
use std::path::Path;

/// Result of parsing one descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(ParsedSong),
    /// Descriptor unreadable or missing required fields; soft skip
    Skip,
}

/// Parse a descriptor file into validated required fields plus the open
/// metadata bag. Unrecognized keys are preserved for forward compatibility.
pub fn parse_descriptor(descriptor_path: &Path) -> ParseOutcome {
    let raw = match std::fs::read(descriptor_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", descriptor_path.display(), e);
            return ParseOutcome::Skip;
        }
    };

    let text = String::from_utf8_lossy(&raw);
    let section = match song_section(&text) {
        Some(map) => map,
        None => {
            tracing::warn!("Missing [song] section in {}", descriptor_path.display());
            return ParseOutcome::Skip;
        }
    };

    let mut metadata = section;
    let title = take_required(&mut metadata, "name");
    let artist = take_required(&mut metadata, "artist");
    let album = take_required(&mut metadata, "album");

    match (title, artist, album) {
        (Some(title), Some(artist), Some(album)) => ParseOutcome::Parsed(ParsedSong {
            title,
            artist,
            album,
            metadata,
        }),
        _ => {
            tracing::warn!(
                "Missing required fields in {}, skipping descriptor",
                descriptor_path.display()
            );
            ParseOutcome::Skip
        }
    }
}

/// Collect `key = value` pairs from the `[song]` section. Keys are
/// lowercased, values trimmed verbatim; later duplicates overwrite.
fn song_section(text: &str) -> Option<BTreeMap<String, String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut in_song_section = false;
    let mut seen_song_section = false;
    let mut map = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let section = line[1..line.len() - 1].trim();
            in_song_section = section.eq_ignore_ascii_case("song");
            seen_song_section |= in_song_section;
            continue;
        }

        if !in_song_section {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if !key.is_empty() {
                map.insert(key, value.trim().to_string());
            }
        }
    }

    seen_song_section.then_some(map)
}

fn take_required(map: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    let value = map.remove(key)?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_descriptor(content: &str) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("song.ini");
        std::fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_parses_required_and_optional_fields() {
        let (_t, path) = write_descriptor(
            "[song]\nname = Test\nartist = Band\nalbum = Demo\ngenre = Rock\n",
        );
        match parse_descriptor(&path) {
            ParseOutcome::Parsed(song) => {
                assert_eq!(song.title, "Test");
                assert_eq!(song.artist, "Band");
                assert_eq!(song.album, "Demo");
                assert_eq!(song.metadata.len(), 1);
                assert_eq!(song.metadata.get("genre").map(String::as_str), Some("Rock"));
            }
            ParseOutcome::Skip => panic!("Expected Parsed"),
        }
    }

    #[test]
    fn test_section_and_keys_are_case_insensitive() {
        let (_t, path) = write_descriptor(
            "[SONG]\nName = A\nARTIST = B\nAlbum = C\nDiff_Guitar = 4\n",
        );
        match parse_descriptor(&path) {
            ParseOutcome::Parsed(song) => {
                assert_eq!(song.title, "A");
                assert_eq!(song.metadata.get("diff_guitar").map(String::as_str), Some("4"));
            }
            ParseOutcome::Skip => panic!("Expected Parsed"),
        }
    }

    #[test]
    fn test_tolerates_leading_bom() {
        let (_t, path) =
            write_descriptor("\u{feff}[song]\nname = A\nartist = B\nalbum = C\n");
        assert!(matches!(parse_descriptor(&path), ParseOutcome::Parsed(_)));
    }

    #[test]
    fn test_missing_required_field_skips() {
        let (_t, path) = write_descriptor("[song]\nname = A\nartist = B\n");
        assert_eq!(parse_descriptor(&path), ParseOutcome::Skip);
    }

    #[test]
    fn test_blank_required_field_skips() {
        let (_t, path) = write_descriptor("[song]\nname =   \nartist = B\nalbum = C\n");
        assert_eq!(parse_descriptor(&path), ParseOutcome::Skip);
    }

    #[test]
    fn test_missing_song_section_skips() {
        let (_t, path) = write_descriptor("[other]\nname = A\nartist = B\nalbum = C\n");
        assert_eq!(parse_descriptor(&path), ParseOutcome::Skip);
    }

    #[test]
    fn test_unrecognized_keys_preserved() {
        let (_t, path) = write_descriptor(
            "[song]\nname = A\nartist = B\nalbum = C\nfuture_key = kept\nloading_phrase = Hi\n",
        );
        match parse_descriptor(&path) {
            ParseOutcome::Parsed(song) => {
                assert_eq!(song.metadata.get("future_key").map(String::as_str), Some("kept"));
                assert_eq!(
                    song.metadata.get("loading_phrase").map(String::as_str),
                    Some("Hi")
                );
            }
            ParseOutcome::Skip => panic!("Expected Parsed"),
        }
    }

    #[test]
    fn test_values_are_trimmed() {
        let (_t, path) = write_descriptor(
            "[song]\nname =  Padded \nartist = B\nalbum = C\nyear =  1999 \n",
        );
        match parse_descriptor(&path) {
            ParseOutcome::Parsed(song) => {
                assert_eq!(song.title, "Padded");
                assert_eq!(song.metadata.get("year").map(String::as_str), Some("1999"));
            }
            ParseOutcome::Skip => panic!("Expected Parsed"),
        }
    }

    #[test]
    fn test_unreadable_file_skips() {
        assert_eq!(
            parse_descriptor(Path::new("/nonexistent/song.ini")),
            ParseOutcome::Skip
        );
    }
}
