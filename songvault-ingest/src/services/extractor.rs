//! Safe archive extraction
//!
//! Unpacks a `.zip` or `.rar` upload into a fresh, uniquely named scratch
//! directory. Entry paths are validated before any byte is written: one
//! absolute or parent-traversing entry rejects the whole archive.

use crate::error::{IngestError, IngestResult};
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;
use zip::ZipArchive;

/// Request-scoped extraction workspace.
///
/// Exclusively owned by the extraction call that created it; the directory
/// and everything in it is removed on drop, on every exit path.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(parent: &Path) -> IngestResult<Self> {
        let token = Uuid::new_v4().simple().to_string();
        let path = parent.join(format!("extract_{}", &token[..12]));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove scratch dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Archive extractor for the two supported upload formats
pub struct ArchiveExtractor {
    scratch_root: PathBuf,
}

impl ArchiveExtractor {
    /// `scratch_root` is the parent under which scratch directories are
    /// created (the layout's temp folder).
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    /// True when the path carries one of the supported archive extensions
    pub fn is_archive(path: &Path) -> bool {
        matches!(
            lowercase_extension(path).as_deref(),
            Some("zip") | Some("rar")
        )
    }

    /// Extract `archive_path` into a fresh scratch directory.
    ///
    /// On any failure the partially written scratch directory is deleted
    /// before the error returns (via `ScratchDir::drop`).
    pub fn extract(&self, archive_path: &Path) -> IngestResult<ScratchDir> {
        let scratch = ScratchDir::create(&self.scratch_root)?;
        tracing::info!(
            "Extracting {} to {}",
            archive_path.display(),
            scratch.path().display()
        );

        match lowercase_extension(archive_path).as_deref() {
            Some("zip") => self.extract_zip(archive_path, scratch.path())?,
            Some("rar") => self.extract_rar(archive_path, scratch.path())?,
            other => {
                return Err(IngestError::UnsupportedFormat(format!(
                    "{} (extension {:?})",
                    archive_path.display(),
                    other.unwrap_or("none")
                )));
            }
        }

        Ok(scratch)
    }

    fn extract_zip(&self, archive_path: &Path, dest: &Path) -> IngestResult<()> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| IngestError::ExtractionFailed(format!("Failed to read zip: {e}")))?;

        // Pass 1: validate every entry path before writing anything.
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| IngestError::ExtractionFailed(format!("Bad zip entry {i}: {e}")))?;
            if !is_safe_entry_path(Path::new(entry.name())) {
                return Err(IngestError::UnsafeArchive(entry.name().to_string()));
            }
        }

        // Pass 2: write entries into the scratch directory.
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| IngestError::ExtractionFailed(format!("Bad zip entry {i}: {e}")))?;
            let out_path = dest.join(Path::new(entry.name()));

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out_file = File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file)?;
        }

        Ok(())
    }

    fn extract_rar(&self, archive_path: &Path, dest: &Path) -> IngestResult<()> {
        // Pass 1: list entries, rejecting continuation volumes and unsafe
        // paths before extraction starts.
        let listing = unrar::Archive::new(archive_path)
            .open_for_listing()
            .map_err(|e| IngestError::ExtractionFailed(format!("Failed to open rar: {e}")))?;

        for entry in listing {
            let header = entry
                .map_err(|e| IngestError::ExtractionFailed(format!("Bad rar entry: {e}")))?;
            if header.is_split() {
                return Err(IngestError::MultiVolumeUnsupported(
                    archive_path.to_path_buf(),
                ));
            }
            if !is_safe_entry_path(&header.filename) {
                return Err(IngestError::UnsafeArchive(
                    header.filename.to_string_lossy().into_owned(),
                ));
            }
        }

        // Pass 2: extract under the scratch directory.
        let mut archive = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| IngestError::ExtractionFailed(format!("Failed to open rar: {e}")))?;

        while let Some(header) = archive
            .read_header()
            .map_err(|e| IngestError::ExtractionFailed(format!("Bad rar header: {e}")))?
        {
            archive = if header.entry().is_file() {
                header
                    .extract_with_base(dest)
                    .map_err(|e| IngestError::ExtractionFailed(format!("Rar extract: {e}")))?
            } else {
                header
                    .skip()
                    .map_err(|e| IngestError::ExtractionFailed(format!("Rar skip: {e}")))?
            };
        }

        Ok(())
    }
}

/// An entry path is safe when it is relative and contains only normal
/// components: no root, no drive prefix, no `..` segments.
fn is_safe_entry_path(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    path.components().all(|c| match c {
        Component::Normal(_) | Component::CurDir => true,
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => false,
    })
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_entry_path_safety() {
        assert!(is_safe_entry_path(Path::new("song/notes.chart")));
        assert!(is_safe_entry_path(Path::new("./song.ini")));
        assert!(!is_safe_entry_path(Path::new("../escape.ini")));
        assert!(!is_safe_entry_path(Path::new("a/../../escape.ini")));
        assert!(!is_safe_entry_path(Path::new("/etc/passwd")));
        assert!(!is_safe_entry_path(Path::new("")));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("content.7z");
        std::fs::write(&archive, b"not really").unwrap();

        let extractor = ArchiveExtractor::new(temp.path().join("scratch"));
        match extractor.extract(&archive) {
            Err(IngestError::UnsupportedFormat(_)) => {}
            other => panic!("Expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_extracts_nested_zip_entries() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("pack.zip");
        write_zip(
            &archive,
            &[
                ("My Song/song.ini", b"[song]\nname = A\n".as_slice()),
                ("My Song/audio.ogg", b"\x00\x01".as_slice()),
            ],
        );

        let extractor = ArchiveExtractor::new(temp.path().join("scratch"));
        let scratch = extractor.extract(&archive).unwrap();
        assert!(scratch.path().join("My Song/song.ini").is_file());
        assert!(scratch.path().join("My Song/audio.ogg").is_file());

        let scratch_path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!scratch_path.exists());
    }

    #[test]
    fn test_traversal_entry_rejects_whole_archive() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(
            &archive,
            &[
                ("good.txt", b"ok".as_slice()),
                ("../evil.txt", b"bad".as_slice()),
            ],
        );

        let scratch_root = temp.path().join("scratch");
        let extractor = ArchiveExtractor::new(&scratch_root);
        match extractor.extract(&archive) {
            Err(IngestError::UnsafeArchive(name)) => assert!(name.contains("evil.txt")),
            other => panic!("Expected UnsafeArchive, got {other:?}"),
        }

        // Nothing was written and the scratch dir is gone.
        assert!(!temp.path().join("evil.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(&scratch_root)
            .map(|d| d.flatten().collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_extracts_rar_entries() {
        let temp = tempfile::tempdir().unwrap();
        let extractor = ArchiveExtractor::new(temp.path().join("scratch"));
        let scratch = extractor.extract(&fixture("songpack.rar")).unwrap();

        let descriptor =
            std::fs::read_to_string(scratch.path().join("My Song/song.ini")).unwrap();
        assert!(descriptor.contains("name = Rar Song"));
        assert!(scratch.path().join("My Song/audio.ogg").is_file());
    }

    #[test]
    fn test_multipart_rar_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let scratch_root = temp.path().join("scratch");
        let extractor = ArchiveExtractor::new(&scratch_root);

        match extractor.extract(&fixture("split.part1.rar")) {
            Err(IngestError::MultiVolumeUnsupported(path)) => {
                assert!(path.ends_with("split.part1.rar"));
            }
            other => panic!("Expected MultiVolumeUnsupported, got {other:?}"),
        }

        // Rejected before anything was written
        let leftovers: Vec<_> = std::fs::read_dir(&scratch_root)
            .map(|d| d.flatten().collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_is_archive() {
        assert!(ArchiveExtractor::is_archive(Path::new("a.ZIP")));
        assert!(ArchiveExtractor::is_archive(Path::new("a.rar")));
        assert!(!ArchiveExtractor::is_archive(Path::new("a.png")));
        assert!(!ArchiveExtractor::is_archive(Path::new("noext")));
    }
}
