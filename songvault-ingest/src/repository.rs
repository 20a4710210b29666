//! Deduplicated content repository
//!
//! Owns canonical file placement under `<root>/songs/<artist>/` and the
//! insert-or-fetch against the songs table. The dedup key is the exact
//! trimmed (title, artist, album) triple, compared case-sensitively;
//! "The Beatles" and "the beatles" are distinct artists.

use crate::error::{IngestError, IngestResult};
use crate::models::{ContentPage, ContentRecord};
use chrono::{DateTime, Utc};
use songvault_common::ContentLayout;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Result of a `store` call
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub record: ContentRecord,
    /// True when an existing record with the same triple was returned and
    /// the newly extracted files were discarded
    pub duplicate: bool,
}

/// Deduplicated insert-or-fetch against durable storage
#[derive(Clone)]
pub struct ContentRepository {
    db: SqlitePool,
    layout: ContentLayout,
}

impl ContentRepository {
    pub fn new(db: SqlitePool, layout: ContentLayout) -> Self {
        Self { db, layout }
    }

    /// Store extracted song content, deduplicating on the exact triple.
    ///
    /// If no record matches, `source_dir` is moved into a canonical
    /// per-artist folder and a new record inserted. If a record already
    /// exists (including one inserted concurrently between our check and
    /// insert), the existing identifier is returned and the new files are
    /// discarded. The unique index on (title, artist, album) makes the
    /// check-then-insert behave as a single logical transaction.
    pub async fn store(
        &self,
        title: &str,
        artist: &str,
        album: &str,
        source_dir: &Path,
        metadata: BTreeMap<String, String>,
    ) -> IngestResult<StoreOutcome> {
        // Dedup key is the trimmed triple; trim here so every caller
        // compares the same strings.
        let (title, artist, album) = (title.trim(), artist.trim(), album.trim());

        // Fast path: known duplicate, nothing is moved.
        if let Some(existing) = self.find_by_triple(title, artist, album).await? {
            tracing::info!(
                title,
                artist,
                "Duplicate content, returning existing record {}",
                existing.guid
            );
            return Ok(StoreOutcome {
                record: existing,
                duplicate: true,
            });
        }

        let final_dir = self.canonical_song_dir(artist, title)?;
        move_dir(source_dir, &final_dir)?;

        let record = ContentRecord {
            guid: Uuid::new_v4(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            folder_path: final_dir.to_string_lossy().into_owned(),
            metadata,
            created_at: Utc::now(),
        };

        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| IngestError::StorageFailure(e.to_string()))?;

        let insert = sqlx::query(
            r#"
            INSERT INTO songs (guid, title, artist, album, folder_path, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title, artist, album) DO NOTHING
            "#,
        )
        .bind(record.guid.to_string())
        .bind(&record.title)
        .bind(&record.artist)
        .bind(&record.album)
        .bind(&record.folder_path)
        .bind(&metadata_json)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.db)
        .await;

        let result = match insert {
            Ok(result) => result,
            Err(e) => {
                // The folder was already moved; a failed insert must not
                // strand it under the songs root with no record.
                std::fs::remove_dir_all(&final_dir).ok();
                return Err(e.into());
            }
        };

        if result.rows_affected() == 0 {
            // A concurrent store with the same triple won the insert.
            // Discard our copy and return the winner's record.
            std::fs::remove_dir_all(&final_dir).ok();
            let existing = self
                .find_by_triple(title, artist, album)
                .await?
                .ok_or_else(|| {
                    IngestError::StorageFailure(format!(
                        "Insert conflict but no row for triple ({title}, {artist}, {album})"
                    ))
                })?;
            tracing::info!(
                title,
                artist,
                "Lost insert race, returning existing record {}",
                existing.guid
            );
            return Ok(StoreOutcome {
                record: existing,
                duplicate: true,
            });
        }

        tracing::info!(
            title,
            artist,
            album,
            "Content added: {}",
            record.folder_path
        );
        Ok(StoreOutcome {
            record,
            duplicate: false,
        })
    }

    /// Load a single record by identifier
    pub async fn get(&self, guid: Uuid) -> IngestResult<Option<ContentRecord>> {
        let row = sqlx::query(
            "SELECT guid, title, artist, album, folder_path, metadata, created_at
             FROM songs WHERE guid = ?",
        )
        .bind(guid.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.map(record_from_row).transpose()
    }

    /// Delete a record by identifier; returns false if absent.
    ///
    /// Does not delete the underlying files: file lifecycle is a separate
    /// concern handled by library maintenance, not the repository.
    pub async fn delete(&self, guid: Uuid) -> IngestResult<bool> {
        let result = sqlx::query("DELETE FROM songs WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List records, newest first, with an optional case-insensitive
    /// substring filter over title/artist/album.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> IngestResult<ContentPage> {
        let term = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let (total, rows) = match &term {
            Some(pattern) => {
                let total: i64 = sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM songs
                    WHERE title LIKE ?1 ESCAPE '\'
                       OR artist LIKE ?1 ESCAPE '\'
                       OR album LIKE ?1 ESCAPE '\'
                    "#,
                )
                .bind(pattern)
                .fetch_one(&self.db)
                .await?;

                let rows = sqlx::query(
                    r#"
                    SELECT guid, title, artist, album, folder_path, metadata, created_at
                    FROM songs
                    WHERE title LIKE ?1 ESCAPE '\'
                       OR artist LIKE ?1 ESCAPE '\'
                       OR album LIKE ?1 ESCAPE '\'
                    ORDER BY rowid DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(pattern)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.db)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
                    .fetch_one(&self.db)
                    .await?;
                let rows = sqlx::query(
                    "SELECT guid, title, artist, album, folder_path, metadata, created_at
                     FROM songs ORDER BY rowid DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.db)
                .await?;
                (total, rows)
            }
        };

        let records = rows
            .into_iter()
            .map(record_from_row)
            .collect::<IngestResult<Vec<_>>>()?;

        Ok(ContentPage { total, records })
    }

    async fn find_by_triple(
        &self,
        title: &str,
        artist: &str,
        album: &str,
    ) -> IngestResult<Option<ContentRecord>> {
        let row = sqlx::query(
            "SELECT guid, title, artist, album, folder_path, metadata, created_at
             FROM songs WHERE title = ? AND artist = ? AND album = ?",
        )
        .bind(title)
        .bind(artist)
        .bind(album)
        .fetch_optional(&self.db)
        .await?;

        row.map(record_from_row).transpose()
    }

    /// Canonical destination: `songs/<artist>/<title>_<token>/`. The token
    /// disambiguates repeated titles by the same artist; path components
    /// are sanitized so metadata strings cannot escape the songs root.
    fn canonical_song_dir(&self, artist: &str, title: &str) -> IngestResult<PathBuf> {
        let artist_dir = self.layout.songs_dir().join(sanitize_component(artist));
        std::fs::create_dir_all(&artist_dir)?;

        let token = Uuid::new_v4().simple().to_string();
        Ok(artist_dir.join(format!("{}_{}", sanitize_component(title), &token[..8])))
    }
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> IngestResult<ContentRecord> {
    let guid_str: String = row.get("guid");
    let metadata_json: String = row.get("metadata");
    let created_at_str: String = row.get("created_at");

    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| IngestError::StorageFailure(format!("Bad guid {guid_str}: {e}")))?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| IngestError::StorageFailure(format!("Bad metadata JSON: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| IngestError::StorageFailure(format!("Bad timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(ContentRecord {
        guid,
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        folder_path: row.get("folder_path"),
        metadata,
        created_at,
    })
}

/// Replace path separators and traversal segments in a user-supplied name
pub(crate) fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Escape LIKE wildcards in user search terms
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Move a directory or file, rename-first with copy fallback for moves
/// across filesystems. The source is only removed after the destination
/// is confirmed to exist, so a failed move never strands content.
pub(crate) fn move_dir(source: &Path, dest: &Path) -> IngestResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match std::fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_recursive(source, dest)?;
            if !dest.exists() {
                return Err(IngestError::StorageFailure(format!(
                    "Move verification failed: {} missing after copy",
                    dest.display()
                )));
            }
            if source.is_dir() {
                std::fs::remove_dir_all(source)?;
            } else {
                std::fs::remove_file(source)?;
            }
            Ok(())
        }
    }
}

fn copy_recursive(source: &Path, dest: &Path) -> IngestResult<()> {
    if source.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(source, dest)?;
    }
    Ok(())
}
