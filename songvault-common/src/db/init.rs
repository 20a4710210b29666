//! Database initialization
//!
//! Opens (creating if necessary) the SQLite database and applies the
//! idempotent schema. The unique index on the (title, artist, album)
//! triple is what makes the repository's insert-or-fetch race-free.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_songs_table(&pool).await?;

    Ok(pool)
}

/// Connection-level pragmas: WAL for concurrent ingestion requests,
/// busy timeout so parallel writers queue instead of failing fast.
async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;
    Ok(())
}

/// Songs table: one row per accepted content record.
///
/// The dedup key is the exact trimmed (title, artist, album) triple;
/// comparisons are case-sensitive. `metadata` is an open key set stored
/// as JSON.
async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT NOT NULL,
            folder_path TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_songs_dedup_triple
        ON songs (title, artist, album)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("songvault.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        // Schema is idempotent
        create_songs_table(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_dedup_triple_is_unique() {
        let temp = tempfile::tempdir().unwrap();
        let pool = init_database(&temp.path().join("songvault.db"))
            .await
            .unwrap();

        let insert = |guid: &str| {
            let guid = guid.to_string();
            let pool = pool.clone();
            async move {
                sqlx::query(
                    "INSERT INTO songs (guid, title, artist, album, folder_path, created_at)
                     VALUES (?, 'Test', 'Band', 'Demo', '/x', '2026-01-01T00:00:00Z')",
                )
                .bind(guid)
                .execute(&pool)
                .await
            }
        };

        insert("a").await.unwrap();
        assert!(insert("b").await.is_err());
    }
}
