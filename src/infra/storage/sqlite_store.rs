use crate::core::mentions::{HistoryError, HistoryStore, MentionHistoryRecord};
use crate::core::moderators::{DirectoryError, DirectoryStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// SQLite-backed store for the modlist cache and mention history.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS moderators (
                community TEXT PRIMARY KEY,
                usernames TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mention_history (
                author TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0,
                objects TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for SqliteStore {
    async fn load_moderators(
        &self,
        community: &str,
    ) -> Result<Option<Vec<String>>, DirectoryError> {
        let row = sqlx::query("SELECT usernames FROM moderators WHERE community = ?")
            .bind(community.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DirectoryError::StorageError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let usernames_json: String = row.get("usernames");
        let usernames = serde_json::from_str(&usernames_json)
            .map_err(|e| DirectoryError::StorageError(e.to_string()))?;
        Ok(Some(usernames))
    }

    async fn store_moderators(
        &self,
        community: &str,
        moderators: &[String],
    ) -> Result<(), DirectoryError> {
        let usernames_json = serde_json::to_string(moderators)
            .map_err(|e| DirectoryError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO moderators (community, usernames, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(community) DO UPDATE SET
                usernames = excluded.usernames,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(community.to_lowercase())
        .bind(usernames_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn clear_moderators(&self, community: &str) -> Result<(), DirectoryError> {
        sqlx::query("DELETE FROM moderators WHERE community = ?")
            .bind(community.to_lowercase())
            .execute(&self.pool)
            .await
            .map_err(|e| DirectoryError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn get(&self, author: &str) -> Result<MentionHistoryRecord, HistoryError> {
        let row = sqlx::query("SELECT count, objects FROM mention_history WHERE author = ?")
            .bind(author)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| HistoryError::StorageError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(MentionHistoryRecord::default());
        };

        let objects_json: String = row.get("objects");
        Ok(MentionHistoryRecord {
            count: row.get::<i64, _>("count") as u64,
            objects: serde_json::from_str(&objects_json)
                .map_err(|e| HistoryError::StorageError(e.to_string()))?,
        })
    }

    async fn put(&self, author: &str, record: &MentionHistoryRecord) -> Result<(), HistoryError> {
        let objects_json = serde_json::to_string(&record.objects)
            .map_err(|e| HistoryError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO mention_history (author, count, objects, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(author) DO UPDATE SET
                count = excluded.count,
                objects = excluded.objects,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(author)
        .bind(record.count as i64)
        .bind(objects_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn counts(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        let rows = sqlx::query("SELECT author, count FROM mention_history")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("author"),
                    row.get::<i64, _>("count") as u64,
                )
            })
            .collect())
    }

    // Let SQLite do the sorting instead of pulling every row into memory first.
    async fn ranked_by_count(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        let rows = sqlx::query("SELECT author, count FROM mention_history ORDER BY count DESC, author ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("author"),
                    row.get::<i64, _>("count") as u64,
                )
            })
            .collect())
    }
}
