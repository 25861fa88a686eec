//! Keyed document store for harvested aggregates.
//!
//! One row per channel; the aggregate itself is stored as a JSON body and is
//! always replaced as a whole.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use libsql::{Connection, params};
use serde::Serialize;
use tracing::info;

use crate::db;
use crate::error::{HarvestError, HarvestResult};
use crate::metadata::ChannelAggregate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Listing projection used by selection UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub channel_id: String,
    pub channel_name: String,
    pub harvested_at: String,
}

#[derive(Debug)]
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    pub async fn open(path: &Path) -> HarvestResult<Self> {
        let conn = db::open_local(path).await?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                channel_id TEXT PRIMARY KEY,
                channel_name TEXT NOT NULL,
                harvested_at TEXT NOT NULL,
                body_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(channel_name);
            "#,
        )
        .await?;
        Ok(Self { conn })
    }

    /// Replaces the stored aggregate for its channel id, inserting it when
    /// none exists.
    pub async fn upsert(&self, aggregate: &ChannelAggregate) -> HarvestResult<UpsertOutcome> {
        let body = serde_json::to_string(aggregate)
            .map_err(|err| HarvestError::store(format!("serializing aggregate: {err}")))?;
        let harvested_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let tx = self.conn.transaction().await?;
        let mut existing = tx
            .query(
                "SELECT 1 FROM documents WHERE channel_id = ?1",
                params![aggregate.channel_id()],
            )
            .await?;
        let outcome = if existing.next().await?.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        };
        drop(existing);

        tx.execute(
            r#"
            INSERT INTO documents (channel_id, channel_name, harvested_at, body_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(channel_id) DO UPDATE SET
                channel_name = excluded.channel_name,
                harvested_at = excluded.harvested_at,
                body_json = excluded.body_json
            "#,
            params![
                aggregate.channel_id(),
                aggregate.channel_name(),
                harvested_at,
                body
            ],
        )
        .await?;
        tx.commit().await?;

        info!(
            channel_id = aggregate.channel_id(),
            ?outcome,
            videos = aggregate.videos.len(),
            "stored aggregate"
        );
        Ok(outcome)
    }

    pub async fn find_one(&self, channel_id: &str) -> HarvestResult<Option<ChannelAggregate>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body_json FROM documents WHERE channel_id = ?1",
                params![channel_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let body: String = row.get(0)?;
        let aggregate = serde_json::from_str(&body).map_err(|err| {
            HarvestError::store(format!("stored document for {channel_id} is corrupt: {err}"))
        })?;
        Ok(Some(aggregate))
    }

    /// Deletes the document for `channel_id`, returning how many were removed
    /// (0 or 1).
    pub async fn delete_one(&self, channel_id: &str) -> HarvestResult<u64> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM documents WHERE channel_id = ?1",
                params![channel_id],
            )
            .await?;
        info!(channel_id, deleted, "deleted aggregate document");
        Ok(deleted)
    }

    /// Channel id/name pairs of every stored document, ordered by name.
    pub async fn list(&self) -> HarvestResult<Vec<DocumentSummary>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT channel_id, channel_name, harvested_at
                FROM documents
                ORDER BY channel_name COLLATE NOCASE, channel_id
                "#,
                params![],
            )
            .await?;

        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await? {
            summaries.push(DocumentSummary {
                channel_id: row.get(0)?,
                channel_name: row.get(1)?,
                harvested_at: row.get(2)?,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ChannelSummary, CommentRecord, VideoRecord};
    use tempfile::tempdir;

    fn aggregate(channel_id: &str, name: &str, videos: Vec<VideoRecord>) -> ChannelAggregate {
        ChannelAggregate {
            summary: ChannelSummary {
                channel_id: channel_id.into(),
                channel_name: name.into(),
                subscriber_count: Some(1),
                view_count: Some(2),
                video_count: Some(videos.len() as i64),
                playlist_id: format!("UU{channel_id}"),
                description: String::new(),
            },
            videos,
        }
    }

    fn video(id: &str, comments: Option<Vec<CommentRecord>>) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            title: id.into(),
            published_at: "2024-01-01T00:00:00Z".into(),
            view_count: Some(1),
            like_count: None,
            favorite_count: None,
            comment_count: None,
            description: String::new(),
            duration: "00:00:10".into(),
            caption_available: true,
            comments,
        }
    }

    async fn open_store() -> HarvestResult<(tempfile::TempDir, DocumentStore)> {
        let dir = tempdir().map_err(|err| HarvestError::store(err.to_string()))?;
        let store = DocumentStore::open(&dir.path().join("docs/documents.db")).await?;
        Ok((dir, store))
    }

    #[tokio::test]
    async fn upsert_reports_insert_then_replace() -> HarvestResult<()> {
        let (_dir, store) = open_store().await?;

        let first = aggregate("UC1", "First", vec![video("a", None)]);
        assert_eq!(store.upsert(&first).await?, UpsertOutcome::Inserted);

        let second = aggregate("UC1", "Renamed", vec![video("b", None), video("c", None)]);
        assert_eq!(store.upsert(&second).await?, UpsertOutcome::Replaced);

        let stored = store.find_one("UC1").await?.expect("document exists");
        assert_eq!(stored, second);
        assert_eq!(store.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn reload_preserves_absent_comment_samples() -> HarvestResult<()> {
        let (_dir, store) = open_store().await?;
        let sample = vec![CommentRecord {
            comment_id: "c".into(),
            video_id: "with".into(),
            text: "t".into(),
            author: "a".into(),
            published_at: "2024-01-01T00:00:00Z".into(),
        }];
        let original = aggregate(
            "UC2",
            "Two",
            vec![video("without", None), video("with", Some(sample))],
        );
        store.upsert(&original).await?;

        let reloaded = store.find_one("UC2").await?.expect("document exists");
        assert_eq!(reloaded.videos[0].comments, None);
        assert_eq!(reloaded.videos[1].comments.as_ref().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn delete_one_reports_count() -> HarvestResult<()> {
        let (_dir, store) = open_store().await?;
        store.upsert(&aggregate("UC3", "Three", Vec::new())).await?;

        assert_eq!(store.delete_one("UC3").await?, 1);
        assert_eq!(store.delete_one("UC3").await?, 0);
        assert!(store.find_one("UC3").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn list_returns_summaries_sorted_by_name() -> HarvestResult<()> {
        let (_dir, store) = open_store().await?;
        store.upsert(&aggregate("UCb", "beta", Vec::new())).await?;
        store.upsert(&aggregate("UCa", "Alpha", Vec::new())).await?;

        let listed = store.list().await?;
        let names: Vec<&str> = listed.iter().map(|d| d.channel_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(listed[0].channel_id, "UCa");
        assert!(listed[0].harvested_at.ends_with('Z'));
        Ok(())
    }
}
