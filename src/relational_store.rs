//! Relational store holding the projected `channel`, `playlist`, `video` and
//! `comments` tables.
//!
//! Writes are append-only (re-migrating a channel duplicates its rows) and
//! every statement binds identifiers as parameters.

use std::path::Path;

use libsql::params::Params;
use libsql::{Connection, Value, params};
use serde::Serialize;
use tracing::info;

use crate::db;
use crate::error::HarvestResult;
use crate::projection::{Cell, ChannelRow, CommentRow, PlaylistRow, Projection, TableRow, VideoRow};

/// Rows written by one [`RelationalStore::append`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendReport {
    pub channel: u64,
    pub playlist: u64,
    pub video: u64,
    pub comments: u64,
}

/// Rows removed by one [`RelationalStore::delete_by_channel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub comments: u64,
    pub video: u64,
    pub playlist: u64,
    pub channel: u64,
}

impl DeleteReport {
    pub fn total(&self) -> u64 {
        self.comments + self.video + self.playlist + self.channel
    }
}

// Playlists owned by the channel, whether recorded in `playlist` or only on
// the `channel` row.
const CHANNEL_PLAYLISTS: &str = r#"
    SELECT playlist_id FROM playlist WHERE channel_id = ?1
    UNION
    SELECT playlist_id FROM channel WHERE channel_id = ?1
"#;

#[derive(Debug)]
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    /// Opens the database, creating the file and the four tables if needed.
    pub async fn open(path: &Path) -> HarvestResult<Self> {
        let conn = db::open_local(path).await?;
        let store = Self { conn };
        store.ensure_tables().await?;
        Ok(store)
    }

    async fn ensure_tables(&self) -> HarvestResult<()> {
        let mut ddl = String::new();
        ddl.push_str(&create_table::<ChannelRow>());
        ddl.push_str(&create_table::<PlaylistRow>());
        ddl.push_str(&create_table::<VideoRow>());
        ddl.push_str(&create_table::<CommentRow>());
        ddl.push_str(
            r#"
            CREATE INDEX IF NOT EXISTS idx_channel_channel_id ON channel(channel_id);
            CREATE INDEX IF NOT EXISTS idx_playlist_channel_id ON playlist(channel_id);
            CREATE INDEX IF NOT EXISTS idx_video_playlist_id ON video(playlist_id);
            CREATE INDEX IF NOT EXISTS idx_comments_video_id ON comments(video_id);
            "#,
        );
        self.conn.execute_batch(&ddl).await?;
        Ok(())
    }

    /// Appends all four row sets in one transaction. Nothing is committed if
    /// any insert fails.
    pub async fn append(&self, projection: &Projection) -> HarvestResult<AppendReport> {
        let tx = self.conn.transaction().await?;
        let mut report = AppendReport::default();

        let result: HarvestResult<()> = async {
            report.channel = insert_rows(&tx, std::slice::from_ref(&projection.channel)).await?;
            report.playlist = insert_rows(&tx, std::slice::from_ref(&projection.playlist)).await?;
            report.video = insert_rows(&tx, &projection.videos).await?;
            report.comments = insert_rows(&tx, &projection.comments).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                info!(
                    channel_id = %projection.channel.channel_id,
                    videos = report.video,
                    comments = report.comments,
                    "appended relational rows"
                );
                Ok(report)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// Removes every row that belongs to `channel_id`, children first
    /// (comments, video, playlist, channel). Unknown ids remove nothing.
    pub async fn delete_by_channel(&self, channel_id: &str) -> HarvestResult<DeleteReport> {
        let tx = self.conn.transaction().await?;

        let comments = tx
            .execute(
                &format!(
                    "DELETE FROM comments WHERE video_id IN (
                        SELECT video_id FROM video WHERE playlist_id IN ({CHANNEL_PLAYLISTS})
                    )"
                ),
                params![channel_id],
            )
            .await?;
        let video = tx
            .execute(
                &format!("DELETE FROM video WHERE playlist_id IN ({CHANNEL_PLAYLISTS})"),
                params![channel_id],
            )
            .await?;
        let playlist = tx
            .execute(
                "DELETE FROM playlist WHERE channel_id = ?1",
                params![channel_id],
            )
            .await?;
        let channel = tx
            .execute(
                "DELETE FROM channel WHERE channel_id = ?1",
                params![channel_id],
            )
            .await?;
        tx.commit().await?;

        let report = DeleteReport {
            comments,
            video,
            playlist,
            channel,
        };
        info!(channel_id, removed = report.total(), "deleted relational rows");
        Ok(report)
    }

    /// Distinct channel names available for analysis.
    pub async fn channel_names(&self) -> HarvestResult<Vec<String>> {
        let rows = self
            .query(
                "SELECT DISTINCT channel_name FROM channel ORDER BY channel_name",
                Vec::new(),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Cell::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Runs a read query with positional parameters, returning typed cells.
    /// Real values are rounded to integers.
    pub(crate) async fn query(&self, sql: &str, args: Vec<Cell>) -> HarvestResult<Vec<Vec<Cell>>> {
        let params = Params::Positional(args.into_iter().map(to_value).collect());
        let mut rows = self.conn.query(sql, params).await?;
        let columns = rows.column_count();

        let mut table = Vec::new();
        while let Some(row) = rows.next().await? {
            let mut cells = Vec::with_capacity(columns.max(0) as usize);
            for index in 0..columns {
                cells.push(from_value(row.get_value(index)?));
            }
            table.push(cells);
        }
        Ok(table)
    }
}

fn create_table<R: TableRow>() -> String {
    let columns = R::COLUMNS
        .iter()
        .map(|column| format!("{} {}", column.name, column.ty.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({columns});\n", R::TABLE)
}

async fn insert_rows<R: TableRow>(conn: &Connection, rows: &[R]) -> HarvestResult<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let names = R::COLUMNS
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=R::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("INSERT INTO {} ({names}) VALUES ({placeholders})", R::TABLE);

    let mut inserted = 0;
    for row in rows {
        let values = row.cells().into_iter().map(to_value).collect();
        inserted += conn.execute(&sql, Params::Positional(values)).await?;
    }
    Ok(inserted)
}

fn to_value(cell: Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Integer(value) => Value::Integer(value),
        Cell::Text(value) => Value::Text(value),
    }
}

fn from_value(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Integer(value) => Cell::Integer(value),
        Value::Real(value) => Cell::Integer(value.round() as i64),
        Value::Text(value) => Cell::Text(value),
        Value::Blob(bytes) => Cell::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
