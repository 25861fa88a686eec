//! The pipeline entry points used by both front ends.
//!
//! Each call opens the stores it touches and drops them before returning, so
//! no connection outlives the operation that needed it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DOCUMENT_DB_FILE, RELATIONAL_DB_FILE};
use crate::document_store::{DocumentStore, UpsertOutcome};
use crate::error::{HarvestError, HarvestResult};
use crate::harvest::ChannelHarvester;
use crate::projection::{ProjectionOptions, project};
use crate::relational_store::{AppendReport, DeleteReport, RelationalStore};
use crate::youtube::VideoPlatform;

/// Locations of the two database files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub documents: PathBuf,
    pub relational: PathBuf,
}

impl DataPaths {
    pub fn from_root(root: &Path) -> Self {
        Self {
            documents: root.join(DOCUMENT_DB_FILE),
            relational: root.join(RELATIONAL_DB_FILE),
        }
    }

    pub async fn documents(&self) -> HarvestResult<DocumentStore> {
        DocumentStore::open(&self.documents).await
    }

    pub async fn relational(&self) -> HarvestResult<RelationalStore> {
        RelationalStore::open(&self.relational).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    pub channel_id: String,
    pub channel_name: String,
    pub videos: usize,
    pub comments: usize,
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub channel_id: String,
    pub channel_name: String,
    pub rows: AppendReport,
}

/// Harvests `channel_id` and upserts the aggregate into the document store.
///
/// The harvest itself blocks on HTTP, so it runs on the blocking pool.
pub async fn harvest_and_store<P>(
    harvester: Arc<ChannelHarvester<P>>,
    paths: &DataPaths,
    channel_id: &str,
) -> HarvestResult<HarvestSummary>
where
    P: VideoPlatform + Send + Sync + 'static,
{
    let requested = channel_id.to_string();
    let aggregate = tokio::task::spawn_blocking(move || harvester.harvest(&requested))
        .await
        .map_err(|err| {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
            HarvestError::upstream("harvest task was cancelled")
        })??;

    let outcome = paths.documents().await?.upsert(&aggregate).await?;
    Ok(HarvestSummary {
        channel_id: aggregate.channel_id().to_string(),
        channel_name: aggregate.channel_name().to_string(),
        videos: aggregate.videos.len(),
        comments: aggregate.comment_count(),
        outcome,
    })
}

/// Loads the stored aggregate, projects it and appends the rows to the
/// relational store. Repeating a migration duplicates rows.
pub async fn migrate(
    paths: &DataPaths,
    channel_id: &str,
    options: ProjectionOptions,
) -> HarvestResult<MigrationReport> {
    let aggregate = paths
        .documents()
        .await?
        .find_one(channel_id)
        .await?
        .ok_or_else(|| HarvestError::document_not_found(channel_id))?;

    let projection = project(&aggregate, options);
    let rows = paths.relational().await?.append(&projection).await?;
    info!(
        channel_id,
        videos = rows.video,
        comments = rows.comments,
        "migrated channel"
    );
    Ok(MigrationReport {
        channel_id: aggregate.channel_id().to_string(),
        channel_name: aggregate.channel_name().to_string(),
        rows,
    })
}

/// Removes the channel's document. Returns 0 when nothing was stored.
pub async fn delete_aggregate(paths: &DataPaths, channel_id: &str) -> HarvestResult<u64> {
    paths.documents().await?.delete_one(channel_id).await
}

pub async fn delete_relational_by_channel(
    paths: &DataPaths,
    channel_id: &str,
) -> HarvestResult<DeleteReport> {
    paths.relational().await?.delete_by_channel(channel_id).await
}

/// Re-harvests every channel already in the document store. A failing channel
/// is logged and reported; the rest still run.
pub async fn refresh_all<P>(
    harvester: Arc<ChannelHarvester<P>>,
    paths: &DataPaths,
) -> HarvestResult<Vec<(String, HarvestResult<HarvestSummary>)>>
where
    P: VideoPlatform + Send + Sync + 'static,
{
    let stored = paths.documents().await?.list().await?;
    info!(channels = stored.len(), "refreshing stored channels");

    let mut results = Vec::with_capacity(stored.len());
    for document in stored {
        let result = harvest_and_store(Arc::clone(&harvester), paths, &document.channel_id).await;
        if let Err(err) = &result {
            warn!(channel_id = %document.channel_id, error = %err, "refresh failed");
        }
        results.push((document.channel_id, result));
    }
    Ok(results)
}
