//! Channel harvesting: summary → uploads playlist → video details → comment
//! samples, assembled into one [`ChannelAggregate`].

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::duration;
use crate::error::{HarvestError, HarvestResult};
use crate::metadata::{ChannelAggregate, CommentRecord, VideoRecord};
use crate::pagination::{self, PAGE_SIZE_CEILING};
use crate::youtube::{DETAIL_BATCH_CEILING, VideoDetail, VideoPlatform};

/// Number of top-level comments sampled per video.
pub const COMMENT_SAMPLE_SIZE: usize = 2;

/// Pulls a full channel snapshot from a [`VideoPlatform`]. Read-only: nothing
/// is persisted here.
pub struct ChannelHarvester<P> {
    platform: P,
}

impl<P: VideoPlatform> ChannelHarvester<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Harvests `channel_id`. Fails with [`HarvestError::NotFound`] when the
    /// channel lookup returns nothing, and with
    /// [`HarvestError::UpstreamUnavailable`] when any essential call fails.
    /// Comment samples that cannot be fetched are recorded as absent.
    pub fn harvest(&self, channel_id: &str) -> HarvestResult<ChannelAggregate> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(HarvestError::channel_not_found(channel_id));
        }

        let summary = self
            .platform
            .channel(channel_id)?
            .ok_or_else(|| HarvestError::channel_not_found(channel_id))?;
        info!(
            channel = %summary.channel_name,
            playlist = %summary.playlist_id,
            "resolved channel"
        );

        let video_ids = self.playlist_video_ids(&summary.playlist_id)?;
        info!(count = video_ids.len(), "collected playlist video ids");

        let mut videos = Vec::with_capacity(video_ids.len());
        for batch in video_ids.chunks(DETAIL_BATCH_CEILING) {
            videos.extend(self.video_batch(batch)?);
        }
        info!(
            channel = %summary.channel_name,
            videos = videos.len(),
            "harvest complete"
        );

        Ok(ChannelAggregate { summary, videos })
    }

    /// Every video id referenced by the playlist, in playlist order, without
    /// repeats. A channel that never uploaded has no uploads playlist to list,
    /// which yields no ids rather than an error.
    fn playlist_video_ids(&self, playlist_id: &str) -> HarvestResult<Vec<String>> {
        let ids = match pagination::fetch_all(|cursor| {
            self.platform
                .playlist_items(playlist_id, cursor, PAGE_SIZE_CEILING)
        }) {
            Ok(ids) => ids,
            Err(HarvestError::NotFound(detail)) => {
                warn!(playlist_id, %detail, "uploads playlist not found; treating as empty");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }

    /// One detail call for `batch`, plus a comment sample per returned video.
    /// Output follows the order of `batch`; ids the platform did not return
    /// (deleted or private videos) are dropped.
    fn video_batch(&self, batch: &[String]) -> HarvestResult<Vec<VideoRecord>> {
        let mut details: HashMap<String, VideoDetail> = self
            .platform
            .videos(batch)?
            .into_iter()
            .map(|detail| (detail.video_id.clone(), detail))
            .collect();

        let mut records = Vec::with_capacity(batch.len());
        for video_id in batch {
            let Some(detail) = details.remove(video_id) else {
                warn!(video_id = %video_id, "video detail missing from response; skipping");
                continue;
            };
            let comments = self.comment_sample(video_id)?;
            records.push(video_record(detail, comments));
        }
        Ok(records)
    }

    /// Non-fatal failures (comments disabled or inaccessible, video gone)
    /// become `None`; an unavailable upstream still aborts the harvest.
    fn comment_sample(&self, video_id: &str) -> HarvestResult<Option<Vec<CommentRecord>>> {
        match self.platform.comment_threads(video_id, COMMENT_SAMPLE_SIZE) {
            Ok(mut comments) if !comments.is_empty() => {
                comments.truncate(COMMENT_SAMPLE_SIZE);
                Ok(Some(comments))
            }
            Ok(_) => Ok(None),
            Err(err @ (HarvestError::LocalizedFetchFailure(_) | HarvestError::NotFound(_))) => {
                warn!(video_id, error = %err, "comment sample unavailable");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn video_record(detail: VideoDetail, comments: Option<Vec<CommentRecord>>) -> VideoRecord {
    VideoRecord {
        duration: duration::parse(&detail.duration),
        video_id: detail.video_id,
        title: detail.title,
        published_at: detail.published_at,
        view_count: detail.view_count,
        like_count: detail.like_count,
        favorite_count: detail.favorite_count,
        comment_count: detail.comment_count,
        description: detail.description,
        caption_available: detail.caption_available,
        comments,
    }
}
