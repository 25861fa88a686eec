//! Harvested channel metadata.
//!
//! These structs are the unit of persistence in the document store: one
//! [`ChannelAggregate`] per channel, serialized as a single JSON document and
//! replaced wholesale on every harvest.

use serde::{Deserialize, Serialize};

/// Channel-level statistics resolved from a single channel lookup.
///
/// Counts stay optional because the platform hides some of them (e.g. a
/// channel with hidden subscriber count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub channel_name: String,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    /// Identifier of the channel's uploads playlist.
    pub playlist_id: String,
    #[serde(default)]
    pub description: String,
}

/// One video from the uploads playlist, with a bounded comment sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub description: String,
    /// Always `HH:MM:SS`, see [`crate::duration::parse`].
    pub duration: String,
    pub caption_available: bool,
    /// `None` when the sample could not be fetched or the video has no
    /// comments. Serialized as `null` so the absence survives a reload.
    pub comments: Option<Vec<CommentRecord>>,
}

/// A top-level comment. `video_id` refers to the owning [`VideoRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub video_id: String,
    pub text: String,
    pub author: String,
    pub published_at: String,
}

/// Everything harvested for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAggregate {
    pub summary: ChannelSummary,
    /// Videos in the uploads playlist's iteration order.
    pub videos: Vec<VideoRecord>,
}

impl ChannelAggregate {
    pub fn channel_id(&self) -> &str {
        &self.summary.channel_id
    }

    pub fn channel_name(&self) -> &str {
        &self.summary.channel_name
    }

    pub fn playlist_id(&self) -> &str {
        &self.summary.playlist_id
    }

    /// Number of sampled comments across all videos.
    pub fn comment_count(&self) -> usize {
        self.videos
            .iter()
            .filter_map(|video| video.comments.as_ref())
            .map(Vec::len)
            .sum()
    }
}
