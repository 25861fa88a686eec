//! Upstream seam: the video platform API.
//!
//! [`VideoPlatform`] is the narrow surface the harvester needs. The production
//! implementation, [`YouTubeClient`], talks to the YouTube Data API v3 with a
//! blocking `ureq` agent; tests substitute in-memory fakes.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};
use crate::metadata::{ChannelSummary, CommentRecord};
use crate::pagination::{PAGE_SIZE_CEILING, Page};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum number of ids the video detail endpoint accepts per call.
pub const DETAIL_BATCH_CEILING: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const COMMENT_THREADS: &str = "commentThreads";

/// Video metadata as returned by the detail endpoint, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetail {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub description: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub comment_count: Option<i64>,
    /// Raw `PT#H#M#S` token.
    pub duration: String,
    pub caption_available: bool,
}

/// Read-only calls the harvester issues against the platform.
pub trait VideoPlatform {
    /// Channel lookup by id. `Ok(None)` when the platform returns no items.
    fn channel(&self, channel_id: &str) -> HarvestResult<Option<ChannelSummary>>;

    /// One page of video ids from a playlist. `max_results` is clamped to
    /// [`PAGE_SIZE_CEILING`].
    fn playlist_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        max_results: usize,
    ) -> HarvestResult<Page<String>>;

    /// Details for at most [`DETAIL_BATCH_CEILING`] ids.
    fn videos(&self, video_ids: &[String]) -> HarvestResult<Vec<VideoDetail>>;

    /// Up to `max_results` top-level comments of a video.
    fn comment_threads(&self, video_id: &str, max_results: usize)
    -> HarvestResult<Vec<CommentRecord>>;
}

/// Blocking client for the YouTube Data API v3. The API key is passed through
/// untouched.
#[derive(Clone)]
pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> HarvestResult<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in query {
            request = request.query(name, value);
        }
        debug!(endpoint, ?query, "calling video platform");

        match request.call() {
            Ok(response) => response.into_json::<T>().map_err(|err| {
                HarvestError::upstream(format!("malformed {endpoint} response: {err}"))
            }),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(classify_status(endpoint, status, &body))
            }
            Err(ureq::Error::Transport(transport)) => Err(HarvestError::upstream(format!(
                "could not reach {endpoint}: {transport}"
            ))),
        }
    }
}

impl VideoPlatform for YouTubeClient {
    fn channel(&self, channel_id: &str) -> HarvestResult<Option<ChannelSummary>> {
        let response: ChannelListResponse = self.get(
            "channels",
            &[("part", "snippet,contentDetails,statistics"), ("id", channel_id)],
        )?;

        let Some(item) = response.items.into_iter().next() else {
            return Ok(None);
        };
        let Some(playlist_id) = item.content_details.related_playlists.uploads else {
            return Err(HarvestError::NotFound(format!(
                "channel \"{channel_id}\" exposes no uploads playlist"
            )));
        };

        Ok(Some(ChannelSummary {
            channel_id: item.id,
            channel_name: item.snippet.title,
            subscriber_count: parse_count(item.statistics.subscriber_count.as_deref()),
            view_count: parse_count(item.statistics.view_count.as_deref()),
            video_count: parse_count(item.statistics.video_count.as_deref()),
            playlist_id,
            description: item.snippet.description,
        }))
    }

    fn playlist_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        max_results: usize,
    ) -> HarvestResult<Page<String>> {
        let max_results = max_results.clamp(1, PAGE_SIZE_CEILING).to_string();
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("pageToken", cursor));
        }

        let response: PlaylistItemListResponse = self.get("playlistItems", &query)?;
        let ids = response
            .items
            .into_iter()
            .map(|item| item.content_details.video_id)
            .collect();
        Ok(Page::new(ids, response.next_page_token))
    }

    fn videos(&self, video_ids: &[String]) -> HarvestResult<Vec<VideoDetail>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = video_ids[..video_ids.len().min(DETAIL_BATCH_CEILING)].join(",");
        let response: VideoListResponse = self.get(
            "videos",
            &[("part", "snippet,contentDetails,statistics"), ("id", ids.as_str())],
        )?;

        Ok(response
            .items
            .into_iter()
            .map(|item| VideoDetail {
                video_id: item.id,
                title: item.snippet.title,
                published_at: item.snippet.published_at,
                description: item.snippet.description,
                view_count: parse_count(item.statistics.view_count.as_deref()),
                like_count: parse_count(item.statistics.like_count.as_deref()),
                favorite_count: parse_count(item.statistics.favorite_count.as_deref()),
                comment_count: parse_count(item.statistics.comment_count.as_deref()),
                duration: item.content_details.duration,
                caption_available: item
                    .content_details
                    .caption
                    .as_deref()
                    .is_some_and(|value| value.eq_ignore_ascii_case("true")),
            })
            .collect())
    }

    fn comment_threads(
        &self,
        video_id: &str,
        max_results: usize,
    ) -> HarvestResult<Vec<CommentRecord>> {
        let max_results = max_results.clamp(1, 100).to_string();
        let response: CommentThreadListResponse = self.get(
            COMMENT_THREADS,
            &[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", max_results.as_str()),
                ("textFormat", "plainText"),
            ],
        )?;

        Ok(response
            .items
            .into_iter()
            .map(|thread| {
                let snippet = thread.snippet.top_level_comment.snippet;
                CommentRecord {
                    comment_id: thread.id,
                    video_id: video_id.to_string(),
                    text: snippet.text_original,
                    author: snippet.author_display_name,
                    published_at: snippet.published_at,
                }
            })
            .collect())
    }
}

/// Maps an HTTP error status (plus the API's error reasons) onto the error
/// taxonomy.
fn classify_status(endpoint: &str, status: u16, body: &str) -> HarvestError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let reasons: Vec<&str> = envelope
        .as_ref()
        .map(|envelope| {
            envelope
                .error
                .errors
                .iter()
                .map(|detail| detail.reason.as_str())
                .collect()
        })
        .unwrap_or_default();
    let message = envelope
        .as_ref()
        .map(|envelope| envelope.error.message.clone())
        .unwrap_or_default();

    if reasons.contains(&"commentsDisabled") {
        return HarvestError::LocalizedFetchFailure(format!(
            "{endpoint}: comments are disabled"
        ));
    }
    if reasons.iter().any(|reason| {
        matches!(
            *reason,
            "quotaExceeded" | "rateLimitExceeded" | "dailyLimitExceeded" | "userRateLimitExceeded"
        )
    }) {
        return HarvestError::upstream(format!("{endpoint}: API quota exhausted"));
    }

    match status {
        // Any other client error on one video's comments stays local to that video.
        400..=499 if endpoint == COMMENT_THREADS && status != 429 => {
            HarvestError::LocalizedFetchFailure(format!(
                "{endpoint}: comments unavailable (HTTP {status}): {message}"
            ))
        }
        404 => HarvestError::NotFound(format!("{endpoint}: {message}")),
        _ => HarvestError::upstream(format!("{endpoint} returned HTTP {status}: {message}")),
    }
}

/// The API reports counts as decimal strings.
fn parse_count(value: Option<&str>) -> Option<i64> {
    value.and_then(|value| value.trim().parse().ok())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
    #[serde(default)]
    content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    favorite_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadListResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    id: String,
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_original: String,
    #[serde(default)]
    author_display_name: String,
    #[serde(default)]
    published_at: String,
}
