use std::collections::HashMap;
use std::sync::Mutex;

use tubeharvest::error::{HarvestError, HarvestResult};
use tubeharvest::metadata::{ChannelSummary, CommentRecord};
use tubeharvest::pagination::Page;
use tubeharvest::youtube::{VideoDetail, VideoPlatform};

/// In-memory platform with paginated playlists and per-video comment
/// behavior. Records how many playlist pages were served.
#[derive(Default)]
pub struct FakePlatform {
    pub channels: HashMap<String, FakeChannel>,
    pub page_size: usize,
    pub pages_served: Mutex<usize>,
}

pub struct FakeChannel {
    pub summary: ChannelSummary,
    pub videos: Vec<VideoDetail>,
    pub comments: HashMap<String, HarvestResult<Vec<CommentRecord>>>,
}

impl FakePlatform {
    pub fn with_channel(channel: FakeChannel) -> Self {
        let mut channels = HashMap::new();
        channels.insert(channel.summary.channel_id.clone(), channel);
        Self {
            channels,
            page_size: 50,
            pages_served: Mutex::new(0),
        }
    }

    fn by_playlist(&self, playlist_id: &str) -> Option<&FakeChannel> {
        self.channels
            .values()
            .find(|channel| channel.summary.playlist_id == playlist_id)
    }

    fn all_videos(&self) -> impl Iterator<Item = (&FakeChannel, &VideoDetail)> {
        self.channels
            .values()
            .flat_map(|channel| channel.videos.iter().map(move |video| (channel, video)))
    }
}

impl VideoPlatform for FakePlatform {
    fn channel(&self, channel_id: &str) -> HarvestResult<Option<ChannelSummary>> {
        Ok(self.channels.get(channel_id).map(|c| c.summary.clone()))
    }

    fn playlist_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        max_results: usize,
    ) -> HarvestResult<Page<String>> {
        *self.pages_served.lock().unwrap() += 1;
        let ids: Vec<String> = self
            .by_playlist(playlist_id)
            .map(|c| c.videos.iter().map(|v| v.video_id.clone()).collect())
            .unwrap_or_default();
        let size = max_results.min(self.page_size).max(1);
        let start = match cursor {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| HarvestError::upstream("bad page token"))?,
            None => 0,
        };
        let end = (start + size).min(ids.len());
        let next = (end < ids.len()).then(|| end.to_string());
        Ok(Page::new(ids[start..end].to_vec(), next))
    }

    fn videos(&self, video_ids: &[String]) -> HarvestResult<Vec<VideoDetail>> {
        Ok(self
            .all_videos()
            .filter(|(_, video)| video_ids.contains(&video.video_id))
            .map(|(_, video)| video.clone())
            .collect())
    }

    fn comment_threads(
        &self,
        video_id: &str,
        max_results: usize,
    ) -> HarvestResult<Vec<CommentRecord>> {
        let Some((channel, _)) = self.all_videos().find(|(_, v)| v.video_id == video_id) else {
            return Err(HarvestError::NotFound(format!("video {video_id}")));
        };
        match channel.comments.get(video_id) {
            Some(Ok(comments)) => Ok(comments.iter().take(max_results).cloned().collect()),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(Vec::new()),
        }
    }
}

pub fn video(id: &str, published_at: &str, views: i64, duration: &str) -> VideoDetail {
    VideoDetail {
        video_id: id.into(),
        title: format!("Video {id}"),
        published_at: published_at.into(),
        description: format!("about {id}"),
        view_count: Some(views),
        like_count: Some(views / 10),
        favorite_count: Some(0),
        comment_count: Some(views / 100),
        duration: duration.into(),
        caption_available: false,
    }
}

pub fn comment(id: &str, video_id: &str) -> CommentRecord {
    CommentRecord {
        comment_id: id.into(),
        video_id: video_id.into(),
        text: format!("comment {id}"),
        author: "viewer".into(),
        published_at: "2022-09-01T00:00:00Z".into(),
    }
}

pub fn summary(channel_id: &str, name: &str, video_count: i64) -> ChannelSummary {
    ChannelSummary {
        channel_id: channel_id.into(),
        channel_name: name.into(),
        subscriber_count: Some(12_345),
        view_count: Some(9_999_999_999),
        video_count: Some(video_count),
        playlist_id: format!("UU{}", &channel_id[2..]),
        description: format!("{name} channel"),
    }
}
