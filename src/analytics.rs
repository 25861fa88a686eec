//! The ten fixed analytical questions asked of the relational store.

use serde::Serialize;

use crate::duration;
use crate::error::HarvestResult;
use crate::projection::Cell;
use crate::relational_store::RelationalStore;

pub const DEFAULT_PUBLISHED_YEAR: i32 = 2022;

// Every question walks channel -> playlist -> video the same way.
const CHANNEL_VIDEOS: &str = r#"
    FROM channel c
    JOIN playlist p ON c.channel_id = p.channel_id
    JOIN video v ON p.playlist_id = v.playlist_id
"#;

/// Seconds of an `HH:MM:SS` duration column. Hours may be wider than two
/// digits.
const DURATION_SECONDS: &str = "CAST(substr(v.duration, 1, length(v.duration) - 6) AS INTEGER) * 3600 \
     + CAST(substr(v.duration, -5, 2) AS INTEGER) * 60 \
     + CAST(substr(v.duration, -2, 2) AS INTEGER)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Question {
    VideosWithChannels,
    ChannelsByVideoCount,
    TopViewedPerChannel,
    CommentsPerVideo,
    VideosByLikes,
    LikesPerVideo,
    ViewsPerChannel,
    VideosPublishedInYear,
    AverageDurationPerChannel,
    VideosByComments,
}

impl Question {
    pub const ALL: [Question; 10] = [
        Question::VideosWithChannels,
        Question::ChannelsByVideoCount,
        Question::TopViewedPerChannel,
        Question::CommentsPerVideo,
        Question::VideosByLikes,
        Question::LikesPerVideo,
        Question::ViewsPerChannel,
        Question::VideosPublishedInYear,
        Question::AverageDurationPerChannel,
        Question::VideosByComments,
    ];

    /// 1-based index as shown to users.
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|zero_based| Self::ALL.get(zero_based))
            .copied()
    }

    pub fn index(self) -> usize {
        self as usize + 1
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::VideosWithChannels => {
                "What are the names of all the videos and their corresponding channels?"
            }
            Self::ChannelsByVideoCount => {
                "Which channels have the most number of videos, and how many videos do they have?"
            }
            Self::TopViewedPerChannel => {
                "What are the top 10 most viewed videos and their respective channels?"
            }
            Self::CommentsPerVideo => {
                "How many comments were made on each video, and what are their corresponding video names?"
            }
            Self::VideosByLikes => {
                "Which videos have the highest number of likes, and what are their corresponding channel names?"
            }
            Self::LikesPerVideo => {
                "What is the total number of likes for each video, and what are their corresponding video names?"
            }
            Self::ViewsPerChannel => {
                "What is the total number of views for each channel, and what are their corresponding channel names?"
            }
            Self::VideosPublishedInYear => {
                "What are the names of the channels and count of videos that have published videos in the given year?"
            }
            Self::AverageDurationPerChannel => {
                "What is the average duration of all videos in each channel, and what are their corresponding channel names?"
            }
            Self::VideosByComments => {
                "Which videos have the highest number of comments, and what are their corresponding channel names?"
            }
        }
    }

    /// Bar chart drawn next to the table, for the questions that have one.
    pub fn chart(self) -> Option<ChartHint> {
        let (x, y, title) = match self {
            Self::ChannelsByVideoCount => ("Channel Name", "Video Count", "Most number of videos"),
            Self::TopViewedPerChannel => ("Video Name", "View count", "Top 10 most viewed videos"),
            Self::ViewsPerChannel => (
                "Channel Name",
                "Total number of views",
                "Total number of views",
            ),
            _ => return None,
        };
        Some(ChartHint { x, y, title })
    }

    fn columns(self) -> &'static [&'static str] {
        match self {
            Self::VideosWithChannels => &["Channel Name", "Video Name"],
            Self::ChannelsByVideoCount | Self::VideosPublishedInYear => {
                &["Channel Name", "Video Count"]
            }
            Self::TopViewedPerChannel => &["Channel Name", "Video Name", "View count"],
            Self::CommentsPerVideo => &["Channel Name", "Video Name", "Comment count"],
            Self::VideosByLikes | Self::LikesPerVideo => {
                &["Channel Name", "Video Name", "Like count"]
            }
            Self::ViewsPerChannel => &["Channel Name", "Total number of views"],
            Self::AverageDurationPerChannel => {
                &["Channel Name", "Average duration of videos (HH:MM:SS)"]
            }
            Self::VideosByComments => &["Channel Name", "Video Name", "Number of comments"],
        }
    }

    fn statement(self) -> String {
        match self {
            Self::VideosWithChannels => format!(
                "SELECT c.channel_name, v.video_name {CHANNEL_VIDEOS} ORDER BY c.channel_name, v.rowid"
            ),
            Self::ChannelsByVideoCount => "SELECT channel_name, video_count FROM channel \
                 ORDER BY video_count DESC, channel_name"
                .to_string(),
            Self::TopViewedPerChannel => format!(
                r#"
                WITH ranked AS (
                    SELECT c.channel_name, v.video_name, v.view_count,
                           ROW_NUMBER() OVER (
                               PARTITION BY c.channel_id ORDER BY v.view_count DESC
                           ) AS video_rank
                    {CHANNEL_VIDEOS}
                )
                SELECT channel_name, video_name, view_count
                FROM ranked
                WHERE video_rank <= 10
                ORDER BY channel_name, video_rank
                "#
            ),
            Self::CommentsPerVideo => format!(
                "SELECT c.channel_name, v.video_name, v.comment_count {CHANNEL_VIDEOS} \
                 ORDER BY c.channel_name, v.rowid"
            ),
            Self::VideosByLikes | Self::LikesPerVideo => format!(
                "SELECT c.channel_name, v.video_name, v.like_count {CHANNEL_VIDEOS} \
                 ORDER BY v.like_count DESC, v.video_name"
            ),
            Self::ViewsPerChannel => "SELECT channel_name, channel_views FROM channel \
                 ORDER BY channel_views DESC, channel_name"
                .to_string(),
            Self::VideosPublishedInYear => format!(
                "SELECT c.channel_name, COUNT(v.video_id) AS video_count {CHANNEL_VIDEOS} \
                 WHERE CAST(substr(v.published_date, 1, 4) AS INTEGER) = ?1 \
                 GROUP BY c.channel_name ORDER BY c.channel_name"
            ),
            Self::AverageDurationPerChannel => format!(
                "SELECT c.channel_name, CAST(ROUND(AVG({DURATION_SECONDS})) AS INTEGER) AS seconds \
                 {CHANNEL_VIDEOS} GROUP BY c.channel_name ORDER BY seconds DESC, c.channel_name"
            ),
            Self::VideosByComments => format!(
                "SELECT c.channel_name, v.video_name, v.comment_count {CHANNEL_VIDEOS} \
                 GROUP BY c.channel_name, v.video_name, v.comment_count \
                 ORDER BY v.comment_count DESC, v.video_name"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartHint {
    pub x: &'static str,
    pub y: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Publication year for [`Question::VideosPublishedInYear`].
    pub year: i32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            year: DEFAULT_PUBLISHED_YEAR,
        }
    }
}

/// Tabular answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTable {
    pub question: usize,
    pub title: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
    pub chart: Option<ChartHint>,
}

pub async fn run_question(
    store: &RelationalStore,
    question: Question,
    options: &AnalysisOptions,
) -> HarvestResult<QueryTable> {
    let args = match question {
        Question::VideosPublishedInYear => vec![Cell::Integer(i64::from(options.year))],
        _ => Vec::new(),
    };
    let mut rows = store.query(&question.statement(), args).await?;

    if question == Question::AverageDurationPerChannel {
        for row in &mut rows {
            if let Some(cell) = row.get_mut(1) {
                let formatted = match &*cell {
                    Cell::Integer(seconds) => {
                        Cell::Text(duration::format_seconds((*seconds).max(0) as u64))
                    }
                    _ => Cell::Null,
                };
                *cell = formatted;
            }
        }
    }

    Ok(QueryTable {
        question: question.index(),
        title: question.title(),
        columns: question.columns().to_vec(),
        rows,
        chart: question.chart(),
    })
}
