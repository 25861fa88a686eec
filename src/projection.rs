//! Flattening of a [`ChannelAggregate`] into the four relational row sets.
//!
//! Projection is a pure function of the aggregate. Column typing lives next to
//! the row types so the relational store can create tables and bind values
//! without re-deriving anything.

use serde::Serialize;

use crate::metadata::ChannelAggregate;

/// Declared SQL type of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    VarChar(u16),
    Text,
    Int,
    BigInt,
}

impl ColumnType {
    pub fn sql(self) -> String {
        match self {
            Self::VarChar(length) => format!("VARCHAR({length})"),
            Self::Text => "TEXT".to_string(),
            Self::Int => "INT".to_string(),
            Self::BigInt => "BIGINT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn column(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// A single typed cell, shared by projected rows and query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Text(String),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

/// Implemented by every projected row type.
pub trait TableRow {
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];

    /// Cell values in [`Self::COLUMNS`] order.
    fn cells(&self) -> Vec<Cell>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRow {
    pub channel_name: String,
    pub channel_id: String,
    pub video_count: Option<i64>,
    pub subscriber_count: Option<i64>,
    pub channel_views: Option<i64>,
    pub channel_description: String,
    pub playlist_id: String,
}

impl TableRow for ChannelRow {
    const TABLE: &'static str = "channel";
    const COLUMNS: &'static [Column] = &[
        column("channel_name", ColumnType::VarChar(225)),
        column("channel_id", ColumnType::VarChar(225)),
        column("video_count", ColumnType::Int),
        column("subscriber_count", ColumnType::BigInt),
        column("channel_views", ColumnType::BigInt),
        column("channel_description", ColumnType::Text),
        column("playlist_id", ColumnType::VarChar(225)),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.channel_name.as_str().into(),
            self.channel_id.as_str().into(),
            self.video_count.into(),
            self.subscriber_count.into(),
            self.channel_views.into(),
            self.channel_description.as_str().into(),
            self.playlist_id.as_str().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistRow {
    pub channel_id: String,
    pub playlist_id: String,
}

impl TableRow for PlaylistRow {
    const TABLE: &'static str = "playlist";
    const COLUMNS: &'static [Column] = &[
        column("channel_id", ColumnType::VarChar(225)),
        column("playlist_id", ColumnType::VarChar(225)),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![self.channel_id.as_str().into(), self.playlist_id.as_str().into()]
    }
}

/// Videos link to their channel only through `playlist_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRow {
    pub playlist_id: String,
    pub video_id: String,
    pub video_name: String,
    pub video_description: String,
    /// Kept as text; analytics parse it with string functions.
    pub published_date: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub comment_count: Option<i64>,
    /// `HH:MM:SS` text.
    pub duration: String,
    pub caption_status: String,
}

impl TableRow for VideoRow {
    const TABLE: &'static str = "video";
    const COLUMNS: &'static [Column] = &[
        column("playlist_id", ColumnType::VarChar(225)),
        column("video_id", ColumnType::VarChar(225)),
        column("video_name", ColumnType::VarChar(225)),
        column("video_description", ColumnType::Text),
        column("published_date", ColumnType::VarChar(50)),
        column("view_count", ColumnType::BigInt),
        column("like_count", ColumnType::BigInt),
        column("favorite_count", ColumnType::BigInt),
        column("comment_count", ColumnType::Int),
        column("duration", ColumnType::VarChar(1024)),
        column("caption_status", ColumnType::VarChar(225)),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.playlist_id.as_str().into(),
            self.video_id.as_str().into(),
            self.video_name.as_str().into(),
            self.video_description.as_str().into(),
            self.published_date.as_str().into(),
            self.view_count.into(),
            self.like_count.into(),
            self.favorite_count.into(),
            self.comment_count.into(),
            self.duration.as_str().into(),
            self.caption_status.as_str().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub video_id: String,
    pub comment_id: String,
    pub comment_text: String,
    pub comment_author: String,
    pub comment_published_date: String,
}

impl TableRow for CommentRow {
    const TABLE: &'static str = "comments";
    const COLUMNS: &'static [Column] = &[
        column("video_id", ColumnType::VarChar(225)),
        column("comment_id", ColumnType::VarChar(225)),
        column("comment_text", ColumnType::Text),
        column("comment_author", ColumnType::VarChar(225)),
        column("comment_published_date", ColumnType::VarChar(50)),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.video_id.as_str().into(),
            self.comment_id.as_str().into(),
            self.comment_text.as_str().into(),
            self.comment_author.as_str().into(),
            self.comment_published_date.as_str().into(),
        ]
    }
}

/// The four row sets derived from one aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub channel: ChannelRow,
    pub playlist: PlaylistRow,
    pub videos: Vec<VideoRow>,
    pub comments: Vec<CommentRow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Leave the first video (and its comments) out of the video and comment
    /// row sets. Off by default; the legacy dashboard always dropped it.
    pub skip_first_video: bool,
}

pub fn project(aggregate: &ChannelAggregate, options: ProjectionOptions) -> Projection {
    let summary = &aggregate.summary;
    let first = usize::from(options.skip_first_video);
    let videos = aggregate.videos.get(first..).unwrap_or_default();

    let channel = ChannelRow {
        channel_name: summary.channel_name.clone(),
        channel_id: summary.channel_id.clone(),
        video_count: summary.video_count,
        subscriber_count: summary.subscriber_count,
        channel_views: summary.view_count,
        channel_description: summary.description.clone(),
        playlist_id: summary.playlist_id.clone(),
    };
    let playlist = PlaylistRow {
        channel_id: summary.channel_id.clone(),
        playlist_id: summary.playlist_id.clone(),
    };

    let video_rows = videos
        .iter()
        .map(|video| VideoRow {
            playlist_id: summary.playlist_id.clone(),
            video_id: video.video_id.clone(),
            video_name: video.title.clone(),
            video_description: video.description.clone(),
            published_date: video.published_at.clone(),
            view_count: video.view_count,
            like_count: video.like_count,
            favorite_count: video.favorite_count,
            comment_count: video.comment_count,
            duration: video.duration.clone(),
            caption_status: video.caption_available.to_string(),
        })
        .collect();

    let comment_rows = videos
        .iter()
        .flat_map(|video| video.comments.iter().flatten())
        .map(|comment| CommentRow {
            video_id: comment.video_id.clone(),
            comment_id: comment.comment_id.clone(),
            comment_text: comment.text.clone(),
            comment_author: comment.author.clone(),
            comment_published_date: comment.published_at.clone(),
        })
        .collect();

    Projection {
        channel,
        playlist,
        videos: video_rows,
        comments: comment_rows,
    }
}
