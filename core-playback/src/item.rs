//! # Playable Items
//!
//! A [`Video`] is what the catalog knows about a video. A [`PlaybackItem`] pairs
//! it with the stream the resolver picked, if one was picked yet.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::Time;

/// Opaque video identifier issued by the content service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start: Time,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start: Time) -> Self {
        Self {
            title: title.into(),
            start,
        }
    }
}

/// Catalog metadata for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Length advertised by the catalog. Live streams have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Time>,
    /// Ordered by start position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<Chapter>,
}

impl Video {
    pub fn new(id: impl Into<VideoId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            length: None,
            chapters: Vec::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_length(mut self, length: Time) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_chapters(mut self, mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by_key(|chapter| chapter.start);
        self.chapters = chapters;
        self
    }

    /// Index of the chapter containing `time`, if the video has chapters and
    /// `time` is not before the first one.
    pub fn chapter_at(&self, time: Time) -> Option<usize> {
        let after = self.chapters.partition_point(|chapter| chapter.start <= time);
        after.checked_sub(1)
    }
}

/// Delivery format of a resolved stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Single file with audio and video muxed together.
    Progressive,
    Hls,
    Dash,
}

/// A stream the resolver picked for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub url: String,
    pub kind: StreamKind,
    /// Quality label such as `1080p`.
    pub quality: Option<String>,
    pub http_headers: Vec<(String, String)>,
}

impl StreamSource {
    pub fn new(url: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            url: url.into(),
            kind,
            quality: None,
            http_headers: Vec::new(),
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.push((name.into(), value.into()));
        self
    }
}

/// A queued or playing unit: a video and, once resolved, its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub video: Video,
    pub stream: Option<StreamSource>,
}

impl PlaybackItem {
    pub fn unresolved(video: Video) -> Self {
        Self {
            video,
            stream: None,
        }
    }

    pub fn resolved(video: Video, stream: StreamSource) -> Self {
        Self {
            video,
            stream: Some(stream),
        }
    }

    pub fn id(&self) -> &VideoId {
        &self.video.id
    }

    pub fn is_resolved(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops the stream; resolved URLs expire and must not be reused later.
    pub fn without_stream(&self) -> Self {
        Self::unresolved(self.video.clone())
    }
}
