//! Media units
//!
//! A media unit is one elementary access unit (a video frame or an audio
//! packet) together with its classification: media kind, compression
//! state, and presentation timestamp.

use bytes::Bytes;
use std::time::Duration;

/// Identifier of a track within a packetized stream
pub type TrackId = u16;

/// The kind of media a unit carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Presence set of media kinds
///
/// Used to tell the packetizer which kinds a publishing session will
/// actually feed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaKinds {
    video: bool,
    audio: bool,
}

impl MediaKinds {
    /// The empty set
    pub fn none() -> Self {
        MediaKinds::default()
    }

    /// Add a kind to the set
    pub fn insert(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Video => self.video = true,
            MediaKind::Audio => self.audio = true,
        }
    }

    /// Whether the set contains a kind
    pub fn contains(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video,
            MediaKind::Audio => self.audio,
        }
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        !self.video && !self.audio
    }
}

/// One elementary media access unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUnit {
    /// Media kind
    pub kind: MediaKind,
    /// Whether the payload is already compressed
    pub compressed: bool,
    /// Presentation timestamp relative to the start of the stream
    pub pts: Duration,
    /// The access-unit payload
    pub payload: Bytes,
}

impl MediaUnit {
    /// Create a unit
    pub fn new(kind: MediaKind, compressed: bool, pts: Duration, payload: Bytes) -> Self {
        MediaUnit {
            kind,
            compressed,
            pts,
            payload,
        }
    }

    /// Create a compressed video unit
    pub fn video(pts: Duration, payload: Bytes) -> Self {
        MediaUnit::new(MediaKind::Video, true, pts, payload)
    }

    /// Create a compressed audio unit
    pub fn audio(pts: Duration, payload: Bytes) -> Self {
        MediaUnit::new(MediaKind::Audio, true, pts, payload)
    }

    /// Whether this is a video unit
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Whether this is an audio unit
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}
