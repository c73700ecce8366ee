//! Pipeline collaborator interfaces
//!
//! The session layer coordinates four collaborators it does not
//! implement: the packetizer and depacketizer that translate between
//! access units and transport byte chunks, the producer pipeline that
//! yields encoded media, and the playback sink that renders received
//! media. Output streams are plain channel receivers so forwarding loops
//! can block on them directly.

use crate::settings::VideoSize;
use crate::unit::{MediaKinds, MediaUnit, TrackId};
use bytes::Bytes;
use crossbeam::channel::Receiver;
use std::time::Duration;

/// Format of the video a producer is currently being fed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub size: VideoSize,
}

/// Format of the audio a producer is currently being fed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

/// Serializes media units into transport byte chunks.
///
/// `clear` resets framing state and replaces the output stream; a
/// receiver obtained before `clear` disconnects rather than yielding
/// stale chunks.
pub trait Packetizer: Send {
    /// Append one unit for packetization
    fn append(&mut self, unit: MediaUnit);

    /// Reset framing state
    fn clear(&mut self);

    /// Tell the packetizer which media kinds to expect
    fn set_expected_kinds(&mut self, kinds: MediaKinds);

    /// The media kinds currently expected
    fn expected_kinds(&self) -> MediaKinds;

    /// The stream of packetized byte chunks ready to send
    fn output(&mut self) -> Receiver<Bytes>;
}

/// Recovers media units from transport byte chunks.
///
/// Partial or malformed trailing bytes are buffered internally until
/// more data arrives; they are never surfaced as errors.
pub trait Depacketizer: Send {
    /// Feed received bytes; returns the number of bytes consumed
    fn read(&mut self, data: &[u8]) -> usize;

    /// Drop buffered partial state
    fn clear(&mut self);

    /// The stream of recovered units, tagged with their track
    fn output(&mut self) -> Receiver<(TrackId, MediaUnit)>;
}

/// The encoder-side producer pipeline.
///
/// Yields compressed access units on per-kind streams while running.
/// Raw units appended to it are encoded asynchronously and come back out
/// through the same streams.
pub trait MediaProducer: Send + Sync {
    fn start_running(&self);
    fn stop_running(&self);
    fn is_running(&self) -> bool;

    /// The stream of compressed video units
    fn video_units(&self) -> Receiver<MediaUnit>;

    /// The stream of compressed audio units with their capture timestamps
    fn audio_units(&self) -> Receiver<(MediaUnit, Duration)>;

    /// Format of the video input, if a video pipeline is attached
    fn video_format(&self) -> Option<VideoFormat>;

    /// Format of the audio input, if an audio pipeline is attached
    fn audio_format(&self) -> Option<AudioFormat>;

    /// Hand a raw unit to the encoder
    fn append(&self, unit: MediaUnit);

    /// Current video target bit rate in bits per second
    fn video_bitrate(&self) -> u32;

    /// Request a new video target bit rate
    fn set_video_bitrate(&self, bit_rate: u32);
}

/// Renders received media units.
///
/// `stop_running` must not block; the session's delivery loop observes
/// `is_running` and exits on its own.
pub trait PlaybackSink: Send + Sync {
    fn start_running(&self);
    fn stop_running(&self);
    fn is_running(&self) -> bool;

    /// Deliver one depacketized unit for playback
    fn append(&self, unit: MediaUnit);
}

/// Observer of a session's outbound media, for local preview or
/// recording. Registered by identity; receives every outbound unit.
pub trait MediaOutput: Send + Sync {
    fn on_unit(&self, unit: &MediaUnit);
}
