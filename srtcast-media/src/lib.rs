//! Media Data Model and Pipeline Interfaces
//!
//! This crate defines the media units that flow through a streaming
//! session, the interfaces of the pipeline collaborators that produce
//! and consume them (packetizer, depacketizer, producer, playback sink),
//! validated codec configuration, and the frame-tick choreographer.

pub mod choreographer;
pub mod pipeline;
pub mod settings;
pub mod unit;

pub use choreographer::{Choreographer, FrameTick};
pub use pipeline::{
    AudioFormat, Depacketizer, MediaOutput, MediaProducer, Packetizer, PlaybackSink, VideoFormat,
};
pub use settings::{
    AudioCodecSettings, BitRateMode, ScalingMode, SettingsError, VideoCodecSettings, VideoSize,
};
pub use unit::{MediaKind, MediaKinds, MediaUnit, TrackId};
