//! SRTCast - live streaming client over SRT
//!
//! High-level API for publishing and playing media streams over a
//! single SRT connection.

pub use srtcast_media as media;
pub use srtcast_session as session;
pub use srtcast_transport as transport;

// Re-export commonly used types
pub use media::{
    AudioCodecSettings, Choreographer, MediaKind, MediaKinds, MediaUnit, VideoCodecSettings,
};
pub use session::{
    AdaptiveBitrateStrategy, ClientConfig, ConnectError, NetworkEvent, NetworkMonitor,
    NetworkReport, ReadyState, SrtConnection, SrtStream,
};
pub use transport::{SrtMode, SrtSocket, SrtSocketOptions, Transport, TransportStats};
