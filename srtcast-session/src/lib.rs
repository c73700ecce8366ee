//! SRT Streaming Session Layer
//!
//! This crate implements the connection/session coordination core: the
//! connection lifecycle over one SRT transport, per-stream publish/play
//! state machines, multiplexing of concurrent streams over one socket,
//! inbound dispatch, and network-telemetry-driven bitrate adaptation.

pub mod config;
pub mod connection;
pub mod monitor;
pub mod strategy;
pub mod stream;


pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnectError, SrtConnection};
pub use monitor::{NetworkEvent, NetworkMonitor, NetworkReport, DEFAULT_STATS_INTERVAL};
pub use strategy::{AdaptiveBitrateStrategy, BitrateStrategy, NullBitrateStrategy};
pub use stream::{ReadyState, SrtStream};
