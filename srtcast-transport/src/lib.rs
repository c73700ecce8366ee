//! SRT Transport Layer
//!
//! This crate provides the transport seam the streaming client drives:
//! the [`Transport`] contract (open/close/send/receive/statistics), a
//! datagram-socket implementation, URI-carried tuning options, and
//! performance counters.

pub mod options;
pub mod socket;
pub mod stats;

pub use options::SrtSocketOptions;
pub use socket::{SocketError, SrtMode, SrtSocket};
pub use stats::{StatsRecorder, TransportStats};

use bytes::Bytes;
use crossbeam::channel::Receiver;
use std::sync::Arc;

/// An established bidirectional transport.
///
/// One instance is owned exclusively by the connection that opened it.
/// `send` preserves the ordering of calls made by a single caller;
/// `incoming` yields received chunks until the peer closes or the
/// transport errors; `close` is idempotent.
pub trait Transport: Send + Sync {
    /// Send one chunk of bytes to the peer.
    fn send(&self, data: Bytes) -> Result<(), SocketError>;

    /// The stream of inbound chunks.
    ///
    /// Ends (disconnects) when the transport is closed or fails. Each
    /// call returns a handle onto the same underlying stream.
    fn incoming(&self) -> Receiver<Bytes>;

    /// Release the transport. Safe to call multiple times.
    fn close(&self);

    /// Whether the underlying transport currently reports an
    /// established state.
    fn is_established(&self) -> bool;

    /// Point-in-time performance counters.
    fn statistics(&self) -> TransportStats;
}

/// Establishes transports on behalf of a connection.
///
/// The production implementation opens an [`SrtSocket`]; tests substitute
/// a simulated transport behind the same seam.
pub trait Connector: Send + Sync {
    /// Open a transport to `host:port` in the given role.
    fn connect(
        &self,
        host: &str,
        port: u16,
        mode: SrtMode,
        options: &SrtSocketOptions,
    ) -> Result<Arc<dyn Transport>, SocketError>;
}

/// Default connector backed by [`SrtSocket`].
#[derive(Debug, Default)]
pub struct SrtConnector;

impl Connector for SrtConnector {
    fn connect(
        &self,
        host: &str,
        port: u16,
        mode: SrtMode,
        options: &SrtSocketOptions,
    ) -> Result<Arc<dyn Transport>, SocketError> {
        Ok(Arc::new(SrtSocket::open(host, port, mode, options)?))
    }
}
