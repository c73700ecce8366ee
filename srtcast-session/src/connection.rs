//! SRT connection lifecycle and routing
//!
//! A connection owns one transport and the network monitor bound to it,
//! tracks the set of attached streams, serializes outbound sends, routes
//! inbound data, and fans network-quality events out to every attached
//! stream.

use crate::monitor::{NetworkEvent, NetworkMonitor, DEFAULT_STATS_INTERVAL};
use crate::stream::SrtStream;
use bytes::Bytes;
use crossbeam::channel::Receiver;
use parking_lot::RwLock;
use srtcast_transport::{
    Connector, SocketError, SrtConnector, SrtMode, SrtSocketOptions, Transport, TransportStats,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

/// Connection establishment errors
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The target URI is structurally invalid for this protocol
    #[error("unsupported URI: {0}")]
    UnsupportedUri(String),

    /// The transport-level handshake failed
    #[error("failed to connect: {message} (reason {reason})")]
    FailedToConnect { message: String, reason: i32 },
}

/// Validate a connection target and split it into its parts.
///
/// The scheme must be `srt`, and host and port are both required.
pub(crate) fn parse_target(uri: &str) -> Result<(url::Url, String, u16), ConnectError> {
    let parsed =
        url::Url::parse(uri).map_err(|_| ConnectError::UnsupportedUri(uri.to_string()))?;
    if parsed.scheme() != "srt" {
        return Err(ConnectError::UnsupportedUri(uri.to_string()));
    }
    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(ConnectError::UnsupportedUri(uri.to_string())),
    };
    let port = parsed
        .port()
        .ok_or_else(|| ConnectError::UnsupportedUri(uri.to_string()))?;
    Ok((parsed, host, port))
}

/// Shared connection state, owned behind the [`SrtConnection`] handle.
///
/// Streams hold a `Weak` reference to this; the connection owns stream
/// membership, never the other way around.
pub(crate) struct ConnectionCore {
    uri: RwLock<Option<url::Url>>,
    connected: AtomicBool,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    monitor: RwLock<Option<NetworkMonitor>>,
    streams: RwLock<Vec<SrtStream>>,
    /// Listener-accepted per-peer transports; closed and cleared with the
    /// connection
    clients: RwLock<Vec<Arc<dyn Transport>>>,
    routing: AtomicBool,
    connector: Box<dyn Connector>,
    stats_interval: RwLock<Duration>,
}

impl ConnectionCore {
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Forward outbound bytes to the transport.
    ///
    /// A silent no-op when no transport is open; the data is dropped,
    /// not queued.
    pub(crate) fn output(&self, data: Bytes) {
        let transport = self.transport.read().clone();
        match transport {
            Some(transport) => {
                if let Err(err) = transport.send(data) {
                    tracing::trace!("outbound send dropped: {}", err);
                }
            }
            None => tracing::trace!("outbound send dropped: connection not open"),
        }
    }

    /// Start routing inbound transport data to the first attached
    /// stream. Idempotent; re-armed by the next `open` after a close.
    pub(crate) fn begin_routing(self: &Arc<Self>) {
        if self.routing.swap(true, Ordering::AcqRel) {
            return;
        }
        let incoming = match self.transport.read().as_ref() {
            Some(transport) => transport.incoming(),
            None => {
                self.routing.store(false, Ordering::Release);
                return;
            }
        };
        let weak = Arc::downgrade(self);
        std::thread::spawn(move || route_inbound(weak, incoming));
    }
}

fn route_inbound(weak: Weak<ConnectionCore>, incoming: Receiver<Bytes>) {
    // Ends when the transport closes (channel disconnects) or the
    // connection is gone.
    for chunk in incoming.iter() {
        let Some(core) = weak.upgrade() else {
            break;
        };
        if !core.is_connected() {
            break;
        }
        let target = core.streams.read().first().cloned();
        match target {
            Some(stream) => stream.feed(&chunk),
            None => tracing::trace!("dropping {} inbound bytes: no attached stream", chunk.len()),
        }
    }
}

fn fan_out_events(weak: Weak<ConnectionCore>, events: Receiver<NetworkEvent>) {
    // Ends when the monitor stops (channel disconnects) or the
    // connection is gone. Streams attached later only see later events.
    for event in events.iter() {
        let Some(core) = weak.upgrade() else {
            break;
        };
        let streams = core.streams.read().clone();
        for stream in &streams {
            stream.dispatch(event.clone());
        }
    }
}

/// A two-way connection to an SRT peer
pub struct SrtConnection {
    core: Arc<ConnectionCore>,
}

impl SrtConnection {
    /// Create an unopened connection using the socket-backed connector
    pub fn new() -> Self {
        Self::with_connector(Box::new(SrtConnector))
    }

    /// Create an unopened connection with a custom transport connector
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        SrtConnection {
            core: Arc::new(ConnectionCore {
                uri: RwLock::new(None),
                connected: AtomicBool::new(false),
                transport: RwLock::new(None),
                monitor: RwLock::new(None),
                streams: RwLock::new(Vec::new()),
                clients: RwLock::new(Vec::new()),
                routing: AtomicBool::new(false),
                connector,
                stats_interval: RwLock::new(DEFAULT_STATS_INTERVAL),
            }),
        }
    }

    /// Override the statistics sampling interval used by the network
    /// monitor of subsequent opens
    pub fn set_stats_interval(&self, interval: Duration) {
        *self.core.stats_interval.write() = interval;
    }

    /// Open a two-way connection to `uri` (`srt://host:port?options`).
    ///
    /// Fails with [`ConnectError::UnsupportedUri`] before any resource is
    /// allocated when the URI is structurally invalid, and with
    /// [`ConnectError::FailedToConnect`] when the transport cannot be
    /// established; in both cases the connection is left unopened. An
    /// already-open connection is closed and replaced.
    pub fn open(&self, uri: &str, mode: SrtMode) -> Result<(), ConnectError> {
        let (parsed, host, port) = parse_target(uri)?;

        if self.core.is_connected() {
            tracing::debug!("replacing open connection with {}", uri);
            self.close();
        }

        let options = SrtSocketOptions::from_uri(&parsed);
        let transport = self
            .core
            .connector
            .connect(&host, port, mode, &options)
            .map_err(|err| connect_failure(&err))?;
        if !transport.is_established() {
            transport.close();
            return Err(ConnectError::FailedToConnect {
                message: "transport did not reach an established state".to_string(),
                reason: -1,
            });
        }

        let monitor = NetworkMonitor::new(Arc::clone(&transport), *self.core.stats_interval.read());
        let events = monitor.subscribe();
        monitor.start_running();

        *self.core.transport.write() = Some(transport);
        *self.core.monitor.write() = Some(monitor);
        *self.core.uri.write() = Some(parsed);
        self.core.connected.store(true, Ordering::Release);
        tracing::info!("connected to {}", uri);

        let weak = Arc::downgrade(&self.core);
        std::thread::spawn(move || fan_out_events(weak, events));
        self.core.begin_routing();

        // Streams that queued a publish/play while disconnected get their
        // single deferred action now, in attach order.
        let streams = self.core.streams.read().clone();
        for stream in &streams {
            stream.resume_pending();
        }
        Ok(())
    }

    /// Close the connection.
    ///
    /// Cascades to every attached stream, stops the monitor, closes the
    /// socket, and clears transient client transports. Idempotent and
    /// safe to call when never opened; streams stay attached.
    pub fn close(&self) {
        let streams = self.core.streams.read().clone();
        for stream in &streams {
            stream.close();
        }
        if let Some(monitor) = self.core.monitor.write().take() {
            monitor.stop_running();
        }
        if let Some(transport) = self.core.transport.write().take() {
            transport.close();
        }
        for client in self.core.clients.write().drain(..) {
            client.close();
        }
        self.core.routing.store(false, Ordering::Release);
        if self.core.connected.swap(false, Ordering::AcqRel) {
            tracing::info!("connection closed");
        }
    }

    /// The URI most recently opened successfully
    pub fn uri(&self) -> Option<url::Url> {
        self.core.uri.read().clone()
    }

    /// Whether the transport currently reports an established state
    pub fn connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Point-in-time transport performance counters, while open
    pub fn performance_data(&self) -> Option<TransportStats> {
        self.core
            .transport
            .read()
            .as_ref()
            .map(|transport| transport.statistics())
    }

    /// Send packetized bytes to the peer; silently dropped when unopened
    pub fn output(&self, data: Bytes) {
        self.core.output(data);
    }

    /// Keep a listener-accepted per-peer transport until the connection
    /// closes
    pub fn register_client(&self, client: Arc<dyn Transport>) {
        self.core.clients.write().push(client);
    }

    /// Attach a stream. Identity-based: a stream already attached is not
    /// re-added.
    pub fn add_stream(&self, stream: &SrtStream) {
        let mut streams = self.core.streams.write();
        if streams.iter().any(|existing| existing.ptr_eq(stream)) {
            return;
        }
        streams.push(stream.clone());
    }

    /// Detach a stream; a no-op for non-members
    pub fn remove_stream(&self, stream: &SrtStream) {
        self.core
            .streams
            .write()
            .retain(|existing| !existing.ptr_eq(stream));
    }

    /// Snapshot of the attached streams, in attach order
    pub fn streams(&self) -> Vec<SrtStream> {
        self.core.streams.read().clone()
    }

    pub(crate) fn core(&self) -> &Arc<ConnectionCore> {
        &self.core
    }
}

impl Default for SrtConnection {
    fn default() -> Self {
        SrtConnection::new()
    }
}

fn connect_failure(err: &SocketError) -> ConnectError {
    ConnectError::FailedToConnect {
        message: err.to_string(),
        reason: err.reason_code(),
    }
}
