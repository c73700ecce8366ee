//! Datagram socket transport
//!
//! Provides the socket-backed [`Transport`] implementation: a UDP socket
//! configured from [`SrtSocketOptions`], a reader thread feeding the
//! inbound chunk channel, and counter-based statistics.

use crate::options::SrtSocketOptions;
use crate::stats::{StatsRecorder, TransportStats};
use crate::Transport;
use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// Reader thread poll interval; bounds how long `close` can lag
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest datagram the reader accepts
const MAX_DATAGRAM_SIZE: usize = 65536;

/// Socket transport errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("address could not be resolved: {0}")]
    Unresolvable(String),

    #[error("connection rejected: {message} (code {code})")]
    Rejected { message: String, code: i32 },

    #[error("socket is closed")]
    Closed,

    #[error("no connected peer")]
    NoPeer,
}

impl SocketError {
    /// Numeric reason code carried in connect failures
    pub fn reason_code(&self) -> i32 {
        match self {
            SocketError::Io(err) => err.raw_os_error().unwrap_or(-1),
            SocketError::Rejected { code, .. } => *code,
            SocketError::Unresolvable(_) => -2,
            SocketError::Closed => -3,
            SocketError::NoPeer => -4,
        }
    }
}

/// Role used when opening a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrtMode {
    /// Initiate the connection to a remote peer
    Caller,
    /// Accept a connection from a remote peer
    Listener,
}

/// Socket-backed transport
///
/// In caller mode the socket is connected to the resolved remote address.
/// In listener mode it is bound locally and adopts the first peer that
/// sends a datagram.
pub struct SrtSocket {
    socket: UdpSocket,
    mode: SrtMode,
    peer: Arc<RwLock<Option<SocketAddr>>>,
    recorder: Arc<StatsRecorder>,
    incoming_rx: Receiver<Bytes>,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SrtSocket {
    /// Open a socket to (or listening at) `host:port`.
    ///
    /// Caller mode resolves the hostname and connects; listener mode
    /// binds the local address. Buffer-size options are applied before
    /// the socket is put into service.
    pub fn open(
        host: &str,
        port: u16,
        mode: SrtMode,
        options: &SrtSocketOptions,
    ) -> Result<Self, SocketError> {
        let addr = resolve(host, port)?;

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        if let Some(size) = options.sndbuf {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = options.rcvbuf {
            socket.set_recv_buffer_size(size)?;
        }
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        let peer = match mode {
            SrtMode::Caller => {
                let bind_addr = if addr.is_ipv4() {
                    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
                } else {
                    SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
                };
                socket.bind(&bind_addr.into())?;
                socket.connect(&addr.into())?;
                Some(addr)
            }
            SrtMode::Listener => {
                socket.set_reuse_address(true)?;
                socket.bind(&addr.into())?;
                None
            }
        };

        let socket: UdpSocket = socket.into();
        let peer = Arc::new(RwLock::new(peer));
        let recorder = Arc::new(StatsRecorder::new());
        let closed = Arc::new(AtomicBool::new(false));
        let (incoming_tx, incoming_rx) = unbounded();

        let reader = {
            let socket = socket.try_clone()?;
            let peer = Arc::clone(&peer);
            let recorder = Arc::clone(&recorder);
            let closed = Arc::clone(&closed);
            std::thread::spawn(move || {
                let mut buf = [0u8; MAX_DATAGRAM_SIZE];
                while !closed.load(Ordering::Acquire) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            if mode == SrtMode::Listener && peer.read().is_none() {
                                tracing::debug!("adopting peer {}", from);
                                *peer.write() = Some(from);
                            }
                            recorder.record_received(len);
                            if incoming_tx.send(Bytes::copy_from_slice(&buf[..len])).is_err() {
                                break;
                            }
                        }
                        Err(err)
                            if err.kind() == ErrorKind::WouldBlock
                                || err.kind() == ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(err) => {
                            tracing::debug!("socket reader stopping: {}", err);
                            break;
                        }
                    }
                }
            })
        };

        tracing::info!("socket open ({:?}) at {}", mode, addr);

        Ok(SrtSocket {
            socket,
            mode,
            peer,
            recorder,
            incoming_rx,
            closed,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// The locally bound address
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.socket.local_addr()?)
    }

    /// The remote peer, once known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.peer.read()
    }

    /// The role this socket was opened with
    pub fn mode(&self) -> SrtMode {
        self.mode
    }
}

impl Transport for SrtSocket {
    fn send(&self, data: Bytes) -> Result<(), SocketError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SocketError::Closed);
        }
        let sent = match self.mode {
            SrtMode::Caller => self.socket.send(&data)?,
            SrtMode::Listener => {
                let peer = self.peer.read().ok_or(SocketError::NoPeer)?;
                self.socket.send_to(&data, peer)?
            }
        };
        self.recorder.record_sent(sent);
        Ok(())
    }

    fn incoming(&self) -> Receiver<Bytes> {
        self.incoming_rx.clone()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.reader.lock().take() {
            // The reader observes the flag within one read timeout.
            let _ = handle.join();
        }
        tracing::info!("socket closed");
    }

    fn is_established(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn statistics(&self) -> TransportStats {
        self.recorder.snapshot()
    }
}

impl Drop for SrtSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, SocketError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| SocketError::Unresolvable(host.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| SocketError::Unresolvable(host.to_string()))
}
