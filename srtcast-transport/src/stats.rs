//! Transport performance counters
//!
//! Counters are updated lock-free on the send/receive paths and sampled
//! as point-in-time snapshots by the network monitor.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Point-in-time transport performance snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total packets sent
    pub packets_sent: u64,
    /// Total packets received
    pub packets_received: u64,
    /// Total packets reported lost
    pub packets_lost: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Estimated send rate (bits per second) since the previous snapshot
    pub send_rate_bps: u64,
    /// Estimated receive rate (bits per second) since the previous snapshot
    pub recv_rate_bps: u64,
    /// Round-trip time (microseconds); 0 when the transport cannot measure it
    pub rtt_us: u32,
    /// Bytes queued for sending but not yet handed to the network
    pub queued_bytes: u64,
}

/// Last-snapshot reference point for rate estimation
struct SampleWindow {
    taken_at: Instant,
    bytes_sent: u64,
    bytes_received: u64,
}

/// Shared counter cell behind a transport
///
/// The socket's send path and reader thread bump the counters; snapshots
/// derive rates from the delta since the previous snapshot.
pub struct StatsRecorder {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_lost: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    queued_bytes: AtomicU64,
    rtt_us: AtomicU64,
    window: Mutex<SampleWindow>,
}

impl StatsRecorder {
    /// Create a recorder with zeroed counters
    pub fn new() -> Self {
        StatsRecorder {
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_lost: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            queued_bytes: AtomicU64::new(0),
            rtt_us: AtomicU64::new(0),
            window: Mutex::new(SampleWindow {
                taken_at: Instant::now(),
                bytes_sent: 0,
                bytes_received: 0,
            }),
        }
    }

    /// Record a sent packet
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a received packet
    pub fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record packets reported lost
    pub fn record_lost(&self, packets: u64) {
        self.packets_lost.fetch_add(packets, Ordering::Relaxed);
    }

    /// Update the queued-bytes gauge
    pub fn set_queued_bytes(&self, bytes: u64) {
        self.queued_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Update the measured round-trip time
    pub fn set_rtt_us(&self, rtt_us: u32) {
        self.rtt_us.store(rtt_us as u64, Ordering::Relaxed);
    }

    /// Take a snapshot, deriving rates from the delta since the last one
    pub fn snapshot(&self) -> TransportStats {
        let bytes_sent = self.bytes_sent.load(Ordering::Relaxed);
        let bytes_received = self.bytes_received.load(Ordering::Relaxed);

        let mut window = self.window.lock();
        let elapsed = window.taken_at.elapsed();
        let (send_rate_bps, recv_rate_bps) = if elapsed.as_millis() > 0 {
            let millis = elapsed.as_millis() as u64;
            (
                bytes_sent.saturating_sub(window.bytes_sent) * 8 * 1000 / millis,
                bytes_received.saturating_sub(window.bytes_received) * 8 * 1000 / millis,
            )
        } else {
            (0, 0)
        };
        window.taken_at = Instant::now();
        window.bytes_sent = bytes_sent;
        window.bytes_received = bytes_received;
        drop(window);

        TransportStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_lost: self.packets_lost.load(Ordering::Relaxed),
            bytes_sent,
            bytes_received,
            send_rate_bps,
            recv_rate_bps,
            rtt_us: self.rtt_us.load(Ordering::Relaxed) as u32,
            queued_bytes: self.queued_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        StatsRecorder::new()
    }
}
