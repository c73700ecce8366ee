//! Network monitor
//!
//! Samples transport statistics on a fixed interval and turns them into
//! a broadcast stream of network-quality events. Every subscriber
//! receives every event in production order; no event is delivered after
//! `stop_running` returns.

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use srtcast_transport::{Transport, TransportStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default statistics sampling interval
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Flag-poll granularity of the sampling thread
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Consecutive zero-progress sampling cycles (with data queued) before an
/// insufficient-bandwidth event is emitted
const INSUFFICIENT_BW_CYCLES: u32 = 3;

/// A momentary description of transport conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkReport {
    /// Estimated outbound rate (bits per second)
    pub uplink_bps: u64,
    /// Estimated inbound rate (bits per second)
    pub downlink_bps: u64,
    /// Round-trip time (microseconds); 0 when unknown
    pub rtt_us: u32,
    /// Packets reported lost since the previous report
    pub packets_lost: u64,
    /// Bytes queued for sending but not yet on the network
    pub queued_bytes: u64,
}

/// Network-quality event consumed by bitrate strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Monitoring (re)started; strategies should drop momentum state
    Reset,
    /// Periodic condition report
    Status(NetworkReport),
    /// The transport made no send progress while data was queued
    InsufficientBandwidth(NetworkReport),
}

struct MonitorShared {
    running: AtomicBool,
    subscribers: Mutex<Vec<Sender<NetworkEvent>>>,
}

impl MonitorShared {
    /// Deliver one event to every subscriber, unless the monitor stopped.
    ///
    /// Delivery holds the subscriber lock, the same lock `stop_running`
    /// drains, so a cycle still in flight when the monitor stops drops
    /// its event silently.
    fn broadcast(&self, event: NetworkEvent) {
        let subscribers = self.subscribers.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        for subscriber in subscribers.iter() {
            let _ = subscriber.send(event.clone());
        }
    }
}

/// Periodic transport-statistics sampler with broadcast output
pub struct NetworkMonitor {
    transport: Arc<dyn Transport>,
    interval: Duration,
    shared: Arc<MonitorShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// Create a monitor over a transport, sampling at `interval`
    pub fn new(transport: Arc<dyn Transport>, interval: Duration) -> Self {
        NetworkMonitor {
            transport,
            interval,
            shared: Arc::new(MonitorShared {
                running: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Register an event subscriber.
    ///
    /// Each subscriber independently receives every event produced after
    /// it subscribed, in production order.
    pub fn subscribe(&self) -> Receiver<NetworkEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Start the sampling thread; no-op when already running
    pub fn start_running(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let interval = self.interval;
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || {
            shared.broadcast(NetworkEvent::Reset);
            let mut previous = transport.statistics();
            let mut zero_progress_cycles = 0u32;
            let mut last_sample = Instant::now();
            while shared.running.load(Ordering::Acquire) {
                std::thread::sleep(POLL_INTERVAL.min(interval));
                if last_sample.elapsed() < interval {
                    continue;
                }
                last_sample = Instant::now();

                let stats = transport.statistics();
                let report = make_report(&previous, &stats);

                let stalled = stats.queued_bytes > 0 && stats.bytes_sent == previous.bytes_sent;
                previous = stats;

                if stalled {
                    zero_progress_cycles += 1;
                } else {
                    zero_progress_cycles = 0;
                }

                if zero_progress_cycles >= INSUFFICIENT_BW_CYCLES {
                    zero_progress_cycles = 0;
                    tracing::warn!(
                        "insufficient bandwidth: {} bytes queued, uplink {} bps",
                        report.queued_bytes,
                        report.uplink_bps
                    );
                    shared.broadcast(NetworkEvent::InsufficientBandwidth(report));
                } else {
                    shared.broadcast(NetworkEvent::Status(report));
                }
            }
        });
        *self.handle.lock() = Some(handle);
    }

    /// Stop sampling and drop all subscribers.
    ///
    /// Subscriber channels disconnect; no event is delivered after this
    /// returns.
    pub fn stop_running(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.subscribers.lock().clear();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn make_report(previous: &TransportStats, current: &TransportStats) -> NetworkReport {
    NetworkReport {
        uplink_bps: current.send_rate_bps,
        downlink_bps: current.recv_rate_bps,
        rtt_us: current.rtt_us,
        packets_lost: current.packets_lost.saturating_sub(previous.packets_lost),
        queued_bytes: current.queued_bytes,
    }
}
