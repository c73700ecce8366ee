//! Frame-tick choreographer
//!
//! A periodic tick source for display-refresh-driven work. Subscribers
//! receive a [`FrameTick`] per interval while running and not paused; no
//! tick is delivered after `stop_running` returns.

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Flag-poll granularity of the tick thread
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One frame tick
#[derive(Debug, Clone, Copy)]
pub struct FrameTick {
    /// When the tick fired
    pub timestamp: Instant,
    /// Time since the previous tick was delivered
    pub duration: Duration,
}

struct ChoreographerShared {
    running: AtomicBool,
    paused: AtomicBool,
    subscribers: Mutex<Vec<Sender<FrameTick>>>,
}

/// Fixed-rate tick source with pause/resume
pub struct Choreographer {
    interval: Duration,
    shared: Arc<ChoreographerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Choreographer {
    /// Create a choreographer ticking at `preferred_fps` frames per second
    pub fn new(preferred_fps: u32) -> Self {
        let fps = preferred_fps.max(1);
        Choreographer {
            interval: Duration::from_secs(1) / fps,
            shared: Arc::new(ChoreographerShared {
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Register a tick subscriber
    pub fn subscribe(&self) -> Receiver<FrameTick> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Start the tick thread; no-op when already running
    pub fn start_running(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let interval = self.interval;
        tracing::debug!("choreographer ticking every {:?}", interval);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || {
            let mut last = Instant::now();
            while shared.running.load(Ordering::Acquire) {
                std::thread::sleep(POLL_INTERVAL.min(interval));
                if shared.paused.load(Ordering::Acquire) {
                    // Paused time never counts toward the next tick.
                    last = Instant::now();
                    continue;
                }
                let elapsed = last.elapsed();
                if elapsed < interval {
                    continue;
                }
                let tick = FrameTick {
                    timestamp: Instant::now(),
                    duration: elapsed,
                };
                last = tick.timestamp;
                let subscribers = shared.subscribers.lock();
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                for subscriber in subscribers.iter() {
                    let _ = subscriber.send(tick);
                }
            }
        });
        *self.handle.lock() = Some(handle);
    }

    /// Stop the tick thread and drop all subscribers.
    ///
    /// Subscriber channels disconnect; no tick is delivered after this
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

    /// Suspend or resume tick delivery without tearing down subscribers
    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }
}

impl Drop for Choreographer {
    fn drop(&mut self) {
        self.stop_running();
    }
}
