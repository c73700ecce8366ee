//! Stream publish/play state machine
//!
//! A stream is a one-way channel over its owning connection: publishing
//! pulls encoded media from the producer pipeline and pushes packetized
//! bytes to the connection; playing feeds connection-routed bytes
//! through the depacketizer into the playback sink. A stream belongs to
//! exactly one connection for its whole life and holds only a non-owning
//! reference back to it.

use crate::connection::{ConnectionCore, SrtConnection};
use crate::monitor::NetworkEvent;
use crate::strategy::BitrateStrategy;
use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use srtcast_media::{
    Depacketizer, MediaKind, MediaKinds, MediaOutput, MediaProducer, MediaUnit, Packetizer,
    PlaybackSink,
};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Running-flag recheck interval of the forwarding loops
const LOOP_POLL: Duration = Duration::from_millis(50);

/// Stream readiness state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Neither publishing nor playing
    Idle,
    /// Sending media to the peer
    Publishing,
    /// Receiving media from the peer
    Playing,
}

/// A publish/play request made before the connection was established.
/// At most one survives; a newer request overwrites an older one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingAction {
    Publish(String),
    Play(String),
}

struct StreamCore {
    connection: Weak<ConnectionCore>,
    ready_state: Mutex<ReadyState>,
    pending: Mutex<Option<PendingAction>>,
    name: Mutex<Option<String>>,
    packetizer: Mutex<Box<dyn Packetizer>>,
    depacketizer: Mutex<Box<dyn Depacketizer>>,
    producer: Arc<dyn MediaProducer>,
    sink: Arc<dyn PlaybackSink>,
    outputs: Mutex<Vec<Arc<dyn MediaOutput>>>,
    strategy: Arc<Mutex<Option<Box<dyn BitrateStrategy>>>>,
    /// Inbox of the per-stream strategy thread
    events_tx: Sender<NetworkEvent>,
}

/// A one-way media channel over an [`SrtConnection`]
#[derive(Clone)]
pub struct SrtStream {
    core: Arc<StreamCore>,
}

impl SrtStream {
    /// Create a stream bound to `connection` and attach it.
    ///
    /// The packetizer/depacketizer pair and the producer/sink pipelines
    /// are the stream's collaborators for its whole life.
    pub fn new(
        connection: &SrtConnection,
        packetizer: Box<dyn Packetizer>,
        depacketizer: Box<dyn Depacketizer>,
        producer: Arc<dyn MediaProducer>,
        sink: Arc<dyn PlaybackSink>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        let strategy: Arc<Mutex<Option<Box<dyn BitrateStrategy>>>> = Arc::new(Mutex::new(None));

        // Strategy work runs on its own thread so a slow strategy never
        // stalls the connection's event fan-out. Exits when the stream
        // core is dropped (sender disconnects).
        {
            let strategy = Arc::clone(&strategy);
            let producer = Arc::clone(&producer);
            std::thread::spawn(move || {
                for event in events_rx.iter() {
                    let mut slot = strategy.lock();
                    if let Some(active) = slot.as_mut() {
                        active.adjust_bitrate(&event, producer.as_ref());
                    }
                }
            });
        }

        let stream = SrtStream {
            core: Arc::new(StreamCore {
                connection: Arc::downgrade(connection.core()),
                ready_state: Mutex::new(ReadyState::Idle),
                pending: Mutex::new(None),
                name: Mutex::new(None),
                packetizer: Mutex::new(packetizer),
                depacketizer: Mutex::new(depacketizer),
                producer,
                sink,
                outputs: Mutex::new(Vec::new()),
                strategy,
                events_tx,
            }),
        };
        connection.add_stream(&stream);
        stream
    }

    /// Current readiness state
    pub fn ready_state(&self) -> ReadyState {
        *self.core.ready_state.lock()
    }

    /// The name used by the active (or deferred) publish/play
    pub fn name(&self) -> Option<String> {
        self.core.name.lock().clone()
    }

    /// Start sending media to the peer under `name`.
    ///
    /// While the connection is not established the request is parked as
    /// the single pending action and replayed once connectivity is
    /// achieved. `publish(None)` stops a current publish and is
    /// otherwise a no-op.
    pub fn publish(&self, name: Option<&str>) {
        let Some(name) = name else {
            if self.ready_state() == ReadyState::Publishing {
                self.close();
            }
            return;
        };
        let connection = match self.core.connection.upgrade() {
            Some(connection) if connection.is_connected() => connection,
            _ => {
                tracing::debug!("publish({}) deferred until connected", name);
                *self.core.pending.lock() = Some(PendingAction::Publish(name.to_string()));
                return;
            }
        };
        if self.ready_state() != ReadyState::Idle {
            self.close();
        }

        self.core.producer.start_running();
        {
            let mut packetizer = self.core.packetizer.lock();
            packetizer.clear();
            let mut kinds = MediaKinds::none();
            if self.core.producer.video_format().is_some() {
                kinds.insert(MediaKind::Video);
            }
            if self.core.producer.audio_format().is_some() {
                kinds.insert(MediaKind::Audio);
            }
            packetizer.set_expected_kinds(kinds);
        }
        *self.core.name.lock() = Some(name.to_string());
        *self.core.ready_state.lock() = ReadyState::Publishing;
        tracing::info!("publishing as {}", name);
        self.spawn_publish_loops(&connection);
    }

    /// Start receiving media from the peer under `name`.
    ///
    /// Deferred like [`publish`](Self::publish) while disconnected.
    /// `play(None)` stops a current play and is otherwise a no-op.
    pub fn play(&self, name: Option<&str>) {
        let Some(name) = name else {
            if self.ready_state() == ReadyState::Playing {
                self.close();
            }
            return;
        };
        let connection = match self.core.connection.upgrade() {
            Some(connection) if connection.is_connected() => connection,
            _ => {
                tracing::debug!("play({}) deferred until connected", name);
                *self.core.pending.lock() = Some(PendingAction::Play(name.to_string()));
                return;
            }
        };
        if self.ready_state() != ReadyState::Idle {
            self.close();
        }

        let delivery = {
            let mut depacketizer = self.core.depacketizer.lock();
            depacketizer.clear();
            depacketizer.output()
        };
        connection.begin_routing();
        self.core.sink.start_running();
        {
            let sink = Arc::clone(&self.core.sink);
            let gate = Arc::clone(&self.core.sink);
            std::thread::spawn(move || {
                run_while(&delivery, || gate.is_running(), |(_track, unit)| {
                    sink.append(unit);
                });
            });
        }
        *self.core.name.lock() = Some(name.to_string());
        *self.core.ready_state.lock() = ReadyState::Playing;
        tracing::info!("playing {}", name);
    }

    /// Stop publishing or playing and return to idle.
    ///
    /// A no-op when already idle. Never blocks on the forwarding loops;
    /// they observe the stopped pipelines and exit on their own.
    pub fn close(&self) {
        {
            let mut state = self.core.ready_state.lock();
            if *state == ReadyState::Idle {
                return;
            }
            *state = ReadyState::Idle;
        }
        self.core.producer.stop_running();
        self.core.sink.stop_running();
        tracing::debug!("stream closed");
    }

    /// Append one outbound media unit.
    ///
    /// Compressed units go to the packetizer (only while publishing);
    /// raw units go to the encoder pipeline. Every unit is fanned out to
    /// the registered outputs regardless of state.
    pub fn append(&self, unit: MediaUnit) {
        for output in self.core.outputs.lock().iter() {
            output.on_unit(&unit);
        }
        if unit.compressed {
            if self.ready_state() == ReadyState::Publishing {
                self.core.packetizer.lock().append(unit);
            }
        } else {
            self.core.producer.append(unit);
        }
    }

    /// Append one outbound audio unit captured at `when`
    pub fn append_audio(&self, unit: MediaUnit, when: Duration) {
        self.append(MediaUnit { pts: when, ..unit });
    }

    /// Inbound bytes routed to this stream by the connection
    pub fn feed(&self, data: &[u8]) {
        let consumed = self.core.depacketizer.lock().read(data);
        tracing::trace!("depacketizer consumed {} of {} bytes", consumed, data.len());
    }

    /// Register an output observer. Identity-based: an observer already
    /// registered is not added again.
    pub fn add_output(&self, output: Arc<dyn MediaOutput>) {
        let mut outputs = self.core.outputs.lock();
        if outputs.iter().any(|existing| same_output(existing, &output)) {
            return;
        }
        outputs.push(output);
    }

    /// Remove an output observer; a no-op for non-members
    pub fn remove_output(&self, output: &Arc<dyn MediaOutput>) {
        self.core
            .outputs
            .lock()
            .retain(|existing| !same_output(existing, output));
    }

    /// Install (or clear) the bitrate adaptation strategy
    pub fn set_bitrate_strategy(&self, strategy: Option<Box<dyn BitrateStrategy>>) {
        *self.core.strategy.lock() = strategy;
    }

    /// Hand a network-quality event to the bitrate strategy.
    ///
    /// Returns as soon as the event is enqueued; strategy work runs on
    /// the stream's own thread.
    pub fn dispatch(&self, event: NetworkEvent) {
        let _ = self.core.events_tx.send(event);
    }

    /// Replay the deferred publish/play request, if any. Called by the
    /// connection when it becomes connected; the slot is consumed so the
    /// request runs exactly once.
    pub(crate) fn resume_pending(&self) {
        let action = self.core.pending.lock().take();
        match action {
            Some(PendingAction::Publish(name)) => self.publish(Some(&name)),
            Some(PendingAction::Play(name)) => self.play(Some(&name)),
            None => {}
        }
    }

    pub(crate) fn ptr_eq(&self, other: &SrtStream) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    fn spawn_publish_loops(&self, connection: &Arc<ConnectionCore>) {
        // Video and audio forwarding run independently; per-kind order
        // is preserved, cross-kind interleaving is the packetizer's
        // business.
        {
            let units = self.core.producer.video_units();
            let gate = Arc::clone(&self.core.producer);
            let stream = self.clone();
            std::thread::spawn(move || {
                run_while(&units, || gate.is_running(), |unit| stream.append(unit));
            });
        }
        {
            let units = self.core.producer.audio_units();
            let gate = Arc::clone(&self.core.producer);
            let stream = self.clone();
            std::thread::spawn(move || {
                run_while(&units, || gate.is_running(), |(unit, when)| {
                    stream.append_audio(unit, when);
                });
            });
        }
        {
            let chunks = self.core.packetizer.lock().output();
            let gate = Arc::clone(&self.core.producer);
            let connection = Arc::downgrade(connection);
            std::thread::spawn(move || {
                run_while(&chunks, || gate.is_running(), |chunk: Bytes| {
                    if let Some(connection) = connection.upgrade() {
                        connection.output(chunk);
                    }
                });
            });
        }
    }
}

/// Drain `source` while `running` holds, rechecking the flag between
/// items so a stopped pipeline releases the loop without unblocking help.
fn run_while<T>(source: &Receiver<T>, running: impl Fn() -> bool, mut handle: impl FnMut(T)) {
    while running() {
        match source.recv_timeout(LOOP_POLL) {
            Ok(item) => handle(item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn same_output(a: &Arc<dyn MediaOutput>, b: &Arc<dyn MediaOutput>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
