//! Shared fixtures for the integration tests
#![allow(dead_code)]

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use srtcast_media::{
    AudioFormat, Depacketizer, MediaKinds, MediaOutput, MediaProducer, MediaUnit, Packetizer,
    PlaybackSink, TrackId, VideoFormat, VideoSize,
};
use srtcast_session::{BitrateStrategy, NetworkEvent, SrtConnection, SrtStream};
use srtcast_transport::{
    Connector, SocketError, SrtMode, SrtSocketOptions, Transport, TransportStats,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Initialize test logging once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();
}

/// Spin until `predicate` holds or `timeout` elapses
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

/// In-memory transport that accepts the connection, records sends, and
/// replays scripted inbound data
pub struct FakeTransport {
    established: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<Bytes>>,
    stats: RwLock<TransportStats>,
    incoming_tx: Mutex<Option<Sender<Bytes>>>,
    incoming_rx: Receiver<Bytes>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(FakeTransport {
            established: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            stats: RwLock::new(TransportStats::default()),
            incoming_tx: Mutex::new(Some(tx)),
            incoming_rx: rx,
        })
    }

    /// Simulate the peer sending a chunk
    pub fn push_incoming(&self, data: Bytes) {
        if let Some(tx) = self.incoming_tx.lock().as_ref() {
            let _ = tx.send(data);
        }
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn set_stats(&self, stats: TransportStats) {
        *self.stats.write() = stats;
    }
}

impl Transport for FakeTransport {
    fn send(&self, data: Bytes) -> Result<(), SocketError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SocketError::Closed);
        }
        self.sent.lock().push(data);
        Ok(())
    }

    fn incoming(&self) -> Receiver<Bytes> {
        self.incoming_rx.clone()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.established.store(false, Ordering::Release);
        self.incoming_tx.lock().take();
    }

    fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    fn statistics(&self) -> TransportStats {
        self.stats.read().clone()
    }
}

/// Connector handing out a configurable fake transport
#[derive(Clone)]
pub struct FakeConnector {
    transport: Arc<Mutex<Arc<FakeTransport>>>,
    fail_next: Arc<Mutex<Option<(String, i32)>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::with_transport(&FakeTransport::new())
    }

    pub fn with_transport(transport: &Arc<FakeTransport>) -> Self {
        FakeConnector {
            transport: Arc::new(Mutex::new(Arc::clone(transport))),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_transport(&self, transport: &Arc<FakeTransport>) {
        *self.transport.lock() = Arc::clone(transport);
    }

    pub fn fail_next(&self, message: &str, code: i32) {
        *self.fail_next.lock() = Some((message.to_string(), code));
    }
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        _host: &str,
        _port: u16,
        _mode: SrtMode,
        _options: &SrtSocketOptions,
    ) -> Result<Arc<dyn Transport>, SocketError> {
        if let Some((message, code)) = self.fail_next.lock().take() {
            return Err(SocketError::Rejected { message, code });
        }
        let transport: Arc<dyn Transport> = self.transport.lock().clone();
        Ok(transport)
    }
}

/// Producer whose unit streams are driven by the test
pub struct FakeProducer {
    running: AtomicBool,
    video_tx: Sender<MediaUnit>,
    video_rx: Receiver<MediaUnit>,
    audio_tx: Sender<(MediaUnit, Duration)>,
    audio_rx: Receiver<(MediaUnit, Duration)>,
    bit_rate: AtomicU32,
}

impl FakeProducer {
    pub fn new() -> Arc<Self> {
        let (video_tx, video_rx) = unbounded();
        let (audio_tx, audio_rx) = unbounded();
        Arc::new(FakeProducer {
            running: AtomicBool::new(false),
            video_tx,
            video_rx,
            audio_tx,
            audio_rx,
            bit_rate: AtomicU32::new(1_000_000),
        })
    }

    pub fn push_video(&self, unit: MediaUnit) {
        let _ = self.video_tx.send(unit);
    }

    pub fn push_audio(&self, unit: MediaUnit, when: Duration) {
        let _ = self.audio_tx.send((unit, when));
    }
}

impl MediaProducer for FakeProducer {
    fn start_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn video_units(&self) -> Receiver<MediaUnit> {
        self.video_rx.clone()
    }

    fn audio_units(&self) -> Receiver<(MediaUnit, Duration)> {
        self.audio_rx.clone()
    }

    fn video_format(&self) -> Option<VideoFormat> {
        Some(VideoFormat {
            size: VideoSize::new(1280, 720),
        })
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        Some(AudioFormat {
            sample_rate: 48_000,
            channels: 2,
        })
    }

    fn append(&self, _unit: MediaUnit) {}

    fn video_bitrate(&self) -> u32 {
        self.bit_rate.load(Ordering::Acquire)
    }

    fn set_video_bitrate(&self, bit_rate: u32) {
        self.bit_rate.store(bit_rate, Ordering::Release);
    }
}

/// Observable handles into a [`RecordingPacketizer`]
#[derive(Clone)]
pub struct PacketizerProbe {
    pub log: Arc<Mutex<Vec<MediaUnit>>>,
    pub cleared: Arc<AtomicUsize>,
    pub expected: Arc<Mutex<MediaKinds>>,
}

/// Packetizer recording appended units and emitting one chunk per unit
pub struct RecordingPacketizer {
    log: Arc<Mutex<Vec<MediaUnit>>>,
    cleared: Arc<AtomicUsize>,
    expected: Arc<Mutex<MediaKinds>>,
    chunk_tx: Sender<Bytes>,
    chunk_rx: Receiver<Bytes>,
}

impl RecordingPacketizer {
    pub fn new() -> (Self, PacketizerProbe) {
        let (chunk_tx, chunk_rx) = unbounded();
        let probe = PacketizerProbe {
            log: Arc::new(Mutex::new(Vec::new())),
            cleared: Arc::new(AtomicUsize::new(0)),
            expected: Arc::new(Mutex::new(MediaKinds::none())),
        };
        let packetizer = RecordingPacketizer {
            log: Arc::clone(&probe.log),
            cleared: Arc::clone(&probe.cleared),
            expected: Arc::clone(&probe.expected),
            chunk_tx,
            chunk_rx,
        };
        (packetizer, probe)
    }
}

impl Packetizer for RecordingPacketizer {
    fn append(&mut self, unit: MediaUnit) {
        let _ = self.chunk_tx.send(unit.payload.clone());
        self.log.lock().push(unit);
    }

    fn clear(&mut self) {
        self.cleared.fetch_add(1, Ordering::AcqRel);
        let (tx, rx) = unbounded();
        self.chunk_tx = tx;
        self.chunk_rx = rx;
    }

    fn set_expected_kinds(&mut self, kinds: MediaKinds) {
        *self.expected.lock() = kinds;
    }

    fn expected_kinds(&self) -> MediaKinds {
        *self.expected.lock()
    }

    fn output(&mut self) -> Receiver<Bytes> {
        self.chunk_rx.clone()
    }
}

/// Observable handles into a [`FakeDepacketizer`]
#[derive(Clone)]
pub struct DepacketizerProbe {
    pub fed: Arc<Mutex<Vec<u8>>>,
}

/// Depacketizer emitting one audio unit per chunk of bytes it reads
pub struct FakeDepacketizer {
    fed: Arc<Mutex<Vec<u8>>>,
    unit_tx: Sender<(TrackId, MediaUnit)>,
    unit_rx: Receiver<(TrackId, MediaUnit)>,
}

impl FakeDepacketizer {
    pub fn new() -> (Self, DepacketizerProbe) {
        let (unit_tx, unit_rx) = unbounded();
        let probe = DepacketizerProbe {
            fed: Arc::new(Mutex::new(Vec::new())),
        };
        let depacketizer = FakeDepacketizer {
            fed: Arc::clone(&probe.fed),
            unit_tx,
            unit_rx,
        };
        (depacketizer, probe)
    }
}

impl Depacketizer for FakeDepacketizer {
    fn read(&mut self, data: &[u8]) -> usize {
        self.fed.lock().extend_from_slice(data);
        let unit = MediaUnit::audio(Duration::ZERO, Bytes::copy_from_slice(data));
        let _ = self.unit_tx.send((0, unit));
        data.len()
    }

    fn clear(&mut self) {
        let (tx, rx) = unbounded();
        self.unit_tx = tx;
        self.unit_rx = rx;
    }

    fn output(&mut self) -> Receiver<(TrackId, MediaUnit)> {
        self.unit_rx.clone()
    }
}

/// Sink recording every delivered unit
pub struct FakeSink {
    running: AtomicBool,
    received: Mutex<Vec<MediaUnit>>,
}

impl FakeSink {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeSink {
            running: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<MediaUnit> {
        self.received.lock().clone()
    }
}

impl PlaybackSink for FakeSink {
    fn start_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn append(&self, unit: MediaUnit) {
        self.received.lock().push(unit);
    }
}

/// Media output observer recording every unit it sees
pub struct RecordingOutput {
    units: Mutex<Vec<MediaUnit>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingOutput {
            units: Mutex::new(Vec::new()),
        })
    }

    pub fn units(&self) -> Vec<MediaUnit> {
        self.units.lock().clone()
    }
}

impl MediaOutput for RecordingOutput {
    fn on_unit(&self, unit: &MediaUnit) {
        self.units.lock().push(unit.clone());
    }
}

/// Strategy recording the events it was asked to react to
pub struct RecordingStrategy {
    events: Arc<Mutex<Vec<NetworkEvent>>>,
}

impl RecordingStrategy {
    pub fn new() -> (Box<dyn BitrateStrategy>, Arc<Mutex<Vec<NetworkEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(RecordingStrategy {
                events: Arc::clone(&events),
            }),
            events,
        )
    }
}

impl BitrateStrategy for RecordingStrategy {
    fn adjust_bitrate(&mut self, event: &NetworkEvent, _producer: &dyn MediaProducer) {
        self.events.lock().push(event.clone());
    }
}

/// A stream wired to fakes, with the observable ends exposed
pub struct StreamFixture {
    pub stream: SrtStream,
    pub producer: Arc<FakeProducer>,
    pub sink: Arc<FakeSink>,
    pub packetizer: PacketizerProbe,
    pub depacketizer: DepacketizerProbe,
}

/// Build a fake-backed stream attached to `connection`
pub fn attach_stream(connection: &SrtConnection) -> StreamFixture {
    let producer = FakeProducer::new();
    let sink = FakeSink::new();
    let (packetizer, packetizer_probe) = RecordingPacketizer::new();
    let (depacketizer, depacketizer_probe) = FakeDepacketizer::new();
    let stream = SrtStream::new(
        connection,
        Box::new(packetizer),
        Box::new(depacketizer),
        producer.clone(),
        sink.clone(),
    );
    StreamFixture {
        stream,
        producer,
        sink,
        packetizer: packetizer_probe,
        depacketizer: depacketizer_probe,
    }
}

/// An opened connection backed by a fake transport
pub struct ConnectionFixture {
    pub connection: SrtConnection,
    pub transport: Arc<FakeTransport>,
    pub connector: FakeConnector,
}

/// Build a connection over a fake transport, optionally opened
pub fn connection(open: bool) -> ConnectionFixture {
    let transport = FakeTransport::new();
    let connector = FakeConnector::with_transport(&transport);
    let connection = SrtConnection::with_connector(Box::new(connector.clone()));
    connection.set_stats_interval(Duration::from_millis(50));
    if open {
        connection
            .open("srt://host.example:9000?latency=120", SrtMode::Caller)
            .unwrap();
    }
    ConnectionFixture {
        connection,
        transport,
        connector,
    }
}
