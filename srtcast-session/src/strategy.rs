//! Bitrate adaptation strategies
//!
//! A strategy reacts to network-quality events by asking the producer
//! pipeline to change its target video bit rate. Strategies run on the
//! owning stream's strategy thread, never on the connection's fan-out
//! loop.

use crate::monitor::NetworkEvent;
use srtcast_media::MediaProducer;

/// Reacts to network-quality events on behalf of one stream
pub trait BitrateStrategy: Send {
    fn adjust_bitrate(&mut self, event: &NetworkEvent, producer: &dyn MediaProducer);
}

/// Strategy that ignores every event
#[derive(Debug, Default)]
pub struct NullBitrateStrategy;

impl BitrateStrategy for NullBitrateStrategy {
    fn adjust_bitrate(&mut self, _event: &NetworkEvent, _producer: &dyn MediaProducer) {}
}

/// Additive-increase / multiplicative-decrease video bitrate adaptation.
///
/// On an insufficient-bandwidth event the target drops toward the
/// reported uplink estimate; after a run of healthy status reports it
/// steps back up by a fixed increment. The target never leaves the
/// `[floor, ceiling]` band.
#[derive(Debug, Clone)]
pub struct AdaptiveBitrateStrategy {
    /// Lowest target bit rate (bits per second)
    floor_bps: u32,
    /// Highest target bit rate (bits per second)
    ceiling_bps: u32,
    /// Step added after a healthy run
    increment_bps: u32,
    /// Healthy status reports required before stepping up
    healthy_threshold: u32,
    /// Consecutive healthy reports seen so far
    healthy_run: u32,
}

/// Fraction of the reported uplink adopted on a decrease
const DECREASE_NUMERATOR: u64 = 7;
const DECREASE_DENOMINATOR: u64 = 10;

impl AdaptiveBitrateStrategy {
    /// Create a strategy with the given bit-rate band
    pub fn new(floor_bps: u32, ceiling_bps: u32) -> Self {
        AdaptiveBitrateStrategy {
            floor_bps,
            ceiling_bps: ceiling_bps.max(floor_bps),
            increment_bps: 100_000,
            healthy_threshold: 10,
            healthy_run: 0,
        }
    }

    /// Override the additive-increase step
    pub fn with_increment(mut self, increment_bps: u32) -> Self {
        self.increment_bps = increment_bps;
        self
    }

    /// Override how many healthy reports trigger an increase
    pub fn with_healthy_threshold(mut self, reports: u32) -> Self {
        self.healthy_threshold = reports.max(1);
        self
    }
}

impl Default for AdaptiveBitrateStrategy {
    fn default() -> Self {
        AdaptiveBitrateStrategy::new(100_000, 2_500_000)
    }
}

impl BitrateStrategy for AdaptiveBitrateStrategy {
    fn adjust_bitrate(&mut self, event: &NetworkEvent, producer: &dyn MediaProducer) {
        match event {
            NetworkEvent::Reset => {
                self.healthy_run = 0;
            }
            NetworkEvent::InsufficientBandwidth(report) => {
                self.healthy_run = 0;
                let current = producer.video_bitrate();
                let scaled =
                    (report.uplink_bps * DECREASE_NUMERATOR / DECREASE_DENOMINATOR).min(u32::MAX as u64) as u32;
                let target = scaled.clamp(self.floor_bps, self.ceiling_bps).min(current);
                if target < current {
                    tracing::info!("reducing video bitrate {} -> {} bps", current, target);
                    producer.set_video_bitrate(target);
                }
            }
            NetworkEvent::Status(_) => {
                self.healthy_run += 1;
                if self.healthy_run < self.healthy_threshold {
                    return;
                }
                self.healthy_run = 0;
                let current = producer.video_bitrate();
                let target = current
                    .saturating_add(self.increment_bps)
                    .min(self.ceiling_bps);
                if target > current {
                    tracing::debug!("raising video bitrate {} -> {} bps", current, target);
                    producer.set_video_bitrate(target);
                }
            }
        }
    }
}
