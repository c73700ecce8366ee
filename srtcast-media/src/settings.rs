//! Codec configuration
//!
//! Pure configuration objects for the encoder pipelines: validated,
//! serializable, and diffable. Diffing answers one question for the
//! encoder owner: can the change be applied to a live encoder session,
//! or does the session have to be rebuilt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("video size must be non-zero")]
    EmptyVideoSize,

    #[error("bit rate must be non-zero")]
    ZeroBitRate,

    #[error("key frame interval must be non-zero")]
    ZeroKeyFrameInterval,

    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u32),
}

/// Encoded video dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        VideoSize { width, height }
    }
}

/// How the encoder holds its target bit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitRateMode {
    /// Average bit rate over a window
    Average,
    /// Constant bit rate
    Constant,
}

/// How source frames are scaled into the encoded size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    Normal,
    Letterbox,
    CropSourceToCleanAperture,
    Trim,
}

/// Video compression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCodecSettings {
    /// Encoded video size
    #[serde(default = "default_video_size")]
    pub video_size: VideoSize,
    /// Target bit rate in bits per second
    #[serde(default = "default_video_bit_rate")]
    pub bit_rate: u32,
    /// Codec profile and level identifier
    #[serde(default = "default_profile_level")]
    pub profile_level: String,
    /// Bit rate mode
    #[serde(default = "default_bit_rate_mode")]
    pub bit_rate_mode: BitRateMode,
    /// Maximum seconds between key frames
    #[serde(default = "default_key_frame_interval")]
    pub max_key_frame_interval_duration: u32,
    /// Scaling mode
    #[serde(default = "default_scaling_mode")]
    pub scaling_mode: ScalingMode,
    /// Whether the encoder may reorder frames (B-frames); None = encoder default
    #[serde(default)]
    pub allow_frame_reordering: Option<bool>,
    /// Peak data rate limit as (bytes, seconds); None = unlimited
    #[serde(default)]
    pub data_rate_limits: Option<(f64, f64)>,
}

fn default_video_size() -> VideoSize {
    VideoSize::new(854, 480)
}

fn default_video_bit_rate() -> u32 {
    640 * 1000
}

fn default_profile_level() -> String {
    "H264_Baseline_3_1".to_string()
}

fn default_bit_rate_mode() -> BitRateMode {
    BitRateMode::Average
}

fn default_key_frame_interval() -> u32 {
    2
}

fn default_scaling_mode() -> ScalingMode {
    ScalingMode::Trim
}

impl Default for VideoCodecSettings {
    fn default() -> Self {
        VideoCodecSettings {
            video_size: default_video_size(),
            bit_rate: default_video_bit_rate(),
            profile_level: default_profile_level(),
            bit_rate_mode: default_bit_rate_mode(),
            max_key_frame_interval_duration: default_key_frame_interval(),
            scaling_mode: default_scaling_mode(),
            allow_frame_reordering: None,
            data_rate_limits: None,
        }
    }
}

impl VideoCodecSettings {
    /// Check the settings for values no encoder session can accept
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.video_size.width == 0 || self.video_size.height == 0 {
            return Err(SettingsError::EmptyVideoSize);
        }
        if self.bit_rate == 0 {
            return Err(SettingsError::ZeroBitRate);
        }
        if self.max_key_frame_interval_duration == 0 {
            return Err(SettingsError::ZeroKeyFrameInterval);
        }
        Ok(())
    }

    /// Whether switching from `self` to `other` requires tearing down the
    /// encoder session.
    ///
    /// Bit rate and data-rate limits can be applied to a live session;
    /// everything else cannot.
    pub fn requires_new_session(&self, other: &VideoCodecSettings) -> bool {
        self.video_size != other.video_size
            || self.profile_level != other.profile_level
            || self.bit_rate_mode != other.bit_rate_mode
            || self.max_key_frame_interval_duration != other.max_key_frame_interval_duration
            || self.scaling_mode != other.scaling_mode
            || self.allow_frame_reordering != other.allow_frame_reordering
    }
}

/// Audio compression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCodecSettings {
    /// Target bit rate in bits per second
    #[serde(default = "default_audio_bit_rate")]
    pub bit_rate: u32,
    /// Output sample rate in hertz; 0 = keep the source rate
    #[serde(default)]
    pub sample_rate: u32,
    /// Output channel count; 0 = keep the source layout
    #[serde(default)]
    pub channels: u32,
}

fn default_audio_bit_rate() -> u32 {
    64 * 1000
}

impl Default for AudioCodecSettings {
    fn default() -> Self {
        AudioCodecSettings {
            bit_rate: default_audio_bit_rate(),
            sample_rate: 0,
            channels: 0,
        }
    }
}

impl AudioCodecSettings {
    /// Check the settings for values no encoder session can accept
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.bit_rate == 0 {
            return Err(SettingsError::ZeroBitRate);
        }
        if self.channels > 8 {
            return Err(SettingsError::UnsupportedChannels(self.channels));
        }
        Ok(())
    }

    /// Whether switching from `self` to `other` requires tearing down the
    /// encoder session.
    pub fn requires_new_session(&self, other: &AudioCodecSettings) -> bool {
        self.sample_rate != other.sample_rate || self.channels != other.channels
    }
}
