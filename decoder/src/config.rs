//! Decoder configuration and output format.

use std::time::Duration;

use tracing::warn;

/// Output sample rates the decoder can produce.
pub const SUPPORTED_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Rate used when downstream does not fix one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Channel count used when downstream does not fix one.
pub const DEFAULT_CHANNELS: u8 = 2;

/// Reference rate that pre-skip is expressed in.
pub const REFERENCE_RATE: u32 = 48000;

/// Longest duration a single Opus packet can carry.
pub const MAX_FRAME_DURATION_MS: u32 = 120;

/// Shortest duration a single Opus packet can carry, in microseconds.
const MIN_FRAME_DURATION_US: u64 = 2500;

/// Decoder configuration, fixed for the lifetime of a stream.
///
/// # Example
///
/// ```
/// use opusdec::DecoderConfig;
///
/// let config = DecoderConfig::new(true);
/// assert!(config.use_inband_fec);
/// assert!(config.latency().is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderConfig {
    // ---
    /// Delay decoding by one packet so lost packets can be rebuilt from
    /// the redundancy carried in their successor.
    pub use_inband_fec: bool,
}

impl DecoderConfig {
    // ---
    pub fn new(use_inband_fec: bool) -> Self {
        // ---
        Self { use_inband_fec }
    }

    /// Extra (min, max) latency introduced by the decoder.
    ///
    /// FEC holds back one packet, whose duration ranges from 2.5 ms to
    /// 120 ms. Without FEC there is no added latency.
    pub fn latency(&self) -> Option<(Duration, Duration)> {
        // ---
        self.use_inband_fec.then(|| {
            (
                Duration::from_micros(MIN_FRAME_DURATION_US),
                Duration::from_millis(MAX_FRAME_DURATION_MS as u64),
            )
        })
    }
}

/// What downstream was able to agree on. Either field may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedFormat {
    // ---
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl NegotiatedFormat {
    // ---
    pub fn new(sample_rate: u32, channels: u8) -> Self {
        // ---
        Self {
            sample_rate: Some(sample_rate),
            channels: Some(channels),
        }
    }

    /// Fills missing fields with 48000 Hz / 2 channels.
    pub fn resolve(self) -> OutputFormat {
        // ---
        let channels = self.channels.unwrap_or_else(|| {
            warn!("Failed to get channels, using default {}", DEFAULT_CHANNELS);
            DEFAULT_CHANNELS
        });
        let sample_rate = self.sample_rate.unwrap_or_else(|| {
            warn!("Failed to get rate, using default {}", DEFAULT_SAMPLE_RATE);
            DEFAULT_SAMPLE_RATE
        });

        OutputFormat {
            sample_rate,
            channels,
        }
    }
}

/// PCM format the decoder session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    // ---
    pub sample_rate: u32,
    pub channels: u8,
}

impl OutputFormat {
    // ---
    /// Returns true when the decode engine can produce this format.
    pub fn is_supported(&self) -> bool {
        // ---
        SUPPORTED_RATES.contains(&self.sample_rate) && (1..=2).contains(&self.channels)
    }

    /// Samples per channel in the longest possible packet.
    pub fn max_frame_samples(&self) -> usize {
        // ---
        (MAX_FRAME_DURATION_MS * self.sample_rate / 1000) as usize
    }

    /// Bytes per interleaved sample frame.
    pub fn bytes_per_frame(&self) -> usize {
        // ---
        2 * self.channels as usize
    }

    /// Output capacity needed for one decode call, in bytes.
    pub fn max_frame_bytes(&self) -> usize {
        // ---
        self.max_frame_samples() * self.bytes_per_frame()
    }

    /// Playback time of `samples` per-channel samples.
    pub fn duration_of(&self, samples: usize) -> Duration {
        // ---
        Duration::from_nanos(samples as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        // ---
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }
}
