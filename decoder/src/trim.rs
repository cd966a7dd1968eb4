//! Pre-skip accounting.
//!
//! The encoder prepends priming samples that must be dropped. Their count
//! is given at 48 kHz and rescaled to the output rate on every decode.

use tracing::info;

use crate::config::{OutputFormat, REFERENCE_RATE};
use crate::frame::PcmBuffer;

/// Samples still to be discarded, counted at 48 kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipBudget {
    // ---
    remaining: u32,
}

impl SkipBudget {
    // ---
    pub fn new(pre_skip: u16) -> Self {
        // ---
        Self {
            remaining: pre_skip as u32,
        }
    }

    /// Samples left to skip at 48 kHz.
    pub fn remaining(&self) -> u32 {
        // ---
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        // ---
        self.remaining == 0
    }

    /// Consumes budget for `decoded` fresh samples at `rate`.
    ///
    /// Returns how many of those samples (per channel) must be dropped.
    /// A remainder worth less than one output sample is discarded.
    pub fn take(&mut self, decoded: usize, rate: u32) -> usize {
        // ---
        if self.remaining == 0 || rate == 0 {
            return 0;
        }

        let scaled = (self.remaining as u64 * rate as u64 / REFERENCE_RATE as u64) as usize;
        if scaled == 0 {
            self.remaining = 0;
            return 0;
        }

        let skip = scaled.min(decoded);
        let consumed = (skip as u64 * REFERENCE_RATE as u64 / rate as u64) as u32;
        self.remaining = self.remaining.saturating_sub(consumed);

        skip
    }
}

/// Drops pre-skip samples from the front of `pcm`.
///
/// Returns the number of samples per channel removed.
pub fn trim_pre_skip(budget: &mut SkipBudget, pcm: &mut PcmBuffer, format: OutputFormat) -> usize {
    // ---
    if budget.is_exhausted() {
        return 0;
    }

    let channels = format.channels as usize;
    let before = budget.remaining();
    let skip = budget.take(pcm.len() / channels.max(1), format.sample_rate);
    pcm.advance(skip * channels);

    info!(
        "Skipping {} samples ({} at 48000 Hz, {} left to skip)",
        skip,
        before - budget.remaining(),
        budget.remaining()
    );

    skip
}
