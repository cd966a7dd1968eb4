//! Error types for the decode pipeline.

use thiserror::Error;

/// Errors surfaced by [`DecoderContext`](crate::DecoderContext) operations.
///
/// None of these are swallowed internally. [`DecoderError::Format`] and
/// [`DecoderError::Decode`] affect a single packet; the rest leave the
/// stream unable to make progress.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    // ---
    /// Identification packet is too short or lacks the `OpusHead` magic.
    #[error("invalid identification packet: {0}")]
    Format(String),

    /// The decode engine refused the requested rate/channel combination.
    #[error("failed to create Opus decoder ({sample_rate} Hz, {channels} channels): status {code}")]
    DecoderInit {
        sample_rate: u32,
        channels: u8,
        code: i32,
    },

    /// The decode engine returned a negative status for a packet.
    #[error("decoding error: {code}")]
    Decode { code: i32 },

    /// Downstream could not supply an output buffer of the required size.
    #[error("output buffer allocation failed: requested {requested} bytes, got {available}")]
    Allocation { requested: usize, available: usize },

    /// Downstream refused a finished frame.
    #[error("downstream rejected frame: {0}")]
    Downstream(String),
}

impl DecoderError {
    // ---
    /// Returns true when no audio can be produced until the stream is reset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecoderError::DecoderInit { .. }
                | DecoderError::Allocation { .. }
                | DecoderError::Downstream(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DecoderError>;
