//! The opaque decode engine.
//!
//! The pipeline only needs "decode these bytes (or nothing) into this
//! buffer, optionally via the FEC path". [`OpusEngine`] provides that on top
//! of libopus through the `opus` crate; tests substitute their own engines.

use opus::{Channels, Decoder};
use tracing::debug;

use crate::config::OutputFormat;

/// libopus status for invalid arguments.
pub const STATUS_BAD_ARG: i32 = -1;

/// A stateful decoder producing interleaved 16-bit PCM.
pub trait DecodeEngine {
    // ---
    /// Decodes one packet into `output`.
    ///
    /// `data` is `None` for concealment. With `fec` set the engine rebuilds
    /// the packet preceding `data` from its redundancy.
    ///
    /// Returns the number of samples per channel written, or the engine's
    /// negative status code.
    fn decode(&mut self, data: Option<&[u8]>, output: &mut [i16], fec: bool) -> Result<usize, i32>;
}

/// Creates engines for a given output format.
pub trait EngineFactory {
    // ---
    type Engine: DecodeEngine;

    /// Returns a new engine or the engine's negative status code.
    fn create(&mut self, format: OutputFormat) -> Result<Self::Engine, i32>;
}

/// libopus-backed engine.
pub struct OpusEngine {
    // ---
    decoder: Decoder,
    channels: usize,
}

impl OpusEngine {
    // ---
    /// Creates a decoder for `format`.
    ///
    /// # Errors
    ///
    /// Returns the libopus status code when the rate or channel count is
    /// rejected.
    pub fn new(format: OutputFormat) -> Result<Self, i32> {
        // ---
        let channels = match format.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => return Err(STATUS_BAD_ARG),
        };

        let decoder = Decoder::new(format.sample_rate, channels).map_err(|e| status_of(&e))?;

        Ok(Self {
            decoder,
            channels: format.channels as usize,
        })
    }
}

impl DecodeEngine for OpusEngine {
    fn decode(&mut self, data: Option<&[u8]>, output: &mut [i16], fec: bool) -> Result<usize, i32> {
        // ---
        // An empty input makes the opus crate pass NULL, which selects
        // concealment.
        let input = data.unwrap_or(&[]);

        let samples = self
            .decoder
            .decode(input, output, fec)
            .map_err(|e| status_of(&e))?;

        debug!(
            "libopus produced {} samples x {} channels",
            samples, self.channels
        );
        Ok(samples)
    }
}

/// Factory producing [`OpusEngine`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpusEngineFactory;

impl EngineFactory for OpusEngineFactory {
    type Engine = OpusEngine;

    fn create(&mut self, format: OutputFormat) -> Result<OpusEngine, i32> {
        // ---
        OpusEngine::new(format)
    }
}

fn status_of(err: &opus::Error) -> i32 {
    // ---
    err.code() as i32
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::NegotiatedFormat;
    use opus::{Application, Encoder};

    #[test]
    fn test_engine_creation() {
        // ---
        assert!(OpusEngine::new(OutputFormat::default()).is_ok());
        assert!(OpusEngine::new(NegotiatedFormat::new(16000, 1).resolve()).is_ok());
    }

    #[test]
    fn test_engine_rejects_bad_format() {
        // ---
        let status = OpusEngine::new(NegotiatedFormat::new(44100, 2).resolve())
            .err()
            .expect("44.1 kHz should be rejected");
        assert!(status < 0);

        let status = OpusEngine::new(NegotiatedFormat::new(48000, 6).resolve())
            .err()
            .expect("six channels should be rejected");
        assert_eq!(status, STATUS_BAD_ARG);
    }

    #[test]
    fn test_decode_encoded_frame() {
        // ---
        let mut encoder =
            Encoder::new(16000, Channels::Mono, Application::Voip).expect("encoder creation failed");
        let silence = vec![0i16; 320];
        let mut encoded = vec![0u8; 4000];
        let len = encoder.encode(&silence, &mut encoded).expect("encoding failed");
        encoded.truncate(len);

        let format = NegotiatedFormat::new(16000, 1).resolve();
        let mut engine = OpusEngine::new(format).expect("engine creation failed");
        let mut output = vec![0i16; format.max_frame_samples()];

        let samples = engine
            .decode(Some(&encoded), &mut output, false)
            .expect("decode failed");
        assert_eq!(samples, 320);
    }

    #[test]
    fn test_concealment_without_data() {
        // ---
        let format = NegotiatedFormat::new(16000, 1).resolve();
        let mut engine = OpusEngine::new(format).expect("engine creation failed");
        let mut output = vec![0i16; format.max_frame_samples()];

        let samples = engine.decode(None, &mut output, false).expect("PLC failed");
        assert!(samples > 0);
    }

    #[test]
    fn test_invalid_data_reports_negative_status() {
        // ---
        let format = NegotiatedFormat::new(16000, 1).resolve();
        let mut engine = OpusEngine::new(format).expect("engine creation failed");
        let mut output = vec![0i16; format.max_frame_samples()];

        let status = engine
            .decode(Some(&[0xFF; 10]), &mut output, false)
            .expect_err("garbage should not decode");
        assert!(status < 0);
    }
}
