//! Decoded PCM frames and the downstream sink they are handed to.

use std::time::Duration;

use tracing::debug;

use crate::config::{NegotiatedFormat, OutputFormat};
use crate::error::Result;

/// Owned interleaved 16-bit PCM with a (offset, len) view into it.
///
/// Decoding writes into the whole storage; trimming narrows the view
/// without moving samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcmBuffer {
    // ---
    data: Vec<i16>,
    offset: usize,
    len: usize,
}

impl PcmBuffer {
    // ---
    /// Allocates zeroed storage for `bytes` bytes of PCM with an empty view.
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        // ---
        Self {
            data: vec![0; bytes / 2],
            offset: 0,
            len: 0,
        }
    }

    /// Size of the underlying storage in bytes.
    pub fn capacity_bytes(&self) -> usize {
        // ---
        self.data.len() * 2
    }

    /// Whole storage, for the decoder to write into.
    pub fn storage_mut(&mut self) -> &mut [i16] {
        // ---
        &mut self.data
    }

    /// Resets the view to the first `samples` interleaved samples.
    pub fn set_len(&mut self, samples: usize) {
        // ---
        self.offset = 0;
        self.len = samples.min(self.data.len());
    }

    /// Drops `samples` interleaved samples from the front of the view.
    pub fn advance(&mut self, samples: usize) {
        // ---
        let samples = samples.min(self.len);
        self.offset += samples;
        self.len -= samples;
    }

    /// Interleaved samples in view.
    pub fn samples(&self) -> &[i16] {
        // ---
        &self.data[self.offset..self.offset + self.len]
    }

    /// Number of interleaved samples in view.
    pub fn len(&self) -> usize {
        // ---
        self.len
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.len == 0
    }

    /// View start, in bytes from the beginning of storage.
    pub fn offset_bytes(&self) -> usize {
        // ---
        self.offset * 2
    }

    /// View length in bytes.
    pub fn len_bytes(&self) -> usize {
        // ---
        self.len * 2
    }

    /// View as native-endian bytes.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        // ---
        self.samples().iter().flat_map(|s| s.to_ne_bytes()).collect()
    }
}

/// A block of decoded audio ready for downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    // ---
    pub pcm: PcmBuffer,
    pub format: OutputFormat,
    pub timestamp: Duration,
    pub duration: Duration,
}

impl DecodedFrame {
    // ---
    /// Interleaved samples in this frame.
    pub fn samples(&self) -> &[i16] {
        // ---
        self.pcm.samples()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        // ---
        self.pcm.len() / self.format.channels.max(1) as usize
    }
}

/// Downstream side of the decoder.
///
/// Supplies the output format and buffers, and receives finished frames.
/// `None` means the packet produced no audio (headers, fully skipped
/// output).
pub trait FrameSink {
    // ---
    /// Format downstream can accept. Missing fields fall back to defaults.
    fn negotiated_format(&mut self) -> NegotiatedFormat {
        NegotiatedFormat::default()
    }

    /// Provides an output buffer of at least `bytes` bytes.
    fn allocate(&mut self, bytes: usize) -> Result<PcmBuffer> {
        Ok(PcmBuffer::with_capacity_bytes(bytes))
    }

    /// Accepts the outcome of one packet.
    fn finish_frame(&mut self, frame: Option<DecodedFrame>) -> Result<()>;
}

/// Stamps decoded PCM with timing and hands it to the sink.
#[derive(Debug, Default)]
pub struct FrameEmitter {
    // ---
    /// End of the last emitted frame
    next_timestamp: Option<Duration>,
}

impl FrameEmitter {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Emits `pcm` and returns the samples per channel delivered.
    ///
    /// The frame starts at `origin` when the decoded packet carried a
    /// timestamp, otherwise where the previous frame ended. Trimmed samples
    /// shift the start forward.
    pub fn emit<S: FrameSink + ?Sized>(
        &mut self,
        sink: &mut S,
        pcm: PcmBuffer,
        format: OutputFormat,
        origin: Option<Duration>,
        skipped: usize,
    ) -> Result<usize> {
        // ---
        let start = origin.or(self.next_timestamp).unwrap_or_default() + format.duration_of(skipped);

        if pcm.is_empty() {
            self.next_timestamp = Some(start);
            debug!("Nothing left after trimming");
            sink.finish_frame(None)?;
            return Ok(0);
        }

        let frames = pcm.len() / format.channels.max(1) as usize;
        let duration = format.duration_of(frames);
        self.next_timestamp = Some(start + duration);

        sink.finish_frame(Some(DecodedFrame {
            pcm,
            format,
            timestamp: start,
            duration,
        }))?;

        Ok(frames)
    }

    /// Forgets the running clock.
    pub fn reset(&mut self) {
        // ---
        self.next_timestamp = None;
    }
}

/// Sink that keeps every outcome in memory.
///
/// Useful for offline decoding and tests.
#[derive(Debug, Default)]
pub struct FrameCollector {
    // ---
    format: NegotiatedFormat,

    /// One entry per finished packet, `None` where no audio was produced
    pub outcomes: Vec<Option<DecodedFrame>>,
}

impl FrameCollector {
    // ---
    /// Creates a collector advertising `format` to the decoder.
    pub fn new(format: NegotiatedFormat) -> Self {
        // ---
        Self {
            format,
            outcomes: Vec::new(),
        }
    }

    /// Frames that carried audio, in order.
    pub fn frames(&self) -> impl Iterator<Item = &DecodedFrame> {
        // ---
        self.outcomes.iter().flatten()
    }

    /// All emitted samples, concatenated.
    pub fn samples(&self) -> Vec<i16> {
        // ---
        self.frames()
            .flat_map(|frame| frame.samples().iter().copied())
            .collect()
    }
}

impl FrameSink for FrameCollector {
    fn negotiated_format(&mut self) -> NegotiatedFormat {
        // ---
        self.format
    }

    fn finish_frame(&mut self, frame: Option<DecodedFrame>) -> Result<()> {
        // ---
        self.outcomes.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn filled(format: OutputFormat, frames: usize) -> PcmBuffer {
        let mut pcm = PcmBuffer::with_capacity_bytes(format.max_frame_bytes());
        pcm.set_len(frames * format.channels as usize);
        pcm
    }

    #[test]
    fn test_view_arithmetic() {
        // ---
        let mut pcm = PcmBuffer::with_capacity_bytes(16);
        assert_eq!(pcm.capacity_bytes(), 16);
        assert!(pcm.is_empty());

        pcm.storage_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        pcm.set_len(6);
        pcm.advance(2);

        assert_eq!(pcm.samples(), &[3, 4, 5, 6]);
        assert_eq!(pcm.offset_bytes(), 4);
        assert_eq!(pcm.len_bytes(), 8);

        pcm.advance(100);
        assert!(pcm.is_empty());
    }

    #[test]
    fn test_emit_uses_packet_timestamp() {
        // ---
        let format = NegotiatedFormat::new(48000, 2).resolve();
        let mut sink = FrameCollector::default();
        let mut emitter = FrameEmitter::new();

        let origin = Duration::from_millis(100);
        let frames = emitter
            .emit(&mut sink, filled(format, 960), format, Some(origin), 0)
            .unwrap();

        assert_eq!(frames, 960);
        let frame = sink.frames().next().unwrap();
        assert_eq!(frame.timestamp, origin);
        assert_eq!(frame.duration, Duration::from_millis(20));
        assert_eq!(frame.frames(), 960);
    }

    #[test]
    fn test_emit_continues_running_clock() {
        // ---
        let format = NegotiatedFormat::new(16000, 1).resolve();
        let mut sink = FrameCollector::default();
        let mut emitter = FrameEmitter::new();

        emitter
            .emit(&mut sink, filled(format, 320), format, None, 0)
            .unwrap();
        emitter
            .emit(&mut sink, filled(format, 320), format, None, 0)
            .unwrap();

        let stamps: Vec<_> = sink.frames().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![Duration::ZERO, Duration::from_millis(20)]);
    }

    #[test]
    fn test_emit_shifts_by_skipped_samples() {
        // ---
        let format = NegotiatedFormat::new(48000, 1).resolve();
        let mut sink = FrameCollector::default();
        let mut emitter = FrameEmitter::new();

        let mut pcm = filled(format, 960);
        pcm.advance(480);
        emitter.emit(&mut sink, pcm, format, None, 480).unwrap();

        let frame = sink.frames().next().unwrap();
        assert_eq!(frame.timestamp, Duration::from_millis(10));
        assert_eq!(frame.duration, Duration::from_millis(10));
    }

    #[test]
    fn test_empty_pcm_is_no_audio() {
        // ---
        let format = OutputFormat::default();
        let mut sink = FrameCollector::default();
        let mut emitter = FrameEmitter::new();

        let frames = emitter
            .emit(&mut sink, filled(format, 0), format, None, 960)
            .unwrap();

        assert_eq!(frames, 0);
        assert_eq!(sink.outcomes, vec![None]);
    }
}
