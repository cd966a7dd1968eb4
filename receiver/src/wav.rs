//! WAV file output for decoded audio.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use opusdec::{DecodedFrame, DecoderError, FrameSink, NegotiatedFormat, OutputFormat};
use tracing::info;

/// Frame sink writing 16-bit PCM to a WAV container.
///
/// The WAV header is written once the decoder has settled on a format, so
/// the file always matches the first frame. A later frame in a different
/// format is refused.
pub struct WavSink<W: Write + Seek> {
    // ---
    format: NegotiatedFormat,

    /// Destination until the header is written
    target: Option<W>,

    writer: Option<(WavWriter<W>, OutputFormat)>,
    frames_written: u64,
}

impl WavSink<BufWriter<File>> {
    // ---
    /// Creates (or truncates) `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: NegotiatedFormat) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write + Seek> WavSink<W> {
    // ---
    /// Wraps `target`, advertising `format` to the decoder.
    pub fn new(target: W, format: NegotiatedFormat) -> Self {
        // ---
        Self {
            format,
            target: Some(target),
            writer: None,
            frames_written: 0,
        }
    }

    /// Samples per channel written so far.
    pub fn frames_written(&self) -> u64 {
        // ---
        self.frames_written
    }

    /// Completes the WAV header. Returns the samples per channel written.
    ///
    /// A sink that never received audio still produces a valid, empty file
    /// in the negotiated (or default) format.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn finalize(mut self) -> Result<u64> {
        // ---
        let format = self.format.resolve();
        let frames = self.frames_written;
        let writer = match self.writer.take() {
            Some((writer, _)) => writer,
            None => self.open(format)?,
        };

        writer.finalize().context("failed to finalize WAV file")?;
        info!("Wrote {} samples per channel", frames);
        Ok(frames)
    }

    fn open(&mut self, format: OutputFormat) -> opusdec::Result<WavWriter<W>> {
        // ---
        let target = self
            .target
            .take()
            .ok_or_else(|| DecoderError::Downstream("WAV output already opened".into()))?;

        let spec = WavSpec {
            channels: format.channels as u16,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::new(target, spec).map_err(downstream)?;

        info!(
            "Writing WAV: {} Hz, {} channels",
            format.sample_rate, format.channels
        );
        Ok(writer)
    }

    fn writer_for(&mut self, format: OutputFormat) -> opusdec::Result<&mut WavWriter<W>> {
        // ---
        let (writer, current) = match self.writer {
            Some(ref mut open) => open,
            None => {
                let writer = self.open(format)?;
                self.writer.insert((writer, format))
            }
        };

        if *current != format {
            return Err(DecoderError::Downstream(format!(
                "format changed from {} Hz/{} ch to {} Hz/{} ch",
                current.sample_rate, current.channels, format.sample_rate, format.channels
            )));
        }
        Ok(writer)
    }
}

impl<W: Write + Seek> FrameSink for WavSink<W> {
    fn negotiated_format(&mut self) -> NegotiatedFormat {
        // ---
        self.format
    }

    fn finish_frame(&mut self, frame: Option<DecodedFrame>) -> opusdec::Result<()> {
        // ---
        let Some(frame) = frame else {
            return Ok(());
        };

        let writer = self.writer_for(frame.format)?;
        for &sample in frame.samples() {
            writer.write_sample(sample).map_err(downstream)?;
        }

        self.frames_written += frame.frames() as u64;
        Ok(())
    }
}

fn downstream(err: hound::Error) -> DecoderError {
    // ---
    DecoderError::Downstream(err.to_string())
}
