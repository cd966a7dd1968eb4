//! RTP front end for the Opus decoder.
//!
//! Receives RTP over UDP, reorders it in a jitter buffer, and feeds the
//! packets (and the gaps between them) to a [`DecoderContext`]. Decoded
//! audio goes to any [`FrameSink`], usually a [`WavSink`].

pub mod jitter_buffer;
pub mod network;
pub mod stats;
pub mod wav;

pub use jitter_buffer::{JitterBuffer, JitterBufferConfig, Playout};
pub use network::{NetworkStats, RtpReceiver};
pub use stats::DecodeStats;
pub use wav::WavSink;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use opusdec::{Cycle, DecoderContext, FrameSink, Packet};
use opusdec_common::rtp::OPUS_CLOCK_RATE;
use opusdec_common::DecoderMetrics;
use tracing::{debug, error, warn};

/// Drives one decoder from jitter buffer output.
pub struct StreamDecoder<S: FrameSink> {
    // ---
    ctx: DecoderContext,
    sink: S,
    stats: DecodeStats,
    metrics: Option<DecoderMetrics>,

    /// RTP timestamp of the first packet, the stream's zero point
    base_timestamp: Option<u32>,
}

impl<S: FrameSink> StreamDecoder<S> {
    // ---
    pub fn new(ctx: DecoderContext, sink: S) -> Self {
        // ---
        Self {
            ctx,
            sink,
            stats: DecodeStats::default(),
            metrics: None,
            base_timestamp: None,
        }
    }

    /// Also reports to Prometheus.
    pub fn with_metrics(mut self, metrics: DecoderMetrics) -> Self {
        // ---
        self.metrics = Some(metrics);
        self
    }

    /// Hands one jitter buffer release to the decoder.
    ///
    /// Returns `None` when the packet was dropped after a recoverable
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error when the decoder can make no further progress.
    pub fn feed(&mut self, playout: Playout) -> Result<Option<Cycle>> {
        // ---
        let packet = match playout {
            Playout::Packet(rtp) => {
                self.stats.record_received();
                self.count(|m| m.packets_received_total.inc());
                let timestamp = self.stream_time(rtp.timestamp);
                Packet::new(rtp.payload).with_timestamp(timestamp)
            }
            Playout::Lost { sequence } => {
                debug!("Packet seq={} lost", sequence);
                self.stats.record_lost();
                self.count(|m| m.packets_lost_total.inc());
                Packet::lost()
            }
        };

        let sessions_before = self.ctx.sessions_created();
        let started = Instant::now();
        let result = self.ctx.handle_packet(packet, &mut self.sink);
        let elapsed = started.elapsed();

        let new_sessions = self.ctx.sessions_created() - sessions_before;
        self.count(|m| m.sessions_created_total.inc_by(new_sessions));

        match result {
            Ok(cycle) => {
                self.record(&cycle, elapsed);
                Ok(Some(cycle))
            }
            Err(e) if !e.is_fatal() => {
                warn!("Dropping packet: {}", e);
                self.stats.record_error();
                self.count(|m| m.decode_errors_total.inc());
                Ok(None)
            }
            Err(e) => {
                error!("Decoder failed: {}", e);
                Err(e).context("decoder cannot continue")
            }
        }
    }

    /// Counts a packet the jitter buffer refused.
    pub fn record_late(&mut self) {
        // ---
        self.stats.record_late();
        self.count(|m| m.packets_late_total.inc());
    }

    pub fn stats(&self) -> &DecodeStats {
        // ---
        &self.stats
    }

    pub fn context_mut(&mut self) -> &mut DecoderContext {
        // ---
        &mut self.ctx
    }

    pub fn metrics(&self) -> Option<&DecoderMetrics> {
        // ---
        self.metrics.as_ref()
    }

    /// Stops the decoder and returns the sink.
    pub fn finish(mut self) -> S {
        // ---
        self.ctx.stop();
        self.stats.log();
        self.sink
    }

    fn record(&mut self, cycle: &Cycle, elapsed: Duration) {
        // ---
        self.stats.record_cycle(cycle);

        let Some(metrics) = &self.metrics else {
            return;
        };
        match cycle {
            Cycle::Header { .. } | Cycle::Comment | Cycle::KnownHeader => {
                metrics.header_packets_total.inc();
            }
            Cycle::Primed => {}
            Cycle::Decoded(summary) => {
                metrics.decode_seconds.observe(elapsed.as_secs_f64());
                if summary.concealed {
                    metrics.concealed_total.inc();
                } else if summary.path.uses_fec() {
                    metrics.fec_reconstructions_total.inc();
                }
                metrics.samples_emitted_total.inc_by(summary.emitted as u64);
                metrics.samples_skipped_total.inc_by(summary.skipped as u64);
            }
        }
    }

    fn count<F: FnOnce(&DecoderMetrics)>(&self, f: F) {
        // ---
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    fn stream_time(&mut self, rtp_timestamp: u32) -> Duration {
        // ---
        let base = *self.base_timestamp.get_or_insert(rtp_timestamp);
        let ticks = rtp_timestamp.wrapping_sub(base) as u64;
        Duration::from_micros(ticks * 1_000_000 / OPUS_CLOCK_RATE as u64)
    }
}

/// Receives until `max_packets` datagrams have arrived, or forever.
///
/// Whatever is still buffered when the limit is reached is decoded before
/// returning.
///
/// # Errors
///
/// Returns an error if the socket fails or the decoder cannot continue.
pub async fn receive_loop<S: FrameSink>(
    receiver: &mut RtpReceiver,
    decoder: &mut StreamDecoder<S>,
    jitter_config: JitterBufferConfig,
    max_packets: Option<u64>,
) -> Result<()> {
    // ---
    let mut jitter_buffer = JitterBuffer::new(jitter_config);
    let mut received = 0u64;

    while !matches!(max_packets, Some(max) if received >= max) {
        let Some(packet) = receiver.receive().await? else {
            continue;
        };
        received += 1;

        if !jitter_buffer.insert(packet) {
            decoder.record_late();
            continue;
        }

        while let Some(playout) = jitter_buffer.pop() {
            decoder.feed(playout)?;
        }
        decoder.count(|m| m.jitter_buffer_occupancy_packets.set(jitter_buffer.len() as i64));
    }

    for playout in jitter_buffer.drain() {
        decoder.feed(playout)?;
    }
    Ok(())
}
