//! The per-stream decoding context.

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::classify::{Classifier, PacketKind, StreamHeaders};
use crate::config::{DecoderConfig, OutputFormat};
use crate::engine::{DecodeEngine, EngineFactory, OpusEngineFactory};
use crate::error::{DecoderError, Result};
use crate::frame::{FrameEmitter, FrameSink};
use crate::header::{parse_comments, parse_header, StreamHeader};
use crate::packet::Packet;
use crate::schedule::{DecodePath, FecScheduler};
use crate::session::DecoderSession;
use crate::trim::{trim_pre_skip, SkipBudget};

/// What handling one packet amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    // ---
    /// In-band identification packet parsed.
    Header { pre_skip: u16 },

    /// In-band comment packet accepted.
    Comment,

    /// Copy of an out-of-band header, ignored.
    KnownHeader,

    /// First payload packet in FEC mode, held back without output.
    Primed,

    /// A decode call was made.
    Decoded(DecodeSummary),
}

impl Cycle {
    // ---
    /// Samples per channel delivered downstream.
    pub fn emitted(&self) -> usize {
        // ---
        match self {
            Cycle::Decoded(summary) => summary.emitted,
            _ => 0,
        }
    }
}

/// Details of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    // ---
    pub path: DecodePath,

    /// No packet bytes were handed to the engine.
    pub concealed: bool,

    /// Samples per channel produced by the engine.
    pub decoded: usize,

    /// Samples per channel dropped as pre-skip.
    pub skipped: usize,

    /// Samples per channel delivered downstream.
    pub emitted: usize,
}

/// All mutable state for one decoded stream.
///
/// Packets are fed in arrival order through
/// [`handle_packet`](Self::handle_packet); everything the decoder remembers
/// between packets lives here.
///
/// # Example
///
/// ```
/// use opusdec::{Cycle, DecoderConfig, DecoderContext, FrameCollector, NegotiatedFormat, Packet};
///
/// let mut ctx = DecoderContext::new(DecoderConfig::new(false));
/// let mut sink = FrameCollector::new(NegotiatedFormat::new(48000, 2));
///
/// let mut head = b"OpusHead".to_vec();
/// head.extend_from_slice(&[1, 2, 0x38, 0x01, 0x80, 0xBB, 0, 0, 0, 0, 0]);
///
/// let cycle = ctx.handle_packet(Packet::new(head), &mut sink).unwrap();
/// assert_eq!(cycle, Cycle::Header { pre_skip: 312 });
/// ```
pub struct DecoderContext<F: EngineFactory = OpusEngineFactory> {
    // ---
    config: DecoderConfig,
    classifier: Classifier,
    header: Option<StreamHeader>,
    session: DecoderSession<F>,
    scheduler: FecScheduler,
    budget: SkipBudget,
    emitter: FrameEmitter,
}

impl DecoderContext<OpusEngineFactory> {
    // ---
    /// Creates a context decoding through libopus.
    pub fn new(config: DecoderConfig) -> Self {
        // ---
        Self::with_factory(config, OpusEngineFactory)
    }
}

impl<F: EngineFactory> DecoderContext<F> {
    // ---
    /// Creates a context that builds engines with `factory`.
    pub fn with_factory(config: DecoderConfig, factory: F) -> Self {
        // ---
        Self {
            config,
            classifier: Classifier::new(),
            header: None,
            session: DecoderSession::new(factory),
            scheduler: FecScheduler::new(config.use_inband_fec),
            budget: SkipBudget::default(),
            emitter: FrameEmitter::new(),
        }
    }

    pub fn config(&self) -> DecoderConfig {
        // ---
        self.config
    }

    /// Begins a stream. Returns the latency the decoder adds, if any.
    pub fn start(&mut self) -> Option<(Duration, Duration)> {
        // ---
        self.reset();

        let latency = self.config.latency();
        if let Some((min, max)) = latency {
            info!("In-band FEC enabled, latency {:?} to {:?}", min, max);
        }
        latency
    }

    /// Ends a stream, releasing the engine.
    pub fn stop(&mut self) {
        // ---
        self.reset();
    }

    /// Destroys the engine and clears all per-stream state.
    pub fn reset(&mut self) {
        // ---
        self.classifier.reset();
        self.header = None;
        self.session.reset();
        self.scheduler.reset();
        self.budget = SkipBudget::default();
        self.emitter.reset();
    }

    /// Supplies header packets out-of-band, before streaming.
    ///
    /// Once both are stored, in-band copies are recognized by content and
    /// ignored wherever they appear.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::Format`] if the identification packet is
    /// invalid; nothing is stored in that case.
    pub fn set_format(&mut self, headers: StreamHeaders) -> Result<()> {
        // ---
        debug!("set_format: {:?}", headers);

        if let Some(identification) = headers.identification {
            let header = parse_header(&identification)?;
            self.apply_header(header);
            self.classifier.store_identification(identification);
        }

        if let Some(comment) = headers.comment {
            parse_comments(&comment)?;
            self.classifier.store_comment(comment);
        }

        Ok(())
    }

    /// Processes the next packet in stream order.
    ///
    /// Every packet finishes with exactly one call to
    /// [`FrameSink::finish_frame`] unless an error is returned or it is the
    /// priming packet in FEC mode.
    ///
    /// # Errors
    ///
    /// - [`DecoderError::Format`] for a malformed in-band identification packet
    /// - [`DecoderError::DecoderInit`] if the engine cannot be created
    /// - [`DecoderError::Allocation`] if `sink` cannot supply a buffer
    /// - [`DecoderError::Decode`] if the engine rejects the packet; the
    ///   stream continues with the next packet
    pub fn handle_packet<S: FrameSink + ?Sized>(
        &mut self,
        packet: Packet,
        sink: &mut S,
    ) -> Result<Cycle> {
        // ---
        trace!(
            "Got buffer ts {:?}, duration {:?}",
            packet.timestamp,
            packet.duration
        );

        match self.classifier.classify(packet.payload()) {
            PacketKind::Identification => {
                let parsed = parse_header(packet.payload().unwrap_or_default());
                sink.finish_frame(None)?;
                let header = parsed?;
                self.apply_header(header);
                Ok(Cycle::Header {
                    pre_skip: header.pre_skip,
                })
            }
            PacketKind::Comment => {
                parse_comments(packet.payload().unwrap_or_default())?;
                sink.finish_frame(None)?;
                Ok(Cycle::Comment)
            }
            PacketKind::KnownHeader => {
                sink.finish_frame(None)?;
                Ok(Cycle::KnownHeader)
            }
            PacketKind::AudioPayload => self.decode_payload(packet, sink),
        }
    }

    fn decode_payload<S: FrameSink + ?Sized>(
        &mut self,
        packet: Packet,
        sink: &mut S,
    ) -> Result<Cycle> {
        // ---
        match packet.payload() {
            Some(data) => debug!("Received buffer of size {}", data.len()),
            None => debug!("Received missing buffer"),
        }

        let (engine, format) = self
            .session
            .ensure(|| sink.negotiated_format().resolve())?;

        let Some(job) = self.scheduler.schedule(packet) else {
            return Ok(Cycle::Primed);
        };

        // Packets carry up to 120 ms, so size for the worst case.
        let requested = format.max_frame_bytes();
        let mut pcm = sink.allocate(requested)?;
        if pcm.capacity_bytes() < requested {
            return Err(DecoderError::Allocation {
                requested,
                available: pcm.capacity_bytes(),
            });
        }

        let concealed = job.data.is_none();
        let output = &mut pcm.storage_mut()[..requested / 2];
        let decoded = decode_into(engine, job.data.as_deref(), output, job.path, format)?;
        pcm.set_len(decoded * format.channels as usize);

        let skipped = trim_pre_skip(&mut self.budget, &mut pcm, format);
        let emitted = self
            .emitter
            .emit(sink, pcm, format, job.timestamp, skipped)?;

        Ok(Cycle::Decoded(DecodeSummary {
            path: job.path,
            concealed,
            decoded,
            skipped,
            emitted,
        }))
    }

    fn apply_header(&mut self, header: StreamHeader) {
        // ---
        self.header = Some(header);
        self.budget = SkipBudget::new(header.pre_skip);
    }

    /// Header parsed for the current stream, if any.
    pub fn header(&self) -> Option<StreamHeader> {
        // ---
        self.header
    }

    /// Pre-skip still to be dropped, at 48 kHz.
    pub fn skip_remaining(&self) -> u32 {
        // ---
        self.budget.remaining()
    }

    /// Format of the live engine, if one exists.
    pub fn output_format(&self) -> Option<OutputFormat> {
        // ---
        self.session.format()
    }

    /// Engines created since this context was built.
    pub fn sessions_created(&self) -> u64 {
        // ---
        self.session.sessions_created()
    }

    /// Packets classified since the last reset.
    pub fn packet_index(&self) -> u64 {
        // ---
        self.classifier.packet_index()
    }

    /// True when a packet is held back for FEC.
    pub fn is_primed(&self) -> bool {
        // ---
        self.scheduler.is_primed()
    }
}

fn decode_into<E: DecodeEngine>(
    engine: &mut E,
    data: Option<&[u8]>,
    output: &mut [i16],
    path: DecodePath,
    format: OutputFormat,
) -> Result<usize> {
    // ---
    match data {
        Some(data) => debug!("Using buffer of size {}", data.len()),
        None => debug!("Using NULL buffer"),
    }

    let decoded = engine
        .decode(data, output, path.uses_fec())
        .map_err(|code| DecoderError::Decode { code })?;

    debug!("decoded {} samples", decoded);
    Ok(decoded.min(format.max_frame_samples()))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::NegotiatedFormat;
    use crate::frame::{DecodedFrame, FrameCollector, PcmBuffer};
    use crate::header::head_packet;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Payload that the scripted engine refuses.
    const CORRUPT: [u8; 2] = [0xDE, 0xAD];

    /// One recorded engine call: bytes handed over and the FEC flag.
    type Call = (Option<Vec<u8>>, bool);

    /// Engine producing 20 ms of PCM filled with the first payload byte.
    struct ScriptedEngine {
        format: OutputFormat,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl DecodeEngine for ScriptedEngine {
        fn decode(
            &mut self,
            data: Option<&[u8]>,
            output: &mut [i16],
            fec: bool,
        ) -> std::result::Result<usize, i32> {
            self.calls.borrow_mut().push((data.map(<[u8]>::to_vec), fec));
            if data == Some(&CORRUPT[..]) {
                return Err(-4);
            }

            let frames = self.format.sample_rate as usize / 50;
            let fill = data.and_then(|d| d.first()).copied().unwrap_or(0) as i16;
            for sample in &mut output[..frames * self.format.channels as usize] {
                *sample = fill;
            }
            Ok(frames)
        }
    }

    #[derive(Clone, Default)]
    struct ScriptedFactory {
        created: Rc<RefCell<Vec<OutputFormat>>>,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl EngineFactory for ScriptedFactory {
        type Engine = ScriptedEngine;

        fn create(&mut self, format: OutputFormat) -> std::result::Result<ScriptedEngine, i32> {
            if !format.is_supported() {
                return Err(-1);
            }
            self.created.borrow_mut().push(format);
            Ok(ScriptedEngine {
                format,
                calls: Rc::clone(&self.calls),
            })
        }
    }

    fn context(use_fec: bool) -> (DecoderContext<ScriptedFactory>, ScriptedFactory) {
        let factory = ScriptedFactory::default();
        let mut ctx = DecoderContext::with_factory(DecoderConfig::new(use_fec), factory.clone());
        ctx.start();
        (ctx, factory)
    }

    fn stereo_sink() -> FrameCollector {
        FrameCollector::new(NegotiatedFormat::new(48000, 2))
    }

    fn tags() -> Vec<u8> {
        b"OpusTags\x07\0\0\0libopus\0\0\0\0".to_vec()
    }

    #[test]
    fn test_in_band_headers_then_trimmed_audio() {
        // ---
        let (mut ctx, _) = context(false);
        let mut sink = stereo_sink();

        let cycle = ctx.handle_packet(Packet::new(head_packet(312)), &mut sink).unwrap();
        assert_eq!(cycle, Cycle::Header { pre_skip: 312 });
        assert_eq!(ctx.handle_packet(Packet::new(tags()), &mut sink).unwrap(), Cycle::Comment);

        let cycle = ctx.handle_packet(Packet::new(vec![7]), &mut sink).unwrap();
        assert_eq!(
            cycle,
            Cycle::Decoded(DecodeSummary {
                path: DecodePath::Immediate,
                concealed: false,
                decoded: 960,
                skipped: 312,
                emitted: 648,
            })
        );

        let cycle = ctx.handle_packet(Packet::new(vec![8]), &mut sink).unwrap();
        assert_eq!(cycle.emitted(), 960);

        assert_eq!(sink.outcomes.len(), 4);
        assert!(sink.outcomes[0].is_none());
        assert!(sink.outcomes[1].is_none());

        let first = sink.outcomes[2].as_ref().unwrap();
        assert_eq!(first.samples().len(), 648 * 2);
        assert!(first.samples().iter().all(|&s| s == 7));
        assert_eq!(ctx.skip_remaining(), 0);
    }

    #[test]
    fn test_pre_skip_rescaled_to_negotiated_rate() {
        // ---
        let (mut ctx, _) = context(false);
        let mut sink = FrameCollector::new(NegotiatedFormat::new(16000, 1));

        ctx.handle_packet(Packet::new(head_packet(312)), &mut sink).unwrap();
        let cycle = ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();

        match cycle {
            Cycle::Decoded(summary) => {
                assert_eq!(summary.decoded, 320);
                assert_eq!(summary.skipped, 104);
                assert_eq!(summary.emitted, 216);
            }
            other => panic!("unexpected cycle {:?}", other),
        }
    }

    #[test]
    fn test_fully_skipped_output_emits_nothing() {
        // ---
        let (mut ctx, _) = context(false);
        let mut sink = stereo_sink();

        ctx.handle_packet(Packet::new(head_packet(2000)), &mut sink).unwrap();
        let first = ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        let second = ctx.handle_packet(Packet::new(vec![2]), &mut sink).unwrap();
        let third = ctx.handle_packet(Packet::new(vec![3]), &mut sink).unwrap();

        assert_eq!(first.emitted(), 0);
        assert_eq!(second.emitted(), 0);
        assert_eq!(third.emitted(), 960 * 3 - 2000);
        assert_eq!(sink.frames().count(), 1);
    }

    #[test]
    fn test_without_fec_each_packet_decodes_immediately() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = stereo_sink();

        for byte in 1..=4u8 {
            ctx.handle_packet(Packet::new(vec![byte]), &mut sink).unwrap();
            let calls = factory.calls.borrow();
            assert_eq!(calls.last().unwrap(), &(Some(vec![byte]), false));
            assert_eq!(sink.frames().last().unwrap().samples()[0], byte as i16);
        }
        assert!(!ctx.is_primed());
    }

    #[test]
    fn test_without_fec_lost_packet_is_concealed() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = stereo_sink();

        ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        let cycle = ctx.handle_packet(Packet::lost(), &mut sink).unwrap();

        match cycle {
            Cycle::Decoded(summary) => {
                assert!(summary.concealed);
                assert_eq!(summary.path, DecodePath::Immediate);
            }
            other => panic!("unexpected cycle {:?}", other),
        }
        assert_eq!(factory.calls.borrow().last().unwrap(), &(None, false));
    }

    #[test]
    fn test_fec_delays_by_one_packet() {
        // ---
        let (mut ctx, factory) = context(true);
        let mut sink = stereo_sink();

        assert_eq!(
            ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap(),
            Cycle::Primed
        );
        assert!(sink.outcomes.is_empty());
        assert!(factory.calls.borrow().is_empty());
        assert!(ctx.is_primed());

        ctx.handle_packet(Packet::new(vec![2]), &mut sink).unwrap();
        ctx.handle_packet(Packet::new(vec![3]), &mut sink).unwrap();

        assert_eq!(
            *factory.calls.borrow(),
            vec![(Some(vec![1]), false), (Some(vec![2]), false)]
        );
        let firsts: Vec<i16> = sink.frames().map(|f| f.samples()[0]).collect();
        assert_eq!(firsts, vec![1, 2]);
    }

    #[test]
    fn test_fec_reconstructs_from_next_packet() {
        // ---
        let (mut ctx, factory) = context(true);
        let mut sink = stereo_sink();

        ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        ctx.handle_packet(Packet::lost(), &mut sink).unwrap();
        let cycle = ctx.handle_packet(Packet::new(vec![3]), &mut sink).unwrap();

        match cycle {
            Cycle::Decoded(summary) => {
                assert_eq!(summary.path, DecodePath::Reconstruct);
                assert!(!summary.concealed);
            }
            other => panic!("unexpected cycle {:?}", other),
        }

        ctx.handle_packet(Packet::new(vec![4]), &mut sink).unwrap();

        assert_eq!(
            *factory.calls.borrow(),
            vec![
                (Some(vec![1]), false),
                (Some(vec![3]), true),
                (Some(vec![3]), false),
            ]
        );
    }

    #[test]
    fn test_out_of_band_headers_suppress_in_band_copies() {
        // ---
        let (mut ctx, factory) = context(false);
        ctx.set_format(StreamHeaders::new(head_packet(312), tags()))
            .unwrap();
        assert_eq!(ctx.header(), Some(StreamHeader { pre_skip: 312 }));

        let mut sink = stereo_sink();
        let stream = [head_packet(312), tags(), vec![5], vec![6]];

        for _ in 0..2 {
            let cycles: Vec<Cycle> = stream
                .iter()
                .map(|data| ctx.handle_packet(Packet::new(data.clone()), &mut sink).unwrap())
                .collect();
            assert_eq!(cycles[0], Cycle::KnownHeader);
            assert_eq!(cycles[1], Cycle::KnownHeader);
            assert!(matches!(cycles[2], Cycle::Decoded(_)));
            assert!(matches!(cycles[3], Cycle::Decoded(_)));
        }

        // Only payload ever reached the engine
        assert_eq!(factory.calls.borrow().len(), 4);
        assert_eq!(ctx.packet_index(), 8);

        // Pre-skip from the out-of-band header applied once
        let emitted: usize = sink.frames().map(|f| f.frames()).sum();
        assert_eq!(emitted, 4 * 960 - 312);
    }

    #[test]
    fn test_invalid_out_of_band_header_rejected() {
        // ---
        let (mut ctx, _) = context(false);
        let err = ctx
            .set_format(StreamHeaders::new(b"OpusHead".to_vec(), tags()))
            .unwrap_err();

        assert!(matches!(err, DecoderError::Format(_)));
        assert_eq!(ctx.header(), None);

        // Positional detection still applies
        let mut sink = stereo_sink();
        assert_eq!(
            ctx.handle_packet(Packet::new(head_packet(80)), &mut sink).unwrap(),
            Cycle::Header { pre_skip: 80 }
        );
    }

    #[test]
    fn test_truncated_in_band_header_is_format_error() {
        // ---
        let (mut ctx, _) = context(false);
        let mut sink = stereo_sink();

        let err = ctx
            .handle_packet(Packet::new(b"OpusHead\x01\x02".to_vec()), &mut sink)
            .unwrap_err();

        assert!(matches!(err, DecoderError::Format(_)));
        assert!(!err.is_fatal());
        assert_eq!(sink.outcomes, vec![None]);
        assert_eq!(ctx.packet_index(), 1);
    }

    #[test]
    fn test_session_reused_until_reset() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = stereo_sink();

        for byte in 0..10u8 {
            ctx.handle_packet(Packet::new(vec![byte]), &mut sink).unwrap();
        }
        assert_eq!(factory.created.borrow().len(), 1);
        assert_eq!(ctx.output_format(), Some(NegotiatedFormat::new(48000, 2).resolve()));

        ctx.reset();
        assert_eq!(ctx.output_format(), None);
        assert_eq!(factory.created.borrow().len(), 1);

        ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        ctx.handle_packet(Packet::new(vec![2]), &mut sink).unwrap();
        assert_eq!(factory.created.borrow().len(), 2);
        assert_eq!(ctx.sessions_created(), 2);
    }

    #[test]
    fn test_headers_do_not_create_session() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = stereo_sink();

        ctx.handle_packet(Packet::new(head_packet(312)), &mut sink).unwrap();
        ctx.handle_packet(Packet::new(tags()), &mut sink).unwrap();

        assert!(factory.created.borrow().is_empty());
    }

    #[test]
    fn test_default_format_when_not_negotiated() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = FrameCollector::default();

        ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        assert_eq!(*factory.created.borrow(), vec![OutputFormat::default()]);
    }

    #[test]
    fn test_rejected_format_is_init_error() {
        // ---
        let (mut ctx, _) = context(false);
        let mut sink = FrameCollector::new(NegotiatedFormat::new(44100, 2));

        let err = ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap_err();
        assert!(matches!(err, DecoderError::DecoderInit { sample_rate: 44100, .. }));
        assert!(err.is_fatal());
        assert!(sink.outcomes.is_empty());
    }

    #[test]
    fn test_decode_error_is_per_packet() {
        // ---
        let (mut ctx, factory) = context(false);
        let mut sink = stereo_sink();

        let err = ctx
            .handle_packet(Packet::new(CORRUPT.to_vec()), &mut sink)
            .unwrap_err();
        assert_eq!(err, DecoderError::Decode { code: -4 });
        assert!(sink.outcomes.is_empty());

        let cycle = ctx.handle_packet(Packet::new(vec![9]), &mut sink).unwrap();
        assert_eq!(cycle.emitted(), 960);
        assert_eq!(factory.created.borrow().len(), 1);
    }

    #[test]
    fn test_fec_decode_error_keeps_stream_moving() {
        // ---
        let (mut ctx, factory) = context(true);
        let mut sink = stereo_sink();

        ctx.handle_packet(Packet::new(CORRUPT.to_vec()), &mut sink).unwrap();
        let err = ctx.handle_packet(Packet::new(vec![2]), &mut sink).unwrap_err();
        assert_eq!(err, DecoderError::Decode { code: -4 });

        // The packet that arrived with the failure is decoded next
        ctx.handle_packet(Packet::new(vec![3]), &mut sink).unwrap();
        assert_eq!(factory.calls.borrow().last().unwrap(), &(Some(vec![2]), false));
    }

    struct StingySink;

    impl FrameSink for StingySink {
        fn allocate(&mut self, _bytes: usize) -> Result<PcmBuffer> {
            Ok(PcmBuffer::with_capacity_bytes(64))
        }

        fn finish_frame(&mut self, _frame: Option<DecodedFrame>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_short_allocation_is_error() {
        // ---
        let (mut ctx, factory) = context(false);

        let err = ctx.handle_packet(Packet::new(vec![1]), &mut StingySink).unwrap_err();
        assert_eq!(
            err,
            DecoderError::Allocation {
                requested: 5760 * 4,
                available: 64,
            }
        );
        assert!(factory.calls.borrow().is_empty());
    }

    #[test]
    fn test_timestamps_follow_decoded_packet() {
        // ---
        let (mut ctx, _) = context(true);
        let mut sink = stereo_sink();

        for i in 0..3u64 {
            let packet = Packet::new(vec![1])
                .with_timestamp(Duration::from_millis(i * 20))
                .with_duration(Duration::from_millis(20));
            ctx.handle_packet(packet, &mut sink).unwrap();
        }

        let stamps: Vec<Duration> = sink.frames().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![Duration::ZERO, Duration::from_millis(20)]);
    }

    #[test]
    fn test_start_reports_latency_and_stop_releases() {
        // ---
        let factory = ScriptedFactory::default();
        let mut ctx = DecoderContext::with_factory(DecoderConfig::new(true), factory);
        assert!(ctx.start().is_some());

        let mut sink = stereo_sink();
        ctx.handle_packet(Packet::new(vec![1]), &mut sink).unwrap();
        assert!(ctx.is_primed());
        assert!(ctx.output_format().is_some());

        ctx.stop();
        assert!(!ctx.is_primed());
        assert!(ctx.output_format().is_none());
        assert_eq!(ctx.packet_index(), 0);
        assert_eq!(ctx.skip_remaining(), 0);
    }
}
