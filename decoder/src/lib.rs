//! Opus decode pipeline.
//!
//! Turns a stream of Opus packets into 16-bit PCM frames. Handles the
//! identification and comment packets at the head of a stream (in-band or
//! supplied out-of-band), drops encoder pre-skip, and optionally delays
//! decoding by one packet so lost packets can be rebuilt from in-band FEC.
//!
//! The entry point is [`DecoderContext`]; output goes to any [`FrameSink`].

pub mod classify;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod frame;
pub mod header;
pub mod packet;
pub mod schedule;
pub mod session;
pub mod trim;

pub use classify::{Classifier, PacketKind, StreamHeaders};
pub use config::{DecoderConfig, NegotiatedFormat, OutputFormat};
pub use context::{Cycle, DecodeSummary, DecoderContext};
pub use engine::{DecodeEngine, EngineFactory, OpusEngine, OpusEngineFactory};
pub use error::{DecoderError, Result};
pub use frame::{DecodedFrame, FrameCollector, FrameEmitter, FrameSink, PcmBuffer};
pub use header::{parse_comments, parse_header, StreamHeader};
pub use packet::Packet;
pub use schedule::{DecodeJob, DecodePath, FecScheduler};
pub use session::DecoderSession;
pub use trim::SkipBudget;
