//! Shared plumbing for the Opus decode tools.
//!
//! Log setup and color policy, Prometheus metrics with a scrape endpoint,
//! and the RTP packet codec used by the network front end.

pub mod cli;
pub mod observability;
pub mod rtp;

pub use cli::LogColor;
pub use observability::{init_tracing, DecoderMetrics, MetricsServerConfig};
pub use rtp::RtpPacket;
