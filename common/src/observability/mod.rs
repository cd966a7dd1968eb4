//! Logging and metrics setup.

mod logging;
mod metrics;

pub use logging::init_tracing;
pub use metrics::{DecoderMetrics, MetricsServerConfig};
