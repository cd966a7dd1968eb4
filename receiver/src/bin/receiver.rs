//! Opus RTP receiver: decodes a UDP RTP stream into a WAV file.

use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;

use opusdec::config::SUPPORTED_RATES;
use opusdec::{DecoderConfig, DecoderContext, NegotiatedFormat, StreamHeaders};
use opusdec_common::{init_tracing, DecoderMetrics, LogColor, MetricsServerConfig};
use receiver::{receive_loop, JitterBufferConfig, RtpReceiver, StreamDecoder, WavSink};

/// Decode an Opus RTP stream to WAV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// UDP port to listen on
    #[arg(short, long, default_value = "5004")]
    port: u16,

    /// WAV file to write
    #[arg(short, long, default_value = "decoded.wav")]
    output: PathBuf,

    /// Delay decoding by one packet to rebuild lost packets from in-band FEC
    #[arg(long)]
    fec: bool,

    /// Output sample rate (8000, 12000, 16000, 24000 or 48000); default 48000
    #[arg(short, long)]
    rate: Option<u32>,

    /// Output channels (1 or 2); default 2
    #[arg(short, long)]
    channels: Option<u8>,

    /// OpusHead packet supplied out-of-band
    #[arg(long, requires = "tags")]
    head: Option<PathBuf>,

    /// OpusTags packet supplied out-of-band
    #[arg(long, requires = "head")]
    tags: Option<PathBuf>,

    /// Jitter buffer depth in milliseconds
    #[arg(short = 'b', long, default_value = "60")]
    buffer_depth_ms: u32,

    /// Stop after this many datagrams
    #[arg(short = 'n', long)]
    max_packets: Option<u64>,

    /// Prometheus metrics bind address (serves `GET /metrics`)
    #[arg(long, default_value = "127.0.0.1:9200")]
    metrics_bind: String,

    /// Log coloring: auto, always or never
    #[arg(long, default_value = "auto")]
    color: LogColor,
}

impl Args {
    // ---
    fn negotiated_format(&self) -> Result<NegotiatedFormat> {
        // ---
        if let Some(rate) = self.rate {
            ensure!(
                SUPPORTED_RATES.contains(&rate),
                "unsupported rate {} Hz, expected one of {:?}",
                rate,
                SUPPORTED_RATES
            );
        }
        if let Some(channels) = self.channels {
            ensure!(matches!(channels, 1 | 2), "unsupported channel count {}", channels);
        }

        Ok(NegotiatedFormat {
            sample_rate: self.rate,
            channels: self.channels,
        })
    }

    fn stream_headers(&self) -> Result<Option<StreamHeaders>> {
        // ---
        let (Some(head), Some(tags)) = (&self.head, &self.tags) else {
            return Ok(None);
        };

        let identification =
            fs::read(head).with_context(|| format!("failed to read {}", head.display()))?;
        let comment = fs::read(tags).with_context(|| format!("failed to read {}", tags.display()))?;
        Ok(Some(StreamHeaders::new(identification, comment)))
    }
}

/// Capture version number from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    let args = Args::parse();
    init_tracing(args.color, "info")?;
    info!("Starting Opus RTP receiver v{VERSION}");

    let format = args.negotiated_format()?;
    let config = DecoderConfig::new(args.fec);

    let metrics = DecoderMetrics::new("receiver")?;
    let metrics_bind = args.metrics_bind.parse().context("invalid metrics bind")?;
    let _metrics_task = metrics.spawn_server(MetricsServerConfig::new(metrics_bind));

    let mut ctx = DecoderContext::new(config);
    ctx.start();
    if let Some(headers) = args.stream_headers()? {
        ctx.set_format(headers).context("invalid out-of-band headers")?;
    }

    let sink = WavSink::create(&args.output, format)?;
    let mut decoder = StreamDecoder::new(ctx, sink).with_metrics(metrics);
    let mut receiver = RtpReceiver::bind(("0.0.0.0", args.port)).await?;

    let jitter_config = JitterBufferConfig {
        depth_ms: args.buffer_depth_ms,
        ..Default::default()
    };

    let result = tokio::select! {
        result = receive_loop(&mut receiver, &mut decoder, jitter_config, args.max_packets) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, finishing output");
            Ok(())
        }
    };

    // Keep whatever was decoded even when the loop failed
    decoder.finish().finalize()?;
    info!(
        "Output written to {} ({} datagrams received)",
        args.output.display(),
        receiver.stats().packets_received
    );

    result
}
