//! Prometheus metrics for the decode pipeline.
//!
//! One `DecoderMetrics` per process. Handles are cheap clones of the
//! registered collectors, so the hot path only bumps counters.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::task::JoinHandle;
use tracing::info;

/// Buckets for decode durations, 10 µs to 50 ms.
const DECODE_BUCKETS: [f64; 8] = [1e-5, 5e-5, 1e-4, 5e-4, 1e-3, 5e-3, 1e-2, 5e-2];

/// Where the scrape endpoint listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    // ---
    pub bind: SocketAddr,
}

impl MetricsServerConfig {
    // ---
    pub fn new(bind: SocketAddr) -> Self {
        // ---
        Self { bind }
    }
}

/// Registry plus handles for every decoder metric.
#[derive(Clone)]
pub struct DecoderMetrics {
    // ---
    registry: Registry,

    // Input
    pub packets_received_total: IntCounter,
    pub packets_lost_total: IntCounter,
    pub packets_late_total: IntCounter,
    pub header_packets_total: IntCounter,

    // Decode
    pub fec_reconstructions_total: IntCounter,
    pub concealed_total: IntCounter,
    pub decode_errors_total: IntCounter,
    pub sessions_created_total: IntCounter,
    pub decode_seconds: Histogram,

    // Output
    pub samples_emitted_total: IntCounter,
    pub samples_skipped_total: IntCounter,

    pub jitter_buffer_occupancy_packets: IntGauge,
}

impl DecoderMetrics {
    // ---
    /// Creates a registry with every metric registered.
    ///
    /// Metric names are prefixed `opusdec_` and carry a constant
    /// `process=<process_name>` label.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric fails to register.
    pub fn new(process_name: &str) -> Result<Self> {
        // ---
        let registry = Registry::new_custom(
            Some("opusdec".into()),
            Some(prometheus::labels! { "process".to_string() => process_name.to_string() }),
        )?;

        let counter = |name: &str, help: &str| -> Result<IntCounter> {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let packets_received_total = counter("packets_received_total", "Packets handed to the decoder")?;
        let packets_lost_total = counter("packets_lost_total", "Packets reported missing by the jitter buffer")?;
        let packets_late_total = counter("packets_late_total", "Packets discarded as late or duplicate")?;
        let header_packets_total = counter("header_packets_total", "Identification and comment packets seen")?;
        let fec_reconstructions_total =
            counter("fec_reconstructions_total", "Lost packets rebuilt from in-band FEC")?;
        let concealed_total = counter("concealed_total", "Decode calls that ran packet loss concealment")?;
        let decode_errors_total = counter("decode_errors_total", "Packets the decoder rejected")?;
        let sessions_created_total = counter("sessions_created_total", "Decoder instances created")?;
        let samples_emitted_total = counter("samples_emitted_total", "Samples per channel delivered downstream")?;
        let samples_skipped_total = counter("samples_skipped_total", "Samples per channel dropped as pre-skip")?;

        let decode_seconds = Histogram::with_opts(
            HistogramOpts::new("decode_seconds", "Time spent in one decode call (seconds)")
                .buckets(DECODE_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(decode_seconds.clone()))?;

        let jitter_buffer_occupancy_packets = IntGauge::with_opts(Opts::new(
            "jitter_buffer_occupancy_packets",
            "Packets waiting in the jitter buffer",
        ))?;
        registry.register(Box::new(jitter_buffer_occupancy_packets.clone()))?;

        Ok(Self {
            registry,
            packets_received_total,
            packets_lost_total,
            packets_late_total,
            header_packets_total,
            fec_reconstructions_total,
            concealed_total,
            decode_errors_total,
            sessions_created_total,
            decode_seconds,
            samples_emitted_total,
            samples_skipped_total,
            jitter_buffer_occupancy_packets,
        })
    }

    /// Current values in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<Vec<u8>> {
        // ---
        render_registry(&self.registry)
    }

    /// Serves `GET /metrics` on `cfg.bind` until the runtime shuts down.
    pub fn spawn_server(&self, cfg: MetricsServerConfig) -> JoinHandle<Result<()>> {
        // ---
        let registry = Arc::new(self.registry.clone());

        tokio::spawn(async move {
            // ---
            let make_svc = make_service_fn(move |_conn| {
                let registry = Arc::clone(&registry);
                async move {
                    Ok::<_, hyper::Error>(service_fn(move |req| {
                        let registry = Arc::clone(&registry);
                        async move { Ok::<_, hyper::Error>(respond(&req, &registry)) }
                    }))
                }
            });

            let server = Server::try_bind(&cfg.bind)?.serve(make_svc);
            info!("Metrics available at http://{}/metrics", cfg.bind);
            server.await.map_err(|e| anyhow!(e))
        })
    }
}

fn render_registry(registry: &Registry) -> Result<Vec<u8>> {
    // ---
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

fn respond(req: &Request<Body>, registry: &Registry) -> Response<Body> {
    // ---
    let (status, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => match render_registry(registry) {
            Ok(text) => (StatusCode::OK, Body::from(text)),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Body::from(format!("encode error: {e}")),
            ),
        },
        _ => (StatusCode::NOT_FOUND, Body::from("not found")),
    };

    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    if status == StatusCode::OK {
        resp.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
        );
    }
    resp
}
