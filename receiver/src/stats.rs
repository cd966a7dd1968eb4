//! Running decode statistics, logged periodically.

use std::time::{Duration, Instant};

use opusdec::{Cycle, DecodePath};
use tracing::info;

/// Counts of what happened to each packet.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    // ---
    pub packets_received: u64,

    /// Sequence numbers released by the jitter buffer as missing
    pub packets_lost: u64,

    /// Discarded by the jitter buffer as late or duplicate
    pub packets_late: u64,

    pub header_packets: u64,
    pub fec_reconstructions: u64,
    pub concealed: u64,
    pub decode_errors: u64,

    /// Samples per channel
    pub samples_emitted: u64,
    pub samples_skipped: u64,

    start_time: Instant,
    last_log_time: Instant,
    log_interval: Duration,
}

impl DecodeStats {
    // ---
    pub fn new(log_interval: Duration) -> Self {
        // ---
        let now = Instant::now();
        Self {
            packets_received: 0,
            packets_lost: 0,
            packets_late: 0,
            header_packets: 0,
            fec_reconstructions: 0,
            concealed: 0,
            decode_errors: 0,
            samples_emitted: 0,
            samples_skipped: 0,
            start_time: now,
            last_log_time: now,
            log_interval,
        }
    }

    /// Accounts for one handled packet.
    pub fn record_cycle(&mut self, cycle: &Cycle) {
        // ---
        match cycle {
            Cycle::Header { .. } | Cycle::Comment | Cycle::KnownHeader => {
                self.header_packets += 1;
            }
            Cycle::Primed => {}
            Cycle::Decoded(summary) => {
                if summary.concealed {
                    self.concealed += 1;
                } else if summary.path == DecodePath::Reconstruct {
                    self.fec_reconstructions += 1;
                }
                self.samples_emitted += summary.emitted as u64;
                self.samples_skipped += summary.skipped as u64;
            }
        }
        self.maybe_log();
    }

    pub fn record_received(&mut self) {
        // ---
        self.packets_received += 1;
    }

    pub fn record_lost(&mut self) {
        // ---
        self.packets_lost += 1;
    }

    pub fn record_late(&mut self) {
        // ---
        self.packets_late += 1;
    }

    pub fn record_error(&mut self) {
        // ---
        self.decode_errors += 1;
    }

    /// Share of expected packets that never arrived, in percent.
    pub fn loss_percentage(&self) -> f64 {
        // ---
        let total = self.packets_received + self.packets_lost;
        if total == 0 {
            0.0
        } else {
            self.packets_lost as f64 / total as f64 * 100.0
        }
    }

    /// Share of lost packets rebuilt from FEC rather than concealed.
    pub fn recovery_percentage(&self) -> f64 {
        // ---
        if self.packets_lost == 0 {
            0.0
        } else {
            self.fec_reconstructions as f64 / self.packets_lost as f64 * 100.0
        }
    }

    fn maybe_log(&mut self) {
        // ---
        if self.last_log_time.elapsed() >= self.log_interval {
            self.log();
            self.last_log_time = Instant::now();
        }
    }

    /// Logs the current totals.
    pub fn log(&self) {
        // ---
        info!(
            "Decode stats after {:.1}s: {} pkts, {:.2}% lost ({:.0}% recovered by FEC), {} concealed, {} errors, {} samples out, {} skipped",
            self.start_time.elapsed().as_secs_f64(),
            self.packets_received,
            self.loss_percentage(),
            self.recovery_percentage(),
            self.concealed,
            self.decode_errors,
            self.samples_emitted,
            self.samples_skipped
        );
    }
}

impl Default for DecodeStats {
    fn default() -> Self {
        // ---
        Self::new(Duration::from_secs(5))
    }
}
