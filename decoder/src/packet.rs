//! Inbound packet representation.

use std::time::Duration;

/// One packet as delivered by the upstream framing layer.
///
/// A packet with no `data` is a signaled loss. It still advances the
/// pipeline and is scheduled like any other payload packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    // ---
    /// Compressed payload, `None` when the packet was lost.
    pub data: Option<Vec<u8>>,

    /// Presentation timestamp, if known.
    pub timestamp: Option<Duration>,

    /// Packet duration, if known.
    pub duration: Option<Duration>,
}

impl Packet {
    // ---
    /// Creates a packet carrying `data` with no timing information.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        // ---
        Self {
            data: Some(data.into()),
            timestamp: None,
            duration: None,
        }
    }

    /// Creates a packet representing a known loss.
    pub fn lost() -> Self {
        // ---
        Self::default()
    }

    /// Attaches a presentation timestamp.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        // ---
        self.timestamp = Some(timestamp);
        self
    }

    /// Attaches a duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        // ---
        self.duration = Some(duration);
        self
    }

    /// Returns the payload bytes, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        // ---
        self.data.as_deref()
    }

    /// Returns true when this packet stands in for a lost one.
    pub fn is_lost(&self) -> bool {
        // ---
        self.data.is_none()
    }

    /// Payload size in bytes, zero when lost.
    pub fn len(&self) -> usize {
        // ---
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Returns true when there are no payload bytes.
    pub fn is_empty(&self) -> bool {
        // ---
        self.len() == 0
    }
}
