//! Reordering jitter buffer.
//!
//! Holds a fixed number of packets and releases them in sequence order.
//! A sequence number that is still missing once the buffer is full is
//! released as lost, so the decoder can rebuild it from FEC or conceal it.

use std::collections::VecDeque;

use opusdec_common::RtpPacket;
use tracing::{debug, warn};

/// Half the sequence space; anything further behind is treated as late.
const SEQUENCE_HALF: u16 = 0x8000;

/// Jitter buffer configuration.
#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    // ---
    /// Audio to hold before playout starts, in milliseconds
    pub depth_ms: u32,

    /// Duration of one packet, in milliseconds
    pub frame_ms: u32,

    /// Hard cap on buffered packets
    pub max_packets: usize,
}

impl JitterBufferConfig {
    // ---
    /// Packets held before a missing one is given up on. Never less than one.
    pub fn depth_packets(&self) -> usize {
        // ---
        (self.depth_ms / self.frame_ms.max(1)).max(1) as usize
    }
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        // ---
        Self {
            depth_ms: 60,
            frame_ms: 20,
            max_packets: 100,
        }
    }
}

/// What the buffer releases next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playout {
    // ---
    Packet(RtpPacket),

    /// Nothing arrived for this sequence number in time.
    Lost { sequence: u16 },
}

/// Fixed-depth jitter buffer.
///
/// # Example
///
/// ```
/// use opusdec_common::RtpPacket;
/// use receiver::jitter_buffer::{JitterBuffer, JitterBufferConfig, Playout};
///
/// let mut buffer = JitterBuffer::new(JitterBufferConfig {
///     depth_ms: 40,
///     ..Default::default()
/// });
///
/// buffer.insert(RtpPacket::new(0, 0, 1, vec![1]));
/// assert!(buffer.pop().is_none()); // still filling
///
/// buffer.insert(RtpPacket::new(2, 1920, 1, vec![3]));
/// assert!(matches!(buffer.pop(), Some(Playout::Packet(p)) if p.sequence == 0));
/// assert_eq!(buffer.pop(), None); // 1 may still arrive
/// ```
pub struct JitterBuffer {
    // ---
    config: JitterBufferConfig,

    /// Sorted by sequence number, none earlier than `next_sequence`
    buffer: VecDeque<RtpPacket>,

    /// Next sequence number to release
    next_sequence: Option<u16>,

    primed: bool,
}

impl JitterBuffer {
    // ---
    pub fn new(config: JitterBufferConfig) -> Self {
        // ---
        Self {
            config,
            buffer: VecDeque::new(),
            next_sequence: None,
            primed: false,
        }
    }

    /// Adds an arriving packet.
    ///
    /// Returns `false` if the packet was discarded as late or duplicate.
    pub fn insert(&mut self, packet: RtpPacket) -> bool {
        // ---
        let next = *self.next_sequence.get_or_insert(packet.sequence);
        let sequence = packet.sequence;

        if sequence.wrapping_sub(next) >= SEQUENCE_HALF {
            warn!("Discarding late packet: seq={} (expected={})", sequence, next);
            return false;
        }

        if self.buffer.iter().any(|p| p.sequence == sequence) {
            debug!("Discarding duplicate packet: seq={}", sequence);
            return false;
        }

        let pos = self
            .buffer
            .iter()
            .position(|p| precedes(sequence, p.sequence))
            .unwrap_or(self.buffer.len());
        self.buffer.insert(pos, packet);

        if self.buffer.len() > self.config.max_packets {
            warn!("Jitter buffer overflow, dropping seq={}", next);
            self.buffer.pop_front();
        }

        true
    }

    /// Releases the next packet or loss, if one is due.
    pub fn pop(&mut self) -> Option<Playout> {
        // ---
        let depth = self.config.depth_packets();

        if !self.primed {
            if self.buffer.len() < depth {
                return None;
            }
            self.primed = true;
            debug!("Jitter buffer primed with {} packets", self.buffer.len());
        }

        let next = self.next_sequence?;
        let front = self.buffer.front()?.sequence;

        if front == next {
            self.next_sequence = Some(next.wrapping_add(1));
            return self.buffer.pop_front().map(Playout::Packet);
        }

        if self.buffer.len() >= depth {
            debug!("Giving up on seq={}", next);
            self.next_sequence = Some(next.wrapping_add(1));
            return Some(Playout::Lost { sequence: next });
        }

        None
    }

    /// Releases everything still held, reporting any gaps as lost.
    pub fn drain(&mut self) -> Vec<Playout> {
        // ---
        let mut out = Vec::with_capacity(self.buffer.len());

        while let (Some(next), Some(front)) = (self.next_sequence, self.buffer.front()) {
            if front.sequence == next {
                out.extend(self.buffer.pop_front().map(Playout::Packet));
            } else {
                out.push(Playout::Lost { sequence: next });
            }
            self.next_sequence = Some(next.wrapping_add(1));
        }

        out
    }

    /// Packets currently held.
    pub fn len(&self) -> usize {
        // ---
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.buffer.is_empty()
    }

    pub fn is_primed(&self) -> bool {
        // ---
        self.primed
    }
}

/// True if `a` comes before `b` in wrapping sequence space.
fn precedes(a: u16, b: u16) -> bool {
    // ---
    a != b && b.wrapping_sub(a) < SEQUENCE_HALF
}
