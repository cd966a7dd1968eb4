//! FEC-aware decode scheduling.
//!
//! With in-band FEC the redundancy for packet *n* travels in packet *n+1*,
//! so every packet is held back until its successor arrives. Without FEC
//! each packet is decoded as soon as it arrives.

use std::time::Duration;

use tracing::debug;

use crate::packet::Packet;

/// Which decode path a job takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    // ---
    /// FEC disabled: the packet just received.
    Immediate,

    /// FEC enabled: the held-back packet, decoded normally.
    Delayed,

    /// FEC enabled and the held-back packet was lost: rebuild it from the
    /// redundancy in the packet just received.
    Reconstruct,
}

impl DecodePath {
    // ---
    /// Value of the engine's FEC flag for this path.
    pub fn uses_fec(self) -> bool {
        // ---
        self == DecodePath::Reconstruct
    }
}

/// One decode call to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeJob {
    // ---
    /// Bytes to hand the engine, `None` for concealment.
    pub data: Option<Vec<u8>>,

    pub path: DecodePath,

    /// Timestamp of the packet whose audio this job produces.
    pub timestamp: Option<Duration>,
}

#[derive(Debug, Default)]
enum State {
    /// No payload packet seen yet
    #[default]
    Unprimed,

    /// Holding the most recent payload packet
    Ready { pending: Packet },
}

/// Decides what to decode for each payload packet.
#[derive(Debug)]
pub struct FecScheduler {
    // ---
    use_fec: bool,
    state: State,
}

impl FecScheduler {
    // ---
    pub fn new(use_fec: bool) -> Self {
        // ---
        Self {
            use_fec,
            state: State::Unprimed,
        }
    }

    /// True once a payload packet is being held back.
    pub fn is_primed(&self) -> bool {
        // ---
        matches!(self.state, State::Ready { .. })
    }

    /// The held-back packet, if any.
    pub fn pending(&self) -> Option<&Packet> {
        // ---
        match &self.state {
            State::Ready { pending } => Some(pending),
            State::Unprimed => None,
        }
    }

    /// Accepts the next payload packet and returns the decode to perform.
    ///
    /// Returns `None` for the first packet in FEC mode, which is only held.
    pub fn schedule(&mut self, packet: Packet) -> Option<DecodeJob> {
        // ---
        if !self.use_fec {
            return Some(DecodeJob {
                data: packet.data,
                path: DecodePath::Immediate,
                timestamp: packet.timestamp,
            });
        }

        let previous = std::mem::replace(&mut self.state, State::Ready { pending: packet });

        match previous {
            State::Unprimed => {
                debug!("First buffer received in FEC mode, early out");
                None
            }
            State::Ready { pending } => match pending.data {
                Some(data) => Some(DecodeJob {
                    data: Some(data),
                    path: DecodePath::Delayed,
                    timestamp: pending.timestamp,
                }),
                None => {
                    debug!("Previous packet lost, reconstructing from FEC data");
                    Some(DecodeJob {
                        data: self.pending().and_then(|p| p.data.clone()),
                        path: DecodePath::Reconstruct,
                        timestamp: pending.timestamp,
                    })
                }
            },
        }
    }

    /// Drops any held-back packet.
    pub fn reset(&mut self) {
        // ---
        self.state = State::Unprimed;
    }
}
