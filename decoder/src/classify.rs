//! Packet classification.
//!
//! Decides whether an incoming packet is the identification packet, the
//! comment packet, or audio payload. When both header buffers arrived
//! out-of-band they fully determine classification; otherwise the first two
//! packets are checked for their magic signatures.

use tracing::debug;

use crate::header::{has_magic, HEAD_MAGIC, TAGS_MAGIC};

/// Classification result for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    // ---
    /// In-band identification packet (`OpusHead`).
    Identification,

    /// In-band comment packet (`OpusTags`).
    Comment,

    /// Byte-identical copy of an out-of-band header, already consumed.
    KnownHeader,

    /// Compressed audio, or a lost packet.
    AudioPayload,
}

/// Header buffers supplied out-of-band before streaming begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeaders {
    // ---
    /// Identification packet bytes.
    pub identification: Option<Vec<u8>>,

    /// Comment packet bytes.
    pub comment: Option<Vec<u8>>,
}

impl StreamHeaders {
    // ---
    pub fn new(identification: Vec<u8>, comment: Vec<u8>) -> Self {
        // ---
        Self {
            identification: Some(identification),
            comment: Some(comment),
        }
    }
}

/// Tracks the state needed to classify packets in arrival order.
#[derive(Debug, Default)]
pub struct Classifier {
    // ---
    /// Packets classified since the last reset
    packet_index: u64,

    /// Out-of-band identification packet
    identification: Option<Vec<u8>>,

    /// Out-of-band comment packet
    comment: Option<Vec<u8>>,
}

impl Classifier {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Remembers the out-of-band identification packet.
    pub fn store_identification(&mut self, packet: Vec<u8>) {
        // ---
        self.identification = Some(packet);
    }

    /// Remembers the out-of-band comment packet.
    pub fn store_comment(&mut self, packet: Vec<u8>) {
        // ---
        self.comment = Some(packet);
    }

    /// True once both header buffers have been supplied out-of-band.
    pub fn has_out_of_band_headers(&self) -> bool {
        // ---
        self.identification.is_some() && self.comment.is_some()
    }

    /// Number of packets classified since the last reset.
    pub fn packet_index(&self) -> u64 {
        // ---
        self.packet_index
    }

    /// Classifies the next packet and advances the packet index.
    ///
    /// `data` is `None` for a lost packet, which is always audio payload.
    pub fn classify(&mut self, data: Option<&[u8]>) -> PacketKind {
        // ---
        let kind = match data {
            None => PacketKind::AudioPayload,
            Some(data) => self.classify_data(data),
        };

        self.packet_index += 1;
        kind
    }

    fn classify_data(&self, data: &[u8]) -> PacketKind {
        // ---
        if let (Some(identification), Some(comment)) = (&self.identification, &self.comment) {
            if data == identification.as_slice() {
                debug!("found streamheader");
                return PacketKind::KnownHeader;
            }
            if data == comment.as_slice() {
                debug!("found comment header");
                return PacketKind::KnownHeader;
            }
            return PacketKind::AudioPayload;
        }

        match self.packet_index {
            0 if has_magic(data, HEAD_MAGIC) => {
                debug!("found streamheader");
                PacketKind::Identification
            }
            1 if has_magic(data, TAGS_MAGIC) => {
                debug!("counted comment header");
                PacketKind::Comment
            }
            _ => PacketKind::AudioPayload,
        }
    }

    /// Forgets out-of-band headers and restarts packet counting.
    pub fn reset(&mut self) {
        // ---
        *self = Self::default();
    }
}
