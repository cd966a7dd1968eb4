//! Identification and comment packet handling.
//!
//! Only the pre-skip field of the identification packet is interpreted.
//! Comment packets are recognized but their tags are not parsed.

use tracing::info;

use crate::error::{DecoderError, Result};

/// Magic signature of the identification packet.
pub const HEAD_MAGIC: &[u8; 8] = b"OpusHead";

/// Magic signature of the comment packet.
pub const TAGS_MAGIC: &[u8; 8] = b"OpusTags";

/// Minimum size of a well-formed identification packet.
pub const MIN_HEAD_LEN: usize = 19;

/// Byte offset of the little-endian pre-skip field.
const PRE_SKIP_OFFSET: usize = 10;

/// Fields extracted from the identification packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamHeader {
    // ---
    /// Samples to discard at stream start, counted at 48 kHz.
    pub pre_skip: u16,
}

/// Returns true if `packet` starts with the given 8-byte magic.
pub fn has_magic(packet: &[u8], magic: &[u8; 8]) -> bool {
    // ---
    packet.starts_with(magic)
}

/// Parses an identification packet.
///
/// # Errors
///
/// Returns [`DecoderError::Format`] if the packet lacks the `OpusHead`
/// magic or is shorter than 19 bytes.
pub fn parse_header(packet: &[u8]) -> Result<StreamHeader> {
    // ---
    if !has_magic(packet, HEAD_MAGIC) {
        return Err(DecoderError::Format("missing OpusHead magic".into()));
    }

    if packet.len() < MIN_HEAD_LEN {
        return Err(DecoderError::Format(format!(
            "identification packet is {} bytes, need at least {}",
            packet.len(),
            MIN_HEAD_LEN
        )));
    }

    let pre_skip = u16::from_le_bytes([packet[PRE_SKIP_OFFSET], packet[PRE_SKIP_OFFSET + 1]]);
    info!("Found pre-skip of {} samples", pre_skip);

    Ok(StreamHeader { pre_skip })
}

/// Accepts a comment packet. Tags are not interpreted.
pub fn parse_comments(_packet: &[u8]) -> Result<()> {
    // ---
    Ok(())
}

#[cfg(test)]
pub(crate) fn head_packet(pre_skip: u16) -> Vec<u8> {
    // ---
    let mut packet = Vec::with_capacity(MIN_HEAD_LEN);
    packet.extend_from_slice(HEAD_MAGIC);
    packet.push(1); // version
    packet.push(2); // channels
    packet.extend_from_slice(&pre_skip.to_le_bytes());
    packet.extend_from_slice(&48000u32.to_le_bytes());
    packet.extend_from_slice(&0i16.to_le_bytes()); // output gain
    packet.push(0); // mapping family
    packet
}
