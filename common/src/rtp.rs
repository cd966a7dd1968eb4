//! RTP packet codec (RFC 3550).
//!
//! Parses the fixed header plus any CSRC list, header extension and padding
//! so Opus payloads from stock payloaders (RFC 7587) can be recovered.
//! Serialization always writes the minimal form: no CSRCs, no extension,
//! no padding.

use anyhow::{bail, Result};

/// RTP version carried in every packet.
const RTP_VERSION: u8 = 2;

/// Size of the fixed header in bytes.
pub const RTP_HEADER_LEN: usize = 12;

/// Dynamic payload type conventionally used for Opus.
pub const PAYLOAD_TYPE_OPUS: u8 = 96;

/// RTP clock rate for Opus, independent of the actual sampling rate.
pub const OPUS_CLOCK_RATE: u32 = 48000;

/// One RTP packet carrying an Opus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    // ---
    /// Set on the first packet after silence.
    pub marker: bool,

    pub payload_type: u8,

    /// Wraps at 65535.
    pub sequence: u16,

    /// Media timestamp in 48 kHz ticks for Opus.
    pub timestamp: u32,

    pub ssrc: u32,

    pub payload: Vec<u8>,
}

impl RtpPacket {
    // ---
    /// Creates an Opus packet with the marker bit clear.
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32, payload: Vec<u8>) -> Self {
        // ---
        Self {
            marker: false,
            payload_type: PAYLOAD_TYPE_OPUS,
            sequence,
            timestamp,
            ssrc,
            payload,
        }
    }

    /// Encodes the packet in wire format.
    ///
    /// ```text
    ///  0                   1                   2                   3
    ///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |                           timestamp                           |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |           synchronization source (SSRC) identifier            |
    /// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        // ---
        let mut buf = Vec::with_capacity(RTP_HEADER_LEN + self.payload.len());

        buf.push(RTP_VERSION << 6);
        buf.push(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        buf.extend_from_slice(&self.payload);

        buf
    }

    /// Decodes a packet received from the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet is shorter than its headers claim,
    /// the version is not 2, or the padding length is inconsistent.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        // ---
        if data.len() < RTP_HEADER_LEN {
            bail!("packet too small: {} bytes", data.len());
        }

        let version = data[0] >> 6;
        if version != RTP_VERSION {
            bail!("invalid RTP version: {}", version);
        }

        let has_padding = data[0] & 0x20 != 0;
        let has_extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0F) as usize;

        let mut start = RTP_HEADER_LEN + csrc_count * 4;
        if data.len() < start {
            bail!("truncated CSRC list: {} bytes for {} entries", data.len(), csrc_count);
        }

        if has_extension {
            if data.len() < start + 4 {
                bail!("truncated header extension");
            }
            let words = u16::from_be_bytes([data[start + 2], data[start + 3]]) as usize;
            start += 4 + words * 4;
            if data.len() < start {
                bail!("header extension overruns packet: {} words", words);
            }
        }

        let mut end = data.len();
        if has_padding {
            let padding = data[end - 1] as usize;
            if padding == 0 || start + padding > end {
                bail!("invalid padding length: {}", padding);
            }
            end -= padding;
        }

        Ok(Self {
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7F,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: data[start..end].to_vec(),
        })
    }
}
