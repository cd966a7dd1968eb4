//! UDP reception of RTP packets.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use opusdec_common::RtpPacket;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, info, warn};

/// Largest datagram accepted.
const MAX_DATAGRAM: usize = 2048;

/// Counters kept by [`RtpReceiver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    // ---
    pub packets_received: u64,
    pub bytes_received: u64,

    /// Datagrams that did not parse as RTP
    pub packets_dropped: u64,
}

/// Async UDP socket yielding parsed RTP packets.
pub struct RtpReceiver {
    // ---
    socket: UdpSocket,
    buf: Vec<u8>,
    stats: NetworkStats,
}

impl RtpReceiver {
    // ---
    /// Binds the receiving socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        // ---
        let socket = UdpSocket::bind(addr)
            .await
            .context("failed to bind UDP socket")?;

        info!("Listening for RTP on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
            stats: NetworkStats::default(),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        // ---
        Ok(self.socket.local_addr()?)
    }

    /// Waits for the next datagram.
    ///
    /// Returns `None` when the datagram is not valid RTP; it is logged and
    /// counted as dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket fails.
    pub async fn receive(&mut self) -> Result<Option<RtpPacket>> {
        // ---
        let (len, src) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .context("failed to receive UDP packet")?;

        self.stats.bytes_received += len as u64;

        match RtpPacket::deserialize(&self.buf[..len]) {
            Ok(packet) => {
                self.stats.packets_received += 1;
                if self.stats.packets_received % 500 == 0 {
                    debug!(
                        "Received {} packets ({} bytes, {} dropped) from {}, seq={}",
                        self.stats.packets_received,
                        self.stats.bytes_received,
                        self.stats.packets_dropped,
                        src,
                        packet.sequence
                    );
                }
                Ok(Some(packet))
            }
            Err(e) => {
                self.stats.packets_dropped += 1;
                warn!("Dropped invalid packet from {}: {}", src, e);
                Ok(None)
            }
        }
    }

    pub fn stats(&self) -> NetworkStats {
        // ---
        self.stats
    }
}
