use std::net::SocketAddr;
use log::debug;
use tokio::net::UdpSocket;

use crate::error::SinkError;

/// Receives every computed cadence value. Publishing must never block or fail the caller.
pub trait TelemetrySink: Send + Sync + 'static {
    fn publish(&self, rpm: u16);
}

/// Sends each cadence value as a 2 byte little-endian datagram to a fixed local listener.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    pub async fn bind(target: SocketAddr) -> Result<Self, SinkError> {
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        Ok(UdpSink { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

pub fn encode_rpm(rpm: u16) -> [u8; 2] {
    rpm.to_le_bytes()
}

impl TelemetrySink for UdpSink {
    fn publish(&self, rpm: u16) {
        // try_send_to never waits for the socket; a full buffer simply drops this value
        if let Err(err) = self.socket.try_send_to(&encode_rpm(rpm), self.target) {
            debug!("Failed to send cadence to {}: {}", self.target, err);
        }
    }
}
