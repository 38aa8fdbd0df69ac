use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{Context, Result, anyhow};

use luxmix_core::transport::Transport;

pub const ARTNET_PORT: u16 = 6454;

const FRAME_SIZE: usize = 512;
const HEADER: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u8 = 14;

/// Assemble one ArtDMX packet around a full 512-slot frame.
fn artdmx_packet(sequence: u8, universe: u16, frame: &[u8; FRAME_SIZE]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(18 + FRAME_SIZE);
    packet.extend_from_slice(HEADER);
    packet.extend_from_slice(&OP_DMX.to_le_bytes());
    packet.push(0);
    packet.push(PROTOCOL_VERSION);
    packet.push(sequence);
    // Physical input port, informational only.
    packet.push(0);
    packet.extend_from_slice(&universe.to_le_bytes());
    packet.extend_from_slice(&(FRAME_SIZE as u16).to_be_bytes());
    packet.extend_from_slice(frame);
    packet
}

/// DMX-over-UDP output link. Slot writes land in a local frame; `submit`
/// ships the whole frame as one ArtDMX packet per tick.
pub struct ArtNetTransport {
    socket: UdpSocket,
    target: SocketAddr,
    universe: u16,
    sequence: u8,
    frame: [u8; FRAME_SIZE],
}

impl ArtNetTransport {
    pub fn new(host: &str, port: u16, universe: u16) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve Art-Net target {}:{}", host, port))?
            .next()
            .ok_or_else(|| anyhow!("Art-Net target {}:{} resolved to nothing", host, port))?;
        let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind Art-Net socket")?;
        Ok(ArtNetTransport {
            socket,
            target,
            universe,
            sequence: 0,
            frame: [0; FRAME_SIZE],
        })
    }
}

impl Transport for ArtNetTransport {
    fn set_channel(&mut self, address: u16, value: u8) {
        // DMX slots are 1-based; anything outside the frame is dropped.
        if (1..=FRAME_SIZE as u16).contains(&address) {
            self.frame[(address - 1) as usize] = value;
        }
    }

    fn submit(&mut self) -> Result<()> {
        // Sequence 0 means "disabled" on the wire, so the counter skips it.
        self.sequence = if self.sequence == u8::MAX { 1 } else { self.sequence + 1 };
        let packet = artdmx_packet(self.sequence, self.universe, &self.frame);
        self.socket
            .send_to(&packet, self.target)
            .with_context(|| format!("failed to send ArtDMX frame to {}", self.target))?;
        Ok(())
    }

    fn close(&mut self) {}
}
