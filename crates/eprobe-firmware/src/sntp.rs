//! Minimal SNTP client implementing [`TimeSync`]
//!
//! One request per poll: resolve once, send a client-mode packet, wait a
//! bounded time for the server's transmit timestamp.

use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};
use log::{debug, warn};

use eprobe_core::time::TimeSync;

const NTP_PORT: u16 = 123;
const LOCAL_PORT: u16 = 50_123;
const PACKET_LEN: usize = 48;
/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01
const NTP_TO_UNIX: i64 = 2_208_988_800;
/// LI = 0, VN = 4, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0x23;
const MODE_SERVER: u8 = 4;
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SntpClient {
    stack: Stack<'static>,
    server: Option<IpAddress>,
    rx_meta: [PacketMetadata; 2],
    tx_meta: [PacketMetadata; 2],
    rx_buffer: [u8; 128],
    tx_buffer: [u8; 128],
}

impl SntpClient {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            server: None,
            rx_meta: [PacketMetadata::EMPTY; 2],
            tx_meta: [PacketMetadata::EMPTY; 2],
            rx_buffer: [0; 128],
            tx_buffer: [0; 128],
        }
    }
}

/// Extract the transmit timestamp of a server reply as unix seconds.
fn parse_reply(packet: &[u8]) -> Option<i64> {
    if packet.len() < PACKET_LEN || packet[0] & 0x07 != MODE_SERVER {
        return None;
    }
    let secs = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    // Kiss-of-death and unsynchronized servers answer with a zero timestamp
    if secs == 0 {
        return None;
    }
    Some(i64::from(secs) - NTP_TO_UNIX)
}

impl TimeSync for SntpClient {
    async fn start(&mut self, server: &str) {
        self.server = match self.stack.dns_query(server, DnsQueryType::A).await {
            Ok(addrs) => addrs.first().copied(),
            Err(e) => {
                warn!("Could not resolve {}: {:?}", server, e);
                None
            }
        };
    }

    async fn poll(&mut self) -> Option<i64> {
        let server = self.server?;
        let mut socket = UdpSocket::new(
            self.stack,
            &mut self.rx_meta,
            &mut self.rx_buffer,
            &mut self.tx_meta,
            &mut self.tx_buffer,
        );
        if let Err(e) = socket.bind(LOCAL_PORT) {
            warn!("SNTP bind failed: {:?}", e);
            return None;
        }

        let mut request = [0u8; PACKET_LEN];
        request[0] = CLIENT_HEADER;
        if let Err(e) = socket
            .send_to(&request, IpEndpoint::new(server, NTP_PORT))
            .await
        {
            warn!("SNTP send failed: {:?}", e);
            return None;
        }

        let mut reply = [0u8; PACKET_LEN];
        match with_timeout(REPLY_TIMEOUT, socket.recv_from(&mut reply)).await {
            Ok(Ok((len, _))) => {
                let time = parse_reply(&reply[..len]);
                debug!("SNTP reply: {:?}", time);
                time
            }
            Ok(Err(e)) => {
                warn!("SNTP receive failed: {:?}", e);
                None
            }
            Err(_) => None,
        }
    }

    fn stop(&mut self) {
        self.server = None;
    }
}
