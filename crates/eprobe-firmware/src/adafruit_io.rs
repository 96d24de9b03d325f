//! Adafruit IO binding of [`TelemetrySession`]
//!
//! Speaks plain HTTP/1.1 to the REST API over an embassy-net TCP socket, one
//! short-lived connection per request. Values go to
//! `POST /api/v2/{user}/feeds/{feed}/data`; the session liveness check and the
//! event pump both use the user's throttle endpoint.

use core::fmt::Write as _;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, with_timeout};
use embedded_io_async::Write as _;
use heapless::String;
use log::{debug, info, warn};

use eprobe_core::connectivity::SessionStatus;
use eprobe_core::telemetry::{Feed, TelemetryError, TelemetrySession};

const HOST: &str = "io.adafruit.com";
const PORT: u16 = 80;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound of one event pump
const PUMP_BUDGET: Duration = Duration::from_secs(2);

type Request = String<512>;

pub struct AdafruitIoSession {
    stack: Stack<'static>,
    username: &'static str,
    key: &'static str,
    address: Option<IpAddress>,
    status: SessionStatus,
    rx_buffer: [u8; 1024],
    tx_buffer: [u8; 1024],
}

impl AdafruitIoSession {
    pub fn new(stack: Stack<'static>, username: &'static str, key: &'static str) -> Self {
        Self {
            stack,
            username,
            key,
            address: None,
            status: SessionStatus::Idle,
            rx_buffer: [0; 1024],
            tx_buffer: [0; 1024],
        }
    }

    async fn resolve(&mut self) -> Result<IpAddress, TelemetryError> {
        if let Some(address) = self.address {
            return Ok(address);
        }
        let addrs = self
            .stack
            .dns_query(HOST, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("Could not resolve {}: {:?}", HOST, e);
                TelemetryError::Unreachable
            })?;
        let address = addrs.first().copied().ok_or(TelemetryError::Unreachable)?;
        self.address = Some(address);
        Ok(address)
    }

    /// Send one request and return the HTTP status code of the answer.
    async fn exchange(&mut self, request: &[u8]) -> Result<u16, TelemetryError> {
        let address = self.resolve().await?;
        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        socket.connect((address, PORT)).await.map_err(|e| {
            warn!("Connect to {} failed: {:?}", HOST, e);
            self.address = None;
            TelemetryError::Unreachable
        })?;

        socket.write_all(request).await.map_err(|_| TelemetryError::Timeout)?;
        socket.flush().await.map_err(|_| TelemetryError::Timeout)?;

        // Only the status line is of interest
        let mut head = [0u8; 32];
        let mut filled = 0;
        while filled < head.len() && !head[..filled].contains(&b'\n') {
            match socket.read(&mut head[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => return Err(TelemetryError::Timeout),
            }
        }
        socket.close();

        parse_status_line(&head[..filled]).ok_or(TelemetryError::Protocol)
    }

    async fn check_throttle(&mut self) -> Result<u16, TelemetryError> {
        let mut request = Request::new();
        write_head(&mut request, "GET", self.username, "throttle", self.key, 0)?;
        self.exchange(request.as_bytes()).await
    }

    fn status_from(&mut self, result: Result<u16, TelemetryError>) {
        self.status = match result {
            Ok(200..=299) => SessionStatus::Connected,
            Ok(401 | 403) => SessionStatus::Unauthorized,
            Ok(code) => {
                warn!("Adafruit IO answered {}", code);
                SessionStatus::Disconnected
            }
            Err(TelemetryError::Unreachable) if !self.stack.is_config_up() => {
                SessionStatus::NetworkDown
            }
            Err(_) => SessionStatus::Disconnected,
        };
    }
}

fn write_head(
    request: &mut Request,
    method: &str,
    username: &str,
    path: &str,
    key: &str,
    content_length: usize,
) -> Result<(), TelemetryError> {
    write!(
        request,
        "{method} /api/v2/{username}/{path} HTTP/1.1\r\n\
         Host: {HOST}\r\n\
         X-AIO-Key: {key}\r\n\
         Connection: close\r\n"
    )
    .map_err(|_| TelemetryError::Protocol)?;
    if content_length > 0 {
        write!(
            request,
            "Content-Type: application/json\r\nContent-Length: {content_length}\r\n"
        )
        .map_err(|_| TelemetryError::Protocol)?;
    }
    request.push_str("\r\n").map_err(|_| TelemetryError::Protocol)
}

/// `HTTP/1.1 201 Created` -> `201`
fn parse_status_line(head: &[u8]) -> Option<u16> {
    let line = core::str::from_utf8(head).ok()?;
    let mut parts = line.split_ascii_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

impl TelemetrySession for AdafruitIoSession {
    type Error = TelemetryError;

    async fn connect(&mut self) {
        if self.username.is_empty() {
            warn!("No Adafruit IO user configured");
            self.status = SessionStatus::Unauthorized;
            return;
        }
        info!("Connecting to Adafruit IO");
        self.status = SessionStatus::Connecting;
        let result = self.check_throttle().await;
        self.status_from(result);
    }

    fn status(&mut self) -> SessionStatus {
        self.status
    }

    async fn pump_events(&mut self) {
        match with_timeout(PUMP_BUDGET, self.check_throttle()).await {
            Ok(result) => self.status_from(result),
            Err(_) => {
                debug!("Event pump timed out");
                self.status = SessionStatus::Disconnected;
            }
        }
    }

    async fn save(&mut self, feed: Feed, value: f32) -> Result<(), TelemetryError> {
        let mut body: String<48> = String::new();
        write!(body, "{{\"value\":\"{value}\"}}").map_err(|_| TelemetryError::Protocol)?;

        let mut path: String<48> = String::new();
        write!(path, "feeds/{}/data", feed.name()).map_err(|_| TelemetryError::Protocol)?;

        let mut request = Request::new();
        write_head(&mut request, "POST", self.username, &path, self.key, body.len())?;
        request
            .push_str(&body)
            .map_err(|_| TelemetryError::Protocol)?;

        match self.exchange(request.as_bytes()).await? {
            200..=299 => Ok(()),
            code => Err(TelemetryError::Rejected(code)),
        }
    }
}
