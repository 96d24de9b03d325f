//! Wireless link and telemetry session management
//!
//! The connection is an explicitly polled state machine. Nothing reacts to
//! radio events asynchronously; the orchestrator calls
//! [`ConnectivityManager::ensure_connected`] at the top of every cycle and
//! the state only moves on what link status polling and the session status
//! report at that moment.
//!
//! ```text
//! Disconnected ──ensure_connected──▶ Connecting ──link + session up──▶ Connected
//!       ▲                                │                                 │
//!       │                         attempts exhausted                 status lost
//!       │                                ▼                                 │
//!       └────────────────────────────  Failed  ◀───────────────────────────┘
//!                              (retried next cycle)
//! ```

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{ConnectPolicy, as_delay_ms};
use crate::telemetry::{Feed, TelemetrySession};

/// Status of the wireless link as reported by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    NoNetworkFound,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
}

/// Status code of the remote sink session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Disconnected,
    NetworkDown,
    Connecting,
    Connected,
    /// Credentials were rejected by the remote sink
    Unauthorized,
}

impl SessionStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Trait for the wireless radio beneath a connect/status/disconnect contract.
pub trait WirelessLink {
    type Error: core::fmt::Debug;

    /// Start associating with the configured network.
    fn begin(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn status(&mut self) -> LinkStatus;

    fn disconnect(&mut self) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Outcome of one [`ConnectivityManager::ensure_connected`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Already connected, no attempt was made
    AlreadyConnected,
    /// The connection was (re)established. `first` is set exactly once per
    /// process lifetime and asks the caller to initialize the clock.
    Connected { first: bool },
    /// Attempts exhausted; proceed offline and retry next cycle
    Failed,
}

/// Owns the link, the telemetry session and the connection state.
pub struct ConnectivityManager<L, S> {
    link: L,
    session: S,
    state: ConnectionState,
    policy: ConnectPolicy,
    ever_connected: bool,
    attempts: u32,
}

impl<L, S> ConnectivityManager<L, S>
where
    L: WirelessLink,
    S: TelemetrySession,
{
    pub fn new(link: L, session: S, policy: ConnectPolicy) -> Self {
        Self {
            link,
            session,
            state: ConnectionState::Disconnected,
            policy,
            ever_connected: false,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Total status poll attempts made since startup
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Bring link and session up unless they already are.
    ///
    /// Idempotent while connected. Otherwise starts the link, and once the
    /// link reports connected, starts the session; status is polled up to
    /// `max_attempts` times with `attempt_interval` after every unsuccessful
    /// poll. Running out of attempts leaves the state at `Failed` and is not
    /// an error.
    pub async fn ensure_connected<D: DelayNs>(&mut self, delay: &mut D) -> ConnectOutcome {
        info!("Checking WiFi and telemetry connection");

        if self.state == ConnectionState::Connected {
            let link = self.link.status();
            let session = self.session.status();
            if link == LinkStatus::Connected && session.is_connected() {
                return ConnectOutcome::AlreadyConnected;
            }
            warn!("Connection lost (link: {:?}, session: {:?})", link, session);
            self.state = ConnectionState::Disconnected;
        }

        self.state = ConnectionState::Connecting;
        if let Err(e) = self.link.begin().await {
            warn!("Failed to start WiFi association: {:?}", e);
        }

        let max_attempts = self.policy.max_attempts;
        let mut session_started = false;
        for attempt in 1..=max_attempts {
            self.attempts = self.attempts.wrapping_add(1);
            info!(
                "Attempting to connect to network ({}/{})",
                attempt, max_attempts
            );

            if self.link.status() == LinkStatus::Connected {
                if !session_started {
                    debug!("WiFi up, opening telemetry session");
                    self.session.connect().await;
                    session_started = true;
                }
                if self.session.status().is_connected() {
                    return self.on_connected();
                }
            }

            delay
                .delay_ms(as_delay_ms(self.policy.attempt_interval))
                .await;
        }

        let link = self.link.status();
        let session = self.session.status();
        warn!(
            "No connection after {} attempts (link: {:?}, session: {:?}), continuing offline",
            max_attempts, link, session
        );
        self.state = ConnectionState::Failed;
        ConnectOutcome::Failed
    }

    fn on_connected(&mut self) -> ConnectOutcome {
        let first = !self.ever_connected;
        self.ever_connected = true;
        self.state = ConnectionState::Connected;
        info!("WiFi and telemetry session connected");
        ConnectOutcome::Connected { first }
    }

    /// Service inbound session events; no-op unless connected.
    pub async fn pump_events(&mut self) {
        if self.is_connected() {
            debug!("Checking incoming telemetry events");
            self.session.pump_events().await;
        } else {
            debug!("Skip checking incoming telemetry events");
        }
    }

    /// Send one value on the open session.
    ///
    /// Returns `None` without touching the session when not connected.
    pub async fn save(&mut self, feed: Feed, value: f32) -> Option<Result<(), S::Error>> {
        if !self.is_connected() {
            return None;
        }
        Some(self.session.save(feed, value).await)
    }

    /// Drop the link before the radio is powered down.
    pub async fn disconnect(&mut self) {
        self.link.disconnect().await;
        self.state = ConnectionState::Disconnected;
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}
