//! Telemetry publication
//!
//! Each sample is pushed field by field to four independently named remote
//! feeds. There is no batching and no atomicity across feeds: one failed send
//! neither blocks nor rolls back the others. Results are logged and dropped;
//! nothing is queued for retry.

use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::connectivity::{ConnectivityManager, SessionStatus, WirelessLink};
use crate::sensors::SensorSample;

/// Remote channel a single value is published to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Temperature,
    Humidity,
    Pressure,
    AirQuality,
}

impl Feed {
    pub const ALL: [Feed; 4] = [
        Feed::Temperature,
        Feed::Humidity,
        Feed::Pressure,
        Feed::AirQuality,
    ];

    /// Feed key on the remote sink
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::AirQuality => "airquality",
        }
    }

    /// Value published for this feed. Pressure and gas resistance go out in
    /// the sensor's native units (Pa, Ohm).
    pub fn value_of(self, sample: &SensorSample) -> f32 {
        match self {
            Self::Temperature => sample.temperature,
            Self::Humidity => sample.humidity,
            Self::Pressure => sample.pressure,
            Self::AirQuality => sample.gas_resistance,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Sink unreachable")]
    Unreachable,
    #[error("Request timed out")]
    Timeout,
    #[error("Sink rejected value with status {0}")]
    Rejected(u16),
    #[error("Malformed response")]
    Protocol,
}

/// Trait for a session with the remote telemetry sink.
pub trait TelemetrySession {
    type Error: core::fmt::Debug;

    /// Open the session. Progress is observed through [`Self::status`].
    fn connect(&mut self) -> impl Future<Output = ()>;

    fn status(&mut self) -> SessionStatus;

    /// Service the inbound event queue, bounded in time.
    fn pump_events(&mut self) -> impl Future<Output = ()>;

    /// Send one value to one feed.
    fn save(&mut self, feed: Feed, value: f32) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Per-feed success of one publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishResult {
    pub temperature: bool,
    pub humidity: bool,
    pub pressure: bool,
    pub airquality: bool,
}

impl PublishResult {
    pub fn get(&self, feed: Feed) -> bool {
        match feed {
            Feed::Temperature => self.temperature,
            Feed::Humidity => self.humidity,
            Feed::Pressure => self.pressure,
            Feed::AirQuality => self.airquality,
        }
    }

    fn set(&mut self, feed: Feed, ok: bool) {
        match feed {
            Feed::Temperature => self.temperature = ok,
            Feed::Humidity => self.humidity = ok,
            Feed::Pressure => self.pressure = ok,
            Feed::AirQuality => self.airquality = ok,
        }
    }

    pub fn all_sent(&self) -> bool {
        Feed::ALL.iter().all(|&feed| self.get(feed))
    }

    pub fn none_sent(&self) -> bool {
        !Feed::ALL.iter().any(|&feed| self.get(feed))
    }
}

/// Running totals kept for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: u32,
    pub failed: u32,
    pub skipped_offline: u32,
}

#[derive(Default)]
pub struct TelemetryPublisher {
    stats: PublishStats,
}

impl TelemetryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish all four fields of `sample`.
    ///
    /// Short-circuits to an all-false result without any I/O when the
    /// connection is not up.
    pub async fn publish<L, S>(
        &mut self,
        connectivity: &mut ConnectivityManager<L, S>,
        sample: &SensorSample,
    ) -> PublishResult
    where
        L: WirelessLink,
        S: TelemetrySession,
    {
        let mut result = PublishResult::default();

        if !connectivity.is_connected() {
            self.stats.skipped_offline = self.stats.skipped_offline.wrapping_add(1);
            debug!(
                "Telemetry disconnected ({:?}). Skip sending data",
                connectivity.state()
            );
            return result;
        }

        debug!("Send sensor data to telemetry sink");
        for feed in Feed::ALL {
            let ok = match connectivity.save(feed, feed.value_of(sample)).await {
                Some(Ok(())) => true,
                Some(Err(e)) => {
                    warn!("Failed to publish {}: {:?}", feed.name(), e);
                    false
                }
                None => false,
            };
            if ok {
                self.stats.sent = self.stats.sent.wrapping_add(1);
            } else {
                self.stats.failed = self.stats.failed.wrapping_add(1);
            }
            result.set(feed, ok);
        }

        info!(
            "Telemetry feed response: temperature: {}, humidity: {}, pressure: {}, airquality: {} (sent {}, failed {})",
            result.temperature,
            result.humidity,
            result.pressure,
            result.airquality,
            self.stats.sent,
            self.stats.failed
        );
        result
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }
}
