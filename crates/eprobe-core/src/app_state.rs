//! Board abstraction and probe-wide error type
//!
//! A [`Board`] names the concrete collaborator types of one hardware target
//! (the ESP32 firmware, the desktop simulator, test mocks). The collaborator
//! values themselves are handed over once in a [`ProbeHardware`] and end up
//! owned by [`crate::Probe`]; nothing is reachable through globals.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use thiserror_no_std::Error;

use crate::connectivity::WirelessLink;
use crate::display::{DisplayError, EpaperPanel};
use crate::power::PowerControl;
use crate::retained::RetainedSlot;
use crate::sensors::EnvironmentSensor;
use crate::storage::LogStorage;
use crate::telemetry::TelemetrySession;
use crate::time::{TimeSync, WallClock};

pub trait Board {
    type Sensor: EnvironmentSensor;
    type Panel: EpaperPanel;
    type Storage: LogStorage;
    type Link: WirelessLink;
    type Session: TelemetrySession;
    type Clock: WallClock;
    type TimeSync: TimeSync;
    type Power: PowerControl;
    type Slot: RetainedSlot;
    type StatusPin: OutputPin;
    type Delay: DelayNs;
}

/// Every collaborator of one board, moved into the probe at construction
pub struct ProbeHardware<B: Board> {
    pub sensor: B::Sensor,
    pub panel: B::Panel,
    pub storage: B::Storage,
    pub link: B::Link,
    pub session: B::Session,
    pub clock: B::Clock,
    pub time_sync: B::TimeSync,
    pub power: B::Power,
    pub slot: B::Slot,
    pub status_pin: B::StatusPin,
    pub delay: B::Delay,
}

/// Failures that stop the probe.
///
/// Everything else (sensor, storage, network, time) is absorbed by the
/// component that hit it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Display failure: {0}")]
    Display(DisplayError),
}

impl From<DisplayError> for ProbeError {
    fn from(e: DisplayError) -> Self {
        Self::Display(e)
    }
}
