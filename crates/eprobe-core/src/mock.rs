//! Recording test doubles for the collaborator traits

use alloc::string::String;
use alloc::vec::Vec;
use core::convert::Infallible;

use embassy_time::Duration;
use embedded_graphics::primitives::Rectangle;

use crate::connectivity::{LinkStatus, SessionStatus, WirelessLink};
use crate::display::EpaperPanel;
use crate::display::framebuffer::FrameBuffer;
use crate::power::{PowerControl, WakeupCause};
use crate::retained::{RETAINED_SLOT_LEN, RetainedSlot, SlotBytes};
use crate::sensors::{EnvironmentSensor, Measurement, SensorError};
use crate::storage::{CardKind, LogStorage, StorageError, StorageInfo};
use crate::telemetry::{Feed, TelemetryError, TelemetrySession};
use crate::time::{TimeSync, WallClock};

const SENSOR_FAULT: SensorError = SensorError::ReadFailed {
    sensor: "mock",
    operation: "measure",
    details: "injected",
};

pub struct MockSensor {
    pub measurement: Measurement,
    /// Fail this many upcoming calls
    pub fail_next: u32,
    pub fail_always: bool,
}

impl MockSensor {
    pub fn steady(measurement: Measurement) -> Self {
        Self {
            measurement,
            fail_next: 0,
            fail_always: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            measurement: Measurement::default(),
            fail_next: 0,
            fail_always: true,
        }
    }

    fn should_fail(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        self.fail_always
    }
}

impl EnvironmentSensor for MockSensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        if self.fail_always {
            return Err(SensorError::InitializationFailed {
                sensor: "mock",
                details: "not found",
            });
        }
        Ok(())
    }

    async fn measure(&mut self) -> Result<Measurement, SensorError> {
        if self.should_fail() {
            return Err(SENSOR_FAULT);
        }
        Ok(self.measurement)
    }
}

pub struct MockClock {
    pub now: i64,
}

impl MockClock {
    pub fn at(now: i64) -> Self {
        Self { now }
    }
}

impl WallClock for MockClock {
    fn now(&self) -> i64 {
        self.now
    }

    fn set(&mut self, unix_secs: i64) {
        self.now = unix_secs;
    }
}

pub struct MockTimeSync {
    answer: Option<(u32, i64)>,
    pub starts: u32,
    pub polls: u32,
    pub stops: u32,
}

impl MockTimeSync {
    /// Answers `time` on poll number `polls`
    pub fn answering_after(polls: u32, time: i64) -> Self {
        Self {
            answer: Some((polls, time)),
            starts: 0,
            polls: 0,
            stops: 0,
        }
    }

    pub fn silent() -> Self {
        Self {
            answer: None,
            starts: 0,
            polls: 0,
            stops: 0,
        }
    }
}

impl TimeSync for MockTimeSync {
    async fn start(&mut self, _server: &str) {
        self.starts += 1;
    }

    async fn poll(&mut self) -> Option<i64> {
        self.polls += 1;
        match self.answer {
            Some((after, time)) if self.polls >= after => Some(time),
            _ => None,
        }
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Records requested delays without waiting
#[derive(Default)]
pub struct MockDelay {
    delays_ms: Vec<u32>,
}

impl MockDelay {
    pub fn calls(&self) -> usize {
        self.delays_ms.len()
    }

    pub fn min_ms(&self) -> u32 {
        self.delays_ms.iter().copied().min().unwrap_or(0)
    }

    pub fn total_ms(&self) -> u64 {
        self.delays_ms.iter().map(|&ms| u64::from(ms)).sum()
    }
}

impl embedded_hal_async::delay::DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.delays_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.delays_ms.push(us / 1000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

pub struct MockLink {
    /// Link reports connected once it was polled more than this many times
    up_after: Option<u32>,
    polls: u32,
    dropped: bool,
    pub begins: u32,
}

impl MockLink {
    pub fn unreachable() -> Self {
        Self {
            up_after: None,
            polls: 0,
            dropped: false,
            begins: 0,
        }
    }

    pub fn up_after(polls: u32) -> Self {
        Self {
            up_after: Some(polls),
            ..Self::unreachable()
        }
    }

    /// Lose the association until the next `begin`
    pub fn drop_link(&mut self) {
        self.dropped = true;
    }

    pub fn force_up(&mut self) {
        self.up_after = Some(0);
    }
}

impl WirelessLink for MockLink {
    type Error = Infallible;

    async fn begin(&mut self) -> Result<(), Infallible> {
        self.begins += 1;
        self.dropped = false;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        self.polls += 1;
        if self.dropped {
            return LinkStatus::ConnectionLost;
        }
        match self.up_after {
            Some(after) if self.polls > after => LinkStatus::Connected,
            Some(_) => LinkStatus::Idle,
            None => LinkStatus::NoNetworkFound,
        }
    }

    async fn disconnect(&mut self) {
        self.dropped = true;
    }
}

pub struct MockSession {
    accept: bool,
    pub connects: u32,
    pub pumps: u32,
    pub saved: Vec<(&'static str, f32)>,
    pub reject_feed: Option<Feed>,
}

impl MockSession {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            connects: 0,
            pumps: 0,
            saved: Vec::new(),
            reject_feed: None,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            ..Self::accepting()
        }
    }
}

impl TelemetrySession for MockSession {
    type Error = TelemetryError;

    async fn connect(&mut self) {
        self.connects += 1;
    }

    fn status(&mut self) -> SessionStatus {
        match (self.connects, self.accept) {
            (0, _) => SessionStatus::Idle,
            (_, true) => SessionStatus::Connected,
            (_, false) => SessionStatus::Unauthorized,
        }
    }

    async fn pump_events(&mut self) {
        self.pumps += 1;
    }

    async fn save(&mut self, feed: Feed, value: f32) -> Result<(), TelemetryError> {
        if self.reject_feed == Some(feed) {
            return Err(TelemetryError::Rejected(422));
        }
        self.saved.push((feed.name(), value));
        Ok(())
    }
}

pub struct MockStorage {
    pub present: bool,
    pub lines: Vec<(&'static str, String)>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self {
            present: true,
            lines: Vec::new(),
        }
    }
}

impl MockStorage {
    pub fn unavailable() -> Self {
        Self {
            present: false,
            lines: Vec::new(),
        }
    }
}

impl LogStorage for MockStorage {
    fn mount(&mut self) -> Result<StorageInfo, StorageError> {
        if !self.present {
            return Err(StorageError::MountFailed);
        }
        Ok(StorageInfo {
            kind: CardKind::Sdhc,
            size_bytes: 8 * 1024 * 1024 * 1024,
        })
    }

    fn append(&mut self, path: &'static str, line: &[u8]) -> Result<(), StorageError> {
        if !self.present {
            return Err(StorageError::OpenFailed(path));
        }
        let line = core::str::from_utf8(line).map_err(|_| StorageError::WriteFailed)?;
        self.lines.push((path, String::from(line)));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    Init,
    Full,
    Window(Rectangle),
}

#[derive(Default)]
pub struct MockPanel {
    pub fail_init: bool,
    pub fail_refresh: bool,
    pub events: Vec<PanelEvent>,
}

impl EpaperPanel for MockPanel {
    type Error = ();

    async fn init(&mut self) -> Result<(), ()> {
        if self.fail_init {
            return Err(());
        }
        self.events.push(PanelEvent::Init);
        Ok(())
    }

    async fn update_full(&mut self, _frame: &FrameBuffer) -> Result<(), ()> {
        if self.fail_refresh {
            return Err(());
        }
        self.events.push(PanelEvent::Full);
        Ok(())
    }

    async fn update_window(&mut self, _frame: &FrameBuffer, window: Rectangle) -> Result<(), ()> {
        if self.fail_refresh {
            return Err(());
        }
        self.events.push(PanelEvent::Window(window));
        Ok(())
    }
}

/// Output pin recording every level it was driven to (`true` = high)
#[derive(Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.push(true);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPower {
    pub sleeps: Vec<Duration>,
}

impl PowerControl for MockPower {
    async fn light_sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }

    fn wakeup_cause(&self) -> WakeupCause {
        if self.sleeps.is_empty() {
            WakeupCause::Undefined
        } else {
            WakeupCause::Timer
        }
    }
}

pub struct MockSlot {
    pub bytes: SlotBytes,
}

impl Default for MockSlot {
    fn default() -> Self {
        Self {
            bytes: [0; RETAINED_SLOT_LEN],
        }
    }
}

impl RetainedSlot for MockSlot {
    fn read(&self) -> SlotBytes {
        self.bytes
    }

    fn write(&mut self, bytes: &SlotBytes) {
        self.bytes = *bytes;
    }
}
