//! Simulated hardware for the desktop build.
//!
//! Sensor values follow slow sinusoids, the log goes to a plain file, the
//! network is a switchable flag and the e-paper panel is an SDL window (or
//! nothing at all when running headless).

use std::cell::Cell;
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use embassy_time::Duration;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics_simulator::{
    BinaryColorTheme, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
};
use log::{debug, info};

use eprobe_core::Board;
use eprobe_core::connectivity::{LinkStatus, SessionStatus, WirelessLink};
use eprobe_core::display::EpaperPanel;
use eprobe_core::display::framebuffer::FrameBuffer;
use eprobe_core::power::{PowerControl, WakeupCause};
use eprobe_core::retained::{RETAINED_SLOT_LEN, RetainedSlot, SlotBytes};
use eprobe_core::sensors::{EnvironmentSensor, Measurement, SensorError};
use eprobe_core::storage::{CardKind, LogStorage, StorageError, StorageInfo};
use eprobe_core::telemetry::{Feed, TelemetryError, TelemetrySession};
use eprobe_core::time::{TimeSync, WallClock};

/// Pixel scale factor for the simulator window
const WINDOW_SCALE: u32 = 2;

/// Every this many readings the simulated sensor times out
const SENSOR_FAULT_EVERY: u32 = 17;

pub struct SimBoard;

impl Board for SimBoard {
    type Sensor = SimSensor;
    type Panel = SimPanel;
    type Storage = FileStorage;
    type Link = SimLink;
    type Session = SimSession;
    type Clock = SystemClock;
    type TimeSync = SimTimeSync;
    type Power = SimPower;
    type Slot = RamSlot;
    type StatusPin = LogPin;
    type Delay = StdDelay;
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Generates readings that vary over time.
pub struct SimSensor {
    readings: u32,
}

impl SimSensor {
    pub fn new() -> Self {
        Self { readings: 0 }
    }
}

impl EnvironmentSensor for SimSensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn measure(&mut self) -> Result<Measurement, SensorError> {
        self.readings += 1;
        if self.readings % SENSOR_FAULT_EVERY == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "BME680",
                operation: "perform reading",
                details: "simulated timeout",
            });
        }

        let t = unix_now() as f64;
        Ok(Measurement {
            temperature_celsius: (22.0 + 3.0 * (t / 600.0).sin()) as f32,
            humidity_percent: (45.0 + 8.0 * (t / 900.0).sin() + (t / 37.0).cos()) as f32,
            pressure_pa: (101_325.0 + 250.0 * (t / 3600.0).sin()) as f32,
            gas_resistance_ohm: (150_000.0 + 40_000.0 * (t / 1200.0).cos()) as f32,
        })
    }
}

/// E-paper stand-in that mirrors every refreshed area into a display buffer.
pub struct SimPanel {
    display: SimulatorDisplay<BinaryColor>,
    window: Option<Window>,
    quit: Rc<Cell<bool>>,
}

impl SimPanel {
    pub fn new(size: Size, headless: bool, quit: Rc<Cell<bool>>) -> Self {
        let window = (!headless).then(|| {
            let output_settings = OutputSettingsBuilder::new()
                .scale(WINDOW_SCALE)
                .theme(BinaryColorTheme::LcdWhite)
                .build();
            Window::new("eProbe Simulator", &output_settings)
        });
        Self {
            display: SimulatorDisplay::new(size),
            window,
            quit,
        }
    }

    fn copy(&mut self, frame: &FrameBuffer, area: Rectangle) {
        let pixels = area
            .points()
            .filter_map(|p| frame.pixel(p).map(|color| Pixel(p, color)));
        let Ok(()) = self.display.draw_iter(pixels);

        if let Some(window) = self.window.as_mut() {
            // The window must be updated once before its events are read
            window.update(&self.display);
            if window.events().any(|e| matches!(e, SimulatorEvent::Quit)) {
                self.quit.set(true);
            }
        }
    }
}

impl EpaperPanel for SimPanel {
    type Error = Infallible;

    async fn init(&mut self) -> Result<(), Infallible> {
        info!("Simulated panel {}x{}", self.display.size().width, self.display.size().height);
        Ok(())
    }

    async fn update_full(&mut self, frame: &FrameBuffer) -> Result<(), Infallible> {
        debug!("Full refresh");
        self.copy(frame, frame.bounding_box());
        Ok(())
    }

    async fn update_window(&mut self, frame: &FrameBuffer, window: Rectangle) -> Result<(), Infallible> {
        debug!("Partial refresh {:?}", window);
        self.copy(frame, window);
        Ok(())
    }
}

/// Appends the measurement log below a local directory.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LogStorage for FileStorage {
    fn mount(&mut self) -> Result<StorageInfo, StorageError> {
        fs::create_dir_all(&self.root).map_err(|_| StorageError::MountFailed)?;
        info!("Logging to {}", self.root.display());
        Ok(StorageInfo {
            kind: CardKind::Sdhc,
            size_bytes: 0,
        })
    }

    fn append(&mut self, path: &'static str, line: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(path))
            .map_err(|_| StorageError::OpenFailed(path))?;
        file.write_all(line).map_err(|_| StorageError::WriteFailed)
    }
}

/// Wireless link that is either reachable or not
pub struct SimLink {
    online: bool,
    associated: bool,
}

impl SimLink {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            associated: false,
        }
    }
}

impl WirelessLink for SimLink {
    type Error = Infallible;

    async fn begin(&mut self) -> Result<(), Infallible> {
        self.associated = self.online;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if self.associated {
            LinkStatus::Connected
        } else {
            LinkStatus::NoNetworkFound
        }
    }

    async fn disconnect(&mut self) {
        self.associated = false;
    }
}

/// Telemetry sink that only logs what it receives
#[derive(Default)]
pub struct SimSession {
    connected: bool,
}

impl TelemetrySession for SimSession {
    type Error = TelemetryError;

    async fn connect(&mut self) {
        self.connected = true;
    }

    fn status(&mut self) -> SessionStatus {
        if self.connected {
            SessionStatus::Connected
        } else {
            SessionStatus::Disconnected
        }
    }

    async fn pump_events(&mut self) {}

    async fn save(&mut self, feed: Feed, value: f32) -> Result<(), TelemetryError> {
        info!("feed {} <- {}", feed.name(), value);
        Ok(())
    }
}

/// Host clock, offset once the simulated time sync answers
#[derive(Default)]
pub struct SystemClock {
    offset: i64,
}

impl WallClock for SystemClock {
    fn now(&self) -> i64 {
        unix_now() + self.offset
    }

    fn set(&mut self, unix_secs: i64) {
        self.offset = unix_secs - unix_now();
    }
}

/// Answers with the host time on the second poll
#[derive(Default)]
pub struct SimTimeSync {
    polls: u32,
}

impl TimeSync for SimTimeSync {
    async fn start(&mut self, server: &str) {
        info!("Time sync against {}", server);
        self.polls = 0;
    }

    async fn poll(&mut self) -> Option<i64> {
        self.polls += 1;
        (self.polls >= 2).then(unix_now)
    }

    fn stop(&mut self) {}
}

pub struct SimPower {
    slept: bool,
}

impl SimPower {
    pub fn new() -> Self {
        Self { slept: false }
    }
}

impl PowerControl for SimPower {
    async fn light_sleep(&mut self, duration: Duration) {
        std::thread::sleep(StdDuration::from_millis(duration.as_millis()));
        self.slept = true;
    }

    fn wakeup_cause(&self) -> WakeupCause {
        if self.slept {
            WakeupCause::Timer
        } else {
            WakeupCause::Undefined
        }
    }
}

pub struct RamSlot {
    bytes: SlotBytes,
}

impl RamSlot {
    pub fn new() -> Self {
        Self {
            bytes: [0; RETAINED_SLOT_LEN],
        }
    }
}

impl RetainedSlot for RamSlot {
    fn read(&self) -> SlotBytes {
        self.bytes
    }

    fn write(&mut self, bytes: &SlotBytes) {
        self.bytes = *bytes;
    }
}

/// Status line shown as log output
pub struct LogPin;

impl embedded_hal::digital::ErrorType for LogPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        debug!("status pin low");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        debug!("status pin high");
        Ok(())
    }
}

/// Blocking delay on the host thread
pub struct StdDelay;

impl embedded_hal_async::delay::DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(StdDuration::from_nanos(u64::from(ns)));
    }

    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(StdDuration::from_millis(u64::from(ms)));
    }
}
