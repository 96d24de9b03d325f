//! A fully mocked board whose collaborators append to one shared trace, so
//! tests can assert on the order of side effects across components.

#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embassy_time::Duration;
use embedded_graphics::primitives::Rectangle;
use eprobe_core::connectivity::{LinkStatus, SessionStatus, WirelessLink};
use eprobe_core::display::EpaperPanel;
use eprobe_core::display::framebuffer::FrameBuffer;
use eprobe_core::power::{PowerControl, WakeupCause};
use eprobe_core::retained::{RETAINED_SLOT_LEN, RetainedSlot, SlotBytes};
use eprobe_core::sensors::{EnvironmentSensor, Measurement, SensorError};
use eprobe_core::storage::{CardKind, LogStorage, StorageError, StorageInfo};
use eprobe_core::telemetry::{Feed, TelemetryError, TelemetrySession};
use eprobe_core::time::{TimeSync, WallClock};
use eprobe_core::{Board, ProbeConfig, ProbeHardware};

/// 2023-11-14 22:13:20 UTC
pub const NOW: i64 = 1_700_000_000;

pub const REFERENCE: Measurement = Measurement {
    temperature_celsius: 21.5,
    humidity_percent: 44.12,
    pressure_pa: 101_325.0,
    gas_resistance_ohm: 150_000.0,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LinkBegin,
    LinkPoll,
    LinkDisconnect,
    SessionConnect,
    Pump,
    SyncPoll,
    Measure,
    PanelInit,
    PanelFull,
    PanelWindow(Rectangle),
    Append(String),
    Save(&'static str, f32),
    PinLow,
    PinHigh,
    Delay(u32),
    Sleep(Duration),
}

/// What the simulated environment does
#[derive(Debug, Clone)]
pub struct Scenario {
    pub network: bool,
    pub storage: bool,
    pub sensor: bool,
    pub panel: bool,
    /// Fail panel refreshes from this refresh number on
    pub panel_fails_after: Option<usize>,
    pub clock: i64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            network: true,
            storage: true,
            sensor: true,
            panel: true,
            panel_fails_after: None,
            clock: NOW,
        }
    }
}

pub type Trace = Rc<RefCell<Vec<Event>>>;

pub struct TestBoard;

impl Board for TestBoard {
    type Sensor = TestSensor;
    type Panel = TestPanel;
    type Storage = TestStorage;
    type Link = TestLink;
    type Session = TestSession;
    type Clock = TestClock;
    type TimeSync = TestTimeSync;
    type Power = TestPower;
    type Slot = TestSlot;
    type StatusPin = TestPin;
    type Delay = TestDelay;
}

/// Build the board for `scenario`. `slot` survives across probes to model a
/// reset with retained RAM.
pub fn hardware(scenario: &Scenario, slot: &Rc<RefCell<SlotBytes>>) -> (ProbeHardware<TestBoard>, Trace) {
    let trace: Trace = Rc::default();
    let clock = Rc::new(RefCell::new(scenario.clock));
    let hw = ProbeHardware {
        sensor: TestSensor {
            trace: trace.clone(),
            working: scenario.sensor,
        },
        panel: TestPanel {
            trace: trace.clone(),
            working: scenario.panel,
            fails_after: scenario.panel_fails_after,
            refreshes: 0,
        },
        storage: TestStorage {
            trace: trace.clone(),
            present: scenario.storage,
        },
        link: TestLink {
            trace: trace.clone(),
            reachable: scenario.network,
        },
        session: TestSession {
            trace: trace.clone(),
            connected: false,
        },
        clock: TestClock { now: clock.clone() },
        time_sync: TestTimeSync {
            trace: trace.clone(),
            answer: NOW,
        },
        power: TestPower {
            trace: trace.clone(),
            woke: false,
        },
        slot: TestSlot { bytes: slot.clone() },
        status_pin: TestPin {
            trace: trace.clone(),
        },
        delay: TestDelay {
            trace: trace.clone(),
        },
    };
    (hw, trace)
}

pub fn fresh_slot() -> Rc<RefCell<SlotBytes>> {
    Rc::new(RefCell::new([0; RETAINED_SLOT_LEN]))
}

pub fn config() -> ProbeConfig {
    ProbeConfig::default()
}

pub fn count(trace: &Trace, pred: impl Fn(&Event) -> bool) -> usize {
    trace.borrow().iter().filter(|e| pred(e)).count()
}

pub fn position(trace: &Trace, pred: impl Fn(&Event) -> bool) -> Option<usize> {
    trace.borrow().iter().position(pred)
}

pub fn rposition(trace: &Trace, pred: impl Fn(&Event) -> bool) -> Option<usize> {
    trace.borrow().iter().rposition(pred)
}

pub struct TestSensor {
    trace: Trace,
    working: bool,
}

impl EnvironmentSensor for TestSensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        if !self.working {
            return Err(SensorError::InitializationFailed {
                sensor: "BME680",
                details: "no chip id",
            });
        }
        Ok(())
    }

    async fn measure(&mut self) -> Result<Measurement, SensorError> {
        self.trace.borrow_mut().push(Event::Measure);
        if !self.working {
            return Err(SensorError::ReadFailed {
                sensor: "BME680",
                operation: "perform reading",
                details: "timeout",
            });
        }
        Ok(REFERENCE)
    }
}

pub struct TestPanel {
    trace: Trace,
    working: bool,
    fails_after: Option<usize>,
    refreshes: usize,
}

impl TestPanel {
    fn refresh(&mut self, event: Event) -> Result<(), ()> {
        self.refreshes += 1;
        if self.fails_after.is_some_and(|n| self.refreshes > n) {
            return Err(());
        }
        self.trace.borrow_mut().push(event);
        Ok(())
    }
}

impl EpaperPanel for TestPanel {
    type Error = ();

    async fn init(&mut self) -> Result<(), ()> {
        if !self.working {
            return Err(());
        }
        self.trace.borrow_mut().push(Event::PanelInit);
        Ok(())
    }

    async fn update_full(&mut self, _frame: &FrameBuffer) -> Result<(), ()> {
        self.refresh(Event::PanelFull)
    }

    async fn update_window(&mut self, _frame: &FrameBuffer, window: Rectangle) -> Result<(), ()> {
        self.refresh(Event::PanelWindow(window))
    }
}

pub struct TestStorage {
    trace: Trace,
    present: bool,
}

impl LogStorage for TestStorage {
    fn mount(&mut self) -> Result<StorageInfo, StorageError> {
        if !self.present {
            return Err(StorageError::NoCard);
        }
        Ok(StorageInfo {
            kind: CardKind::Sdhc,
            size_bytes: 4 << 30,
        })
    }

    fn append(&mut self, path: &'static str, line: &[u8]) -> Result<(), StorageError> {
        if !self.present {
            return Err(StorageError::OpenFailed(path));
        }
        let line = String::from_utf8(line.to_vec()).map_err(|_| StorageError::WriteFailed)?;
        self.trace.borrow_mut().push(Event::Append(line));
        Ok(())
    }
}

pub struct TestLink {
    trace: Trace,
    reachable: bool,
}

impl WirelessLink for TestLink {
    type Error = Infallible;

    async fn begin(&mut self) -> Result<(), Infallible> {
        self.trace.borrow_mut().push(Event::LinkBegin);
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        self.trace.borrow_mut().push(Event::LinkPoll);
        if self.reachable {
            LinkStatus::Connected
        } else {
            LinkStatus::NoNetworkFound
        }
    }

    async fn disconnect(&mut self) {
        self.trace.borrow_mut().push(Event::LinkDisconnect);
    }
}

pub struct TestSession {
    trace: Trace,
    connected: bool,
}

impl TelemetrySession for TestSession {
    type Error = TelemetryError;

    async fn connect(&mut self) {
        self.trace.borrow_mut().push(Event::SessionConnect);
        self.connected = true;
    }

    fn status(&mut self) -> SessionStatus {
        if self.connected {
            SessionStatus::Connected
        } else {
            SessionStatus::Disconnected
        }
    }

    async fn pump_events(&mut self) {
        self.trace.borrow_mut().push(Event::Pump);
    }

    async fn save(&mut self, feed: Feed, value: f32) -> Result<(), TelemetryError> {
        self.trace.borrow_mut().push(Event::Save(feed.name(), value));
        Ok(())
    }
}

pub struct TestClock {
    now: Rc<RefCell<i64>>,
}

impl WallClock for TestClock {
    fn now(&self) -> i64 {
        *self.now.borrow()
    }

    fn set(&mut self, unix_secs: i64) {
        *self.now.borrow_mut() = unix_secs;
    }
}

pub struct TestTimeSync {
    trace: Trace,
    answer: i64,
}

impl TimeSync for TestTimeSync {
    async fn start(&mut self, _server: &str) {}

    async fn poll(&mut self) -> Option<i64> {
        self.trace.borrow_mut().push(Event::SyncPoll);
        Some(self.answer)
    }

    fn stop(&mut self) {}
}

pub struct TestPower {
    trace: Trace,
    woke: bool,
}

impl PowerControl for TestPower {
    async fn light_sleep(&mut self, duration: Duration) {
        self.trace.borrow_mut().push(Event::Sleep(duration));
        self.woke = true;
    }

    fn wakeup_cause(&self) -> WakeupCause {
        if self.woke {
            WakeupCause::Timer
        } else {
            WakeupCause::Undefined
        }
    }
}

pub struct TestSlot {
    bytes: Rc<RefCell<SlotBytes>>,
}

impl RetainedSlot for TestSlot {
    fn read(&self) -> SlotBytes {
        *self.bytes.borrow()
    }

    fn write(&mut self, bytes: &SlotBytes) {
        *self.bytes.borrow_mut() = *bytes;
    }
}

pub struct TestPin {
    trace: Trace,
}

impl embedded_hal::digital::ErrorType for TestPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for TestPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.trace.borrow_mut().push(Event::PinLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.trace.borrow_mut().push(Event::PinHigh);
        Ok(())
    }
}

pub struct TestDelay {
    trace: Trace,
}

impl embedded_hal_async::delay::DelayNs for TestDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.trace.borrow_mut().push(Event::Delay(ns / 1_000_000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.trace.borrow_mut().push(Event::Delay(ms));
    }
}
