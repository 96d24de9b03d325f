//! RTC-backed clock, light sleep and retained memory

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::Duration;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::rtc_cntl::{Rtc, SleepSource, wakeup_cause};
use log::debug;

use eprobe_core::power::{PowerControl, WakeupCause};
use eprobe_core::retained::{RETAINED_SLOT_LEN, RetainedSlot, SlotBytes};
use eprobe_core::time::WallClock;

/// The RTC is shared by the clock, the SD card time source and sleep control
pub type SharedRtc = &'static RefCell<Rtc<'static>>;

const MICROS_PER_SEC: i64 = 1_000_000;

/// Wall clock kept by the RTC; it keeps running through light sleep.
#[derive(Clone, Copy)]
pub struct RtcClock {
    rtc: SharedRtc,
}

impl RtcClock {
    pub fn new(rtc: SharedRtc) -> Self {
        Self { rtc }
    }
}

impl WallClock for RtcClock {
    fn now(&self) -> i64 {
        self.rtc.borrow().current_time_us() as i64 / MICROS_PER_SEC
    }

    fn set(&mut self, unix_secs: i64) {
        let us = unix_secs.max(0) as u64 * MICROS_PER_SEC as u64;
        self.rtc.borrow().set_current_time_us(us);
    }
}

pub struct EspPower {
    rtc: SharedRtc,
}

impl EspPower {
    pub fn new(rtc: SharedRtc) -> Self {
        Self { rtc }
    }
}

impl PowerControl for EspPower {
    async fn light_sleep(&mut self, duration: Duration) {
        debug!("Light sleep for {} ms", duration.as_millis());
        let timer = TimerWakeupSource::new(core::time::Duration::from_millis(duration.as_millis()));
        self.rtc.borrow_mut().sleep_light(&[&timer]);
    }

    fn wakeup_cause(&self) -> WakeupCause {
        match wakeup_cause() {
            SleepSource::Undefined => WakeupCause::Undefined,
            SleepSource::Timer => WakeupCause::Timer,
            SleepSource::Ext0 | SleepSource::Ext1 => WakeupCause::External,
            SleepSource::TouchPad => WakeupCause::Touchpad,
            SleepSource::Ulp => WakeupCause::Ulp,
            SleepSource::Gpio => WakeupCause::Gpio,
            SleepSource::Uart => WakeupCause::Uart,
            _ => WakeupCause::Other,
        }
    }
}

#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut RETAINED: SlotBytes = [0; RETAINED_SLOT_LEN];

static SLOT_TAKEN: AtomicBool = AtomicBool::new(false);

/// Retained slot in RTC fast memory. It survives light sleep and software
/// resets, and holds garbage after power-on, which the decoder rejects.
pub struct RtcSlot {
    _private: (),
}

impl RtcSlot {
    /// Hand out the slot; `None` once it was taken.
    pub fn take() -> Option<Self> {
        if SLOT_TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { _private: () })
    }
}

impl RetainedSlot for RtcSlot {
    fn read(&self) -> SlotBytes {
        // SAFETY: `take` hands out at most one slot and nothing else touches RETAINED
        unsafe { core::ptr::read(&raw const RETAINED) }
    }

    fn write(&mut self, bytes: &SlotBytes) {
        // SAFETY: see `read`
        unsafe { core::ptr::write(&raw mut RETAINED, *bytes) }
    }
}
