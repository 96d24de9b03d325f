//! Liveness pulse on the status line
//!
//! The line idles high once startup has finished. Each completed cycle pulls
//! it low for a short pulse so an external watchdog can tell the probe is
//! still cycling.

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::warn;

use crate::config::as_delay_ms;

pub struct Heartbeat<P> {
    pin: P,
    pulse: Duration,
    pulses: u32,
}

impl<P: OutputPin> Heartbeat<P> {
    pub fn new(pin: P, pulse: Duration) -> Self {
        Self {
            pin,
            pulse,
            pulses: 0,
        }
    }

    /// Drive the line to its idle (high) level.
    pub fn set_idle(&mut self) {
        if let Err(e) = self.pin.set_high() {
            warn!("Status pin: {:?}", e);
        }
    }

    /// Low for the configured pulse width, then back high.
    pub async fn pulse<D: DelayNs>(&mut self, delay: &mut D) {
        if let Err(e) = self.pin.set_low() {
            warn!("Status pin: {:?}", e);
        }
        delay.delay_ms(as_delay_ms(self.pulse)).await;
        self.set_idle();
        self.pulses = self.pulses.wrapping_add(1);
    }

    /// Pulses emitted since startup
    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}
