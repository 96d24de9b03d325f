//! Low-power waiting between cycles

use embassy_time::Duration;

/// Why the chip last resumed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupCause {
    /// Power-on or reset, not a wake from sleep
    Undefined,
    Timer,
    External,
    Touchpad,
    Ulp,
    Gpio,
    Uart,
    Other,
}

impl WakeupCause {
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Undefined => "Wakeup was not caused by deep sleep",
            Self::Timer => "Wakeup caused by timer",
            Self::External => "Wakeup caused by external signal",
            Self::Touchpad => "Wakeup caused by touchpad",
            Self::Ulp => "Wakeup caused by ULP program",
            Self::Gpio => "Wakeup caused by GPIO",
            Self::Uart => "Wakeup caused by UART",
            Self::Other => "Wakeup caused by other source",
        }
    }
}

/// Trait for the chip's sleep control.
pub trait PowerControl {
    /// Suspend in light sleep for `duration`; execution continues afterwards
    /// with RAM and peripheral state intact.
    fn light_sleep(&mut self, duration: Duration) -> impl Future<Output = ()>;

    fn wakeup_cause(&self) -> WakeupCause;
}
