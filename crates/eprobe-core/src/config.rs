//! Static startup configuration
//!
//! The probe never parses a configuration file. Whoever builds the board
//! (firmware `main`, the simulator, tests) fills in a [`ProbeConfig`] once and
//! hands it to [`crate::Probe::new`].

use embassy_time::Duration;

use crate::display::layout::DisplayLayout;
use crate::time::TimeZoneRule;

/// Number of cycles between forced full refreshes of the bistable panel
pub const DEFAULT_REFRESH_PERIOD: u32 = 40;

/// File the measurement log is appended to, relative to the volume root
pub const DEFAULT_LOG_PATH: &str = "datalog.csv";

/// Complete startup configuration of the probe
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time between the start of two measurement cycles
    pub cycle_period: Duration,
    /// Enter light sleep between cycles instead of delaying
    pub sleep_enabled: bool,
    /// Screen layout of the attached panel
    pub display_layout: DisplayLayout,
    /// Force a full panel refresh every `refresh_period` cycles
    pub refresh_period: u32,
    pub connect: ConnectPolicy,
    pub time: TimeConfig,
    /// Width of the low pulse on the status line
    pub heartbeat_pulse: Duration,
    pub log_path: &'static str,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_secs(30),
            sleep_enabled: false,
            display_layout: DisplayLayout::Wide128x250,
            refresh_period: DEFAULT_REFRESH_PERIOD,
            connect: ConnectPolicy::default(),
            time: TimeConfig::default(),
            heartbeat_pulse: Duration::from_millis(100),
            log_path: DEFAULT_LOG_PATH,
        }
    }
}

impl ProbeConfig {
    /// Configuration of the low-power variant: light sleep between cycles
    /// and the square 1.54" panel layout.
    pub fn low_power() -> Self {
        Self {
            sleep_enabled: true,
            display_layout: DisplayLayout::Square200,
            ..Self::default()
        }
    }
}

/// Bounded reconnect policy of the connectivity manager
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub max_attempts: u8,
    pub attempt_interval: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_interval: Duration::from_millis(1000),
        }
    }
}

/// Network time settings
#[derive(Debug, Clone, Copy)]
pub struct TimeConfig {
    pub server: &'static str,
    /// Upper bound on sync polls; the client is stopped afterwards either way
    pub max_retries: u8,
    pub retry_interval: Duration,
    /// Clocks reporting a year below this are considered unset
    pub min_valid_year: i32,
    pub zone: TimeZoneRule,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            server: "pool.ntp.org",
            max_retries: 10,
            retry_interval: Duration::from_millis(2000),
            min_valid_year: 2016,
            zone: TimeZoneRule::CENTRAL_EUROPE,
        }
    }
}

/// Convert a duration to the millisecond argument of `DelayNs::delay_ms`
pub(crate) fn as_delay_ms(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
