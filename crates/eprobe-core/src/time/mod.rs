//! Wall-clock maintenance and timestamp formatting
//!
//! [`TimeService`] owns the device clock and a network time client. It only
//! talks to the network when the clock is implausible, and every sync attempt
//! is bounded: after the retry budget the client is stopped and the clock is
//! left at whatever it reads. Formatting never fails; an unset clock renders
//! as a date near the epoch.

use core::fmt::Write;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, Weekday};
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{TimeConfig, as_delay_ms};

/// Maximum length of a formatted timestamp
pub const TIMESTAMP_CAPACITY: usize = 64;

pub type TimestampString = heapless::String<TIMESTAMP_CAPACITY>;

/// Human-readable locale date and time (`Thu Aug 23 14:55:02 2001`)
pub const PATTERN_LOCALE: &str = "%c";
/// Footer of the square layout
pub const PATTERN_DATE_TIME: &str = "%d.%m.%y %T";
/// Footer of the wide layout
pub const PATTERN_TIME: &str = "%T";

/// Device clock in unix seconds
pub trait WallClock {
    fn now(&self) -> i64;

    fn set(&mut self, unix_secs: i64);
}

/// Network time client
pub trait TimeSync {
    /// Start polling `server`.
    fn start(&mut self, server: &str) -> impl Future<Output = ()>;

    /// Returns the current unix time once the server has answered.
    fn poll(&mut self) -> impl Future<Output = Option<i64>>;

    fn stop(&mut self);
}

/// Fixed offset from UTC plus an optional European summer-time rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZoneRule {
    pub utc_offset_secs: i32,
    /// Add one hour between the last Sundays of March and October (01:00 UTC)
    pub eu_summer_time: bool,
}

impl TimeZoneRule {
    pub const UTC: Self = Self {
        utc_offset_secs: 0,
        eu_summer_time: false,
    };

    /// CET/CEST
    pub const CENTRAL_EUROPE: Self = Self {
        utc_offset_secs: 3600,
        eu_summer_time: true,
    };

    /// Offset from UTC in effect at `unix_secs`
    pub fn offset_at(&self, unix_secs: i64) -> i32 {
        if self.eu_summer_time && in_eu_summer_time(unix_secs) {
            self.utc_offset_secs + 3600
        } else {
            self.utc_offset_secs
        }
    }
}

fn last_sunday_switch(year: i32, month: u32) -> Option<i64> {
    let last_day = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = last_day.weekday().num_days_from_sunday();
    let sunday = last_day - ChronoDuration::days(i64::from(back));
    debug_assert_eq!(sunday.weekday(), Weekday::Sun);
    Some(sunday.and_hms_opt(1, 0, 0)?.and_utc().timestamp())
}

fn in_eu_summer_time(unix_secs: i64) -> bool {
    let Some(utc) = DateTime::from_timestamp(unix_secs, 0) else {
        return false;
    };
    let year = utc.year();
    match (last_sunday_switch(year, 3), last_sunday_switch(year, 10)) {
        (Some(start), Some(end)) => (start..end).contains(&unix_secs),
        _ => false,
    }
}

/// Render `unix_secs` in `zone` with a strftime `pattern`.
///
/// Pure formatting, no I/O. Output longer than [`TIMESTAMP_CAPACITY`] or an
/// invalid pattern yields whatever was rendered before the failure.
pub fn format(unix_secs: i64, zone: TimeZoneRule, pattern: &str) -> TimestampString {
    let mut out = TimestampString::new();
    let Some(utc) = DateTime::from_timestamp(unix_secs, 0) else {
        return out;
    };
    let Some(offset) = FixedOffset::east_opt(zone.offset_at(unix_secs)) else {
        return out;
    };
    if write!(out, "{}", utc.with_timezone(&offset).format(pattern)).is_err() {
        debug!("Timestamp truncated for pattern {}", pattern);
    }
    out
}

/// Owns the clock and keeps it set via network time.
pub struct TimeService<C, N> {
    clock: C,
    sync: N,
    config: TimeConfig,
}

impl<C, N> TimeService<C, N>
where
    C: WallClock,
    N: TimeSync,
{
    pub fn new(clock: C, sync: N, config: TimeConfig) -> Self {
        Self {
            clock,
            sync,
            config,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Whether the clock reads a plausible date
    pub fn is_time_set(&self) -> bool {
        DateTime::from_timestamp(self.clock.now(), 0)
            .is_some_and(|t| t.year() >= self.config.min_valid_year)
    }

    /// Obtain the time from the network unless the clock is already set.
    ///
    /// Polls at most `max_retries - 1` times with `retry_interval` between
    /// polls, then stops the client regardless of the outcome. Returns whether
    /// the clock is plausible afterwards.
    pub async fn ensure_time_set<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        info!("Setup time");
        if self.is_time_set() {
            debug!("Time already set");
            return true;
        }

        info!("Time not yet set. Obtaining current time via NTP");
        self.sync.start(self.config.server).await;

        let retry_count = self.config.max_retries;
        let mut retry = 0;
        loop {
            retry += 1;
            if retry >= retry_count {
                break;
            }
            info!(
                "Waiting for system time to be set... ({}/{})",
                retry, retry_count
            );
            delay.delay_ms(as_delay_ms(self.config.retry_interval)).await;
            if let Some(unix_secs) = self.sync.poll().await {
                self.clock.set(unix_secs);
                break;
            }
        }
        self.sync.stop();

        let now = self.format_now(PATTERN_LOCALE);
        if self.is_time_set() {
            info!("Set time to {}", now);
            true
        } else {
            warn!("Time sync gave up, clock left at {}", now);
            false
        }
    }

    pub fn format(&self, unix_secs: i64, pattern: &str) -> TimestampString {
        format(unix_secs, self.config.zone, pattern)
    }

    pub fn format_now(&self, pattern: &str) -> TimestampString {
        self.format(self.clock.now(), pattern)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// Exposes the wall clock to `embedded-sdmmc` so directory entries carry the
/// local time of the write.
pub struct ClockTimeSource<C> {
    clock: C,
    zone: TimeZoneRule,
}

impl<C: WallClock> ClockTimeSource<C> {
    pub fn new(clock: C, zone: TimeZoneRule) -> Self {
        Self { clock, zone }
    }
}

impl<C: WallClock> embedded_sdmmc::TimeSource for ClockTimeSource<C> {
    fn get_timestamp(&self) -> embedded_sdmmc::Timestamp {
        use chrono::Timelike;

        let now = self.clock.now();
        let local = DateTime::from_timestamp(now + i64::from(self.zone.offset_at(now)), 0)
            .unwrap_or_default();
        // FAT timestamps cannot express anything before 1980
        let year = local.year().clamp(1980, 2107);
        embedded_sdmmc::Timestamp {
            year_since_1970: (year - 1970) as u8,
            zero_indexed_month: local.month0() as u8,
            zero_indexed_day: local.day0() as u8,
            hours: local.hour() as u8,
            minutes: local.minute() as u8,
            seconds: local.second() as u8,
        }
    }
}
