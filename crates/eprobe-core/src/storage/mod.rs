//! Persistent measurement log
//!
//! One CSV line per cycle is appended to the log file:
//!
//! ```text
//! '<timestamp>',<temperature>,<humidity>,<pressure_hPa>,<gas_kOhm>
//! ```
//!
//! Temperature, humidity and pressure carry two decimals, gas resistance four.
//! Every append is an independent open/write/close; nothing is buffered and a
//! failed write is dropped.

pub mod sd_card;

use core::fmt::Write;

use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::sensors::SensorSample;

/// Upper bound of a single log line including the newline
pub const LOG_RECORD_CAPACITY: usize = 128;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("Card mount failed")]
    MountFailed,
    #[error("No card attached")]
    NoCard,
    #[error("Failed to open {0} for appending")]
    OpenFailed(&'static str),
    #[error("Write failed")]
    WriteFailed,
    #[error("Record exceeds line capacity")]
    RecordTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Sdsc,
    Sdhc,
}

impl CardKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sdsc => "SDSC",
            Self::Sdhc => "SDHC",
        }
    }
}

/// What the medium reported when it was mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageInfo {
    pub kind: CardKind,
    pub size_bytes: u64,
}

/// Trait for the filesystem beneath the logger.
pub trait LogStorage {
    /// Probe the medium.
    fn mount(&mut self) -> Result<StorageInfo, StorageError>;

    /// Open `path` in append mode (creating it), write `line`, close it.
    fn append(&mut self, path: &'static str, line: &[u8]) -> Result<(), StorageError>;
}

/// One formatted line of the measurement log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    line: heapless::String<LOG_RECORD_CAPACITY>,
}

impl LogRecord {
    /// Format `sample` with an already rendered timestamp.
    pub fn new(timestamp: &str, sample: &SensorSample) -> Result<Self, StorageError> {
        let mut line = heapless::String::new();
        writeln!(
            line,
            "'{}',{:.2},{:.2},{:.2},{:.4}",
            timestamp,
            sample.temperature,
            sample.humidity,
            sample.pressure_hpa(),
            sample.gas_resistance_kohm()
        )
        .map_err(|_| StorageError::RecordTooLong)?;
        Ok(Self { line })
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }
}

/// Appends one record per cycle and tolerates a missing medium.
pub struct PersistentLogger<S> {
    storage: S,
    path: &'static str,
    mounted: bool,
    dropped: u32,
}

impl<S: LogStorage> PersistentLogger<S> {
    pub fn new(storage: S, path: &'static str) -> Self {
        Self {
            storage,
            path,
            mounted: false,
            dropped: 0,
        }
    }

    /// Probe the medium and report it. Absence is logged, not raised.
    pub fn mount(&mut self) -> Option<StorageInfo> {
        match self.storage.mount() {
            Ok(info) => {
                self.mounted = true;
                info!("SD Card Type: {}", info.kind.label());
                debug!("SD Card Size: {}MB", info.size_bytes / (1024 * 1024));
                Some(info)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Append `record` to the log file.
    ///
    /// A medium that was absent is probed again first, so a card inserted
    /// after boot is picked up. Storage failures are logged and the record
    /// is dropped; the caller continues either way.
    pub fn append(&mut self, record: &LogRecord) -> bool {
        if !self.mounted && self.mount().is_none() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("No card mounted, record dropped ({} so far)", self.dropped);
            return false;
        }
        info!("Appending to file: {}", self.path);
        match self.storage.append(self.path, record.as_bytes()) {
            Ok(()) => {
                debug!("Message appended");
                true
            }
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Dropping log record ({} dropped so far): {}", self.dropped, e);
                false
            }
        }
    }

    /// Whether the medium answered the last mount probe
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Records lost to storage failures since startup
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
