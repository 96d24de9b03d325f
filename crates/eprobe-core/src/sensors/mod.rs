//! Sensor acquisition
//!
//! The physical driver sits behind [`EnvironmentSensor`]. [`SensorReader`]
//! turns every driver outcome into a fully formed [`SensorSample`]: a failed
//! reading yields a zeroed sample instead of an error so the downstream stages
//! always receive something to render, log and publish.

use log::{debug, info, warn};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
}

/// Raw physical quantities as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
    pub pressure_pa: f32,
    pub gas_resistance_ohm: f32,
}

/// Trait for the environmental sensor driver.
pub trait EnvironmentSensor {
    /// Configure oversampling, filters and the gas heater.
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Perform one forced-mode measurement.
    fn measure(&mut self) -> impl Future<Output = Result<Measurement, SensorError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Measured,
    /// The driver reported a failure; all physical fields are zero
    Failed,
}

/// One reading of all four quantities, stamped with the wall-clock time.
///
/// Immutable once produced. The cycle that acquired it owns it and drops it
/// when the cycle ends; consumers copy out what they need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Unix seconds (or seconds since boot while the clock is unset)
    pub timestamp: i64,
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Pascal
    pub pressure: f32,
    /// Ohm
    pub gas_resistance: f32,
    pub status: SampleStatus,
}

impl SensorSample {
    pub const fn new(timestamp: i64, measurement: Measurement) -> Self {
        Self {
            timestamp,
            temperature: measurement.temperature_celsius,
            humidity: measurement.humidity_percent,
            pressure: measurement.pressure_pa,
            gas_resistance: measurement.gas_resistance_ohm,
            status: SampleStatus::Measured,
        }
    }

    /// Sentinel sample produced when the driver fails
    pub const fn zeroed(timestamp: i64) -> Self {
        Self {
            timestamp,
            temperature: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            gas_resistance: 0.0,
            status: SampleStatus::Failed,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.status == SampleStatus::Measured
    }

    pub fn pressure_hpa(&self) -> f32 {
        self.pressure / 100.0
    }

    pub fn gas_resistance_kohm(&self) -> f32 {
        self.gas_resistance / 1000.0
    }
}

/// Wraps the sensor driver and never lets a failure escape.
pub struct SensorReader<S> {
    sensor: S,
    ready: bool,
    failures: u32,
}

impl<S: EnvironmentSensor> SensorReader<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            ready: false,
            failures: 0,
        }
    }

    /// Initialize the driver.
    ///
    /// A missing sensor is not fatal: the error is returned for the caller to
    /// report and every later `acquire` simply retries the driver.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        debug!("Setup environment sensor");
        self.sensor.init().await?;
        self.ready = true;
        info!("Environment sensor ready");
        Ok(())
    }

    /// Perform one measurement.
    ///
    /// On driver failure a zeroed sample carrying `timestamp` is returned and
    /// a warning is logged. There is no backoff; the next call tries again.
    pub async fn acquire(&mut self, timestamp: i64) -> SensorSample {
        debug!("Read environment sensor data");
        match self.sensor.measure().await {
            Ok(measurement) => SensorSample::new(timestamp, measurement),
            Err(e) => {
                self.failures = self.failures.wrapping_add(1);
                warn!(
                    "Failed to perform sensor reading ({} so far): {}",
                    self.failures, e
                );
                SensorSample::zeroed(timestamp)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Total number of failed readings since startup
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
