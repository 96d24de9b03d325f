//! BME680 binding of [`EnvironmentSensor`]

use bme680::{
    Bme680, FieldDataCondition, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode,
    SettingsBuilder,
};
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error};

use eprobe_core::sensors::{EnvironmentSensor, Measurement, SensorError};

const SENSOR: &str = "BME680";

/// Gas heater target temperature in degrees Celsius
const HEATER_TEMP_C: u16 = 320;
/// Gas heater on-time
const HEATER_DURATION: Duration = Duration::from_millis(150);
/// Ambient temperature assumed for the heater calculation
const AMBIENT_TEMP_C: i8 = 25;

enum State<I2C, D> {
    Uninitialized(I2C),
    Ready(Bme680<I2C, D>),
    /// The driver consumed the bus during a failed init
    Lost,
}

/// BME680 on the I2C bus, measured in forced mode once per cycle.
pub struct Bme680Sensor<I2C, D> {
    state: State<I2C, D>,
    delay: D,
    address: I2CAddress,
}

impl<I2C, D> Bme680Sensor<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, address: I2CAddress) -> Self {
        Self {
            state: State::Uninitialized(i2c),
            delay,
            address,
        }
    }
}

impl<I2C, D> EnvironmentSensor for Bme680Sensor<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    async fn init(&mut self) -> Result<(), SensorError> {
        let i2c = match core::mem::replace(&mut self.state, State::Lost) {
            State::Uninitialized(i2c) => i2c,
            ready @ State::Ready(_) => {
                self.state = ready;
                return Ok(());
            }
            State::Lost => {
                return Err(SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "bus lost by an earlier init",
                });
            }
        };

        let mut dev = Bme680::init(i2c, &mut self.delay, self.address).map_err(|e| {
            error!("BME680 init failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "no chip id",
            }
        })?;

        let settings = SettingsBuilder::new()
            .with_humidity_oversampling(OversamplingSetting::OS2x)
            .with_pressure_oversampling(OversamplingSetting::OS4x)
            .with_temperature_oversampling(OversamplingSetting::OS8x)
            .with_temperature_filter(IIRFilterSize::Size3)
            .with_gas_measurement(HEATER_DURATION, HEATER_TEMP_C, AMBIENT_TEMP_C)
            .with_run_gas(true)
            .build();

        let configured = dev.set_sensor_settings(&mut self.delay, settings);
        // Keep the driver even if configuration failed; the next init retries it
        self.state = State::Ready(dev);
        configured.map_err(|e| {
            error!("BME680 configuration failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "settings rejected",
            }
        })
    }

    async fn measure(&mut self) -> Result<Measurement, SensorError> {
        let State::Ready(dev) = &mut self.state else {
            return Err(SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "perform reading",
                details: "not initialized",
            });
        };

        dev.set_sensor_mode(&mut self.delay, PowerMode::ForcedMode)
            .map_err(|e| {
                error!("BME680 mode change failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "start measurement",
                    details: "i2c",
                }
            })?;

        let (data, condition) = dev.get_sensor_data(&mut self.delay).map_err(|e| {
            error!("BME680 read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "perform reading",
                details: "i2c",
            }
        })?;

        if matches!(condition, FieldDataCondition::Unchanged) {
            return Err(SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "perform reading",
                details: "no new data",
            });
        }

        debug!(
            "BME680 raw: {:.2} C {:.2} % {:.2} hPa {} Ohm",
            data.temperature_celsius(),
            data.humidity_percent(),
            data.pressure_hpa(),
            data.gas_resistance_ohm()
        );
        Ok(Measurement {
            temperature_celsius: data.temperature_celsius(),
            humidity_percent: data.humidity_percent(),
            // The driver reports hPa; the probe carries pascal
            pressure_pa: data.pressure_hpa() * 100.0,
            gas_resistance_ohm: data.gas_resistance_ohm() as f32,
        })
    }
}
