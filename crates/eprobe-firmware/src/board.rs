//! Concrete hardware of the ESP32 probe

use embassy_time::Delay;
use embedded_hal_bus::spi::RefCellDevice;
use embedded_sdmmc::SdCard;
use esp_hal::Blocking;
use esp_hal::delay::Delay as BusyDelay;
use esp_hal::gpio::{Input, Output};
use esp_hal::i2c::master::I2c;
use esp_hal::spi::master::Spi;

use eprobe_core::Board;
use eprobe_core::storage::sd_card::SdCardLogStorage;
use eprobe_core::time::{ClockTimeSource, TimeZoneRule};

use crate::adafruit_io::AdafruitIoSession;
use crate::epaper::EpdPanel;
use crate::power::{EspPower, RtcClock, RtcSlot};
use crate::sensor::Bme680Sensor;
use crate::sntp::SntpClient;
use crate::wifi::EspWifiLink;

/// SPI bus shared by the e-paper panel and the SD card
pub type SpiBus = Spi<'static, Blocking>;
pub type SharedSpi = RefCellDevice<'static, SpiBus, Output<'static>, BusyDelay>;

#[cfg(not(feature = "panel-1in54"))]
pub type Controller = epd_waveshare::epd2in13_v2::Epd2in13<
    SharedSpi,
    Input<'static>,
    Output<'static>,
    Output<'static>,
    BusyDelay,
>;
#[cfg(feature = "panel-1in54")]
pub type Controller = epd_waveshare::epd1in54_v2::Epd1in54<
    SharedSpi,
    Input<'static>,
    Output<'static>,
    Output<'static>,
    BusyDelay,
>;

pub type Panel =
    EpdPanel<Controller, SharedSpi, Input<'static>, Output<'static>, Output<'static>, BusyDelay>;
pub type Storage = SdCardLogStorage<SharedSpi, BusyDelay, ClockTimeSource<RtcClock>>;
pub type Sensor = Bme680Sensor<I2c<'static, Blocking>, BusyDelay>;

pub struct EspBoard;

impl Board for EspBoard {
    type Sensor = Sensor;
    type Panel = Panel;
    type Storage = Storage;
    type Link = EspWifiLink;
    type Session = AdafruitIoSession;
    type Clock = RtcClock;
    type TimeSync = SntpClient;
    type Power = EspPower;
    type Slot = RtcSlot;
    type StatusPin = Output<'static>;
    type Delay = Delay;
}

/// Wrap an SD card on the shared bus with the RTC as its time source.
pub fn sd_storage(spi: SharedSpi, clock: RtcClock, zone: TimeZoneRule) -> Storage {
    SdCardLogStorage::new(SdCard::new(spi, BusyDelay::new()), ClockTimeSource::new(clock, zone))
}
