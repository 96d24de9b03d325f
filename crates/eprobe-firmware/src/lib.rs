//! ESP32 firmware-specific modules for eprobe
//!
//! This crate contains the hardware adapters that cannot compile on desktop
//! targets: the BME680 driver binding, the Waveshare e-paper panel on the
//! shared SPI bus, the esp-radio WiFi station, the Adafruit IO HTTP session,
//! SNTP over embassy-net, RTC light sleep and the retained RTC memory slot.

#![no_std]

extern crate alloc;

pub mod adafruit_io;
pub mod board;
pub mod epaper;
pub mod power;
pub mod sensor;
pub mod sntp;
pub mod wifi;
pub mod wifi_secrets;
