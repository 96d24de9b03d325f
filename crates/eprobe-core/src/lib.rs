//! Hardware-independent core library for eprobe
//!
//! This crate contains the measurement-cycle orchestrator of the eprobe
//! environmental monitoring device together with the components it drives:
//! sensor acquisition, e-paper presentation, persistent CSV logging, telemetry
//! publication, connectivity management and wall-clock handling.
//!
//! Every piece of hardware is reached through a narrow trait so the whole
//! cycle runs on embedded targets (ESP32) and on desktop hosts (simulator and
//! tests) alike. It is `#![no_std]` with `extern crate alloc`.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod connectivity;
pub mod display;
pub mod heartbeat;
pub mod orchestrator;
pub mod power;
pub mod retained;
pub mod sensors;
pub mod storage;
pub mod telemetry;
pub mod time;

#[cfg(test)]
pub(crate) mod mock;

pub use app_state::{Board, ProbeError, ProbeHardware};
pub use config::ProbeConfig;
pub use orchestrator::{CycleReport, CycleState, Probe};
