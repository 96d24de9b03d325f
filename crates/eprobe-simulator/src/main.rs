//! Desktop simulator for the eprobe measurement cycle.
//!
//! Runs the unmodified `eprobe-core` probe against simulated hardware and
//! shows the e-paper dashboard in an SDL2 window via
//! `embedded-graphics-simulator`.
//!
//! Run `eprobe-simulator --help` for the flags.

mod board;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use embassy_futures::block_on;
use embassy_time::Duration;
use log::{error, info};

use eprobe_core::{Probe, ProbeConfig, ProbeHardware};

use board::{
    FileStorage, LogPin, RamSlot, SimBoard, SimLink, SimPanel, SimPower, SimSensor, SimSession,
    SimTimeSync, StdDelay, SystemClock,
};

/// Cycle period of the simulation; the device default is far too slow to watch
const SIM_CYCLE_PERIOD: Duration = Duration::from_secs(5);

/// Run the eprobe measurement cycle against simulated hardware
#[derive(Parser, Debug)]
#[command(name = "eprobe-simulator", version, about)]
struct Options {
    /// Stop after N cycles (default: run until the window closes)
    #[arg(long, value_name = "N")]
    cycles: Option<u32>,

    /// Network never comes up
    #[arg(long)]
    offline: bool,

    /// Low-power variant: square layout, light sleep between cycles
    #[arg(long)]
    sleep: bool,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Directory `datalog.csv` is written to
    #[arg(long, value_name = "DIR", default_value = "sim-data")]
    log_dir: PathBuf,
}

fn main() {
    env_logger::init();

    let options = Options::parse();

    let base = if options.sleep {
        ProbeConfig::low_power()
    } else {
        ProbeConfig::default()
    };
    let config = ProbeConfig {
        cycle_period: SIM_CYCLE_PERIOD,
        ..base
    };

    info!("Starting eprobe simulator");
    info!(
        "Layout {:?}, cycle period {} s, network {}",
        config.display_layout,
        config.cycle_period.as_secs(),
        if options.offline { "off" } else { "on" }
    );

    let max_cycles = options.cycles;
    let quit = Rc::new(Cell::new(false));
    let hardware = ProbeHardware::<SimBoard> {
        sensor: SimSensor::new(),
        panel: SimPanel::new(config.display_layout.size(), options.headless, quit.clone()),
        storage: FileStorage::new(options.log_dir),
        link: SimLink::new(!options.offline),
        session: SimSession::default(),
        clock: SystemClock::default(),
        time_sync: SimTimeSync::default(),
        power: SimPower::new(),
        slot: RamSlot::new(),
        status_pin: LogPin,
        delay: StdDelay,
    };

    let mut probe = Probe::new(hardware, config);

    block_on(async {
        if let Err(e) = probe.start().await {
            error!("Startup failed: {}", e);
            return;
        }

        loop {
            if let Err(e) = probe.run_cycle().await {
                error!("Halting: {}", e);
                return;
            }
            if quit.get() || max_cycles.is_some_and(|n| probe.cycle_count() >= n) {
                return;
            }
            probe.wait_for_next_cycle().await;
        }
    });

    info!("Simulator exiting after {} cycles", probe.cycle_count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Options::command().debug_assert();
    }

    #[test]
    fn test_defaults_run_online_with_window() {
        let options = Options::try_parse_from(["eprobe-simulator"]).unwrap();
        assert_eq!(options.cycles, None);
        assert!(!options.offline && !options.sleep && !options.headless);
        assert_eq!(options.log_dir, PathBuf::from("sim-data"));
    }

    #[test]
    fn test_all_flags_are_parsed() {
        let options = Options::try_parse_from([
            "eprobe-simulator",
            "--cycles",
            "3",
            "--offline",
            "--sleep",
            "--headless",
            "--log-dir",
            "/tmp/probe",
        ])
        .unwrap();
        assert_eq!(options.cycles, Some(3));
        assert!(options.offline && options.sleep && options.headless);
        assert_eq!(options.log_dir, PathBuf::from("/tmp/probe"));
    }

    #[test]
    fn test_bad_cycle_count_is_rejected() {
        assert!(Options::try_parse_from(["eprobe-simulator", "--cycles", "many"]).is_err());
        assert!(Options::try_parse_from(["eprobe-simulator", "--bogus"]).is_err());
    }
}
