//! Measurement cycle
//!
//! [`Probe`] owns every component and runs one fixed, linear sequence per
//! cycle:
//!
//! ```text
//! ensure_connected → pump_events → acquire → render + log → publish → heartbeat
//! ```
//!
//! Each stage absorbs its own failures, so the sequence always runs to the
//! end and the heartbeat always pulses. Between cycles the probe either
//! delays or light-sleeps, depending on [`ProbeConfig::sleep_enabled`].

use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::app_state::{Board, ProbeError, ProbeHardware};
use crate::config::{ProbeConfig, as_delay_ms};
use crate::connectivity::{ConnectOutcome, ConnectionState, ConnectivityManager};
use crate::display::{DisplayPresenter, RefreshKind};
use crate::heartbeat::Heartbeat;
use crate::power::PowerControl;
use crate::retained::PersistedState;
use crate::sensors::{SensorReader, SensorSample};
use crate::storage::{LogRecord, PersistentLogger};
use crate::telemetry::{PublishResult, TelemetryPublisher};
use crate::time::{PATTERN_LOCALE, TimeService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Between cycles
    Idle,
    /// One cycle in progress
    Running,
}

/// What happened during one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub cycle: u32,
    pub sample: SensorSample,
    pub connection: ConnectionState,
    pub refresh: RefreshKind,
    pub logged: bool,
    pub published: PublishResult,
}

pub struct Probe<B: Board> {
    config: ProbeConfig,
    reader: SensorReader<B::Sensor>,
    display: DisplayPresenter<B::Panel>,
    logger: PersistentLogger<B::Storage>,
    connectivity: ConnectivityManager<B::Link, B::Session>,
    publisher: TelemetryPublisher,
    time: TimeService<B::Clock, B::TimeSync>,
    heartbeat: Heartbeat<B::StatusPin>,
    power: B::Power,
    slot: B::Slot,
    delay: B::Delay,
    persisted: PersistedState,
    cycle_state: CycleState,
}

impl<B: Board> Probe<B> {
    pub fn new(hw: ProbeHardware<B>, config: ProbeConfig) -> Self {
        Self {
            reader: SensorReader::new(hw.sensor),
            display: DisplayPresenter::new(
                hw.panel,
                config.display_layout,
                config.time.zone,
                config.refresh_period,
            ),
            logger: PersistentLogger::new(hw.storage, config.log_path),
            connectivity: ConnectivityManager::new(hw.link, hw.session, config.connect),
            publisher: TelemetryPublisher::new(),
            time: TimeService::new(hw.clock, hw.time_sync, config.time),
            heartbeat: Heartbeat::new(hw.status_pin, config.heartbeat_pulse),
            power: hw.power,
            slot: hw.slot,
            delay: hw.delay,
            persisted: PersistedState::default(),
            cycle_state: CycleState::Idle,
            config,
        }
    }

    /// Bring the probe up, reporting each step on the startup screen.
    ///
    /// Only a display failure is returned. A missing card, network or sensor
    /// is logged and the probe starts anyway.
    pub async fn start(&mut self) -> Result<(), ProbeError> {
        self.persisted = PersistedState::load(&self.slot);
        self.persisted.boot_count = self.persisted.boot_count.wrapping_add(1);
        if !self.config.sleep_enabled {
            self.persisted.cycle_count = 0;
        }
        self.persisted.store(&mut self.slot);
        info!("Boot number: {}", self.persisted.boot_count);
        info!("{}", self.power.wakeup_cause().describe());

        self.display.init().await?;
        self.display.show_startup().await?;

        self.display.show_status("SD").await?;
        self.logger.mount();

        self.display.show_status("WiFi").await?;
        self.connect().await;

        self.display.show_status("BME680").await?;
        if let Err(e) = self.reader.init().await {
            warn!("{}, samples will read zero until it answers", e);
        }

        self.display.show_status("Datalog").await?;
        self.heartbeat.set_idle();

        self.display.show_main_screen().await?;
        info!("Setup done");
        Ok(())
    }

    async fn connect(&mut self) -> ConnectOutcome {
        let outcome = self.connectivity.ensure_connected(&mut self.delay).await;
        if outcome == (ConnectOutcome::Connected { first: true }) {
            self.time.ensure_time_set(&mut self.delay).await;
        }
        outcome
    }

    /// Run one complete measurement cycle.
    ///
    /// A display failure does not cut the cycle short: the record is still
    /// logged and published and the heartbeat still pulses, then the error
    /// is returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ProbeError> {
        self.cycle_state = CycleState::Running;
        self.persisted.cycle_count = self.persisted.cycle_count.wrapping_add(1);
        let cycle = self.persisted.cycle_count;
        debug!("Cycle {} started", cycle);

        self.connect().await;
        let connection = self.connectivity.state();
        self.connectivity.pump_events().await;

        let sample = self.reader.acquire(self.time.now()).await;
        let timestamp = self.time.format(sample.timestamp, PATTERN_LOCALE);
        log_sample(cycle, &timestamp, &sample);

        let refresh = self.display.render_dashboard(&sample, cycle).await;
        if let Err(e) = &refresh {
            error!("Dashboard render failed: {}", e);
        }
        let logged = self.append_record(&timestamp, &sample);

        let published = self.publisher.publish(&mut self.connectivity, &sample).await;

        self.heartbeat.pulse(&mut self.delay).await;
        self.cycle_state = CycleState::Idle;
        debug!("Cycle {} done", cycle);

        Ok(CycleReport {
            cycle,
            sample,
            connection,
            refresh: refresh?,
            logged,
            published,
        })
    }

    fn append_record(&mut self, timestamp: &str, sample: &SensorSample) -> bool {
        match LogRecord::new(timestamp, sample) {
            Ok(record) => self.logger.append(&record),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Wait out the cycle period, in light sleep when enabled.
    ///
    /// The retained state is stored before sleeping so the cycle counter
    /// carries on if the chip resets instead of resuming. The link is taken
    /// down first; the next cycle reconnects.
    pub async fn wait_for_next_cycle(&mut self) {
        if self.config.sleep_enabled {
            self.persisted.store(&mut self.slot);
            self.connectivity.disconnect().await;
            info!(
                "Light sleep for {} s",
                self.config.cycle_period.as_secs()
            );
            self.power.light_sleep(self.config.cycle_period).await;
            info!("{}", self.power.wakeup_cause().describe());
        } else {
            self.delay
                .delay_ms(as_delay_ms(self.config.cycle_period))
                .await;
        }
    }

    /// Cycle forever. Returns only when the display fails.
    pub async fn run(&mut self) -> Result<Infallible, ProbeError> {
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Halting: {}", e);
                return Err(e);
            }
            self.wait_for_next_cycle().await;
        }
    }

    pub fn cycle_state(&self) -> CycleState {
        self.cycle_state
    }

    pub fn cycle_count(&self) -> u32 {
        self.persisted.cycle_count
    }

    pub fn persisted(&self) -> PersistedState {
        self.persisted
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &ConnectivityManager<B::Link, B::Session> {
        &self.connectivity
    }

    pub fn sensor_reader(&self) -> &SensorReader<B::Sensor> {
        &self.reader
    }

    pub fn display(&self) -> &DisplayPresenter<B::Panel> {
        &self.display
    }

    pub fn logger(&self) -> &PersistentLogger<B::Storage> {
        &self.logger
    }

    pub fn publisher(&self) -> &TelemetryPublisher {
        &self.publisher
    }

    pub fn heartbeat(&self) -> &Heartbeat<B::StatusPin> {
        &self.heartbeat
    }

    pub fn time(&self) -> &TimeService<B::Clock, B::TimeSync> {
        &self.time
    }
}

fn log_sample(cycle: u32, timestamp: &str, sample: &SensorSample) {
    if !sample.is_measured() {
        warn!("Sensor sample zeroed");
    }
    info!("---------------- cycle {} ----------------", cycle);
    info!("{}", timestamp);
    info!("Temperature     : {:.2} °C", sample.temperature);
    info!("Humidity        : {:.2} %", sample.humidity);
    info!("Pressure        : {:.2} hPa", sample.pressure_hpa());
    info!("Gas resistance  : {:.2} kOhm", sample.gas_resistance_kohm());
    info!("----------------------------------------");
}
