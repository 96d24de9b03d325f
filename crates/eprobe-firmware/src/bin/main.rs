#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::cell::RefCell;

use bme680::I2CAddress;
use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_bus::spi::RefCellDevice;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay as BusyDelay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{error, info};
use rtt_target::rprintln;
use static_cell::StaticCell;

use eprobe_core::{Probe, ProbeConfig, ProbeHardware};
use eprobe_firmware::adafruit_io::AdafruitIoSession;
use eprobe_firmware::board::{self, EspBoard, SpiBus};
use eprobe_firmware::epaper::EpdPanel;
use eprobe_firmware::power::{EspPower, RtcClock, RtcSlot};
use eprobe_firmware::sensor::Bme680Sensor;
use eprobe_firmware::sntp::SntpClient;
use eprobe_firmware::wifi::EspWifiLink;
use eprobe_firmware::wifi_secrets::{AIO_KEY, AIO_USERNAME, WIFI_PASSWORD, WIFI_SSID};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static SPI_BUS: StaticCell<RefCell<SpiBus>> = StaticCell::new();
static RTC: StaticCell<RefCell<Rtc<'static>>> = StaticCell::new();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let probe_config = if cfg!(feature = "panel-1in54") {
        ProbeConfig::low_power()
    } else {
        ProbeConfig::default()
    };

    // Radio and network stack
    let radio_init = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).ok();

    // RTC: wall clock, light sleep
    let rtc = RTC.init(RefCell::new(Rtc::new(peripherals.LPWR)));
    let clock = RtcClock::new(rtc);

    // Shared SPI bus: e-paper panel and SD card
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(4))
            .with_mode(Mode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO18)
    .with_mosi(peripherals.GPIO23)
    .with_miso(peripherals.GPIO19);
    let spi_bus = SPI_BUS.init(RefCell::new(spi));

    let epd_cs = Output::new(peripherals.GPIO32, Level::High, OutputConfig::default());
    let epd_dc = Output::new(peripherals.GPIO17, Level::Low, OutputConfig::default());
    let epd_rst = Output::new(peripherals.GPIO16, Level::High, OutputConfig::default());
    let epd_busy = Input::new(peripherals.GPIO4, InputConfig::default());
    let epd_spi = RefCellDevice::new(spi_bus, epd_cs, BusyDelay::new()).unwrap();
    let panel = EpdPanel::new(epd_spi, epd_busy, epd_dc, epd_rst, BusyDelay::new());

    let sd_cs = Output::new(peripherals.GPIO13, Level::High, OutputConfig::default());
    let sd_spi = RefCellDevice::new(spi_bus, sd_cs, BusyDelay::new()).unwrap();
    let storage = board::sd_storage(sd_spi, clock, probe_config.time.zone);

    // BME680 on I2C0
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .unwrap()
    .with_sda(peripherals.GPIO21)
    .with_scl(peripherals.GPIO22);
    let sensor = Bme680Sensor::new(i2c, BusyDelay::new(), I2CAddress::Secondary);

    let status_pin = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());

    let hardware = ProbeHardware::<EspBoard> {
        sensor,
        panel,
        storage,
        link: EspWifiLink::new(wifi_controller, stack, WIFI_SSID, WIFI_PASSWORD),
        session: AdafruitIoSession::new(stack, AIO_USERNAME, AIO_KEY),
        clock,
        time_sync: SntpClient::new(stack),
        power: EspPower::new(rtc),
        slot: RtcSlot::take().expect("retained slot taken twice"),
        status_pin,
        delay: Delay,
    };

    let mut probe = Probe::new(hardware, probe_config);

    let error = match probe.start().await {
        Ok(()) => match probe.run().await {
            Ok(never) => match never {},
            Err(e) => e,
        },
        Err(e) => e,
    };

    // Nothing useful can run without the display; park the core
    error!("Probe stopped: {}", error);
    rprintln!("Halted after {} cycles", probe.cycle_count());
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
