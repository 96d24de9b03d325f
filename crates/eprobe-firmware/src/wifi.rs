//! WiFi station binding of [`WirelessLink`]

use alloc::string::String;

use embassy_net::Stack;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiError, WifiStaState};
use log::{info, warn};

use eprobe_core::connectivity::{LinkStatus, WirelessLink};

/// Station interface of the esp-radio WiFi driver.
///
/// The link only reports [`LinkStatus::Connected`] once DHCP configured the
/// network stack, so the session never starts on an address-less interface.
pub struct EspWifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    ssid: &'static str,
    password: &'static str,
    /// Set when the last association attempt was rejected
    failed: bool,
}

impl EspWifiLink {
    pub fn new(
        controller: WifiController<'static>,
        stack: Stack<'static>,
        ssid: &'static str,
        password: &'static str,
    ) -> Self {
        Self {
            controller,
            stack,
            ssid,
            password,
            failed: false,
        }
    }

    pub fn stack(&self) -> Stack<'static> {
        self.stack
    }
}

impl WirelessLink for EspWifiLink {
    type Error = WifiError;

    async fn begin(&mut self) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            warn!("No WiFi SSID configured");
            self.failed = true;
            return Ok(());
        }

        if !matches!(self.controller.is_started(), Ok(true)) {
            let client = ClientConfig::default()
                .with_ssid(String::from(self.ssid))
                .with_password(String::from(self.password));
            self.controller.set_config(&ModeConfig::Client(client))?;
            self.controller.start_async().await?;
            info!("WiFi started");
        }

        info!("Connecting to {}", self.ssid);
        match self.controller.connect_async().await {
            Ok(()) => self.failed = false,
            Err(e) => {
                warn!("WiFi association failed: {:?}", e);
                self.failed = true;
            }
        }
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match esp_radio::wifi::sta_state() {
            WifiStaState::Connected if self.stack.is_config_up() => LinkStatus::Connected,
            WifiStaState::Connected => LinkStatus::Idle,
            WifiStaState::Disconnected if self.failed => LinkStatus::ConnectFailed,
            WifiStaState::Disconnected => LinkStatus::ConnectionLost,
            WifiStaState::Stopped => LinkStatus::Disconnected,
            _ if self.failed => LinkStatus::NoNetworkFound,
            _ => LinkStatus::Idle,
        }
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.controller.disconnect_async().await {
            warn!("WiFi disconnect failed: {:?}", e);
        }
    }
}
