//! Credentials baked in at build time from `.env` (see `build.rs`)

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const AIO_USERNAME: &str = env!("AIO_USERNAME");
pub const AIO_KEY: &str = env!("AIO_KEY");
