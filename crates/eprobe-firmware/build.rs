//! Compiles the network credentials from `.env` into the firmware.

const SECRETS: [&str; 4] = ["WIFI_SSID", "WIFI_PASSWORD", "AIO_USERNAME", "AIO_KEY"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in SECRETS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=No .env file loaded ({e}), see .env.example");
    }

    for key in SECRETS {
        let value = std::env::var(key).unwrap_or_else(|_| {
            println!("cargo:warning={key} is not set, the probe will run offline");
            String::new()
        });
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
