use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod battery;
mod buffer;
mod clock;
mod config;
mod connectivity;
mod net;
mod scheduler;
mod session;
mod simulate;
mod telemetry;

use buffer::EventBuffer;
use clock::SystemClock;
use config::Config;
use connectivity::ConnectivityManager;
use net::HttpTransport;
use session::Session;
use simulate::{SimulatedAdc, SimulatedRadio};
use telemetry::Uploader;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    info!(device = %config.device_name, api = %config.base_api_url, "node starting");

    let buffer = EventBuffer::new();
    let clock = SystemClock;
    let transport = HttpTransport::new(
        &config.base_api_url,
        Duration::from_secs(config.http_timeout_secs),
    )?;
    let radio = SimulatedRadio::new(&config.wifi_ssid, &config.wifi_password);
    let mut link =
        ConnectivityManager::new(radio, config.wifi_max_attempts, Duration::from_secs(1));

    // Events are stamped with wall-clock time, so the clock has to be sane
    // before capture starts. Failing to sync is fatal; the supervisor
    // restarts the process.
    link.up().await?;
    clock::wait_for_sane_epoch(
        &clock,
        config.clock_sync_max_attempts,
        Duration::from_secs(1),
    )
    .await?;
    link.down().await?;

    let _sensor = simulate::spawn_tip_sensor(buffer.clone(), clock);

    let mut session = Session::new();
    let mut uploader = Uploader::new(
        config.device_name.clone(),
        config.volt_calibration,
        SimulatedAdc,
        clock,
    );

    scheduler::run(
        &config,
        &mut link,
        &transport,
        &mut session,
        &mut uploader,
        &buffer,
    )
    .await;

    Ok(())
}
