use anyhow::Result;
use std::env;
use uuid::Uuid;

use crate::battery::VoltCalibration;

#[derive(Debug, Clone)]
pub struct Config {
    pub device_name: String,
    pub base_api_url: String,
    pub iot_name: String,
    pub iot_password: String,
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub tick_secs: u64,
    pub cycle_modulus: u32,
    pub volt_calibration: VoltCalibration,
    pub wifi_max_attempts: u32,
    pub clock_sync_max_attempts: u32,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let device_name =
            env::var("DEVICE_NAME").unwrap_or_else(|_| format!("tipnode-{}", Uuid::new_v4()));
        let base_api_url =
            env::var("BASE_API_URL").unwrap_or_else(|_| "https://localhost:8443".to_string());
        let iot_name = env::var("IOT_NAME").unwrap_or_default();
        let iot_password = env::var("IOT_PASSWORD").unwrap_or_default();
        let wifi_ssid = env::var("WIFI_SSID").unwrap_or_default();
        let wifi_password = env::var("WIFI_PASSWORD").unwrap_or_default();

        let tick_secs = get_env_var_u64("TICK_SECS", 60);
        let cycle_modulus = get_env_var_u64("CYCLE_MODULUS", 5) as u32;
        let volt_calibration =
            VoltCalibration(get_env_var_f64("VOLT_CALIBRATION", VoltCalibration::default().0));
        let wifi_max_attempts = get_env_var_u64("WIFI_MAX_ATTEMPTS", 30) as u32;
        let clock_sync_max_attempts = get_env_var_u64("CLOCK_SYNC_MAX_ATTEMPTS", 100) as u32;
        let http_timeout_secs = get_env_var_u64("HTTP_TIMEOUT_SECS", 15);

        Ok(Config {
            device_name,
            base_api_url,
            iot_name,
            iot_password,
            wifi_ssid,
            wifi_password,
            tick_secs,
            cycle_modulus,
            volt_calibration,
            wifi_max_attempts,
            clock_sync_max_attempts,
            http_timeout_secs,
        })
    }
}

fn get_env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

fn get_env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}
