//! Host stand-ins for the node's hardware so the pipeline can run as a
//! virtual device: a radio that always associates, a battery pack around
//! 3.7 V, and a hall sensor task that trips at irregular intervals.

use std::time::Duration;

use anyhow::Result;
use tokio::time;
use tracing::{debug, info};

use crate::battery::Adc;
use crate::buffer::EventBuffer;
use crate::clock::Clock;
use crate::connectivity::{LinkIdentity, Radio};

pub struct SimulatedRadio {
    ssid: String,
    mac: String,
}

impl SimulatedRadio {
    pub fn new(ssid: &str, _password: &str) -> Self {
        let bytes: [u8; 6] = rand::random();
        let mac = bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":");
        Self {
            ssid: ssid.to_string(),
            mac,
        }
    }
}

impl Radio for SimulatedRadio {
    async fn associate(&mut self) -> Result<LinkIdentity> {
        time::sleep(Duration::from_millis(200)).await;
        debug!(ssid = %self.ssid, "radio associated");
        Ok(LinkIdentity {
            ip: "127.0.0.1".to_string(),
            mac: self.mac.clone(),
        })
    }

    async fn disassociate(&mut self) -> Result<()> {
        time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

pub struct SimulatedAdc;

impl Adc for SimulatedAdc {
    fn read_raw(&mut self) -> u16 {
        // Jitter around the counts of a healthy ~3.7 V pack.
        500 + (rand::random::<f32>() * 30.0) as u16
    }
}

/// Spawns the capture side: a task standing in for the hall-sensor
/// interrupt, appending a timestamp to the shared buffer at each trip.
pub fn spawn_tip_sensor(
    buffer: EventBuffer,
    clock: impl Clock + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = 20.0 + rand::random::<f32>() * 160.0;
            time::sleep(Duration::from_secs_f32(wait)).await;
            let epoch = clock.now();
            buffer.capture(epoch);
            info!(epoch, "tip detected");
        }
    })
}
