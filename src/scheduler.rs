use std::time::Duration;

use tokio::time;
use tracing::{debug, error, info, warn};

use crate::battery::Adc;
use crate::buffer::EventBuffer;
use crate::clock::Clock;
use crate::config::Config;
use crate::connectivity::{ConnectivityManager, Radio};
use crate::net::Transport;
use crate::session::Session;
use crate::telemetry::Uploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    ActiveCycle,
}

/// Decides, once per fixed tick, whether this tick is an active cycle.
/// A cycle runs when events are pending or the periodic counter reaches its
/// modulus, which keeps battery telemetry flowing even with zero events.
/// The counter is decoupled from real sleeping so ticks can be driven
/// directly in tests.
pub struct Scheduler {
    counter: u32,
    modulus: u32,
}

impl Scheduler {
    pub fn new(modulus: u32) -> Self {
        // Start at the modulus so the first tick after boot runs a full
        // cycle.
        Self {
            counter: modulus,
            modulus,
        }
    }

    pub fn tick(&mut self, events_pending: bool) -> TickAction {
        self.counter += 1;
        if events_pending || self.counter >= self.modulus {
            self.counter = 0;
            TickAction::ActiveCycle
        } else {
            TickAction::Idle
        }
    }
}

/// One active cycle: link up, sign in, upload with events included, link
/// back down to save the battery. Every failure is logged and the cycle
/// moves on; nothing below here is allowed to stop the loop.
pub async fn run_cycle<R: Radio, T: Transport, A: Adc, C: Clock>(
    config: &Config,
    link: &mut ConnectivityManager<R>,
    transport: &T,
    session: &mut Session,
    uploader: &mut Uploader<A, C>,
    buffer: &EventBuffer,
) {
    debug!(pending = buffer.len(), "cycle started");

    if let Err(e) = link.up().await {
        error!(error = %e, "cycle abandoned, link never came up");
        return;
    }

    if let Err(e) = session
        .sign_in(transport, &config.iot_name, &config.iot_password, false)
        .await
    {
        warn!(
            error = %e,
            cached_token = session.is_authenticated(),
            "sign-in failed"
        );
    }

    match uploader
        .upload_batch(transport, link.state(), session, buffer, true)
        .await
    {
        Ok(receipt) => info!(
            status = receipt.status,
            kpis = receipt.kpis_sent,
            cleared = receipt.events_cleared,
            "upload accepted"
        ),
        Err(e) => warn!(error = %e, "upload failed"),
    }

    if let Err(e) = link.down().await {
        warn!(error = %e, "link teardown failed");
    }
}

/// The main loop. Never returns; the tick period is the only granularity at
/// which the node does anything besides servicing the capture interrupt.
pub async fn run<R: Radio, T: Transport, A: Adc, C: Clock>(
    config: &Config,
    link: &mut ConnectivityManager<R>,
    transport: &T,
    session: &mut Session,
    uploader: &mut Uploader<A, C>,
    buffer: &EventBuffer,
) {
    let mut scheduler = Scheduler::new(config.cycle_modulus);
    let mut ticker = time::interval(Duration::from_secs(config.tick_secs));
    loop {
        ticker.tick().await;
        match scheduler.tick(!buffer.is_empty()) {
            TickAction::Idle => {}
            TickAction::ActiveCycle => {
                run_cycle(config, link, transport, session, uploader, buffer).await;
            }
        }
    }
}
