use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time;
use tracing::info;

/// Wall-clock time source, seeded by the platform's network time sync.
pub trait Clock {
    /// Current epoch in whole seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Anything below this is an unsynchronized clock still counting from its
/// power-on reset, not a real date.
const SANE_EPOCH_FLOOR: i64 = 8 * 3600 * 2;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("clock never reached a sane epoch after {attempts} polls")]
    NeverSane { attempts: u32 },
}

/// Polls the clock until network time sync has pushed it past the sane
/// floor. An unsynchronized clock would corrupt every event timestamp, so
/// exhausting the attempt budget is fatal to the caller.
pub async fn wait_for_sane_epoch(
    clock: &impl Clock,
    max_attempts: u32,
    poll_interval: Duration,
) -> Result<(), ClockError> {
    let mut attempts = 0;
    loop {
        let now = clock.now();
        if now >= SANE_EPOCH_FLOOR {
            info!(epoch = now, "clock synchronized");
            return Ok(());
        }
        attempts += 1;
        if attempts >= max_attempts {
            return Err(ClockError::NeverSane { attempts });
        }
        info!(epoch = now, attempt = attempts, "waiting for time sync");
        time::sleep(poll_interval).await;
    }
}
