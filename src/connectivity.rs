use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::time;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

/// Diagnostic identity reported by the radio once associated.
#[derive(Debug, Clone)]
pub struct LinkIdentity {
    pub ip: String,
    pub mac: String,
}

/// Narrow seam over the platform's Wi-Fi association primitives.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// One association attempt, blocking until the radio reports a result.
    async fn associate(&mut self) -> Result<LinkIdentity>;
    /// Blocks until the radio reports disassociated.
    async fn disassociate(&mut self) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("radio failed to associate after {attempts} attempts")]
    AssociateExhausted { attempts: u32 },
    #[error("radio error: {0}")]
    Radio(#[from] anyhow::Error),
}

/// Owns the radio and tracks link state so that `up`/`down` are idempotent
/// and every network operation has a single gate to consult.
pub struct ConnectivityManager<R: Radio> {
    radio: R,
    state: LinkState,
    max_attempts: u32,
    retry_interval: Duration,
}

impl<R: Radio> ConnectivityManager<R> {
    pub fn new(radio: R, max_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            radio,
            state: LinkState::Down,
            max_attempts,
            retry_interval,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Brings the link up, retrying association up to the configured attempt
    /// budget with a log line per attempt. No-op when already up.
    pub async fn up(&mut self) -> Result<(), LinkError> {
        if self.state == LinkState::Up {
            return Ok(());
        }
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.radio.associate().await {
                Ok(identity) => {
                    self.state = LinkState::Up;
                    info!(ip = %identity.ip, mac = %identity.mac, "link up");
                    return Ok(());
                }
                Err(e) => {
                    if attempts >= self.max_attempts {
                        return Err(LinkError::AssociateExhausted { attempts });
                    }
                    warn!(attempt = attempts, error = %e, "association failed, retrying");
                    time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Brings the link down. No-op when already down.
    pub async fn down(&mut self) -> Result<(), LinkError> {
        if self.state == LinkState::Down {
            return Ok(());
        }
        self.radio.disassociate().await?;
        self.state = LinkState::Down;
        info!("link down");
        Ok(())
    }
}
