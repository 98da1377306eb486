use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::net::Transport;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: bool,
}

#[derive(Deserialize)]
struct SignInResponse {
    data: SignInData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInData {
    access_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sign-in transport error: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("sign-in rejected with status {status}")]
    Rejected { status: u16 },
    #[error("sign-in response was not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("sign-in response carried no access token")]
    MissingToken,
}

/// Cached bearer credential. An absent token blocks every upload; a present
/// one is reused until a later successful sign-in replaces it — expiry is
/// never inspected client-side, the server's rejection is the signal.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// One sign-in exchange. A structurally valid response with a string
    /// access token replaces the cached one; every other outcome leaves the
    /// prior token untouched and reports the failure.
    pub async fn sign_in<T: Transport>(
        &mut self,
        transport: &T,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), AuthError> {
        let request = SignInRequest {
            username,
            password,
            remember_me,
        };
        let response = transport.post_json("/iam/signin", &request, None).await?;
        if !response.is_success() {
            warn!(status = response.status, body = %response.body, "sign-in rejected");
            return Err(AuthError::Rejected {
                status: response.status,
            });
        }
        let parsed: SignInResponse = serde_json::from_str(&response.body)?;
        match parsed.data.access_token {
            Some(token) => {
                self.token = Some(token);
                info!("sign-in succeeded");
                Ok(())
            }
            None => Err(AuthError::MissingToken),
        }
    }
}
