use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// Outcome of a request that reached the server. Non-2xx statuses are not
/// transport errors; callers decide what a rejection means.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Narrow seam over the HTTPS stack so the session and uploader can be
/// exercised against a fake in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<ApiResponse>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // The backend runs with a self-signed certificate; certificate
        // validation is deliberately disabled.
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%url, status, "POST complete");
        Ok(ApiResponse { status, body })
    }
}
