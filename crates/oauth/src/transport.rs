use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    reqwest::Client,
};

use crate::request::{Method, RequestOptions};

/// Sends one HTTP request and returns the raw response body.
///
/// Implementations report connection failures, timeouts and non-2xx statuses
/// as errors; decoding and provider error detection happen in
/// [`crate::ApiClient`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<String>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<String> {
        let data = options.data.as_deref().unwrap_or_default();
        let mut req = match options.method.unwrap_or_default() {
            Method::Get => self.client.get(url).query(data),
            Method::Post => self.client.post(url).form(data),
        };
        if let Some(timeout) = options.timeout {
            req = req.timeout(timeout);
        }
        for (name, value) in options.headers.iter().flatten() {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{url} returned {status}: {body}"));
        }

        response
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))
    }
}
