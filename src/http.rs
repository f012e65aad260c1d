//! Asynchronous web fetch.

use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancellationSignal;
use crate::error::{Error, Result};

/// Thin wrapper over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct WebClient {
    client: reqwest::Client,
}

impl WebClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskweave/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text.
    ///
    /// A non-success status fails with [`Error::Http`] whose message starts
    /// with the status, e.g. `"404 (Not Found)"`.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url, "fetching");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            warn!(url, status = status.as_u16(), "request failed");
            return Err(Error::Http(format!(
                "{} ({reason}) fetching {url}",
                status.as_u16()
            )));
        }
        Ok(response.text().await?)
    }

    /// [`fetch_text`](Self::fetch_text) between two checkpoints of `signal`.
    pub async fn fetch_text_cancellable(
        &self,
        url: &str,
        signal: &CancellationSignal,
    ) -> Result<String> {
        signal.guard(self.fetch_text(url)).await
    }
}
