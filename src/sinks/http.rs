use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::display::{DisplaySink, PublishError};

/// POSTs the raw label text to `<base_url>/<indicator id>`.
pub struct HttpSink {
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(base_url: &str, indicator_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpSink {
            url: format!("{}/{}", base_url.trim_end_matches('/'), indicator_id),
            client,
        })
    }

    /// Sink posting to a display host on this machine.
    pub fn localhost(port: u16, indicator_id: &str, timeout: Duration) -> Result<Self> {
        Self::new(&format!("http://localhost:{port}"), indicator_id, timeout)
    }
}

#[async_trait]
impl DisplaySink for HttpSink {
    #[instrument(name = "HttpPublish", skip(self), fields(url = %self.url))]
    async fn publish(&self, label: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(label.to_string())
            .send()
            .await
            .map_err(|e| PublishError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected(format!("HTTP {status}")));
        }
        debug!("Label published");
        Ok(())
    }
}
