use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header;

use super::{GraphSink, SinkError};

const API_KEY_HEADER: &str = "X-API-Key";

/// Synchronous-per-batch POST to a Gephi graph-streaming master endpoint:
/// `{base}/?operation=updateGraph` with the concatenated batch lines as body.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(base_url: &str, timeout: Duration, api_key: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = header::HeaderValue::from_str(key)
                .context("api key is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to construct http client for graph sink")?;

        Ok(Self {
            client,
            endpoint: format!("{}/?operation=updateGraph", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint_for(host: &str, port: u16) -> String {
        format!("http://{host}:{port}")
    }
}

#[async_trait]
impl GraphSink for HttpSink {
    async fn send(&self, payload: &str) -> Result<u16, SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(status.as_u16())
    }
}
