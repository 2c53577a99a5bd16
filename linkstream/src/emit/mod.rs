use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub mod http;

pub use http::HttpSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("graph endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Somewhere a batch payload can go. The dispatcher only needs a
/// success/failure outcome per send; retry policy lives above this trait.
#[async_trait]
pub trait GraphSink: Send + Sync {
    async fn send(&self, payload: &str) -> Result<u16, SinkError>;
}

/// Print-only mode: the payload goes to stdout instead of the network and
/// every send succeeds.
pub struct PrintSink;

#[async_trait]
impl GraphSink for PrintSink {
    async fn send(&self, payload: &str) -> Result<u16, SinkError> {
        info!("print sink, {} bytes", payload.len());
        print!("{payload}");
        Ok(200)
    }
}
