//! Destination Sink Trait
//!
//! Uniform outbound port for every downstream destination: post one JSON
//! document to one URL and report success or a classified failure.
//!
//! Adapters only shape payloads; the sink owns transport concerns such as
//! the bounded timeout. Tests substitute an in-process sink.

use async_trait::async_trait;

use crate::domain::errors::DestinationError;

#[async_trait]
pub trait DestinationSink: Send + Sync {
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<(), DestinationError>;
}
