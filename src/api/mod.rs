//! Transport collaborator.
//!
//! The cache never decides what counts as a network failure; it only sees the
//! `Result` a [`Transport`] hands back. Paths are relative to the API base URL and
//! bodies are JSON values matching the entity shapes.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::TransportError;

/// REST-ish JSON client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, TransportError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    async fn delete(&self, path: &str) -> Result<(), TransportError>;
}
