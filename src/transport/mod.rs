//! Connection to the optimization backend.
//!
//! [`Transport`] is the seam between the session controller and the
//! network: [`HttpTransport`] talks to the real backend, tests substitute
//! scripted implementations.

mod http;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::params::RunRequest;
use crate::scenario::ProblemDescriptor;

pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The caller's cancellation token fired. Not a failure.
    #[error("Request cancelled")]
    Cancelled,

    /// Non-success HTTP status. `message` is the server's error text or
    /// `HTTP Error <status>`.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Network(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Incremental reader over a streamed response body.
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk of raw bytes, `Ok(None)` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET /get_problems`.
    async fn list_problems(&self) -> Result<Vec<ProblemDescriptor>, TransportError>;

    /// `POST /run_optimization`. Resolves once response headers arrive;
    /// the body is read through the returned [`ChunkSource`].
    async fn run_optimization(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ChunkSource>, TransportError>;
}
