//! Transport capability: send a request, get back status, headers and a
//! chunk stream.
//!
//! The client never talks to reqwest directly. [`ReqwestTransport`] is the
//! production implementation; tests substitute a scripted one to control
//! chunk boundaries and timing.

use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Method;
use reqwest::header::HeaderMap;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::FetchError;

/// Response body as it arrives off the wire.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, FetchError>> + Send>>;

/// A fully prepared request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Headers to send as-is.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

/// Status line, headers and the still-unread body.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body chunks in arrival order.
    pub body: ChunkStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs HTTP exchanges for the client.
///
/// This trait uses `async_trait` so the client can hold a `dyn Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns once the response headers are in.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FetchError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// reqwest's own decompression is not enabled; bodies arrive exactly as
/// sent.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds the underlying client from `config`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend or system
    /// configuration cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

fn map_reqwest_error(url: &str, started: Instant, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url, started.elapsed())
    } else {
        FetchError::network(url, error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FetchError> {
        let url = request.url.to_string();
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, started, e))?;

        let status = response.status().as_u16();
        debug!(status, "response headers received");

        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| map_reqwest_error(&url, started, e))
            })
            .boxed();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
