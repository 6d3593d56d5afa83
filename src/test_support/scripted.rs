//! In-memory [`Transport`] with caller-chosen chunk boundaries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::FetchError;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// One scripted body event.
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(Vec<u8>),
    Delay(Duration),
    Fail(&'static str),
}

/// Replays the same response for every request and records what was sent.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    status: u16,
    headers: HeaderMap,
    steps: Vec<Step>,
    pub requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            steps: Vec::new(),
            requests: Arc::default(),
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn chunk(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Chunk(bytes.into()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(Step::Delay(delay));
        self
    }

    pub fn fail(mut self, message: &'static str) -> Self {
        self.steps.push(Step::Fail(message));
        self
    }

    #[allow(clippy::unwrap_used)]
    pub fn sent(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FetchError> {
        let url = request.url.to_string();
        #[allow(clippy::unwrap_used)]
        self.requests.lock().unwrap().push(request);

        let body = futures_util::stream::iter(self.steps.clone())
            .filter_map(move |step| {
                let url = url.clone();
                async move {
                    match step {
                        Step::Chunk(bytes) => Some(Ok(bytes)),
                        Step::Delay(delay) => {
                            tokio::time::sleep(delay).await;
                            None
                        }
                        Step::Fail(message) => Some(Err(FetchError::network(
                            url,
                            std::io::Error::new(std::io::ErrorKind::ConnectionReset, message),
                        ))),
                    }
                }
            })
            .boxed();

        Ok(TransportResponse {
            status: self.status,
            headers: self.headers.clone(),
            body,
        })
    }
}
