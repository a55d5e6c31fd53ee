use crate::{
    config::UpstreamConfig,
    envelope::{FailedAttempt, parse_body},
    error::{AllCandidatesFailedSnafu, BuildHttpClientSnafu, Operation, SiswaResult, TransportError},
};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{Method, StatusCode},
};
use reqwest::{
    Client, Url,
    header::{ACCEPT, CONTENT_TYPE},
};
use secrecy::ExposeSecret;
use serde_json::Value;
use snafu::ResultExt;
use std::{fmt::Debug, sync::Arc};

/// A single upstream call, described before it is made.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub const fn new(method: Method, url: Url, body: Option<Value>) -> Self {
        Self { method, url, body }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn json(&self) -> Value {
        parse_body(&self.body)
    }
}

/// The only way the proxy talks to the outside world.
#[async_trait]
pub trait HttpTransport: Debug + Send + Sync {
    ///`Err` means no status came back at all, non-2xx statuses are still `Ok`
    async fn send(&self, request: &RequestDescriptor) -> Result<UpstreamResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: Arc<UpstreamConfig>,
}

impl ReqwestTransport {
    pub fn new(config: Arc<UpstreamConfig>) -> SiswaResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context(BuildHttpClientSnafu)?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<UpstreamResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(ACCEPT, "application/json");

        if let Some(token) = self.config.token() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(UpstreamResponse { status, body })
    }
}

/// Tries each candidate in order and returns the first 2xx response.
///
/// Candidates are never raced: the next one is only sent once the previous has failed. When
/// every candidate fails, the error carries one [`FailedAttempt`] per candidate.
pub async fn first_success(
    transport: &dyn HttpTransport,
    operation: Operation,
    candidates: &[RequestDescriptor],
) -> SiswaResult<UpstreamResponse> {
    let mut attempts = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        debug!(method = %candidate.method, url = %candidate.url, "Trying upstream endpoint");

        match transport.send(candidate).await {
            Ok(response) if response.status.is_success() => return Ok(response),
            Ok(response) => {
                let body = response.json();
                warn!(method = %candidate.method, url = %candidate.url, status = %response.status, ?body, "Upstream endpoint refused");
                attempts.push(FailedAttempt {
                    method: candidate.method.to_string(),
                    url: candidate.url.to_string(),
                    status: Some(response.status.as_u16()),
                    body,
                });
            }
            Err(e) => {
                warn!(method = %candidate.method, url = %candidate.url, ?e, "Upstream endpoint unreachable");
                attempts.push(FailedAttempt {
                    method: candidate.method.to_string(),
                    url: candidate.url.to_string(),
                    status: None,
                    body: Value::String(e.to_string()),
                });
            }
        }
    }

    AllCandidatesFailedSnafu {
        operation,
        attempts,
    }
    .fail()
}

#[cfg(test)]
pub mod testing {
    use super::{HttpTransport, RequestDescriptor, UpstreamResponse};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use axum::{
        body::Bytes,
        http::{Method, StatusCode},
    };
    use std::{io, sync::Mutex};

    #[derive(Debug)]
    enum Outcome {
        Respond(StatusCode, String),
        Unreachable,
    }

    #[derive(Debug)]
    struct Route {
        method: Method,
        url: String,
        outcome: Outcome,
    }

    /// In-memory upstream: answers scripted `(method, url)` pairs, 404s everything else and
    /// remembers every request it saw.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        routes: Vec<Route>,
        calls: Mutex<Vec<RequestDescriptor>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, method: Method, url: &str, status: u16, body: &str) -> Self {
            self.routes.push(Route {
                method,
                url: url.to_string(),
                outcome: Outcome::Respond(
                    StatusCode::from_u16(status).expect("scripted status must be valid"),
                    body.to_string(),
                ),
            });
            self
        }

        pub fn unreachable(mut self, method: Method, url: &str) -> Self {
            self.routes.push(Route {
                method,
                url: url.to_string(),
                outcome: Outcome::Unreachable,
            });
            self
        }

        pub fn calls(&self) -> Vec<RequestDescriptor> {
            self.calls.lock().expect("calls lock poisoned").clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(
            &self,
            request: &RequestDescriptor,
        ) -> Result<UpstreamResponse, TransportError> {
            self.calls
                .lock()
                .expect("calls lock poisoned")
                .push(request.clone());

            let route = self
                .routes
                .iter()
                .find(|route| route.method == request.method && route.url == request.url.as_str());

            match route.map(|route| &route.outcome) {
                Some(Outcome::Respond(status, body)) => Ok(UpstreamResponse {
                    status: *status,
                    body: Bytes::from(body.clone()),
                }),
                Some(Outcome::Unreachable) => Err(Box::new(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
                None => Ok(UpstreamResponse {
                    status: StatusCode::NOT_FOUND,
                    body: Bytes::from_static(b"Not Found"),
                }),
            }
        }
    }
}
