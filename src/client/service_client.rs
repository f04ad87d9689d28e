//! HTTP client for one destination service.
//!
//! Every call passes the circuit breaker gate, then runs a bounded retry loop:
//! 5xx responses, connection failures and timeouts are retried with
//! exponential backoff; 4xx responses and any other transport error end the
//! call immediately. The breaker hears about each logical call exactly once.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::client::request::{merge_headers, RequestOptions};
use crate::client::response::{error_detail, ResponseBody};
use crate::config::{CircuitBreakerConfig, ClientConfig};
use crate::error::{InterconnectError, Result, UnavailableReason};
use crate::observability::metrics;
use crate::resilience::retries::{classify_status, is_retryable_transport, AttemptClass};
use crate::resilience::{Admission, BreakerSettings, CircuitBreaker, FailurePolicy, RetryPolicy};

/// Construction-time settings for a [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Total timeout for one attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerSettings,
    pub failure_policy: FailurePolicy,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker: BreakerSettings::default(),
            failure_policy: FailurePolicy::default(),
            user_agent: "LMS-Service-Client/1.0".to_string(),
        }
    }
}

impl ClientSettings {
    pub fn from_config(client: &ClientConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            timeout: client.timeout(),
            retry: RetryPolicy::from(client),
            breaker: BreakerSettings::from(breaker),
            failure_policy: FailurePolicy::from(breaker),
            user_agent: client.user_agent.clone(),
        }
    }
}

/// How one attempt ended when the destination answered.
enum Attempt {
    Success(ResponseBody),
    ServerError(StatusCode),
    Rejected { status: StatusCode, detail: String },
}

/// How one attempt ended when the exchange itself failed.
enum TransportFailure {
    Retryable(String),
    Fatal(String),
}

impl TransportFailure {
    fn from_reqwest(err: &reqwest::Error) -> Self {
        if is_retryable_transport(err) {
            Self::Retryable(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

/// Outstanding half-open probe, released if the call is dropped before it
/// reports.
struct ProbeLease<'a> {
    breaker: &'a CircuitBreaker,
    id: u64,
}

impl Drop for ProbeLease<'_> {
    fn drop(&mut self) {
        self.breaker.release_probe(self.id);
    }
}

/// Client bound to one named destination, owning that destination's breaker.
#[derive(Debug)]
pub struct ServiceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    settings: ClientSettings,
    user_agent: HeaderValue,
    default_headers: HeaderMap,
    breaker: CircuitBreaker,
}

impl ServiceClient {
    /// Create a client for `name` at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` for an unparseable base URL and `Communication`
    /// if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, base_url: &str, settings: ClientSettings) -> Result<Self> {
        let name = name.into();

        Url::parse(base_url).map_err(|e| InterconnectError::InvalidUrl {
            service: name.clone(),
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

        let user_agent = HeaderValue::from_str(&settings.user_agent).map_err(|e| {
            InterconnectError::communication(&name, format!("invalid user agent: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                InterconnectError::communication(&name, format!("failed to build HTTP client: {e}"))
            })?;

        let breaker = CircuitBreaker::with_label(name.clone(), settings.breaker);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            name,
            http,
            settings,
            user_agent,
            default_headers: HeaderMap::new(),
            breaker,
        })
    }

    /// Headers sent with every request to this destination.
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Replace the default breaker. It is relabelled with this client's name.
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker.relabel(self.name.clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Full URL for a path relative to the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| InterconnectError::InvalidUrl {
            service: self.name.clone(),
            url: joined,
            message: e.to_string(),
        })
    }

    pub async fn get(&self, path: &str) -> Result<ResponseBody> {
        self.request(Method::GET, path, RequestOptions::new()).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseBody> {
        let options = query
            .iter()
            .fold(RequestOptions::new(), |options, (k, v)| options.query(*k, v));
        self.request(Method::GET, path, options).await
    }

    /// GET and deserialize the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path)
            .await?
            .into_typed()
            .map_err(|e| InterconnectError::communication(&self.name, format!("unexpected response shape: {e}")))
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(Method::POST, path, RequestOptions::new().json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(Method::PUT, path, RequestOptions::new().json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ResponseBody> {
        self.request(Method::PATCH, path, RequestOptions::new().json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ResponseBody> {
        self.request(Method::DELETE, path, RequestOptions::new()).await
    }

    /// Perform one logical call.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` when the circuit is open (nothing is sent) or
    ///   every attempt failed with a 5xx, a connection error or a timeout
    /// - `Rejected` for a 4xx, carrying the origin status and detail
    /// - `Communication` for any other transport failure or an undecodable body
    pub async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<ResponseBody> {
        let start = Instant::now();
        let url = self.url_for(path)?;

        let admission = self.breaker.attempt();
        if let Admission::Rejected { retry_after } = admission {
            tracing::warn!(
                service = %self.name,
                method = %method,
                path = %path,
                retry_after_ms = retry_after.as_millis() as u64,
                "Circuit open, failing fast"
            );
            metrics::record_call(&self.name, method.as_str(), "circuit_open", start);
            return Err(InterconnectError::unavailable(&self.name, UnavailableReason::CircuitOpen));
        }

        let _lease = match admission {
            Admission::Probe { id } => Some(ProbeLease {
                breaker: &self.breaker,
                id,
            }),
            _ => None,
        };

        let request_id = Uuid::new_v4().to_string();
        let request_id_value = HeaderValue::from_str(&request_id)
            .map_err(|e| InterconnectError::communication(&self.name, e.to_string()))?;
        let headers = merge_headers(&self.user_agent, &request_id_value, &self.default_headers, &options.headers);

        let span = tracing::info_span!(
            "service_call",
            service = %self.name,
            method = %method,
            path = %path,
            request_id = %request_id,
            probe = matches!(admission, Admission::Probe { .. })
        );

        let result = self
            .execute(&method, &url, &headers, &options)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(InterconnectError::Rejected { .. }) => "rejected",
            Err(InterconnectError::ServiceUnavailable { .. }) => "unavailable",
            Err(_) => "error",
        };
        metrics::record_call(&self.name, method.as_str(), outcome, start);
        result
    }

    async fn execute(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        options: &RequestOptions,
    ) -> Result<ResponseBody> {
        let retry = &self.settings.retry;
        let mut attempt: u32 = 0;

        loop {
            let (last_status, reason) = match self.send_once(method, url, headers, options).await {
                Ok(Attempt::Success(body)) => {
                    self.breaker.on_success();
                    tracing::debug!(attempt, "Request succeeded");
                    return Ok(body);
                }
                Ok(Attempt::Rejected { status, detail }) => {
                    if self.settings.failure_policy.counts_as_failure(status) {
                        self.breaker.on_failure();
                    } else {
                        self.breaker.on_success();
                    }
                    tracing::warn!(status = status.as_u16(), detail = %detail, "Request rejected");
                    return Err(InterconnectError::Rejected {
                        service: self.name.clone(),
                        status: status.as_u16(),
                        detail,
                    });
                }
                Ok(Attempt::ServerError(status)) => (Some(status.as_u16()), format!("status {status}")),
                Err(TransportFailure::Retryable(message)) => (None, message),
                Err(TransportFailure::Fatal(message)) => {
                    self.breaker.on_failure();
                    tracing::error!(error = %message, "Request failed");
                    return Err(InterconnectError::communication(&self.name, message));
                }
            };

            if retry.should_retry(attempt) {
                let delay = retry.delay_for(attempt);
                tracing::info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Retrying request"
                );
                metrics::record_retry(&self.name);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            self.breaker.on_failure();
            tracing::error!(attempts = attempt + 1, reason = %reason, "Retries exhausted");
            return Err(InterconnectError::unavailable(
                &self.name,
                UnavailableReason::RetriesExhausted {
                    attempts: attempt + 1,
                    last_status,
                },
            ));
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        options: &RequestOptions,
    ) -> std::result::Result<Attempt, TransportFailure> {
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::from_reqwest(&e))?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportFailure::from_reqwest(&e))?;

        match classify_status(status) {
            AttemptClass::Success => ResponseBody::decode(&response_headers, &bytes)
                .map(Attempt::Success)
                .map_err(|e| TransportFailure::Fatal(format!("invalid JSON response: {e}"))),
            AttemptClass::RetryableStatus => Ok(Attempt::ServerError(status)),
            AttemptClass::Rejected => Ok(Attempt::Rejected {
                status,
                detail: error_detail(
                    &response_headers,
                    &bytes,
                    status.canonical_reason().unwrap_or("client error"),
                ),
            }),
        }
    }
}
