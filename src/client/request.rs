//! Outbound request options and header assembly.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

/// Header carrying the per-call correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Optional parts of a single call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) body: Option<Value>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON body sent with the request.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any value as the JSON body.
    pub fn json_from<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    /// Add a header. Caller headers override the client defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Merge headers in precedence order: built-in defaults, then destination
/// defaults, then the caller's headers. Later layers replace earlier ones.
pub(crate) fn merge_headers(
    user_agent: &HeaderValue,
    request_id: &HeaderValue,
    destination: &HeaderMap,
    caller: &HeaderMap,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, user_agent.clone());
    headers.insert(HeaderName::from_static(X_REQUEST_ID), request_id.clone());

    for layer in [destination, caller] {
        for name in layer.keys() {
            headers.remove(name);
        }
        for (name, value) in layer.iter() {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
