//! Response body decoding.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decoded body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    /// Decode raw bytes according to the response's content type.
    pub fn decode(headers: &HeaderMap, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::Empty);
        }
        if is_json(headers) {
            return serde_json::from_slice(bytes).map(Self::Json);
        }
        Ok(Self::Text(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// JSON view of the body; text becomes a JSON string and empty becomes null.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
            Self::Empty => Value::Null,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize the body into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_value())
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Best-effort error detail from a rejected response body.
///
/// Prefers the `detail` or `message` field of a JSON error body.
pub(crate) fn error_detail(headers: &HeaderMap, bytes: &[u8], fallback: &str) -> String {
    if let Ok(ResponseBody::Json(value)) = ResponseBody::decode(headers, bytes) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
        return value.to_string();
    }

    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn test_decode_json() {
        let body = ResponseBody::decode(
            &headers("application/json; charset=utf-8"),
            br#"{"status": "ok"}"#,
        )
        .unwrap();
        assert_eq!(body, ResponseBody::Json(json!({"status": "ok"})));
    }

    #[test]
    fn test_decode_text_and_empty() {
        let body = ResponseBody::decode(&headers("text/plain"), b"pong").unwrap();
        assert_eq!(body, ResponseBody::Text("pong".into()));
        assert_eq!(body.into_value(), json!("pong"));

        let body = ResponseBody::decode(&HeaderMap::new(), b"").unwrap();
        assert_eq!(body, ResponseBody::Empty);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ResponseBody::decode(&headers("application/json"), b"{not json").is_err());
    }

    #[test]
    fn test_error_detail() {
        let detail = error_detail(
            &headers("application/json"),
            br#"{"detail": "User not found"}"#,
            "Not Found",
        );
        assert_eq!(detail, "User not found");

        let detail = error_detail(&headers("text/plain"), b"", "Not Found");
        assert_eq!(detail, "Not Found");

        let detail = error_detail(&headers("text/plain"), b"bad input", "Bad Request");
        assert_eq!(detail, "bad input");
    }
}
