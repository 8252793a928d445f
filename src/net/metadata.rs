//! Request and response metadata handed to an exchange by the transport driver.
//!
//! Neither type carries a body. Body bytes arrive separately through
//! [`HttpExchange::append_data`](crate::net::HttpExchange::append_data).
//!
//! ## Notes
//! - `headers` is an `http::HeaderMap`, which is **case-insensitive** for header names.
//! - Conversions from `reqwest` and `http` types are provided so a driver built on either stack
//!   can feed an exchange without copying fields by hand.
//!
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method};
use url::Url;

/// Identity of the outgoing request.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// Request method. Opaque to the exchange, kept for diagnostics.
    pub method: Method,

    /// URL the request was sent to.
    pub url: Url,

    /// Request headers as sent.
    pub headers: HeaderMap,
}

impl RequestMetadata {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Builds request metadata from `http` request parts.
    ///
    /// The URI must be absolute; origin-form URIs (`/path`) have no host to resolve against.
    pub fn from_parts(parts: &http::request::Parts) -> Result<Self, url::ParseError> {
        let url = Url::parse(&parts.uri.to_string())?;
        Ok(Self {
            method: parts.method.clone(),
            url,
            headers: parts.headers.clone(),
        })
    }
}

impl From<&reqwest::Request> for RequestMetadata {
    fn from(req: &reqwest::Request) -> Self {
        Self {
            method: req.method().clone(),
            url: req.url().clone(),
            headers: req.headers().clone(),
        }
    }
}

/// Status line and headers of a received response.
///
/// All fields reflect the **received** response as-is; interpretation (charset, expected
/// length, location) happens in the helper methods.
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Final URL of the response, when the transport knows it (after redirects).
    ///
    /// When `None`, the exchange keeps the URL of the bound request.
    pub url: Option<Url>,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Human-readable reason phrase (e.g., `"OK"`, `"Not Found"`).
    ///
    /// May be `"Unknown"` for non-standard codes.
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,
}

impl ResponseMetadata {
    pub fn new(status: u16, headers: HeaderMap) -> Self {
        Self {
            url: None,
            status,
            status_text: reason_phrase(status),
            headers,
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Returns the value of header `name` if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    /// Declared body length, from `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Charset label from `Content-Type: ...; charset=...`, if any.
    pub fn charset(&self) -> Option<String> {
        let ct = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;

        // very small, permissive parse: look for "charset=..."
        let idx = ct.to_ascii_lowercase().find("charset=")?;
        let after = &ct[idx + "charset=".len()..];
        // charset value may be quoted or end at ; or end of string
        let end = after.find([';', ' ', '\t']).unwrap_or(after.len());
        let label = after[..end].trim_matches('"');

        if label.is_empty() {
            None
        } else {
            Some(label.to_string())
        }
    }
}

impl From<&reqwest::Response> for ResponseMetadata {
    fn from(res: &reqwest::Response) -> Self {
        Self {
            url: Some(res.url().clone()),
            status: res.status().as_u16(),
            status_text: res.status().canonical_reason().unwrap_or("Unknown").to_string(),
            headers: res.headers().clone(),
        }
    }
}

impl From<&http::response::Parts> for ResponseMetadata {
    fn from(parts: &http::response::Parts) -> Self {
        Self::new(parts.status.as_u16(), parts.headers.clone())
    }
}

fn reason_phrase(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}
