//! HTTP request and status types as plain data.
//!
//! # Design
//! The request is assembled completely (URL, ordered headers, body) before a
//! connection is opened, so everything up to the network round-trip is
//! deterministic and can be checked without a server. `Status` carries the
//! code and reason phrase of a response and decides the success branch.

use url::Url;

/// True for methods that may carry a request body (anything but GET/HEAD).
pub fn permits_body(method: &str) -> bool {
    !(method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD"))
}

/// A fully prepared HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// `method` is sent as given (trimmed); methods are case-sensitive.
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.trim().to_string(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn permits_body(&self) -> bool {
        permits_body(&self.method)
    }
}

/// Status line of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason: String,
}

impl Status {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.code, self.reason)
    }
}
