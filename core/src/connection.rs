//! Connection factory and the scoped connection handle.
//!
//! # Design
//! `Connector` turns the trust and proxy settings into a transport
//! configuration once. Every `connect()` creates a fresh agent so that no
//! pooled socket outlives the handle: dropping a `ConnectionHandle` drops the
//! agent together with any unread response body, which closes the
//! connection on every exit path.
//!
//! Status codes are never transport errors here; classification is left to
//! the executor. The reason phrase is the one the server sent: the transport
//! is wrapped so the raw status line of the final response is kept next to
//! the parsed response.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ureq::config::Config;
use ureq::http::Response;
use ureq::tls::{PemItem, RootCerts, TlsConfig};
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector as _, DefaultConnector, NextTimeout, Transport,
};
use ureq::{Agent, Body, Proxy};
use url::Url;

use crate::config::RequestConfig;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, Status};

/// PEM bundle used as the root set for certificate validation.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustStore {
    pub path: PathBuf,
    pub password: Option<String>,
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// How connections are secured and routed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Skip certificate chain and hostname verification. Insecure.
    pub trust_all: bool,
    pub trust_store: Option<TrustStore>,
    pub proxy: Option<String>,
}

impl ConnectionPolicy {
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            trust_all: config.trust_all,
            trust_store: config.trust_store_path.clone().map(|path| TrustStore {
                path,
                password: config.trust_store_password.clone(),
            }),
            proxy: config.proxy_spec.clone(),
        }
    }
}

/// Lifecycle of a single request on a [`ConnectionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    NotStarted,
    Connected,
    HeadersSent,
    ResponseReceived,
    BodyTransferred,
    Closed,
}

/// Opens connections according to a [`ConnectionPolicy`].
#[derive(Debug)]
pub struct Connector {
    config: Config,
}

impl Connector {
    pub fn new(policy: &ConnectionPolicy) -> Result<Self> {
        // Without a configured proxy connections are direct, whatever the
        // environment's *_PROXY variables say.
        let proxy = match &policy.proxy {
            Some(spec) => {
                let proxy = Proxy::new(spec)
                    .map_err(|e| Error::config(format!("Invalid parameter 'proxy': {spec}: {e}")))?;
                tracing::debug!(proxy = %spec, "routing connections through proxy");
                Some(proxy)
            }
            None => None,
        };
        let builder = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(proxy);

        let tls = if policy.trust_all {
            tracing::warn!("certificate validation is disabled (trustAll=true)");
            TlsConfig::builder().disable_verification(true).build()
        } else if let Some(store) = &policy.trust_store {
            TlsConfig::builder().root_certs(load_roots(store)?).build()
        } else {
            TlsConfig::builder().build()
        };

        Ok(Self {
            config: builder.tls_config(tls).build(),
        })
    }

    /// Bind a new handle to `url`. The socket is opened when the request
    /// is sent.
    pub fn connect(&self, url: &Url) -> ConnectionHandle {
        tracing::trace!(url = %url, "connection acquired");
        let status_line = StatusLineSlot::default();
        let transport = DefaultConnector::new().chain(StatusLineConnector {
            slot: status_line.clone(),
        });
        ConnectionHandle {
            agent: Some(Agent::with_parts(
                self.config.clone(),
                transport,
                DefaultResolver::default(),
            )),
            url: url.clone(),
            status_line,
            response: None,
            state: ConnectionState::Connected,
        }
    }
}

fn load_roots(store: &TrustStore) -> Result<RootCerts> {
    let invalid = |reason: String| {
        Error::config(format!(
            "Invalid parameter 'trustStore': {}: {reason}",
            store.path.display()
        ))
    };

    if store.password.is_some() {
        tracing::debug!(path = %store.path.display(), "trust store password ignored for PEM bundle");
    }
    let pem = std::fs::read(&store.path).map_err(|e| invalid(e.to_string()))?;
    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        if let PemItem::Certificate(cert) = item.map_err(|e| invalid(e.to_string()))? {
            certs.push(cert.to_owned());
        }
    }
    if certs.is_empty() {
        return Err(invalid("no certificates found".to_string()));
    }
    tracing::debug!(path = %store.path.display(), count = certs.len(), "loaded trust store");
    Ok(RootCerts::Specific(Arc::new(certs)))
}

/// One in-flight request. Closes its connection when dropped.
pub struct ConnectionHandle {
    agent: Option<Agent>,
    url: Url,
    status_line: StatusLineSlot,
    response: Option<Response<Body>>,
    state: ConnectionState,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send `request` and wait for the status line.
    pub fn send(&mut self, request: HttpRequest) -> Result<Status> {
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))?;

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        self.state = ConnectionState::HeadersSent;

        let invalid = |e: ureq::http::Error| Error::config(format!("Invalid request: {e}"));
        let requires_body = matches!(request.method.as_str(), "POST" | "PUT" | "PATCH");
        let response = match request.body {
            Some(body) => agent.run(builder.body(body).map_err(invalid)?)?,
            None if requires_body => agent.run(builder.body(Vec::<u8>::new()).map_err(invalid)?)?,
            None => agent.run(builder.body(()).map_err(invalid)?)?,
        };

        let code = response.status();
        let reason = self
            .status_line
            .lock()
            .ok()
            .and_then(|mut line| line.take())
            .filter(|line| line.code == code.as_u16())
            .map(|line| line.reason)
            .unwrap_or_else(|| code.canonical_reason().unwrap_or_default().to_string());
        let status = Status::new(code.as_u16(), reason);
        self.response = Some(response);
        self.state = ConnectionState::ResponseReceived;
        Ok(status)
    }

    /// Copy the whole response body into `out`, returning the byte count.
    pub fn copy_body(&mut self, out: &mut dyn Write) -> Result<u64> {
        let response = self
            .response
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no response received"))?;
        let copied = io::copy(&mut response.body_mut().as_reader(), out)?;
        out.flush()?;
        self.state = ConnectionState::BodyTransferred;
        Ok(copied)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.response.take();
        self.agent.take();
        self.state = ConnectionState::Closed;
        tracing::trace!(url = %self.url, "connection closed");
    }
}

/// Status line of the last final response read on a connection.
type StatusLineSlot = Arc<Mutex<Option<StatusLine>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusLine {
    code: u16,
    reason: String,
}

/// Parse `HTTP/1.1 404 Widget Not Here`, without the line terminator.
fn parse_status_line(line: &[u8]) -> Option<StatusLine> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if !line.starts_with(b"HTTP/") {
        return None;
    }
    let space = line.iter().position(|&b| b == b' ')?;
    let rest = &line[space + 1..];
    let digits = rest.get(..3)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = std::str::from_utf8(digits).ok()?.parse().ok()?;
    let reason = match rest.get(3..) {
        Some([b' ', reason @ ..]) => decode_reason(reason),
        Some([]) | None => String::new(),
        Some(_) => return None,
    };
    Some(StatusLine { code, reason })
}

/// Reason phrases are ASCII in practice; anything else is read as Latin-1.
fn decode_reason(raw: &[u8]) -> String {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(raw)
            .0
            .into_owned(),
    };
    text.trim().to_string()
}

/// Last link of the connector chain: wraps every transport so the status
/// line can be read before ureq parses and discards the reason phrase.
#[derive(Debug)]
struct StatusLineConnector {
    slot: StatusLineSlot,
}

impl ureq::unversioned::transport::Connector<Box<dyn Transport>> for StatusLineConnector {
    type Out = StatusLineTransport;

    fn connect(
        &self,
        _: &ConnectionDetails,
        chained: Option<Box<dyn Transport>>,
    ) -> std::result::Result<Option<Self::Out>, ureq::Error> {
        Ok(chained.map(|inner| StatusLineTransport {
            inner,
            slot: self.slot.clone(),
            awaiting_status: false,
        }))
    }
}

#[derive(Debug)]
struct StatusLineTransport {
    inner: Box<dyn Transport>,
    slot: StatusLineSlot,
    awaiting_status: bool,
}

impl StatusLineTransport {
    fn capture(&mut self) {
        let input = self.inner.buffers().input();
        let Some(end) = input.iter().position(|&b| b == b'\n') else {
            return;
        };
        match parse_status_line(&input[..end]) {
            // Interim responses are followed by the final one.
            Some(line) if (100..200).contains(&line.code) => {}
            Some(line) => {
                if let Ok(mut slot) = self.slot.lock() {
                    *slot = Some(line);
                }
                self.awaiting_status = false;
            }
            None => self.awaiting_status = false,
        }
    }
}

impl Transport for StatusLineTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        self.inner.buffers()
    }

    fn transmit_output(
        &mut self,
        amount: usize,
        timeout: NextTimeout,
    ) -> std::result::Result<(), ureq::Error> {
        // Anything sent starts a new exchange; its response comes next.
        self.awaiting_status = true;
        self.inner.transmit_output(amount, timeout)
    }

    fn await_input(&mut self, timeout: NextTimeout) -> std::result::Result<bool, ureq::Error> {
        let progress = self.inner.await_input(timeout)?;
        if self.awaiting_status {
            self.capture();
        }
        Ok(progress)
    }

    fn is_open(&mut self) -> bool {
        self.inner.is_open()
    }

    fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}
