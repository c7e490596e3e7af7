use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{FromRequest, Path, Request},
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// A request as the server saw it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Every request received, in arrival order.
pub type Recorder = Arc<Mutex<Vec<Recorded>>>;

impl FromRequest<Recorder> for Recorded {
    type Rejection = StatusCode;

    async fn from_request(req: Request, recorder: &Recorder) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let recorded = Recorded {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts
                .headers
                .iter()
                .map(|(n, v)| (n.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        };
        recorder
            .lock()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .push(recorded.clone());
        Ok(recorded)
    }
}

pub fn app() -> Router {
    app_with(Recorder::default())
}

pub fn app_with(recorder: Recorder) -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/missing", any(missing))
        .route("/fail", any(fail))
        .route("/no-content", any(no_content))
        .route("/bytes/{n}", get(bytes))
        .route("/echo", any(echo))
        .with_state(recorder)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, recorder: Recorder) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(recorder)).await
}

async fn ok(_: Recorded) -> &'static str {
    "hello"
}

async fn missing(_: Recorded) -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "no such resource")
}

async fn fail(_: Recorded) -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "server exploded")
}

async fn no_content(_: Recorded) -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `n` bytes of a repeating 0..=250 pattern.
pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

async fn bytes(Path(n): Path<usize>, _: Recorded) -> Body {
    Body::from(pattern(n))
}

async fn echo(recorded: Recorded) -> Json<Recorded> {
    Json(recorded)
}
