//! Build automation tasks: a single-shot HTTP request and a script runner.
//!
//! # Overview
//! `RequestTask` issues exactly one HTTP request described by a
//! `RequestConfig` and streams a successful response body to a file or to
//! standard output. `ScriptTask` compiles a script file and runs it once with
//! an explicit set of named bindings, capturing its standard output.
//!
//! # Design
//! - Everything before the network round-trip is plain data: the URL, the
//!   ordered headers and the Basic credentials are computed up front and can
//!   be tested without a server.
//! - One connection per call, owned by a handle that closes on drop.
//! - No retries. Every failure ends the invocation with an `Error` whose
//!   `kind()` tells configuration problems, transport failures, non-2xx
//!   responses and script failures apart.
//! - Configuration comes from a JSON build descriptor (`Descriptor`).

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod query;
pub mod script;
pub mod sink;
pub mod types;

pub use client::{Outcome, RequestTask};
pub use config::{Descriptor, RequestConfig, ScriptConfig};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpRequest, Status};
pub use script::{ScriptOutcome, ScriptTask};
pub use sink::Destination;
pub use types::{Params, ProjectInfo};
