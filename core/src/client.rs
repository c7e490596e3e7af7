//! Single-shot HTTP request task.
//!
//! # Design
//! `RequestTask` runs one request per `execute` call, strictly in sequence:
//! validate, resolve the encoding, build the URL and the plain-data request,
//! connect, send, classify the status and copy the body. Building is split
//! from sending (`build_request`) so request construction can be checked
//! without a server.
//!
//! The connection handle lives on the stack of `execute_with` and is dropped
//! on every return path, including errors.

use std::io::{self, Write};

use crate::auth::basic_auth_header;
use crate::config::{resolve_encoding, RequestConfig};
use crate::connection::{ConnectionPolicy, Connector};
use crate::error::{Error, Result};
use crate::http::HttpRequest;
use crate::query::build_url;
use crate::sink::{write_to, Destination};
use crate::types::ProjectInfo;

/// What a completed request task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `skip` was set; nothing happened.
    Skipped,
    /// The response body was copied to `destination`.
    Written { bytes: u64, destination: Destination },
}

/// An HTTP request task bound to its configuration.
#[derive(Debug, Clone)]
pub struct RequestTask {
    config: RequestConfig,
    project: ProjectInfo,
    verbose: bool,
}

impl RequestTask {
    pub fn new(config: RequestConfig) -> Self {
        Self {
            config,
            project: ProjectInfo::default(),
            verbose: tracing::enabled!(tracing::Level::DEBUG),
        }
    }

    /// Use the project's source encoding as the encoding fallback.
    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.project = project;
        self
    }

    /// Echo error bodies of failed responses to stderr.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn encoding(&self) -> String {
        resolve_encoding(
            self.config.encoding.as_deref(),
            self.project.source_encoding.as_deref(),
        )
    }

    /// Assemble the request without touching the network.
    pub fn build_request(&self, encoding: &str) -> Result<HttpRequest> {
        let url = build_url(&self.config.target_url, &self.config.query_parameters, encoding)?;
        let mut request = HttpRequest::new(&self.config.method, url);

        for (name, value) in self.config.headers.iter() {
            request = request.header(name, value);
        }
        if let Some(user) = &self.config.auth_user {
            let value = basic_auth_header(user, self.config.auth_password.as_deref(), encoding)?;
            request = request.header("Authorization", value);
        }

        if let Some(input) = &self.config.input_file {
            if !request.permits_body() {
                return Err(Error::config(format!(
                    "Invalid parameter 'inputFile': method {} does not permit a request body",
                    request.method
                )));
            }
            let body = std::fs::read(input).map_err(|e| {
                Error::config(format!(
                    "Invalid parameter 'inputFile': unable to read {}: {e}",
                    input.display()
                ))
            })?;
            request.body = Some(body);
        }
        Ok(request)
    }

    /// Run the task against the process's stdout and stderr.
    pub fn execute(&self) -> Result<Outcome> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.execute_with(&mut stdout.lock(), &mut stderr.lock())
    }

    /// Run the task with explicit streams standing in for stdout and stderr.
    pub fn execute_with(&self, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<Outcome> {
        if self.config.skip {
            tracing::info!("Skipping, parameter skip=true");
            return Ok(Outcome::Skipped);
        }

        self.config.validate_trust_store()?;
        let connector = Connector::new(&ConnectionPolicy::from_config(&self.config))?;
        let encoding = self.encoding();
        let request = self.build_request(&encoding)?;
        tracing::debug!(url = %request.url, method = %request.method, "Url: {}", request.url);

        let mut handle = connector.connect(&request.url);
        let status = handle.send(request)?;

        if status.is_success() {
            tracing::debug!("Response: {status}");
            let destination = Destination::from_option(self.config.output_file.as_deref());
            tracing::debug!("Writing response to {destination}");
            let bytes = write_to(&destination, stdout, |out| handle.copy_body(out))?;
            Ok(Outcome::Written { bytes, destination })
        } else {
            let err = Error::Remote {
                status: status.code,
                reason: status.reason,
            };
            tracing::error!("{err}");
            if self.verbose {
                tracing::error!("Writing response to standard error");
                handle.copy_body(stderr)?;
            }
            Err(err)
        }
    }
}
