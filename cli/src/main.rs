//! plumb - run a build automation goal from a JSON build descriptor
//!
//! Usage:
//!   plumb request --url https://example.test/status   # One HTTP request, body to stdout
//!   plumb request --output target/status.json         # targetUrl from plumb.json
//!   plumb run --script hello.sh --property user=jdoe  # Run a script once
//!
//! Command line values override the descriptor. Logs go to stderr; stdout
//! only carries response bodies and script output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plumb_core::types::parse_pair;
use plumb_core::{Descriptor, Error, RequestConfig, RequestTask, ScriptConfig, ScriptTask};
use tracing_subscriber::EnvFilter;

const DEFAULT_DESCRIPTOR: &str = "plumb.json";

/// plumb - single-shot HTTP requests and scripts for builds
#[derive(Parser, Debug)]
#[command(name = "plumb")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Build descriptor [default: plumb.json, ignored when absent]
    #[arg(long, global = true)]
    descriptor: Option<PathBuf>,

    /// Log at debug level and echo error bodies of failed responses
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    goal: Goal,
}

#[derive(Subcommand, Debug)]
enum Goal {
    /// Send one HTTP request and write the response body
    Request(RequestArgs),
    /// Compile and run one script
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Target URL
    #[arg(long, env = "PLUMB_URL")]
    url: Option<String>,

    /// HTTP method
    #[arg(long, env = "PLUMB_METHOD")]
    method: Option<String>,

    /// Character encoding for query parameters and credentials
    #[arg(long, env = "PLUMB_ENCODING")]
    encoding: Option<String>,

    /// Write the response body here instead of stdout
    #[arg(long, env = "PLUMB_OUTPUT_FILE")]
    output: Option<PathBuf>,

    /// Send this file as the request body
    #[arg(long)]
    input: Option<PathBuf>,

    /// Do nothing
    #[arg(long, env = "PLUMB_SKIP")]
    skip: bool,

    /// Request header (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Query parameter (repeatable)
    #[arg(long = "query", value_name = "NAME=VALUE", value_parser = parse_pair)]
    query_parameters: Vec<(String, String)>,

    /// User for Basic authentication
    #[arg(long, env = "PLUMB_AUTH_USER")]
    auth_user: Option<String>,

    /// Password for Basic authentication
    #[arg(long, env = "PLUMB_AUTH_PASSWORD", hide_env_values = true)]
    auth_password: Option<String>,

    /// Accept any server certificate
    #[arg(long, env = "PLUMB_TRUST_ALL")]
    trust_all: bool,

    /// PEM bundle of trusted root certificates
    #[arg(long)]
    trust_store: Option<PathBuf>,

    /// Password of the trust store
    #[arg(long)]
    trust_store_password: Option<String>,

    /// Proxy address, e.g. http://proxy.example:3128
    #[arg(long, env = "PLUMB_PROXY")]
    proxy: Option<String>,
}

impl RequestArgs {
    /// Layer the command line over the descriptor's request section.
    fn apply(self, base: Option<RequestConfig>) -> plumb_core::Result<RequestConfig> {
        let mut config = match (base, self.url) {
            (Some(mut config), Some(url)) => {
                config.target_url = url;
                config
            }
            (Some(config), None) => config,
            (None, Some(url)) => RequestConfig::new(url),
            (None, None) => {
                return Err(Error::config(
                    "The parameter 'targetUrl' is missing: set it in the build descriptor or pass --url",
                ))
            }
        };

        if let Some(method) = self.method {
            config.method = method;
        }
        if self.encoding.is_some() {
            config.encoding = self.encoding;
        }
        if self.output.is_some() {
            config.output_file = self.output;
        }
        if self.input.is_some() {
            config.input_file = self.input;
        }
        if self.auth_user.is_some() {
            config.auth_user = self.auth_user;
        }
        if self.auth_password.is_some() {
            config.auth_password = self.auth_password;
        }
        if self.trust_store.is_some() {
            config.trust_store_path = self.trust_store;
        }
        if self.trust_store_password.is_some() {
            config.trust_store_password = self.trust_store_password;
        }
        if self.proxy.is_some() {
            config.proxy_spec = self.proxy;
        }
        config.skip |= self.skip;
        config.trust_all |= self.trust_all;

        for (name, value) in self.headers {
            config.headers.insert(name, value);
        }
        for (name, value) in self.query_parameters {
            config.query_parameters.insert(name, value);
        }
        Ok(config)
    }
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Script file, relative to the project base directory
    #[arg(long)]
    script: Option<String>,

    /// Script property (repeatable)
    #[arg(long = "property", value_name = "NAME=VALUE", value_parser = parse_pair)]
    properties: Vec<(String, String)>,

    /// Interpreter used to check and run the script [default: sh on PATH]
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// Do nothing
    #[arg(long)]
    skip: bool,
}

impl RunArgs {
    fn apply(self, base: Option<ScriptConfig>) -> ScriptConfig {
        let mut config = base.unwrap_or_default();
        if self.script.is_some() {
            config.script_file = self.script;
        }
        if self.interpreter.is_some() {
            config.interpreter = self.interpreter;
        }
        config.skip |= self.skip;
        for (name, value) in self.properties {
            config.script_properties.insert(name, value);
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let Descriptor {
        project,
        request: request_section,
        script: script_section,
    } = load_descriptor(args.descriptor.as_deref())?;

    match args.goal {
        Goal::Request(request) => {
            let config = request.apply(request_section)?;
            let task = RequestTask::new(config)
                .with_project(project.unwrap_or_default())
                .verbose(args.verbose || tracing::enabled!(tracing::Level::DEBUG));
            let outcome = task.execute().context("HTTP request failed")?;
            tracing::debug!(?outcome, "request finished");
        }
        Goal::Run(run) => {
            let mut task = ScriptTask::new(run.apply(script_section));
            if let Some(project) = project {
                task = task.with_project(project);
            }
            let outcome = task.execute().context("Script execution failed")?;
            tracing::debug!(?outcome, "script finished");
        }
    }
    Ok(())
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// An explicitly named descriptor must exist; the default one is optional.
fn load_descriptor(path: Option<&Path>) -> Result<Descriptor> {
    match path {
        Some(path) => Ok(Descriptor::load(path)?),
        None => {
            let path = Path::new(DEFAULT_DESCRIPTOR);
            if path.exists() {
                Ok(Descriptor::load(path)?)
            } else {
                tracing::debug!("no {DEFAULT_DESCRIPTOR} found, using command line only");
                Ok(Descriptor::default())
            }
        }
    }
}
