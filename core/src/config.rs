//! Task configuration and the build descriptor it is read from.
//!
//! # Design
//! The descriptor is a JSON document with a `project` section and one
//! section per task. Field names are camelCase to match the option names
//! users already know (`targetUrl`, `queryParameters`, `trustStorePwd`...).
//! Validation that needs the filesystem (trust store, script file) happens
//! at execution time, before any network or process side effect.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Params, ProjectInfo};

/// Encoding used when nothing else is configured.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Parameters of a single HTTP request task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestConfig {
    pub target_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub headers: Params,
    #[serde(default)]
    pub query_parameters: Params,
    #[serde(default)]
    pub auth_user: Option<String>,
    #[serde(default)]
    pub auth_password: Option<String>,
    #[serde(default)]
    pub trust_all: bool,
    #[serde(default, rename = "trustStore")]
    pub trust_store_path: Option<PathBuf>,
    #[serde(default, rename = "trustStorePwd")]
    pub trust_store_password: Option<String>,
    #[serde(default, rename = "proxy")]
    pub proxy_spec: Option<String>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    #[serde(default)]
    pub skip: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            method: default_method(),
            encoding: None,
            headers: Params::new(),
            query_parameters: Params::new(),
            auth_user: None,
            auth_password: None,
            trust_all: false,
            trust_store_path: None,
            trust_store_password: None,
            proxy_spec: None,
            output_file: None,
            input_file: None,
            skip: false,
        }
    }

    /// Fail unless the configured trust store is an existing regular file.
    pub fn validate_trust_store(&self) -> Result<()> {
        match &self.trust_store_path {
            Some(path) if !path.is_file() => Err(Error::config(format!(
                "Invalid parameter 'trustStore': Expected existing file, got {}",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}

/// Parameters of a single script run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptConfig {
    #[serde(default)]
    pub script_file: Option<String>,
    #[serde(default)]
    pub script_properties: Params,
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
    #[serde(default)]
    pub skip: bool,
}

/// The build descriptor: project facts plus optional task sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Descriptor {
    #[serde(default)]
    pub project: Option<ProjectInfo>,
    #[serde(default)]
    pub request: Option<RequestConfig>,
    #[serde(default)]
    pub script: Option<ScriptConfig>,
}

impl Descriptor {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("Invalid build descriptor: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Unable to read build descriptor {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }
}

/// Pick the character encoding for a request.
///
/// First non-blank wins: the configured value, the project's source
/// encoding, the platform locale's codeset, then `UTF-8`.
pub fn resolve_encoding(configured: Option<&str>, project_default: Option<&str>) -> String {
    if let Some(value) = non_blank(configured) {
        tracing::debug!(encoding = value, "Encoding: using configured value");
        return value.to_string();
    }
    if let Some(value) = non_blank(project_default) {
        tracing::debug!(encoding = value, "Encoding: using default value from build");
        return value.to_string();
    }
    if let Some(value) = platform_encoding() {
        tracing::debug!(encoding = %value, "Encoding: using system default");
        return value;
    }
    tracing::debug!(encoding = DEFAULT_ENCODING, "Encoding: using default value");
    DEFAULT_ENCODING.to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Codeset of the process locale, e.g. `UTF-8` from `en_US.UTF-8@euro`.
fn platform_encoding() -> Option<String> {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .and_then(|locale| codeset_of(&locale))
}

fn codeset_of(locale: &str) -> Option<String> {
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest).trim();
    (!codeset.is_empty()).then(|| codeset.to_string())
}

/// Look up an encoding by label, failing with a configuration error.
pub fn lookup_encoding(name: &str) -> Result<&'static Encoding> {
    Encoding::for_label(name.trim().as_bytes())
        .ok_or_else(|| Error::config(format!("Unsupported encoding: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_config_defaults() {
        let config: RequestConfig =
            serde_json::from_str(r#"{"targetUrl":"http://example.test/ok"}"#).unwrap();
        assert_eq!(config.method, "GET");
        assert!(!config.skip);
        assert!(!config.trust_all);
        assert!(config.headers.is_empty());
        assert!(config.query_parameters.is_empty());
        assert!(config.output_file.is_none());
        assert_eq!(config, RequestConfig::new("http://example.test/ok"));
    }

    #[test]
    fn request_config_uses_option_names() {
        let config: RequestConfig = serde_json::from_str(
            r#"{
                "targetUrl": "https://example.test/api",
                "method": "POST",
                "headers": {"Accept": "application/json", "X-Build": "42"},
                "queryParameters": {"a": "1"},
                "authUser": "jdoe",
                "authPassword": "secret",
                "trustAll": true,
                "trustStore": "certs/roots.pem",
                "trustStorePwd": "changeit",
                "proxy": "http://proxy.test:3128",
                "outputFile": "target/out.json"
            }"#,
        )
        .unwrap();
        assert_eq!(config.method, "POST");
        assert_eq!(config.headers.get("X-Build"), Some("42"));
        assert_eq!(config.trust_store_path, Some(PathBuf::from("certs/roots.pem")));
        assert_eq!(config.trust_store_password.as_deref(), Some("changeit"));
        assert_eq!(config.proxy_spec.as_deref(), Some("http://proxy.test:3128"));
        assert!(config.trust_all);
    }

    #[test]
    fn request_config_requires_target_url() {
        let result: std::result::Result<RequestConfig, _> = serde_json::from_str(r#"{"method":"GET"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_descriptor_keys_are_rejected() {
        let err = Descriptor::from_json(r#"{"request":{"targetUrl":"http://x.test","methd":"GET"}}"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid build descriptor"));
    }

    #[test]
    fn descriptor_with_all_sections() {
        let descriptor = Descriptor::from_json(
            r#"{
                "project": {"name": "demo", "baseDir": "/work", "sourceEncoding": "ISO-8859-1"},
                "request": {"targetUrl": "http://example.test/ok"},
                "script": {"scriptFile": "hello.sh", "scriptProperties": {"userName": "Doe, John"}}
            }"#,
        )
        .unwrap();
        let project = descriptor.project.unwrap();
        assert_eq!(project.base_dir, PathBuf::from("/work"));
        let script = descriptor.script.unwrap();
        assert_eq!(script.script_properties.get("userName"), Some("Doe, John"));
        assert!(descriptor.request.is_some());
    }

    #[test]
    fn configured_encoding_wins_and_is_trimmed() {
        assert_eq!(resolve_encoding(Some("  ISO-8859-1 "), Some("UTF-16")), "ISO-8859-1");
    }

    #[test]
    fn blank_encoding_falls_back_to_project_default() {
        assert_eq!(resolve_encoding(Some("   "), Some(" windows-1252")), "windows-1252");
    }

    #[test]
    fn codeset_is_extracted_from_locale() {
        assert_eq!(codeset_of("en_US.UTF-8"), Some("UTF-8".to_string()));
        assert_eq!(codeset_of("de_DE.ISO-8859-15@euro"), Some("ISO-8859-15".to_string()));
        assert_eq!(codeset_of("C"), None);
        assert_eq!(codeset_of("POSIX."), None);
    }

    #[test]
    fn resolution_never_returns_blank() {
        let encoding = resolve_encoding(None, None);
        assert!(!encoding.trim().is_empty());
    }

    #[test]
    fn lookup_accepts_common_labels() {
        assert_eq!(lookup_encoding("utf-8").unwrap(), encoding_rs::UTF_8);
        assert_eq!(lookup_encoding("UTF-8").unwrap(), encoding_rs::UTF_8);
        assert!(lookup_encoding("ISO-8859-1").is_ok());
    }

    #[test]
    fn lookup_rejects_unknown_labels() {
        let err = lookup_encoding("klingon-7").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported encoding: klingon-7");
    }

    #[test]
    fn missing_trust_store_is_a_configuration_error() {
        let mut config = RequestConfig::new("https://example.test");
        config.trust_store_path = Some(PathBuf::from("/definitely/not/here.pem"));
        let err = config.validate_trust_store().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'trustStore': Expected existing file, got /definitely/not/here.pem"
        );
    }

    #[test]
    fn directory_is_not_a_trust_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RequestConfig::new("https://example.test");
        config.trust_store_path = Some(dir.path().to_path_buf());
        assert!(config.validate_trust_store().is_err());
    }
}
