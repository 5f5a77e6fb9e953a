//! Run configuration loaded from YAML.
//!
//! ```yaml
//! label: sandbox
//! method: POST
//! url_template: "https://api.example.com/users/{user_id}/fees/{fee_id}"
//! headers:
//!   Authorization: "apikey {api_key}"
//!   Accept: application/json
//! api_key_env: SANDBOX_API_KEY
//! params:
//!   fixed: { op: waive, reason: OTHER }
//!   fields: { amount: amount }
//! rate_limit: 25
//! chunk_size: 1000
//! output_dir: ./sandbox
//! source:
//!   path: fines.csv
//!   columns:
//!     "Fine Fee Id": fee_id
//!     "Remaining Amount": amount
//!     "Primary Identifier": user_id
//! ```
//!
//! Header values are templates rendered once per run against `{api_key}` and
//! `{label}`; the resulting header map is never modified afterwards.
//! `Accept: application/json` is always sent unless `headers` sets `Accept`.

use crate::batch::{ensure_accept_json, BatchRunnerBuilder, DEFAULT_CHUNK_SIZE, DEFAULT_RATE_LIMIT};
use crate::dispatch::ParamMapping;
use crate::resilience::RetryPolicy;
use crate::source::SourceConfig;
use crate::transport::{HttpMethod, TransportConfig};
use crate::utils::template::Template;
use crate::{Error, ErrorContext, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Identifies the run in logs and the audit CSV.
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub url_template: String,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key, used when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub params: ParamMapping,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Per-request timeout; falls back to the transport's env/default value.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

fn default_label() -> String {
    "run".to_string()
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Accept".to_string(), "application/json".to_string())])
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: RunConfig = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Structural checks that need no network or credentials.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(config_error("chunk_size must be at least 1", "chunk_size"));
        }
        let url = Template::parse(&self.url_template)?;
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                config_error(format!("invalid header name '{}'", name), format!("headers.{}", name))
            })?;
            Template::parse(value.as_str())?;
        }
        if let Some(fields) = self.source.as_ref().and_then(|s| s.output_fields()) {
            let needed = url.fields().chain(self.params.referenced_fields());
            let missing: Vec<&str> = needed.filter(|f| !fields.contains(f)).collect();
            if !missing.is_empty() {
                return Err(Error::validation_with_context(
                    format!("fields not provided by source: {}", missing.join(", ")),
                    ErrorContext::new()
                        .with_field_path("source.columns")
                        .with_source("config_loader"),
                ));
            }
        }
        Ok(())
    }

    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        match &self.api_key_env {
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                Error::configuration_with_context(
                    format!("environment variable {} is not set", var),
                    ErrorContext::new()
                        .with_field_path("api_key_env")
                        .with_source("config_loader"),
                )
            }),
            None => Ok(None),
        }
    }

    /// Render header templates into a fresh header map.
    pub fn header_map(&self, api_key: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, raw) in &self.headers {
            let field_path = format!("headers.{}", name);
            let value = Template::parse(raw.as_str())?.render_with(|var| match var {
                "api_key" => api_key.map(str::to_string),
                "label" => Some(self.label.clone()),
                _ => None,
            })?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| config_error("invalid header name", field_path.clone()))?;
            let mut value = HeaderValue::from_str(&value)
                .map_err(|_| config_error("invalid header value", field_path))?;
            if name == reqwest::header::AUTHORIZATION {
                value.set_sensitive(true);
            }
            headers.insert(name, value);
        }
        ensure_accept_json(&mut headers);
        Ok(headers)
    }

    pub fn transport_config(&self) -> TransportConfig {
        let base = TransportConfig::from_env();
        match self.timeout_secs {
            Some(secs) => base.with_timeout(Duration::from_secs(secs)),
            None => base,
        }
    }

    /// Builder pre-populated from this config, with credentials resolved.
    pub fn runner_builder(&self) -> Result<BatchRunnerBuilder> {
        let api_key = self.resolve_api_key()?;
        let headers = self.header_map(api_key.as_deref())?;
        Ok(BatchRunnerBuilder::new()
            .method(self.method)
            .url_template(self.url_template.clone())
            .headers(headers)
            .params(self.params.clone())
            .rate_limit(self.rate_limit)
            .chunk_size(self.chunk_size)
            .output_dir(&self.output_dir)
            .transport(self.transport_config())
            .retry(self.retry.clone()))
    }
}

fn config_error(msg: impl Into<String>, field: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("config_loader"),
    )
}
