//! # Runtime Configuration Module
//!
//! Environment- and file-driven configuration for the routing layer.
//!
//! ## Environment Variables
//!
//! ### `JSONROUTES_ENV`
//!
//! `development` switches the Response Writer to pretty-printed JSON (2-space
//! indentation). Any other value, or no value, keeps compact output.
//!
//! ### `JSONROUTES_NAMESPACE`
//!
//! Path prefix prepended to every registered route, e.g. `/api`. Default: empty.
//!
//! ### `JSONROUTES_STACK_SIZE`
//!
//! Stack size for the per-request handler coroutines. Accepts values in:
//! - Decimal: `65536` (64 KB)
//! - Hexadecimal: `0x10000` (64 KB)
//!
//! Default: `0x10000` (64 KB)
//!
//! ### `JSONROUTES_BODY_LIMIT`
//!
//! Maximum accepted request body in bytes for the JSON and URL-encoded parsers.
//! Default: `1048576` (1 MiB)
//!
//! ### `JSONROUTES_ADDR`
//!
//! Listen address used by the `serve` command. Default: `0.0.0.0:8080`
//!
//! ## Config File
//!
//! ```yaml
//! namespace: /api
//! environment: development
//! stack_size: 32768
//! body_limit: 65536
//! response_headers:
//!   Cache-Control: no-store
//!   Pragma: no-cache
//! ```
//!
//! Environment variables override values read from the file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::ResponseError;

const DEFAULT_STACK_SIZE: usize = 0x10000;
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Which JSON formatting the Response Writer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Pretty-printed JSON
    Development,
    /// Compact JSON
    #[default]
    Production,
}

impl Environment {
    /// Parse the value of `JSONROUTES_ENV`. Only `development` selects development mode.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("development") {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    #[must_use]
    pub fn pretty_json(self) -> bool {
        self == Environment::Development
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Namespace prefix for every route (e.g. `/api`)
    pub namespace: String,
    /// Development or production output
    pub environment: Environment,
    /// Stack size for handler coroutines in bytes
    pub stack_size: usize,
    /// Body parser size limit in bytes
    pub body_limit: usize,
    /// Listen address for the bundled server
    pub addr: String,
    /// Headers applied to every response unless overridden
    pub response_headers: BTreeMap<String, String>,
}

/// The headers every response carries unless replaced: `Cache-Control: no-store`, `Pragma: no-cache`.
#[must_use]
pub fn default_response_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    headers.insert(http::header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

fn default_response_header_map() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Cache-Control".to_string(), "no-store".to_string()),
        ("Pragma".to_string(), "no-cache".to_string()),
    ])
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            environment: Environment::Production,
            stack_size: DEFAULT_STACK_SIZE,
            body_limit: DEFAULT_BODY_LIMIT,
            addr: "0.0.0.0:8080".to_string(),
            response_headers: default_response_header_map(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables on top of the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load a YAML config file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: RuntimeConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from a variable lookup. Unparseable numeric values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ns) = lookup("JSONROUTES_NAMESPACE") {
            self.namespace = ns;
        }
        if let Some(env) = lookup("JSONROUTES_ENV") {
            self.environment = Environment::parse(&env);
        }
        if let Some(size) = lookup("JSONROUTES_STACK_SIZE").as_deref().and_then(parse_size) {
            self.stack_size = size;
        }
        if let Some(limit) = lookup("JSONROUTES_BODY_LIMIT").as_deref().and_then(parse_size) {
            self.body_limit = limit;
        }
        if let Some(addr) = lookup("JSONROUTES_ADDR") {
            self.addr = addr;
        }
    }

    /// Convert `response_headers` into a `HeaderMap`.
    pub fn default_headers(&self) -> Result<HeaderMap, ResponseError> {
        let mut headers = HeaderMap::with_capacity(self.response_headers.len());
        for (name, value) in &self.response_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ResponseError::InvalidHeader { name: name.clone() })?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ResponseError::InvalidHeader { name: name.clone() })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}
