use crate::limiter::DEFAULT_CONCURRENCY;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Request timeout cannot be 0")]
    InvalidTimeout,

    #[error("Unsupported API URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Connection settings for the school API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto, e.g. `https://school.example.com/api/`
    pub base_url: Url,
    /// Bearer token. Treated as an opaque capability and never logged.
    #[serde(default)]
    pub token: Option<String>,
    /// Timeout for each individual request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        match self.base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubmissionConfig {
    /// Maximum number of per-record upserts in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        SubmissionConfig {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        if self.submission.concurrency == 0 {
            return Err(ValidationError::InvalidConcurrency);
        }
        Ok(())
    }
}
