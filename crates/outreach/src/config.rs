//! Client configuration
//!
//! The API base URL is loaded from (in order of priority):
//! 1. Compile-time `OUTREACH_API_URL` (for production builds)
//! 2. JSON file (~/.config/outreach/client.json)
//! 3. Runtime `OUTREACH_API_URL` environment variable
//!
//! Every URL goes through [`ApiBaseUrl::parse`], which only accepts
//! `https://`. A client can therefore never be built against an
//! insecure transport.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ClientError;

/// Client settings filename in the Outreach config directory
const CLIENT_CONFIG_FILE: &str = "client.json";

/// Environment variable holding the API base URL
const API_URL_VAR: &str = "OUTREACH_API_URL";

/// Default bound on a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default delay between Gmail connection checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default ceiling on waiting for the Gmail connection
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A validated HTTPS base URL for the backend API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBaseUrl(Url);

impl ApiBaseUrl {
    /// Parse and validate a base URL. Only `https` is accepted.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "https" {
            return Err(ClientError::InsecureUrl(trimmed.to_string()));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ClientError::InvalidUrl {
                url: trimmed.to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        Ok(Self(url))
    }

    /// Join an endpoint path onto the base URL
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ApiBaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Timing of the Gmail connection poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between profile checks
    pub interval: Duration,
    /// Hard ceiling after which the loop gives up
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Settings needed to talk to the backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: ApiBaseUrl,
    /// Bound on every request; exceeding it is reported as a timeout
    pub request_timeout: Duration,
    pub poll: PollSettings,
}

/// On-disk format of client.json
#[derive(Deserialize)]
struct ClientConfigFile {
    api_url: String,
    request_timeout_secs: Option<u64>,
    oauth_poll_interval_secs: Option<u64>,
    oauth_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Build a config with default timings for the given base URL
    pub fn new(api_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            api_url: ApiBaseUrl::parse(api_url)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollSettings::default(),
        })
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the Gmail poll timings
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Load the config using the priority order described in the module docs
    pub fn load() -> Result<Self> {
        if let Some(config) = Self::from_compile_time() {
            return Ok(config);
        }

        if config::config_exists(CLIENT_CONFIG_FILE) {
            let file: ClientConfigFile = config::load_json(CLIENT_CONFIG_FILE)?;
            return Self::from_config_file(file);
        }

        Self::from_env()
    }

    /// Base URL embedded at compile time.
    /// Build with: OUTREACH_API_URL=https://... cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let url = option_env!("OUTREACH_API_URL")?;
        if url.is_empty() {
            return None;
        }
        Self::new(url).ok()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ClientConfigFile = config::load_json_file(path)?;
        Self::from_config_file(file)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientConfigFile =
            serde_json::from_str(json).context("Failed to parse client config JSON")?;
        Self::from_config_file(file)
    }

    fn from_config_file(file: ClientConfigFile) -> Result<Self> {
        let mut config = Self::new(&file.api_url)?;
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = positive_secs("request_timeout_secs", secs)?;
        }
        if let Some(secs) = file.oauth_poll_interval_secs {
            config.poll.interval = positive_secs("oauth_poll_interval_secs", secs)?;
        }
        if let Some(secs) = file.oauth_timeout_secs {
            config.poll.timeout = positive_secs("oauth_timeout_secs", secs)?;
        }
        Ok(config)
    }

    /// Load the base URL from the environment
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(API_URL_VAR)
            .with_context(|| format!("{} environment variable not set", API_URL_VAR))?;
        Ok(Self::new(&url)?)
    }

    /// Get the default client config path (~/.config/outreach/client.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CLIENT_CONFIG_FILE)
    }
}

/// Durations in client.json must be at least one second
fn positive_secs(field: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("{} must be greater than zero", field);
    }
    Ok(Duration::from_secs(secs))
}
