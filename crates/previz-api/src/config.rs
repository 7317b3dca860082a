use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_COMFY_URL: &str = "http://localhost:8188";

/// Client configuration.
///
/// Passed explicitly to everything that talks to the backend; nothing reads
/// process globals after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the PreViz REST API, including the `/api` prefix
    pub api_base_url: String,

    /// Fall back to fixture data when a backend call fails
    pub use_mocks: bool,

    /// ComfyUI server used by the connection probe
    pub comfy_url: String,

    /// Default per-request timeout
    pub request_timeout_secs: u64,

    /// Timeout for script uploads
    pub upload_timeout_secs: u64,

    /// Timeout for storyboard export
    pub export_timeout_secs: u64,

    pub poll_interval_ms: u64,

    pub max_poll_attempts: u32,

    /// Simulated latency of the fixture source; 0 disables it
    pub mock_latency_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            use_mocks: false,
            comfy_url: DEFAULT_COMFY_URL.to_string(),
            request_timeout_secs: 120,
            upload_timeout_secs: 300,
            export_timeout_secs: 300,
            poll_interval_ms: 3000,
            max_poll_attempts: 100,
            mock_latency_ms: 300,
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

impl ClientConfig {
    /// Defaults overlaid with `PREVIZ_*` environment variables, falling back to
    /// the legacy `VITE_*` names.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get = |primary: &str, legacy: &str| set(primary).or_else(|| set(legacy));

        let mut config = Self::default();
        if let Some(url) = get("PREVIZ_API_BASE_URL", "VITE_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(flag) = get("PREVIZ_USE_MOCKS", "VITE_USE_MOCKS") {
            config.use_mocks = truthy(&flag);
        }
        if let Some(url) = get("PREVIZ_COMFY_URL", "VITE_COMFY_URL") {
            config.comfy_url = url;
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_mocks(mut self, enabled: bool) -> Self {
        self.use_mocks = enabled;
        self
    }

    pub fn with_comfy_url(mut self, url: impl Into<String>) -> Self {
        self.comfy_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Intervals beyond `u64::MAX` milliseconds saturate.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn with_mock_latency(mut self, latency: Duration) -> Self {
        self.mock_latency_ms = saturating_millis(latency);
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn mock_latency(&self) -> Duration {
        Duration::from_millis(self.mock_latency_ms)
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
