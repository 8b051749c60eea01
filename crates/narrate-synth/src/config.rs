//! Configuration for the HTTP voice engine client.

use std::time::Duration;

/// Environment variable holding the engine base URL.
pub const ENV_ENGINE_URL: &str = "NARRATE_ENGINE_URL";
/// Environment variable holding the engine API key.
pub const ENV_ENGINE_API_KEY: &str = "NARRATE_ENGINE_API_KEY";

/// Configuration for [`HttpSynthesisEngine`](crate::HttpSynthesisEngine).
///
/// ```
/// use narrate_synth::SynthConfig;
/// use std::time::Duration;
///
/// let config = SynthConfig::new()
///     .with_base_url("http://localhost:9000")
///     .with_timeout(Duration::from_secs(90));
/// ```
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) api_key_header: String,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            api_key_header: "xi-api-key".to_string(),
            user_agent: concat!("narrate-synth/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl SynthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `NARRATE_ENGINE_URL` / `NARRATE_ENGINE_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_ENGINE_URL) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        config.api_key = std::env::var(ENV_ENGINE_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty());
        config
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Header carrying the API key. Defaults to `xi-api-key`.
    #[must_use]
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Per-request timeout. Defaults to 120 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
