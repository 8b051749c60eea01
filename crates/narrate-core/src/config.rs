//! Process-level pipeline configuration.
//!
//! Unlike [`RenderSettings`](crate::settings::RenderSettings), nothing here
//! is hashed or persisted with a job. A `RenderConfig` is built once by the
//! composition root and handed to the pipeline explicitly.

use std::time::Duration;

/// Retry policy for storage reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Add up to 50% random extra delay to each sleep.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy for reads the pipeline cannot proceed without (request, status).
    #[must_use]
    pub const fn critical() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter: true,
        }
    }

    /// Policy for reads with a cheap fallback (cache probes).
    #[must_use]
    pub const fn opportunistic() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(150),
            max_delay: Duration::from_millis(600),
            jitter: false,
        }
    }

    /// Single attempt, no sleeping.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Replace the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replace the base and cap delays.
    #[must_use]
    pub const fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Effective attempt budget (a zero budget still makes one attempt).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based),
    /// before jitter is applied.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::critical()
    }
}

/// Pacing between consecutive calls to the voice engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Number of initial engine calls that use `warmup_delay`.
    pub warmup_calls: u32,
    /// Delay after each of the first `warmup_calls` engine calls.
    pub warmup_delay: Duration,
    /// Delay after every later engine call.
    pub steady_delay: Duration,
}

impl PacingConfig {
    /// No delays at all (tests, bypass runs).
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            warmup_calls: 0,
            warmup_delay: Duration::ZERO,
            steady_delay: Duration::ZERO,
        }
    }

    /// Delay to insert after the `calls_made`-th engine call (1-based).
    #[must_use]
    pub const fn delay_after(&self, calls_made: u32) -> Duration {
        if calls_made <= self.warmup_calls {
            self.warmup_delay
        } else {
            self.steady_delay
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            warmup_calls: 3,
            warmup_delay: Duration::from_millis(1_200),
            steady_delay: Duration::from_millis(350),
        }
    }
}

/// Continuity context passed to the voice engine with every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuityConfig {
    /// Characters of neighbouring chunk text sent as context.
    pub context_chars: usize,
    /// Most-recent engine request ids forwarded with each call.
    pub request_id_window: usize,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            context_chars: 300,
            request_id_window: 3,
        }
    }
}

/// Options recognised by the render pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Return synthetic silence instead of calling the voice engine.
    pub bypass_engine: bool,
    /// Reads of request/manifest/status.
    pub critical_retry: RetryPolicy,
    /// Chunk cache probes.
    pub opportunistic_retry: RetryPolicy,
    pub pacing: PacingConfig,
    pub continuity: ContinuityConfig,
    /// Ceiling on a single render; `None` means unbounded.
    pub job_timeout: Option<Duration>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bypass_engine: false,
            critical_retry: RetryPolicy::critical(),
            opportunistic_retry: RetryPolicy::opportunistic(),
            pacing: PacingConfig::default(),
            continuity: ContinuityConfig::default(),
            job_timeout: None,
        }
    }
}

/// Configuration parse error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {key}: {value:?} ({reason})")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

impl RenderConfig {
    /// Configuration suitable for tests: no pacing, tiny retry delays.
    #[must_use]
    pub fn for_tests() -> Self {
        let fast = Duration::from_millis(1);
        Self {
            bypass_engine: false,
            critical_retry: RetryPolicy::critical().with_delays(fast, fast),
            opportunistic_retry: RetryPolicy::opportunistic().with_delays(fast, fast),
            pacing: PacingConfig::immediate(),
            continuity: ContinuityConfig::default(),
            job_timeout: None,
        }
    }

    /// Build from `NARRATE_*` process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, starting from defaults.
    ///
    /// Recognised keys:
    /// - `NARRATE_BYPASS_ENGINE` (bool)
    /// - `NARRATE_CRITICAL_ATTEMPTS`, `NARRATE_CACHE_ATTEMPTS` (u32)
    /// - `NARRATE_RETRY_BASE_MS`, `NARRATE_RETRY_MAX_MS` (u64, applied to both policies)
    /// - `NARRATE_WARMUP_CALLS` (u32), `NARRATE_WARMUP_DELAY_MS`, `NARRATE_STEADY_DELAY_MS` (u64)
    /// - `NARRATE_CONTEXT_CHARS`, `NARRATE_REQUEST_ID_WINDOW` (usize)
    /// - `NARRATE_JOB_TIMEOUT_SECS` (u64, 0 disables)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_with(&lookup, "NARRATE_BYPASS_ENGINE", parse_bool)? {
            config.bypass_engine = v;
        }
        if let Some(v) = parse_with(&lookup, "NARRATE_CRITICAL_ATTEMPTS", parse_num::<u32>)? {
            config.critical_retry.max_attempts = v;
        }
        if let Some(v) = parse_with(&lookup, "NARRATE_CACHE_ATTEMPTS", parse_num::<u32>)? {
            config.opportunistic_retry.max_attempts = v;
        }
        if let Some(ms) = parse_with(&lookup, "NARRATE_RETRY_BASE_MS", parse_num::<u64>)? {
            config.critical_retry.base_delay = Duration::from_millis(ms);
            config.opportunistic_retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_with(&lookup, "NARRATE_RETRY_MAX_MS", parse_num::<u64>)? {
            config.critical_retry.max_delay = Duration::from_millis(ms);
            config.opportunistic_retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse_with(&lookup, "NARRATE_WARMUP_CALLS", parse_num::<u32>)? {
            config.pacing.warmup_calls = v;
        }
        if let Some(ms) = parse_with(&lookup, "NARRATE_WARMUP_DELAY_MS", parse_num::<u64>)? {
            config.pacing.warmup_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_with(&lookup, "NARRATE_STEADY_DELAY_MS", parse_num::<u64>)? {
            config.pacing.steady_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse_with(&lookup, "NARRATE_CONTEXT_CHARS", parse_num::<usize>)? {
            config.continuity.context_chars = v;
        }
        if let Some(v) = parse_with(&lookup, "NARRATE_REQUEST_ID_WINDOW", parse_num::<usize>)? {
            config.continuity.request_id_window = v;
        }
        if let Some(secs) = parse_with(&lookup, "NARRATE_JOB_TIMEOUT_SECS", parse_num::<u64>)? {
            config.job_timeout = (secs > 0).then_some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_with<F, T>(
    lookup: &F,
    key: &str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse(trimmed).map(Some).map_err(|reason| ConfigError {
        key: key.to_string(),
        value: raw.clone(),
        reason,
    })
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| e.to_string())
}
