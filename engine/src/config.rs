//! Engine configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! `ARENA_*` environment variables.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// When the verdict engine runs for a debate that just finished its rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationMode {
    /// End as COMPLETED and adjudicate within the same sweep.
    #[default]
    Inline,
    /// End as VERDICT_READY; a later sweep drains the queue.
    Deferred,
}

impl FromStr for AdjudicationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "deferred" => Ok(Self::Deferred),
            other => Err(ConfigError::Invalid(format!(
                "unknown adjudication mode '{}'",
                other
            ))),
        }
    }
}

/// Tunables of the debate engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub adjudication_mode: AdjudicationMode,
    /// Upper bound on a single judge call
    pub judge_timeout_secs: u64,
    /// Appeals allowed per debate over its lifetime
    pub max_appeals_per_debate: u32,
    /// A PROCESSING appeal claimed longer ago than this is reclaimable
    pub stuck_appeal_after_secs: i64,
    pub max_total_rounds: u32,
    pub min_round_duration_secs: i64,
    pub max_round_duration_secs: i64,
    pub max_statement_chars: usize,
    /// Appeals per user per calendar month
    pub monthly_appeal_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adjudication_mode: AdjudicationMode::Inline,
            judge_timeout_secs: 60,
            max_appeals_per_debate: 2,
            stuck_appeal_after_secs: 15 * 60,
            max_total_rounds: 10,
            min_round_duration_secs: 60,
            max_round_duration_secs: 7 * 24 * 60 * 60,
            max_statement_chars: 10_000,
            monthly_appeal_limit: 3,
        }
    }
}

impl EngineConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ARENA_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Optional file, then environment, then validation.
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ARENA_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        if let Some(mode) = parsed(&lookup, "ARENA_ADJUDICATION_MODE") {
            self.adjudication_mode = mode;
        }
        if let Some(n) = parsed(&lookup, "ARENA_JUDGE_TIMEOUT_SECS") {
            self.judge_timeout_secs = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MAX_APPEALS_PER_DEBATE") {
            self.max_appeals_per_debate = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_STUCK_APPEAL_AFTER_SECS") {
            self.stuck_appeal_after_secs = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MAX_TOTAL_ROUNDS") {
            self.max_total_rounds = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MIN_ROUND_DURATION_SECS") {
            self.min_round_duration_secs = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MAX_ROUND_DURATION_SECS") {
            self.max_round_duration_secs = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MAX_STATEMENT_CHARS") {
            self.max_statement_chars = n;
        }
        if let Some(n) = parsed(&lookup, "ARENA_MONTHLY_APPEAL_LIMIT") {
            self.monthly_appeal_limit = n;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.judge_timeout_secs == 0 {
            return Err(ConfigError::Invalid("judge_timeout_secs must be > 0".into()));
        }
        if self.max_total_rounds == 0 {
            return Err(ConfigError::Invalid("max_total_rounds must be >= 1".into()));
        }
        if self.min_round_duration_secs <= 0
            || self.min_round_duration_secs > self.max_round_duration_secs
        {
            return Err(ConfigError::Invalid(format!(
                "round duration bounds [{}, {}] are not a valid range",
                self.min_round_duration_secs, self.max_round_duration_secs
            )));
        }
        if self.max_statement_chars == 0 {
            return Err(ConfigError::Invalid("max_statement_chars must be > 0".into()));
        }
        if self.stuck_appeal_after_secs <= 0 {
            return Err(ConfigError::Invalid(
                "stuck_appeal_after_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn judge_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.judge_timeout_secs)
    }

    pub fn stuck_appeal_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stuck_appeal_after_secs)
    }

    pub fn min_round_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_round_duration_secs)
    }

    pub fn max_round_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_round_duration_secs)
    }
}
