//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.peerly.toml` in the working directory
//! 4. `~/.config/peerly/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::constants;
use crate::env::Env;
use crate::models::{DEFAULT_WORKERS, ProviderName, Severity};

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub review: ReviewConfig,
    pub provider: ProviderConfig,
    pub guidelines: GuidelinesConfig,
    pub aggregation: AggregationConfig,
}

/// Review pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Worker kinds enabled when the request names none.
    pub workers: Vec<String>,
    pub task_timeout_secs: u64,
    pub request_deadline_secs: u64,
    /// Optional cap on simultaneously running (section, worker) tasks.
    /// Unset means every pair runs at once.
    pub max_concurrent: Option<usize>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Directory of custom worker profiles.
    pub profile_dir: Option<PathBuf>,
    pub fail_on: Option<Severity>,
    /// Finished reports kept for identical requests. Zero disables the cache.
    pub report_cache_capacity: usize,
    pub report_cache_ttl_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS.iter().map(|w| w.to_string()).collect(),
            task_timeout_secs: 30,
            request_deadline_secs: 120,
            max_concurrent: None,
            max_retries: 2,
            retry_backoff_ms: 250,
            profile_dir: None,
            fail_on: None,
            report_cache_capacity: 32,
            report_cache_ttl_secs: 3600,
        }
    }
}

impl ReviewConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn report_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.report_cache_ttl_secs)
    }
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub temperature: f64,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            base_url: None,
            api_key: None,
        }
    }
}

/// Guideline retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidelinesConfig {
    pub enabled: bool,
    /// HTTP search endpoint of the knowledge store.
    pub url: Option<String>,
    /// Local directory of guideline documents, used when `url` is unset.
    pub dir: Option<PathBuf>,
    pub collection: String,
    pub top_k: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    /// Character budget for content sampled into each query.
    pub sample_chars: usize,
    pub timeout_secs: u64,
}

impl Default for GuidelinesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            dir: None,
            collection: "guidelines".to_string(),
            top_k: 3,
            cache_capacity: 256,
            cache_ttl_secs: 3600,
            sample_chars: 1200,
            timeout_secs: 10,
        }
    }
}

/// Deduplication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Candidates at most this many lines apart may merge.
    pub line_window: usize,
    /// Minimum word-overlap similarity for two issue texts to merge.
    pub similarity_threshold: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            line_window: 1,
            similarity_threshold: 0.5,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, local config in `dir`, then applies
    /// environment variable overrides. CLI flags are applied by the caller.
    pub fn load(dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: local config
        if let Some(root) = dir {
            let local_path = root.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "review.task_timeout_secs must be positive".into(),
            ));
        }
        if self.review.task_timeout_secs >= self.review.request_deadline_secs {
            return Err(ConfigError::Invalid(format!(
                "review.task_timeout_secs ({}) must be shorter than review.request_deadline_secs ({})",
                self.review.task_timeout_secs, self.review.request_deadline_secs
            )));
        }
        if self.review.max_concurrent == Some(0) {
            return Err(ConfigError::Invalid(
                "review.max_concurrent must be positive".into(),
            ));
        }
        if self.guidelines.top_k == 0 {
            return Err(ConfigError::Invalid("guidelines.top_k must be positive".into()));
        }
        if self.guidelines.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "guidelines.cache_capacity must be positive".into(),
            ));
        }
        let t = self.aggregation.similarity_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "aggregation.similarity_threshold must be in (0, 1], got {t}"
            )));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature must be in [0, 2], got {}",
                self.provider.temperature
            )));
        }
        Ok(())
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let review = ReviewConfig::default();
        if other.review.workers != review.workers {
            self.review.workers = other.review.workers;
        }
        if other.review.task_timeout_secs != review.task_timeout_secs {
            self.review.task_timeout_secs = other.review.task_timeout_secs;
        }
        if other.review.request_deadline_secs != review.request_deadline_secs {
            self.review.request_deadline_secs = other.review.request_deadline_secs;
        }
        if other.review.max_concurrent.is_some() {
            self.review.max_concurrent = other.review.max_concurrent;
        }
        if other.review.max_retries != review.max_retries {
            self.review.max_retries = other.review.max_retries;
        }
        if other.review.retry_backoff_ms != review.retry_backoff_ms {
            self.review.retry_backoff_ms = other.review.retry_backoff_ms;
        }
        if other.review.profile_dir.is_some() {
            self.review.profile_dir = other.review.profile_dir;
        }
        if other.review.fail_on.is_some() {
            self.review.fail_on = other.review.fail_on;
        }
        if other.review.report_cache_capacity != review.report_cache_capacity {
            self.review.report_cache_capacity = other.review.report_cache_capacity;
        }
        if other.review.report_cache_ttl_secs != review.report_cache_ttl_secs {
            self.review.report_cache_ttl_secs = other.review.report_cache_ttl_secs;
        }

        let provider = ProviderConfig::default();
        if other.provider.name != provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.temperature != provider.temperature {
            self.provider.temperature = other.provider.temperature;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Disabled overrides enabled.
        let guidelines = GuidelinesConfig::default();
        if !other.guidelines.enabled {
            self.guidelines.enabled = false;
        }
        if other.guidelines.url.is_some() {
            self.guidelines.url = other.guidelines.url;
        }
        if other.guidelines.dir.is_some() {
            self.guidelines.dir = other.guidelines.dir;
        }
        if other.guidelines.collection != guidelines.collection {
            self.guidelines.collection = other.guidelines.collection;
        }
        if other.guidelines.top_k != guidelines.top_k {
            self.guidelines.top_k = other.guidelines.top_k;
        }
        if other.guidelines.cache_capacity != guidelines.cache_capacity {
            self.guidelines.cache_capacity = other.guidelines.cache_capacity;
        }
        if other.guidelines.cache_ttl_secs != guidelines.cache_ttl_secs {
            self.guidelines.cache_ttl_secs = other.guidelines.cache_ttl_secs;
        }
        if other.guidelines.sample_chars != guidelines.sample_chars {
            self.guidelines.sample_chars = other.guidelines.sample_chars;
        }
        if other.guidelines.timeout_secs != guidelines.timeout_secs {
            self.guidelines.timeout_secs = other.guidelines.timeout_secs;
        }

        let aggregation = AggregationConfig::default();
        if other.aggregation.line_window != aggregation.line_window {
            self.aggregation.line_window = other.aggregation.line_window;
        }
        if other.aggregation.similarity_threshold != aggregation.similarity_threshold {
            self.aggregation.similarity_threshold = other.aggregation.similarity_threshold;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.var(constants::ENV_PROVIDER) {
            match val.parse::<ProviderName>() {
                Ok(name) => self.provider.name = name,
                Err(_) => warn!(var = constants::ENV_PROVIDER, value = %val, "ignoring invalid value"),
            }
        }
        if let Some(val) = env.var(constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.var(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .var(constants::ENV_API_KEY)
            .or_else(|| env.var(self.provider.name.api_key_env_var()));
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.var(constants::ENV_GUIDELINES_URL) {
            self.guidelines.url = Some(val);
        }
        match env.flag(constants::ENV_GUIDELINES) {
            Some(Ok(enabled)) => self.guidelines.enabled = enabled,
            Some(Err(val)) => {
                warn!(var = constants::ENV_GUIDELINES, value = %val, "ignoring invalid value")
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.provider.name, ProviderName::OpenAI);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.review.workers, vec!["clarity", "rigor"]);
        assert_eq!(config.review.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.guidelines.top_k, 3);
        assert_eq!(config.aggregation.line_window, 1);
        assert_eq!(config.review.max_concurrent, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[review]
workers = ["rigor"]
fail_on = "warning"
max_concurrent = 2

[provider]
name = "anthropic"
model = "claude-sonnet-4-20250514"

[guidelines]
enabled = false
dir = "guides"

[aggregation]
similarity_threshold = 0.7
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.review.workers, vec!["rigor"]);
        assert_eq!(config.review.fail_on, Some(Severity::Warning));
        assert_eq!(config.review.max_concurrent, Some(2));
        assert_eq!(config.provider.name, ProviderName::Anthropic);
        assert!(!config.guidelines.enabled);
        assert_eq!(config.guidelines.dir, Some(PathBuf::from("guides")));
        assert_eq!(config.aggregation.similarity_threshold, 0.7);
        // Unset keys keep their defaults.
        assert_eq!(config.review.task_timeout_secs, 30);
    }

    #[test]
    fn merge_overrides_non_default_values() {
        let mut base = Config::default();
        let mut other = Config::default();

        other.review.workers = vec!["clarity".into()];
        other.review.task_timeout_secs = 10;
        other.review.fail_on = Some(Severity::Error);
        other.provider.name = ProviderName::Gemini;
        other.provider.api_key = Some("sk-test".into());
        other.guidelines.enabled = false;
        other.guidelines.url = Some("http://kb.local/search".into());
        other.guidelines.top_k = 5;
        other.aggregation.line_window = 2;

        base.merge(other);

        assert_eq!(base.review.workers, vec!["clarity"]);
        assert_eq!(base.review.task_timeout_secs, 10);
        assert_eq!(base.review.fail_on, Some(Severity::Error));
        assert_eq!(base.provider.name, ProviderName::Gemini);
        assert_eq!(base.provider.api_key.as_deref(), Some("sk-test"));
        assert!(!base.guidelines.enabled);
        assert_eq!(base.guidelines.url.as_deref(), Some("http://kb.local/search"));
        assert_eq!(base.guidelines.top_k, 5);
        assert_eq!(base.aggregation.line_window, 2);
    }

    #[test]
    fn merge_keeps_base_when_other_is_default() {
        let mut base = Config::default();
        base.provider.model = "gpt-4o".to_string();
        base.review.max_retries = 4;
        base.guidelines.enabled = false;

        base.merge(Config::default());

        assert_eq!(base.provider.model, "gpt-4o");
        assert_eq!(base.review.max_retries, 4);
        assert!(!base.guidelines.enabled);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut c = Config::default();
        c.review.task_timeout_secs = 120;
        assert!(c.validate().unwrap_err().to_string().contains("shorter"));

        let mut c = Config::default();
        c.guidelines.top_k = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.review.max_concurrent = Some(0);
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.guidelines.cache_capacity = 0;
        assert!(c.validate().is_err());

        for t in [0.0, 1.5, f64::NAN] {
            let mut c = Config::default();
            c.aggregation.similarity_threshold = t;
            assert!(c.validate().is_err(), "threshold {t} accepted");
        }
    }

    #[test]
    fn load_file_errors_name_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{ toml").unwrap();
        assert!(Config::load_file(&path).unwrap_err().to_string().contains("parse"));

        let missing = Config::load_file(Path::new("/tmp/peerly_not_exist_config.toml"));
        assert!(missing.unwrap_err().to_string().contains("read"));
    }

    #[test]
    fn load_from_working_dir() {
        let env = Env::mock(Vec::<(&str, &str)>::new());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".peerly.toml"),
            "[provider]\nmodel = \"gpt-4o\"\n\n[review]\nmax_retries = 5\n",
        )
        .unwrap();

        let config = Config::load(Some(dir.path()), &env).unwrap();
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.review.max_retries, 5);
    }

    #[test]
    fn env_overrides_file_values() {
        let env = Env::mock([
            ("PEERLY_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-anthropic-test"),
            ("PEERLY_MODEL", "claude-sonnet-4-20250514"),
            ("PEERLY_GUIDELINES_URL", "http://kb.local/search"),
            ("PEERLY_GUIDELINES", "off"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.name, ProviderName::Anthropic);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-anthropic-test"));
        assert_eq!(config.provider.model, "claude-sonnet-4-20250514");
        assert_eq!(config.guidelines.url.as_deref(), Some("http://kb.local/search"));
        assert!(!config.guidelines.enabled);
    }

    #[test]
    fn generic_api_key_wins_over_provider_specific() {
        let env = Env::mock([("PEERLY_API_KEY", "sk-generic"), ("OPENAI_API_KEY", "sk-openai")]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-generic"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env = Env::mock([("PEERLY_PROVIDER", "not-a-provider"), ("PEERLY_GUIDELINES", "maybe")]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.provider.name, ProviderName::OpenAI);
        assert!(config.guidelines.enabled);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".into()),
            ..ProviderConfig::default()
        };
        let out = format!("{config:?}");
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("[REDACTED]"));
    }
}
