//! Planwright configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Planwright configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model registry source
    pub registry: RegistryConfig,

    /// Retry, circuit breaker and timeout settings
    pub router: RouterConfig,

    /// Generation / validation / review loop limits
    pub workflow: WorkflowConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.router.failure_threshold == 0 {
            return Err(eyre::eyre!("router.failure-threshold must be at least 1"));
        }
        if self.router.backoff_multiplier < 1.0 {
            return Err(eyre::eyre!(
                "router.backoff-multiplier must be >= 1.0 (got {})",
                self.router.backoff_multiplier
            ));
        }
        if self.router.max_backoff_ms < self.router.min_backoff_ms {
            return Err(eyre::eyre!("router.max-backoff-ms must be >= router.min-backoff-ms"));
        }
        if self.workflow.max_rounds == 0 {
            return Err(eyre::eyre!("workflow.max-rounds must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planwright.yml
        let local_config = PathBuf::from(".planwright.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planwright/planwright.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planwright").join("planwright.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Follows the same fallback chain as [`Config::load`] and swallows errors.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let mut candidates: Vec<PathBuf> = config_path.into_iter().cloned().collect();
        if candidates.is_empty() {
            candidates.push(PathBuf::from(".planwright.yml"));
            if let Some(config_dir) = dirs::config_dir() {
                candidates.push(config_dir.join("planwright").join("planwright.yml"));
            }
        }
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Where the model registry is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path to the registry source (YAML or JSON list of entries)
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let path = dirs::config_dir()
            .map(|d| d.join("planwright").join("models.yml"))
            .unwrap_or_else(|| PathBuf::from("models.yml"));
        Self { path }
    }
}

/// Router resilience settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Consecutive failures before a model's circuit opens
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,

    /// How long an open circuit stays open, in milliseconds
    #[serde(rename = "cooldown-ms")]
    pub cooldown_ms: u64,

    /// Attempts against the primary model before falling back
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Multiplier applied to the backoff after each failed attempt
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Lower bound for any backoff delay
    #[serde(rename = "min-backoff-ms")]
    pub min_backoff_ms: u64,

    /// Upper bound for any backoff delay
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Per-call network timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Role to try once when the primary role is exhausted
    #[serde(rename = "fallback-role")]
    pub fallback_role: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 60_000,
            max_retries: 3,
            initial_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            min_backoff_ms: 100,
            max_backoff_ms: 30_000,
            timeout_ms: 120_000,
            fallback_role: None,
        }
    }
}

impl RouterConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Workflow loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Registry role used for plan generation
    pub role: String,

    /// Maximum generation attempts
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,

    /// Maximum repair passes per invalid reply
    #[serde(rename = "max-repair-attempts")]
    pub max_repair_attempts: u32,

    /// Maximum clarification questions forwarded to the requester
    #[serde(rename = "max-clarifications")]
    pub max_clarifications: u32,

    /// Staging directory for the human-review checkpoint
    #[serde(rename = "review-dir")]
    pub review_dir: PathBuf,

    /// Require an approval marker before the checkpoint is read back
    #[serde(rename = "require-approval")]
    pub require_approval: bool,

    /// Give up waiting for review after this many milliseconds
    #[serde(rename = "review-timeout-ms")]
    pub review_timeout_ms: Option<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let review_dir = dirs::data_dir()
            .map(|d| d.join("planwright").join("review"))
            .unwrap_or_else(|| PathBuf::from(".planwright/review"));

        Self {
            role: "planner".to_string(),
            max_rounds: 5,
            max_repair_attempts: 3,
            max_clarifications: 3,
            review_dir,
            require_approval: false,
            review_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.router.failure_threshold, 5);
        assert_eq!(config.router.max_retries, 3);
        assert_eq!(config.workflow.role, "planner");
        assert_eq!(config.workflow.max_rounds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
registry:
  path: /etc/planwright/models.yml

router:
  failure-threshold: 3
  cooldown-ms: 5000
  max-retries: 2
  initial-backoff-ms: 250
  backoff-multiplier: 1.5
  timeout-ms: 30000
  fallback-role: reviewer

workflow:
  role: architect
  max-rounds: 4
  max-repair-attempts: 2
  review-dir: /tmp/review

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.registry.path, PathBuf::from("/etc/planwright/models.yml"));
        assert_eq!(config.router.failure_threshold, 3);
        assert_eq!(config.router.cooldown(), Duration::from_secs(5));
        assert_eq!(config.router.fallback_role.as_deref(), Some("reviewer"));
        assert_eq!(config.workflow.role, "architect");
        assert_eq!(config.workflow.max_repair_attempts, 2);
        assert_eq!(config.workflow.review_dir, PathBuf::from("/tmp/review"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
router:
  max-retries: 7
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.router.max_retries, 7);
        assert_eq!(config.router.failure_threshold, 5);
        assert_eq!(config.workflow.max_rounds, 5);
        assert!(config.router.fallback_role.is_none());
    }

    #[test]
    fn test_load_log_level_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pw.yml");
        fs::write(&path, "log-level: trace\n").unwrap();
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("trace"));

        let missing = dir.path().join("missing.yml");
        assert_eq!(Config::load_log_level(Some(&missing)), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.router.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workflow.max_rounds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.router.failure_threshold = 0;
        assert!(config.validate().is_err());
    }
}
