//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/prism/config.toml)
//! 3. Environment variables (PRISM_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapter::SceneTemplate;

/// Environment variable prefix
const ENV_PREFIX: &str = "PRISM";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for persisted history blobs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log file path (optional, defaults to stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Scene assumed when a document carries no hint
    #[serde(default = "default_scene")]
    pub default_scene: SceneTemplate,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub ai: AiConfig,
}

/// Snapshot history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum snapshots kept; older ones are evicted from the front
    pub max_history_size: usize,
    /// Compression runs after every this many snapshots
    pub compress_interval: usize,
    /// Runs of the same operation longer than this are collapsed
    pub compress_min_run: usize,
    /// Storage key for the persisted history blob
    pub storage_key: String,
    /// Whether periodic auto-save is enabled
    pub auto_save: bool,
    /// Minimum seconds between opportunistic auto-saves
    pub auto_save_interval_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_size: 50,
            compress_interval: 10,
            compress_min_run: 5,
            storage_key: "prism-history".to_string(),
            auto_save: true,
            auto_save_interval_secs: 30,
        }
    }
}

impl HistoryConfig {
    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }
}

/// Rate limiting for high-frequency adapter events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Trailing debounce for text changes, in milliseconds
    pub content_debounce_ms: u64,
    /// Leading+trailing throttle for selection changes, in milliseconds
    pub selection_throttle_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            content_debounce_ms: 100,
            selection_throttle_ms: 50,
        }
    }
}

impl InputConfig {
    pub fn content_debounce(&self) -> Duration {
        Duration::from_millis(self.content_debounce_ms)
    }

    pub fn selection_throttle(&self) -> Duration {
        Duration::from_millis(self.selection_throttle_ms)
    }
}

/// Thresholds used by adapter health scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Ring buffer capacity for performance samples
    pub sample_capacity: usize,
    /// An operation slower than this is flagged slow, in milliseconds
    pub slow_operation_ms: u64,
    /// Recent average render time above this marks the adapter unhealthy
    pub max_average_render_ms: u64,
    /// Memory usage above this marks the adapter unhealthy, in megabytes
    pub max_memory_mb: u64,
    /// Error rate (errors per operation) above this marks the adapter unhealthy
    pub max_error_rate: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 100,
            slow_operation_ms: 100,
            max_average_render_ms: 50,
            max_memory_mb: 100,
            max_error_rate: 0.05,
        }
    }
}

/// AI capability settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Deadline for a single AI request, in seconds
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: None,
            default_scene: default_scene(),
            history: HistoryConfig::default(),
            input: InputConfig::default(),
            performance: PerformanceConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PRISM_DATA_DIR, PRISM_MAX_HISTORY, PRISM_AUTO_SAVE, PRISM_LOG_FILE)
    /// 2. Config file (~/.config/prism/config.toml or PRISM_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration with an optional CLI-provided path
    pub fn load_with_cli_override(cli_path: Option<&PathBuf>) -> Result<Self> {
        match cli_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // PRISM_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // PRISM_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // PRISM_MAX_HISTORY
        if let Ok(val) = std::env::var(format!("{}_MAX_HISTORY", ENV_PREFIX)) {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.history.max_history_size = n,
                _ => tracing::warn!("Ignoring invalid PRISM_MAX_HISTORY value: {}", val),
            }
        }

        // PRISM_AUTO_SAVE
        if let Ok(val) = std::env::var(format!("{}_AUTO_SAVE", ENV_PREFIX)) {
            self.history.auto_save = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PRISM_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prism")
            .join("config.toml")
    }

    /// Directory holding persisted history blobs
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prism")
}

fn default_scene() -> SceneTemplate {
    SceneTemplate::Writing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "PRISM_DATA_DIR",
        "PRISM_LOG_FILE",
        "PRISM_MAX_HISTORY",
        "PRISM_AUTO_SAVE",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.data_dir.ends_with("prism"));
        assert_eq!(config.history.max_history_size, 50);
        assert_eq!(config.history.compress_interval, 10);
        assert_eq!(config.history.compress_min_run, 5);
        assert_eq!(config.input.content_debounce(), Duration::from_millis(100));
        assert_eq!(config.input.selection_throttle(), Duration::from_millis(50));
        assert_eq!(config.ai.timeout(), Duration::from_secs(30));
        assert_eq!(config.default_scene, SceneTemplate::Writing);
    }

    #[test]
    fn test_history_dir() {
        let config = Config::default();
        assert!(config.history_dir().ends_with("history"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PRISM_DATA_DIR", "/tmp/prism-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/prism-test"));
    }

    #[test]
    fn test_env_override_max_history() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PRISM_MAX_HISTORY", "7");
        config.apply_env_overrides();
        assert_eq!(config.history.max_history_size, 7);

        // Invalid values are ignored
        env::set_var("PRISM_MAX_HISTORY", "lots");
        config.apply_env_overrides();
        assert_eq!(config.history.max_history_size, 7);

        env::set_var("PRISM_MAX_HISTORY", "0");
        config.apply_env_overrides();
        assert_eq!(config.history.max_history_size, 7);
    }

    #[test]
    fn test_env_override_auto_save() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PRISM_AUTO_SAVE", "false");
        config.apply_env_overrides();
        assert!(!config.history.auto_save);

        env::set_var("PRISM_AUTO_SAVE", "1");
        config.apply_env_overrides();
        assert!(config.history.auto_save);
    }

    #[test]
    fn test_env_override_log_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("PRISM_LOG_FILE", "/tmp/prism.log");
        config.apply_env_overrides();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/prism.log")));

        // Empty string clears it
        env::set_var("PRISM_LOG_FILE", "");
        config.apply_env_overrides();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config {
            data_dir: PathBuf::from("/data/prism"),
            ..Config::default()
        };
        config.history.max_history_size = 200;
        config.default_scene = SceneTemplate::Planning;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("[history]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.history, config.history);
        assert_eq!(parsed.default_scene, SceneTemplate::Planning);
    }

    #[test]
    fn test_load_from_str_partial_sections() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            default_scene = "research"

            [history]
            max_history_size = 20

            [performance]
            slow_operation_ms = 250
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.default_scene, SceneTemplate::Research);
        assert_eq!(config.history.max_history_size, 20);
        // Unspecified fields keep their defaults
        assert_eq!(config.history.compress_interval, 10);
        assert_eq!(config.performance.slow_operation_ms, 250);
        assert_eq!(config.performance.sample_capacity, 100);
        assert_eq!(config.ai.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.history.max_history_size, 50);
    }

    #[test]
    fn test_load_from_path_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[input]\ncontent_debounce_ms = 300\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.input.content_debounce_ms, 300);
        assert_eq!(config.input.selection_throttle_ms, 50);
    }

    #[test]
    fn test_save_to_path_creates_parent() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.ai.timeout_secs = 5;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.ai.timeout(), Duration::from_secs(5));
    }
}
