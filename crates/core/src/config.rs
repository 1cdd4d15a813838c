//! Viewer configuration
//!
//! Settings can be built programmatically, loaded from `STRIP_VIEWER_*`
//! environment variables, or read from a TOML file. Durations are stored in
//! the file as whole milliseconds.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use strip_viewer_cache::CacheLimits;
use strip_viewer_scheduler::RetryPolicy;

/// Configuration for the windowed cache, the jump coordinator and the
/// scroll trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Materialization unit.
    pub batch_size: usize,

    /// Resident count above which eviction passes run.
    pub max_resident: usize,

    /// Minimum distance from the current position before an entry can be
    /// evicted.
    pub unload_threshold: usize,

    /// Distance in pixels from a viewport edge at which prefetch starts.
    pub load_threshold_px: f32,

    /// Residency checks before a jump gives up.
    pub jump_attempt_budget: u32,

    /// Delay between residency checks.
    #[serde(rename = "jump_retry_delay_ms", with = "millis")]
    pub jump_retry_delay: Duration,

    /// Wait after repositioning before a jump completes.
    #[serde(rename = "jump_settle_delay_ms", with = "millis")]
    pub jump_settle_delay: Duration,

    /// Wait before repositioning, letting freshly inserted entries lay out.
    #[serde(rename = "jump_reflow_delay_ms", with = "millis")]
    pub jump_reflow_delay: Duration,

    /// Longest wait for a resident target to finish decoding.
    #[serde(rename = "ready_timeout_ms", with = "millis")]
    pub ready_timeout: Duration,

    /// Jumps farther than this load five neighborhoods instead of three.
    pub long_jump_distance: usize,

    /// How long a computed position stays valid outside of a jump.
    #[serde(rename = "position_cache_ttl_ms", with = "millis")]
    pub position_cache_ttl: Duration,

    /// Minimum interval between scroll-driven eviction passes.
    #[serde(rename = "unload_check_interval_ms", with = "millis")]
    pub unload_check_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_resident: 100,
            unload_threshold: 45,
            load_threshold_px: 300.0,
            jump_attempt_budget: 20,
            jump_retry_delay: Duration::from_millis(50),
            jump_settle_delay: Duration::from_millis(150),
            jump_reflow_delay: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(3),
            long_jump_distance: 50,
            position_cache_ttl: Duration::from_millis(100),
            unload_check_interval: Duration::from_secs(2),
        }
    }
}

impl ViewerConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the eviction trigger.
    pub fn with_max_resident(mut self, max_resident: usize) -> Self {
        self.max_resident = max_resident;
        self
    }

    /// Set the eviction distance.
    pub fn with_unload_threshold(mut self, unload_threshold: usize) -> Self {
        self.unload_threshold = unload_threshold;
        self
    }

    /// Set the prefetch distance in pixels.
    pub fn with_load_threshold_px(mut self, px: f32) -> Self {
        self.load_threshold_px = px;
        self
    }

    /// Set the jump residency budget and the delay between checks.
    pub fn with_jump_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.jump_attempt_budget = attempts;
        self.jump_retry_delay = delay;
        self
    }

    /// Set the post-reposition settle delay.
    pub fn with_jump_settle_delay(mut self, delay: Duration) -> Self {
        self.jump_settle_delay = delay;
        self
    }

    /// Set the ready timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Cache limits derived from this configuration.
    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits {
            batch_size: self.batch_size,
            max_resident: self.max_resident,
            unload_threshold: self.unload_threshold,
        }
    }

    /// Residency polling policy for jumps.
    pub fn jump_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.jump_attempt_budget, self.jump_retry_delay)
    }

    /// Check that the settings can work together.
    ///
    /// # Errors
    /// Returns an error for a zero batch size, a negative or non-finite
    /// prefetch distance, or a `max_resident` smaller than what one eviction
    /// pass can leave behind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue("batch_size".to_string()));
        }
        if !self.load_threshold_px.is_finite() || self.load_threshold_px < 0.0 {
            return Err(ConfigError::InvalidValue("load_threshold_px".to_string()));
        }

        let retained = self.cache_limits().retained_window();
        if self.max_resident < retained {
            return Err(ConfigError::Inconsistent(format!(
                "max_resident {} is below the {} entries an eviction pass retains \
                 with batch_size {} and unload_threshold {}",
                self.max_resident, retained, self.batch_size, self.unload_threshold
            )));
        }
        Ok(())
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `STRIP_VIEWER_BATCH_SIZE`
    /// - `STRIP_VIEWER_MAX_RESIDENT`
    /// - `STRIP_VIEWER_UNLOAD_THRESHOLD`
    /// - `STRIP_VIEWER_LOAD_THRESHOLD_PX`
    /// - `STRIP_VIEWER_JUMP_ATTEMPTS`
    /// - `STRIP_VIEWER_JUMP_RETRY_MS`
    /// - `STRIP_VIEWER_JUMP_SETTLE_MS`
    /// - `STRIP_VIEWER_JUMP_REFLOW_MS`
    /// - `STRIP_VIEWER_READY_TIMEOUT_MS`
    /// - `STRIP_VIEWER_LONG_JUMP_DISTANCE`
    /// - `STRIP_VIEWER_POSITION_TTL_MS`
    /// - `STRIP_VIEWER_UNLOAD_INTERVAL_MS`
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_value("STRIP_VIEWER_BATCH_SIZE")? {
            config.batch_size = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_MAX_RESIDENT")? {
            config.max_resident = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_UNLOAD_THRESHOLD")? {
            config.unload_threshold = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_LOAD_THRESHOLD_PX")? {
            config.load_threshold_px = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_JUMP_ATTEMPTS")? {
            config.jump_attempt_budget = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_JUMP_RETRY_MS")? {
            config.jump_retry_delay = Duration::from_millis(value);
        }
        if let Some(value) = env_value("STRIP_VIEWER_JUMP_SETTLE_MS")? {
            config.jump_settle_delay = Duration::from_millis(value);
        }
        if let Some(value) = env_value("STRIP_VIEWER_JUMP_REFLOW_MS")? {
            config.jump_reflow_delay = Duration::from_millis(value);
        }
        if let Some(value) = env_value("STRIP_VIEWER_READY_TIMEOUT_MS")? {
            config.ready_timeout = Duration::from_millis(value);
        }
        if let Some(value) = env_value("STRIP_VIEWER_LONG_JUMP_DISTANCE")? {
            config.long_jump_distance = value;
        }
        if let Some(value) = env_value("STRIP_VIEWER_POSITION_TTL_MS")? {
            config.position_cache_ttl = Duration::from_millis(value);
        }
        if let Some(value) = env_value("STRIP_VIEWER_UNLOAD_INTERVAL_MS")? {
            config.unload_check_interval = Duration::from_millis(value);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file. Missing keys keep their
    /// defaults.
    ///
    /// Expected file format:
    /// ```toml
    /// batch_size = 10
    /// max_resident = 100
    /// unload_threshold = 45
    /// jump_retry_delay_ms = 50
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), toml)?;
        Ok(())
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration key or environment variable
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// Settings that cannot work together
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),

    /// I/O error reading or writing a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed TOML
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "STRIP_VIEWER_BATCH_SIZE",
        "STRIP_VIEWER_MAX_RESIDENT",
        "STRIP_VIEWER_UNLOAD_THRESHOLD",
        "STRIP_VIEWER_LOAD_THRESHOLD_PX",
        "STRIP_VIEWER_JUMP_ATTEMPTS",
        "STRIP_VIEWER_JUMP_RETRY_MS",
        "STRIP_VIEWER_JUMP_SETTLE_MS",
        "STRIP_VIEWER_JUMP_REFLOW_MS",
        "STRIP_VIEWER_READY_TIMEOUT_MS",
        "STRIP_VIEWER_LONG_JUMP_DISTANCE",
        "STRIP_VIEWER_POSITION_TTL_MS",
        "STRIP_VIEWER_UNLOAD_INTERVAL_MS",
    ];

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_resident, 100);
        assert_eq!(config.jump_attempt_budget, 20);
        assert_eq!(config.jump_retry_delay, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ViewerConfig::new()
            .with_batch_size(5)
            .with_max_resident(60)
            .with_unload_threshold(20)
            .with_load_threshold_px(150.0)
            .with_jump_retry(4, Duration::from_millis(10))
            .with_jump_settle_delay(Duration::ZERO)
            .with_ready_timeout(Duration::from_millis(500));

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.jump_retry_policy().budget(), Duration::from_millis(40));
        assert_eq!(config.cache_limits().unload_threshold, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_undersized_window() {
        let config = ViewerConfig::default().with_unload_threshold(50);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));

        let config = ViewerConfig::default().with_batch_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = ViewerConfig::default().with_load_threshold_px(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("STRIP_VIEWER_BATCH_SIZE", "20");
        env::set_var("STRIP_VIEWER_MAX_RESIDENT", "200");
        env::set_var("STRIP_VIEWER_JUMP_RETRY_MS", "25");
        env::set_var("STRIP_VIEWER_LOAD_THRESHOLD_PX", "512.5");

        let config = ViewerConfig::from_env().unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_resident, 200);
        assert_eq!(config.jump_retry_delay, Duration::from_millis(25));
        assert_eq!(config.load_threshold_px, 512.5);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("STRIP_VIEWER_JUMP_ATTEMPTS", "5");

        let config = ViewerConfig::from_env().unwrap();
        assert_eq!(config.jump_attempt_budget, 5);
        assert_eq!(config.batch_size, 10); // default
    }

    #[test]
    #[serial]
    fn test_from_env_jump_timing_and_intervals() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("STRIP_VIEWER_JUMP_REFLOW_MS", "40");
        env::set_var("STRIP_VIEWER_READY_TIMEOUT_MS", "1500");
        env::set_var("STRIP_VIEWER_LONG_JUMP_DISTANCE", "80");
        env::set_var("STRIP_VIEWER_POSITION_TTL_MS", "250");
        env::set_var("STRIP_VIEWER_UNLOAD_INTERVAL_MS", "750");

        let config = ViewerConfig::from_env().unwrap();
        assert_eq!(config.jump_reflow_delay, Duration::from_millis(40));
        assert_eq!(config.ready_timeout, Duration::from_millis(1500));
        assert_eq!(config.long_jump_distance, 80);
        assert_eq!(config.position_cache_ttl, Duration::from_millis(250));
        assert_eq!(config.unload_check_interval, Duration::from_millis(750));
        assert_eq!(config.jump_settle_delay, Duration::from_millis(150));

        env::set_var("STRIP_VIEWER_UNLOAD_INTERVAL_MS", "soon");
        assert!(matches!(
            ViewerConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "STRIP_VIEWER_UNLOAD_INTERVAL_MS"
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&["STRIP_VIEWER_MAX_RESIDENT"]);

        env::set_var("STRIP_VIEWER_MAX_RESIDENT", "lots");
        let result = ViewerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "STRIP_VIEWER_MAX_RESIDENT"));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # Larger batches for a fast disk
            batch_size = 20
            max_resident = 200
            jump_settle_delay_ms = 0
        "#;

        let config = ViewerConfig::from_toml(toml).unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_resident, 200);
        assert_eq!(config.jump_settle_delay, Duration::ZERO);
        assert_eq!(config.ready_timeout, Duration::from_secs(3)); // default
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let result = ViewerConfig::from_toml("batch_size = \"ten\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");

        let config = ViewerConfig::default()
            .with_batch_size(8)
            .with_jump_retry(10, Duration::from_millis(30));
        config.save_to_file(&path).unwrap();

        let loaded = ViewerConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ViewerConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
