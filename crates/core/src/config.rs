// crates/core/src/config.rs
//! Runtime configuration for dispatch and the worker pool.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::channel::DEFAULT_MAX_BATCH_SIZE;
use crate::delay::DelayPolicy;
use crate::error::ConfigError;

/// Tunables shared by the dispatcher and workers.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Simulated processing time per page, in milliseconds.
    pub delay_ms: u64,
    /// Treat `delay_ms` as the upper bound of a uniform draw instead of a fixed value.
    pub randomize_delay: bool,
    /// Page count used when a request gives no usable size.
    pub default_pages: u32,
    /// Largest job a single request may create.
    pub max_pages: u32,
    /// Items per channel submit.
    pub max_batch_size: usize,
    /// Number of concurrent worker loops.
    pub workers: usize,
    /// Extra deliveries a failing item gets before it is dropped.
    pub max_retries: u32,
    /// Attempts at submitting the terminal item before giving up.
    pub terminal_send_attempts: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            randomize_delay: false,
            default_pages: 100,
            max_pages: 10_000,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            workers: 4,
            max_retries: 3,
            terminal_send_attempts: 3,
        }
    }
}

impl TrackerConfig {
    /// Read a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.default_pages == 0 {
            return Err(ConfigError::Invalid("default_pages must be at least 1".into()));
        }
        if self.default_pages > self.max_pages {
            return Err(ConfigError::Invalid(format!(
                "default_pages ({}) exceeds max_pages ({})",
                self.default_pages, self.max_pages
            )));
        }
        if self.terminal_send_attempts == 0 {
            return Err(ConfigError::Invalid(
                "terminal_send_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn delay(&self) -> DelayPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        if self.randomize_delay {
            DelayPolicy::Random { max: delay }
        } else {
            DelayPolicy::Fixed(delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_pages, 100);
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.delay(), DelayPolicy::Fixed(Duration::from_secs(1)));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delay_ms = 250\nrandomize_delay = true\nworkers = 8").unwrap();

        let config = TrackerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.default_pages, 100);
        assert_eq!(
            config.delay(),
            DelayPolicy::Random {
                max: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delay_msec = 5").unwrap();
        let err = TrackerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let err = TrackerConfig::from_file(Path::new("/nonexistent/pagefan.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TrackerConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            default_pages: 500,
            max_pages: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_pages"));
    }
}
