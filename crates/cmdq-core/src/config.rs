use crate::error::CmdqError;
use crate::result::CmdqResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tuning knobs shared by the queue processor, event processor and scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub queue_poll_interval_ms: u64,
    pub event_poll_interval_ms: u64,
    pub scheduler_poll_interval_ms: u64,
    pub max_parallelism: usize,
    pub queue_batch_size: usize,
    pub outbox_batch_size: usize,
    pub lease_timeout_secs: u64,
    pub scheduler_max_in_flight: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_poll_interval_ms: 1000,
            event_poll_interval_ms: 1000,
            scheduler_poll_interval_ms: 1000,
            max_parallelism: 4,
            queue_batch_size: 50,
            outbox_batch_size: 50,
            lease_timeout_secs: 300,
            scheduler_max_in_flight: 16,
        }
    }
}

impl RuntimeConfig {
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir().map(|home| home.join(".config/cmdq/config.toml"))
        }
        #[cfg(target_os = "linux")]
        {
            dirs::config_dir().map(|config| config.join("cmdq/config.toml"))
        }
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|config| config.join("cmdq\\config.toml"))
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }

    /// Database used when none is given on the command line.
    pub fn default_db_path() -> Option<PathBuf> {
        dirs::data_dir().map(|data| data.join("cmdq").join("cmdq.db"))
    }

    /// Loads the per-user config file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                if let Ok(content) = std::fs::read_to_string(&config_path) {
                    if let Ok(config) = toml::from_str::<Self>(&content) {
                        if config.validate().is_ok() {
                            return config;
                        }
                    }
                }
            }
        }
        Self::default()
    }

    pub fn load_from(path: &Path) -> CmdqResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CmdqError::Validation(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CmdqResult<()> {
        let checks: [(&str, u64); 8] = [
            ("queue_poll_interval_ms", self.queue_poll_interval_ms),
            ("event_poll_interval_ms", self.event_poll_interval_ms),
            ("scheduler_poll_interval_ms", self.scheduler_poll_interval_ms),
            ("max_parallelism", self.max_parallelism as u64),
            ("queue_batch_size", self.queue_batch_size as u64),
            ("outbox_batch_size", self.outbox_batch_size as u64),
            ("lease_timeout_secs", self.lease_timeout_secs),
            ("scheduler_max_in_flight", self.scheduler_max_in_flight as u64),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(CmdqError::Validation(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn scheduler_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_poll_interval_ms)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.max_parallelism, 4);
        assert_eq!(config.lease_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_parallelism = 8\nqueue_batch_size = 10").unwrap();

        let config = RuntimeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.max_parallelism, 8);
        assert_eq!(config.queue_batch_size, 10);
        assert_eq!(config.outbox_batch_size, 50);
    }

    #[test]
    fn test_load_from_rejects_zero_parallelism() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_parallelism = 0").unwrap();

        let err = RuntimeConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, CmdqError::Validation(msg) if msg.contains("max_parallelism")));
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CmdqError::Io(_)));
    }

    #[test]
    fn test_load_from_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_parallelism = \"many\"").unwrap();

        assert!(matches!(
            RuntimeConfig::load_from(file.path()),
            Err(CmdqError::Validation(_))
        ));
    }
}
