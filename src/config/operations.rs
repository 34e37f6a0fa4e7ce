//! Config loading, validation, and utility operations.

use super::model::{CONFIG_ENV, Config};
use crate::error::{Result, SemError};
use crate::records::RecordLog;
use crate::sem::Tag;
use std::path::{Path, PathBuf};

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SemError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load the config named on the command line, else `$NAMEDSEM_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document; treat it as all defaults.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| SemError::Config(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `create_attempts` must be positive
    /// - `follow_interval_ms` must be positive
    /// - `sem_mode` and `file_mode` may only carry permission bits
    /// - `default_tags` must be non-empty and contain no NUL
    pub fn validate(&self) -> Result<()> {
        if self.create_attempts == 0 {
            return Err(SemError::Config(
                "create_attempts must be greater than 0".to_string(),
            ));
        }

        if self.follow_interval_ms == 0 {
            return Err(SemError::Config(
                "follow_interval_ms must be greater than 0".to_string(),
            ));
        }

        for (name, mode) in [("sem_mode", self.sem_mode), ("file_mode", self.file_mode)] {
            if mode & !0o777 != 0 {
                return Err(SemError::Config(format!(
                    "{} must only contain permission bits (found {:o})",
                    name, mode
                )));
            }
        }

        if self.default_tags.is_empty() {
            return Err(SemError::Config(
                "default_tags must not be empty".to_string(),
            ));
        }
        self.tags()?;

        Ok(())
    }

    /// The default tags as validated [`Tag`]s.
    pub fn tags(&self) -> Result<Vec<Tag>> {
        parse_tags(&self.default_tags)
    }

    /// Record log for semaphores backed by `backing`.
    pub fn record_log_for(&self, backing: &Path) -> RecordLog {
        match &self.record_log {
            Some(path) => RecordLog::new(path),
            None => RecordLog::for_backing(backing),
        }
    }
}

/// Each character of `s` as a tag.
pub fn parse_tags(s: &str) -> Result<Vec<Tag>> {
    s.chars()
        .map(|c| {
            Tag::try_from(c).map_err(|_| {
                SemError::Config(format!("'{}' cannot be used as a tag", c.escape_default()))
            })
        })
        .collect()
}
