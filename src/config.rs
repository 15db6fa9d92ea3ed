//! Path configuration
//!
//! Default locations are resolved here and only here; everything below the
//! entry point takes explicit directories.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dispatch::StatusPaths;

/// System-wide config file consulted when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bootstage/paths.json";

/// Directory layout of the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persistent state; records live in `<cloud_dir>/data`
    pub cloud_dir: PathBuf,
    /// Runtime directory where records are published
    pub run_dir: PathBuf,
    /// Per-stage hook programs run by the binary
    pub hooks_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cloud_dir: PathBuf::from("/var/lib/cloud"),
            run_dir: PathBuf::from("/run/cloud-init"),
            hooks_dir: PathBuf::from("/etc/bootstage/stages"),
        }
    }
}

impl PathsConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read path configuration from {:?}", path.as_ref())
        })?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse path configuration JSON")?;

        Ok(config)
    }

    /// Load `explicit` if given, else the system file if it exists, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("cloud_dir", &self.cloud_dir),
            ("run_dir", &self.run_dir),
            ("hooks_dir", &self.hooks_dir),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{} cannot be empty", field);
            }
            if !path.is_absolute() {
                bail!("{} must be an absolute path, got {:?}", field, path);
            }
        }
        Ok(())
    }

    /// Authoritative record directory
    pub fn data_dir(&self) -> PathBuf {
        self.cloud_dir.join("data")
    }

    /// Resolve record directories, letting explicit overrides win
    pub fn status_paths(&self, data_dir: Option<&Path>, link_dir: Option<&Path>) -> StatusPaths {
        StatusPaths::new(
            data_dir.map_or_else(|| self.data_dir(), Path::to_path_buf),
            link_dir.map_or_else(|| self.run_dir.clone(), Path::to_path_buf),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PathsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/cloud/data"));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"cloud_dir": "/srv/cloud"}}"#).unwrap();

        let config = PathsConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.cloud_dir, PathBuf::from("/srv/cloud"));
        assert_eq!(config.run_dir, PathsConfig::default().run_dir);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(PathsConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(PathsConfig::load_from_file("/nonexistent/paths.json").is_err());
        assert!(PathsConfig::discover(Some(Path::new("/nonexistent/paths.json"))).is_err());
    }

    #[test]
    fn test_validation_rejects_relative_and_empty() {
        let config = PathsConfig {
            run_dir: PathBuf::from("run/cloud-init"),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PathsConfig {
            cloud_dir: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cloud_dir"));
    }

    #[test]
    fn test_status_paths_overrides() {
        let config = PathsConfig {
            cloud_dir: PathBuf::from("/tmp/cloud"),
            ..Default::default()
        };
        let paths = config.status_paths(None, Some(Path::new("/tmp/link")));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/cloud/data"));
        assert_eq!(paths.link_dir, PathBuf::from("/tmp/link"));

        let paths = config.status_paths(Some(Path::new("/tmp/data")), None);
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(paths.link_dir, PathBuf::from("/run/cloud-init"));
    }
}
