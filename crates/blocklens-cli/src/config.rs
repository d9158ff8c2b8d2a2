//! blocklens.toml configuration.
//!
//! Everything here is optional: the config only supplies paths, and every
//! path can also be given on the command line. The log directory defaults
//! to `<blocky.dir>/logs`, matching a standard Blocky installation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_BLOCKY_DIR: &str = "/opt/blocky";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub blocky: BlockyConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockyConfig {
    /// Base directory of the Blocky installation.
    pub dir: Option<PathBuf>,
    /// Query-log directory; defaults to `<dir>/logs`.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config =
            toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// The query-log directory, with a command-line override taking
    /// precedence over the config file and its defaults.
    pub fn resolve_log_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = flag {
            return dir;
        }
        if let Some(dir) = &self.blocky.log_dir {
            return dir.clone();
        }
        self.blocky
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOCKY_DIR))
            .join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let config: Config = toml::from_str(
            r#"
[blocky]
dir = "/srv/blocky"
"#,
        )
        .unwrap();
        assert_eq!(
            config.resolve_log_dir(None),
            PathBuf::from("/srv/blocky/logs")
        );
    }

    #[test]
    fn explicit_log_dir_wins_over_derivation() {
        let config: Config = toml::from_str(
            r#"
[blocky]
dir = "/srv/blocky"
log_dir = "/var/log/blocky"
"#,
        )
        .unwrap();
        assert_eq!(
            config.resolve_log_dir(None),
            PathBuf::from("/var/log/blocky")
        );
    }

    #[test]
    fn flag_wins_over_everything() {
        let config: Config = toml::from_str(
            r#"
[blocky]
log_dir = "/var/log/blocky"
"#,
        )
        .unwrap();
        assert_eq!(
            config.resolve_log_dir(Some(PathBuf::from("/tmp/logs"))),
            PathBuf::from("/tmp/logs")
        );
    }

    #[test]
    fn empty_config_falls_back_to_the_default_install() {
        assert_eq!(
            Config::default().resolve_log_dir(None),
            PathBuf::from("/opt/blocky/logs")
        );
    }

    #[test]
    fn from_file_reports_missing_files() {
        assert!(Config::from_file(Path::new("/nonexistent/blocklens.toml")).is_err());
    }
}
