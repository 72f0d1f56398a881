//! Optional TOML configuration for the iptlog command

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use iptlog_logs::SourceFormat;

/// Default delay between polls when following a file
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Settings read from a config file, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Delay between polls in follow mode
    pub poll_interval_ms: Option<u64>,

    /// Syslog formats to try, by name ("bsd", "rfc3339")
    pub source_formats: Vec<String>,

    /// Year assumed for timestamps without one
    pub year: Option<i32>,

    /// Skip malformed firewall lines instead of aborting
    pub skip_malformed: bool,
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.formats()?;
        Ok(config)
    }

    /// Resolve configured format names
    pub fn formats(&self) -> Result<Vec<SourceFormat>> {
        self.source_formats
            .iter()
            .map(|name| match SourceFormat::from_name(name) {
                Some(format) => Ok(format),
                None => bail!("Unknown source format '{}'", name),
            })
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert!(config.formats().unwrap().is_empty());
        assert!(!config.skip_malformed);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
poll_interval_ms = 1000
source_formats = ["rfc3339", "bsd"]
year = 2023
skip_malformed = true
"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(
            config.formats().unwrap(),
            vec![SourceFormat::Rfc3339, SourceFormat::Bsd]
        );
        assert_eq!(config.year, Some(2023));
        assert!(config.skip_malformed);
    }

    #[test]
    fn test_unknown_format() {
        assert!(Config::parse(r#"source_formats = ["json"]"#).is_err());
    }

    #[test]
    fn test_unknown_key() {
        assert!(Config::parse("colour = true").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "year = 2020").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.year, Some(2020));
    }
}
