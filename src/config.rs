use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourcePreference {
    /// RDSEED if present, otherwise RDRAND
    Auto,
    Rdseed,
    Rdrand,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuRngConfig {
    pub source: SourcePreference,
    pub rdrand_retries: u32,
    pub rdseed_retries: u32,
}

impl Default for CpuRngConfig {
    fn default() -> Self {
        Self {
            source: SourcePreference::Auto,
            rdrand_retries: 10,
            rdseed_retries: 64,
        }
    }
}

impl CpuRngConfig {
    /// Clamp fields to valid ranges.
    pub fn validate(&mut self) {
        self.rdrand_retries = self.rdrand_retries.clamp(1, 1000);
        self.rdseed_retries = self.rdseed_retries.clamp(1, 1000);
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Keep filling the blocking pool until its entropy count reaches this.
    pub fill_watermark: u32,
    /// Add entropy at least this often, regardless of demand.
    pub max_sleep_ms: u64,
    pub random_device: PathBuf,
    pub urandom_device: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fill_watermark: 3072,
            max_sleep_ms: 300_000,
            random_device: PathBuf::from("/dev/random"),
            urandom_device: PathBuf::from("/dev/urandom"),
        }
    }
}

impl FeedConfig {
    /// Clamp fields to valid ranges. poll(2) takes its timeout as a C int.
    pub fn validate(&mut self) {
        self.max_sleep_ms = self.max_sleep_ms.clamp(1, i32::MAX as u64);
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cpu_rng: CpuRngConfig,
    pub feed: FeedConfig,
}

impl Config {
    pub fn validate(&mut self) {
        self.cpu_rng.validate();
        self.feed.validate();
    }
}

/// Load configuration from a TOML file.
///
/// - If `explicit_path` is `Some` and the file is missing, returns an error.
/// - If `explicit_path` is `None`, tries `/etc/rdfeed.toml`; if missing, returns defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, Error> {
    let path = match explicit_path {
        Some(p) => {
            if !p.exists() {
                return Err(Error::InvalidArgs(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => {
            let default = Path::new("/etc/rdfeed.toml");
            if !default.exists() {
                return Ok(Config::default());
            }
            default.to_path_buf()
        }
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        Error::InvalidArgs(format!("failed to read config {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        Error::InvalidArgs(format!("failed to parse config {}: {}", path.display(), e))
    })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.cpu_rng.source, SourcePreference::Auto);
        assert_eq!(cfg.cpu_rng.rdrand_retries, 10);
        assert_eq!(cfg.cpu_rng.rdseed_retries, 64);
        assert_eq!(cfg.feed.fill_watermark, 3072);
        assert_eq!(cfg.feed.max_sleep_ms, 300_000);
        assert_eq!(cfg.feed.max_sleep(), Duration::from_secs(300));
        assert_eq!(cfg.feed.random_device, Path::new("/dev/random"));
        assert_eq!(cfg.feed.urandom_device, Path::new("/dev/urandom"));
    }

    #[test]
    fn test_validate_clamps_high() {
        let mut cfg = Config {
            cpu_rng: CpuRngConfig {
                rdrand_retries: 5000,
                rdseed_retries: 5000,
                ..Default::default()
            },
            feed: FeedConfig {
                max_sleep_ms: u64::MAX,
                ..Default::default()
            },
        };
        cfg.validate();
        assert_eq!(cfg.cpu_rng.rdrand_retries, 1000);
        assert_eq!(cfg.cpu_rng.rdseed_retries, 1000);
        assert_eq!(cfg.feed.max_sleep_ms, i32::MAX as u64);
    }

    #[test]
    fn test_validate_clamps_low() {
        let mut cfg = Config {
            cpu_rng: CpuRngConfig {
                rdrand_retries: 0,
                rdseed_retries: 0,
                ..Default::default()
            },
            feed: FeedConfig {
                max_sleep_ms: 0,
                fill_watermark: 0,
                ..Default::default()
            },
        };
        cfg.validate();
        assert_eq!(cfg.cpu_rng.rdrand_retries, 1);
        assert_eq!(cfg.cpu_rng.rdseed_retries, 1);
        assert_eq!(cfg.feed.max_sleep_ms, 1);
        assert_eq!(cfg.feed.fill_watermark, 0); // 0 is valid: fill once per wake
    }

    #[test]
    fn test_toml_parsing() {
        let dir = std::env::temp_dir();
        let path = dir.join("rdfeed_test_config.toml");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            write!(
                f,
                r#"
[cpu_rng]
source = "rdrand"
rdrand_retries = 20

[feed]
fill_watermark = 256
"#
            )
            .unwrap();
        }
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cpu_rng.source, SourcePreference::Rdrand);
        assert_eq!(config.cpu_rng.rdrand_retries, 20);
        assert_eq!(config.feed.fill_watermark, 256);
        // Unset fields should get defaults
        assert_eq!(config.cpu_rng.rdseed_retries, 64);
        assert_eq!(config.feed.max_sleep_ms, 300_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_explicit_config_errors() {
        let path = std::path::Path::new("/tmp/rdfeed_nonexistent_config.toml");
        let result = load_config(Some(path));
        assert!(result.is_err());
    }
}
