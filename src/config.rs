use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_CACHE_DIR: &str = ".dl4all";
const DEFAULT_ADMIN_PASSCODE: &str = "ADMIN26";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means offline mode: everything goes through the local cache.
    pub database_url: Option<String>,
    pub cache_dir: PathBuf,
    pub admin_passcode: String,
    pub remote_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let seconds = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{key} must be a whole number of seconds")),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            cache_dir: lookup("DLC_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            admin_passcode: lookup("DLC_ADMIN_PASSCODE")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSCODE.to_string()),
            remote_timeout: seconds("DLC_REMOTE_TIMEOUT_SECS", DEFAULT_REMOTE_TIMEOUT_SECS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.cache_dir, PathBuf::from(".dl4all"));
        assert_eq!(config.admin_passcode, "ADMIN26");
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/dlc"),
            ("DLC_CACHE_DIR", "/tmp/dlc"),
            ("DLC_REMOTE_TIMEOUT_SECS", " 12 "),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/dlc"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/dlc"));
        assert_eq!(config.remote_timeout, Duration::from_secs(12));
    }

    #[test]
    fn rejects_bad_timeouts_and_blank_urls() {
        assert!(config_from(&[("DLC_REMOTE_TIMEOUT_SECS", "soon")]).is_err());
        assert_eq!(config_from(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }
}
