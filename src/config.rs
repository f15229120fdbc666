//! Configuration loader and validator for the DMP audience sync.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub linkedin: LinkedIn,
    pub settings: Settings,
}

/// Host-level settings: where the redrive outbox lives and how it backs off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub poll_interval_ms: u64,
    pub max_backoff_seconds: u64,
}

/// LinkedIn REST API access. The token is expected to be fresh; refreshing it
/// is the job of whoever writes this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedIn {
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Per-destination settings threaded through every sync call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub ad_account_id: String,
    #[serde(default = "default_true")]
    pub send_email: bool,
    #[serde(default = "default_true")]
    pub send_google_advertising_id: bool,
}

fn default_api_version() -> String {
    crate::dmp::LINKEDIN_API_VERSION.to_string()
}

fn default_base_url() -> String {
    crate::dmp::LINKEDIN_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL for the redrive outbox, honouring `DATABASE_URL`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/audience-sync.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }

    if cfg.linkedin.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("linkedin.access_token must be non-empty"));
    }
    if cfg.linkedin.api_version.trim().is_empty() {
        return Err(ConfigError::Invalid("linkedin.api_version must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.linkedin.base_url).is_err() {
        return Err(ConfigError::Invalid("linkedin.base_url must be an absolute URL"));
    }

    let ad_account_id = cfg.settings.ad_account_id.trim();
    if ad_account_id.is_empty() {
        return Err(ConfigError::Invalid("settings.ad_account_id must be non-empty"));
    }
    if !ad_account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Invalid("settings.ad_account_id must be numeric"));
    }

    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  poll_interval_ms: 500
  max_backoff_seconds: 120

linkedin:
  access_token: "YOUR_LINKEDIN_ACCESS_TOKEN"
  api_version: "202505"
  base_url: "https://api.linkedin.com/rest/"

settings:
  ad_account_id: "123"
  send_email: true
  send_google_advertising_id: true
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.linkedin.api_version, "202505");
        assert!(cfg.settings.send_email);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = r#"app:
  data_dir: "./data"
  poll_interval_ms: 100
  max_backoff_seconds: 0
linkedin:
  access_token: "t"
settings:
  ad_account_id: "42"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.linkedin.base_url, "https://api.linkedin.com/rest/");
        assert_eq!(cfg.linkedin.api_version, "202505");
        assert!(cfg.settings.send_email);
        assert!(cfg.settings.send_google_advertising_id);
    }

    #[test]
    fn invalid_access_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.linkedin.access_token = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("access_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_ad_account() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.settings.ad_account_id = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.settings.ad_account_id = "urn:li:sponsoredAccount:1".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("numeric")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.linkedin.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.settings.ad_account_id, "123");
    }
}
