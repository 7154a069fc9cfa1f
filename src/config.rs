//! Configuration loader and validator for the course→product sync service.
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
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub admin: Admin,
    pub shop: Shop,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Courses handed to the server per batch-step request.
    pub batch_size: usize,
}

/// Admin surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Admin {
    /// Shared secret every admin call must present.
    pub token: String,
}

/// Storefront-facing settings used by the trigger-layer filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shop {
    /// Base checkout URL the "take course" button is rewritten to.
    pub checkout_url: String,
    /// Prefix shown before course-backed products in product search results.
    pub search_label: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
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
    if cfg.app.batch_size == 0 {
        return Err(ConfigError::Invalid("app.batch_size must be > 0"));
    }

    if cfg.admin.token.trim().is_empty() {
        return Err(ConfigError::Invalid("admin.token must be non-empty"));
    }

    if cfg.shop.checkout_url.trim().is_empty() {
        return Err(ConfigError::Invalid("shop.checkout_url must be non-empty"));
    }
    if cfg.shop.search_label.trim().is_empty() {
        return Err(ConfigError::Invalid("shop.search_label must be non-empty"));
    }

    Ok(())
}

/// Example YAML configuration shipped with the tool.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  batch_size: 10

admin:
  token: "CHANGE_ME"

shop:
  checkout_url: "https://shop.example.com/checkout"
  search_label: "[Course]"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.batch_size, 10);
    }

    #[test]
    fn invalid_batch_size() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.batch_size = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("batch_size")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_admin_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.admin.token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("admin.token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_shop_fields() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.shop.checkout_url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.shop.search_label = " ".into();
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
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.shop.search_label, "[Course]");
    }
}
