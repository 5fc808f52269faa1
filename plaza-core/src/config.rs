use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// YAML config file structure (~/.plaza/config.yaml). Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigYaml {
    pub api_base_url: Option<String>,
    /// Where the login session is persisted
    pub session_path: Option<PathBuf>,
    /// Posts requested per feed page
    pub page_size: Option<u32>,
    /// Distance from the bottom (px) at which the next page is requested
    pub scroll_threshold_px: Option<u32>,
    pub scroll_debounce_ms: Option<u64>,
    pub story_duration_ms: Option<u64>,
    pub story_tick_ms: Option<u64>,
}

/// Application configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub session_path: PathBuf,
    pub page_size: u32,
    pub scroll_threshold_px: u32,
    pub scroll_debounce_ms: u64,
    pub story_duration_ms: u64,
    pub story_tick_ms: u64,
}

impl Config {
    /// Defaults rooted at `plaza_dir` (normally ~/.plaza)
    pub fn defaults_in(plaza_dir: &Path) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_path: plaza_dir.join("session.json"),
            page_size: plaza_common::feed_state::DEFAULT_PAGE_SIZE,
            scroll_threshold_px: 200,
            scroll_debounce_ms: 100,
            story_duration_ms: plaza_common::story_playback::STORY_DURATION_MS,
            story_tick_ms: plaza_common::story_playback::TICK_INTERVAL_MS,
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        let dev_mode = std::env::var("PLAZA_DEV_MODE").is_ok() || dotenvy::dotenv().is_ok();
        let plaza_dir = plaza_dir()?;
        if dev_mode {
            info!("Dev mode activated - loading from .env");
            Self::from_env(&plaza_dir, |key| std::env::var(key).ok())
        } else {
            info!("Production mode - loading from config.yaml");
            Self::load_from_dir(&plaza_dir)
        }
    }

    /// Build from `PLAZA_*` variables, looked up through `var`
    pub fn from_env<F>(plaza_dir: &Path, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| var(key).filter(|v| !v.is_empty());
        let mut config = Self::defaults_in(plaza_dir);

        if let Some(url) = lookup("PLAZA_API_URL") {
            config.api_base_url = url;
        }
        if let Some(path) = lookup("PLAZA_SESSION_PATH") {
            config.session_path = PathBuf::from(path);
        }
        if let Some(v) = lookup("PLAZA_PAGE_SIZE") {
            config.page_size = parse_var("PLAZA_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("PLAZA_SCROLL_THRESHOLD_PX") {
            config.scroll_threshold_px = parse_var("PLAZA_SCROLL_THRESHOLD_PX", &v)?;
        }
        if let Some(v) = lookup("PLAZA_SCROLL_DEBOUNCE_MS") {
            config.scroll_debounce_ms = parse_var("PLAZA_SCROLL_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("PLAZA_STORY_DURATION_MS") {
            config.story_duration_ms = parse_var("PLAZA_STORY_DURATION_MS", &v)?;
        }
        if let Some(v) = lookup("PLAZA_STORY_TICK_MS") {
            config.story_tick_ms = parse_var("PLAZA_STORY_TICK_MS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read `config.yaml` from `plaza_dir`. A missing file means defaults.
    pub fn load_from_dir(plaza_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = plaza_dir.join("config.yaml");
        let yaml: ConfigYaml = match std::fs::read_to_string(&config_path) {
            Ok(content) => serde_yaml::from_str(&content).map_err(|e| {
                ConfigError::Serialization(format!("{}: {}", config_path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", config_path.display());
                ConfigYaml::default()
            }
            Err(e) => return Err(e.into()),
        };

        let defaults = Self::defaults_in(plaza_dir);
        let config = Self {
            api_base_url: yaml.api_base_url.unwrap_or(defaults.api_base_url),
            session_path: yaml.session_path.unwrap_or(defaults.session_path),
            page_size: yaml.page_size.unwrap_or(defaults.page_size),
            scroll_threshold_px: yaml
                .scroll_threshold_px
                .unwrap_or(defaults.scroll_threshold_px),
            scroll_debounce_ms: yaml
                .scroll_debounce_ms
                .unwrap_or(defaults.scroll_debounce_ms),
            story_duration_ms: yaml.story_duration_ms.unwrap_or(defaults.story_duration_ms),
            story_tick_ms: yaml.story_tick_ms.unwrap_or(defaults.story_tick_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, plaza_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(plaza_dir)?;
        let yaml = ConfigYaml {
            api_base_url: Some(self.api_base_url.clone()),
            session_path: Some(self.session_path.clone()),
            page_size: Some(self.page_size),
            scroll_threshold_px: Some(self.scroll_threshold_px),
            scroll_debounce_ms: Some(self.scroll_debounce_ms),
            story_duration_ms: Some(self.story_duration_ms),
            story_tick_ms: Some(self.story_tick_ms),
        };
        let content =
            serde_yaml::to_string(&yaml).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        std::fs::write(plaza_dir.join("config.yaml"), content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Config("page_size must be positive".into()));
        }
        if self.story_duration_ms == 0 || self.story_tick_ms == 0 {
            return Err(ConfigError::Config(
                "story duration and tick must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn story_tick(&self) -> Duration {
        Duration::from_millis(self.story_tick_ms)
    }
}

/// ~/.plaza
pub fn plaza_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".plaza"))
        .ok_or_else(|| ConfigError::Config("Failed to get home directory".into()))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Config(format!("{key} has invalid value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn missing_yaml_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, Config::defaults_in(dir.path()));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.scroll_threshold_px, 200);
        assert_eq!(config.story_duration_ms, 5000);
        assert_eq!(config.story_tick_ms, 50);
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "api_base_url: https://plaza.example/api\npage_size: 10\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.api_base_url, "https://plaza.example/api");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.scroll_debounce_ms, 100);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::defaults_in(dir.path());
        config.story_duration_ms = 3000;
        config.save_to_file(dir.path()).unwrap();
        assert_eq!(Config::load_from_dir(dir.path()).unwrap(), config);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "page_size: [1, 2]\n").unwrap();
        assert!(matches!(
            Config::load_from_dir(dir.path()),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "page_size: 0\n").unwrap();
        assert!(matches!(
            Config::load_from_dir(dir.path()),
            Err(ConfigError::Config(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let dir = TempDir::new().unwrap();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PLAZA_API_URL", "http://127.0.0.1:9000/api"),
            ("PLAZA_PAGE_SIZE", "5"),
            ("PLAZA_STORY_TICK_MS", ""),
        ]);
        let config =
            Config::from_env(dir.path(), |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.story_tick_ms, 50);
    }

    #[test]
    fn env_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let result = Config::from_env(dir.path(), |k| {
            (k == "PLAZA_PAGE_SIZE").then(|| "twenty".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Config(_))));
    }
}
