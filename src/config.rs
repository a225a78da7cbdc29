use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DATE_FORMAT: &str = "%b %-d, %Y";
pub const DEFAULT_TIME_FORMAT: &str = "%-I:%M %p";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UserConfig {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DisplayConfig {
    pub date_format: Option<String>,
    pub time_format: Option<String>,
}

impl AppConfig {
    /// The authenticated user, if any. Blank ids count as no user.
    pub fn user_id(&self) -> Option<&str> {
        self.user
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("cache"))
    }

    /// Values from the environment win over the file. A token without an
    /// `[api]` section has nothing to authenticate and is dropped.
    fn apply_overrides(&mut self, user_id: Option<String>, token: Option<String>) {
        if let Some(id) = user_id {
            self.user.id = Some(id);
        }
        if let (Some(token), Some(api)) = (token, self.api.as_mut()) {
            api.token = Some(token);
        }
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tickets")
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    config.apply_overrides(
        std::env::var("TICKETS_USER_ID").ok(),
        std::env::var("TICKETS_API_TOKEN").ok(),
    );
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}
