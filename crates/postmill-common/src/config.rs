//! Configuration loading for postmill.
//! Reads postmill.toml from the current directory or the path in the POSTMILL_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{PostmillError, Result};

pub const CONFIG_ENV: &str = "POSTMILL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "postmill.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Persist the article body during deep ingestion.
    #[serde(default)]
    pub save_post_content: bool,
    /// Which rendition of the body is captured when saving is enabled.
    #[serde(default)]
    pub content_mode: ContentMode,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            save_post_content: false,
            content_mode: ContentMode::default(),
        }
    }
}

/// Body rendition captured from the detail document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Inner markup of the content container.
    #[default]
    Html,
    /// Whitespace-normalised text of the content container.
    Text,
}

impl ContentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::Html => "html",
            ContentMode::Text => "text",
        }
    }
}

impl FromStr for ContentMode {
    type Err = PostmillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(ContentMode::Html),
            "text" => Ok(ContentMode::Text),
            other => Err(PostmillError::Config(format!("unknown content mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Linux; Android 10) AppleWebKit/537.36 (KHTML, like Gecko) MicroMessenger/8.0".to_string()
}
fn default_timeout_secs() -> u64 { 30 }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from postmill.toml.
    /// Checks POSTMILL_CONFIG env var first, then current directory.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&path).exists() {
            return Err(PostmillError::Config(format!(
                "Config file not found: {path}\n\
                 Copy postmill.example.toml to postmill.toml and edit it."
            )));
        }

        Self::from_path(&path)
    }

    /// Like [`Config::load`], but falls back to defaults when no file exists.
    pub fn load_or_default() -> Result<Self> {
        match Self::load() {
            Ok(config) => Ok(config),
            Err(PostmillError::Config(msg)) => {
                tracing::warn!("{msg}; using default configuration");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        content.parse()
    }
}

impl FromStr for Config {
    type Err = PostmillError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
