use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::analysis::lint::LintRule;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Review strictness level passed to the AI reviewer. Unknown strings are
/// rejected at the boundary (CLI flag or config parse), never defaulted
/// silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewLevel {
    Light,
    #[default]
    Standard,
    Strict,
}

impl std::fmt::Display for ReviewLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewLevel::Light => write!(f, "light"),
            ReviewLevel::Standard => write!(f, "standard"),
            ReviewLevel::Strict => write!(f, "strict"),
        }
    }
}

/// Top-level configuration loaded from .pr-sentinel.toml.
///
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Language model settings for the AI reviewer
    #[serde(default)]
    pub llm: LlmConfig,

    /// Review behavior settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Custom linter settings
    #[serde(default)]
    pub lint: LintConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key. If None, falls back to OPENAI_API_KEY env var.
    pub api_key: Option<String>,

    /// Alternate OpenAI-compatible endpoint, e.g. a local server.
    pub base_url: Option<String>,

    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewConfig {
    /// Default review level; the --level flag overrides it.
    #[serde(default)]
    pub level: ReviewLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LintConfig {
    /// Custom rules appended after the built-in table.
    #[serde(default)]
    pub rules: Vec<LintRule>,
}

impl Config {
    /// Load configuration from .pr-sentinel.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".pr-sentinel.toml");
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }
        if config.llm.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                config.llm.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }
}
