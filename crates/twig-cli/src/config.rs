//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default system prompt placed at the root of new conversations
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are twig, a helpful assistant.";

const DEFAULT_STREAM_DELAY_MS: u64 = 15;
const DEFAULT_STREAM_CHUNK_CHARS: usize = 4;

/// Configuration for twig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// System prompt for new conversations
    pub system_prompt: Option<String>,
    /// Where session files are kept
    pub sessions_dir: Option<String>,
    /// Delay between streamed chunks from the local responder
    pub stream_delay_ms: Option<u64>,
    /// Characters per streamed chunk
    pub stream_chunk_chars: Option<usize>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("twig")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TWIG_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            sessions_dir: None,
            stream_delay_ms: Some(DEFAULT_STREAM_DELAY_MS),
            stream_chunk_chars: Some(DEFAULT_STREAM_CHUNK_CHARS),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Sessions directory, from config or the platform data dir
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("twig")
                .join("sessions"),
        }
    }

    pub fn stream_delay_ms(&self) -> u64 {
        self.stream_delay_ms.unwrap_or(DEFAULT_STREAM_DELAY_MS)
    }

    pub fn stream_chunk_chars(&self) -> usize {
        self.stream_chunk_chars
            .unwrap_or(DEFAULT_STREAM_CHUNK_CHARS)
            .max(1)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# twig configuration file
# Place at ~/.config/twig/config.toml (Linux) or set TWIG_CONFIG_PATH

# System prompt used as the root message of new conversations
system_prompt = "You are twig, a helpful assistant."

# Where sessions are stored (defaults to the platform data directory)
# sessions_dir = "~/.local/share/twig/sessions"

# Local responder pacing
stream_delay_ms = 15
stream_chunk_chars = 4
"#
}
