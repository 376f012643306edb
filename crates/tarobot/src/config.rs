//! Configuration loading for tarobot
//!
//! Read from `$TAROBOT_CONFIG`, else `~/.config/tarobot/config.toml`, else the
//! built-in defaults. Every section and field is optional.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tarot::card::CARD_COUNT;
use tarot::{CardResolver, SpreadRegistry};

/// Environment variable naming an alternate config file
pub const CONFIG_ENV: &str = "TAROBOT_CONFIG";

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Tarobot configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program name shown in help output
    pub app_name: String,

    pub tarot: TarotConfig,

    pub generation: GenerationConfig,

    pub db: DbConfig,

    /// Alias file overriding the built-in aliases
    pub aliases: Option<PathBuf>,

    /// Spread file overriding the built-in spreads
    pub spreads: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Tarobot".to_string(),
            tarot: TarotConfig::default(),
            generation: GenerationConfig::default(),
            db: DbConfig::default(),
            aliases: None,
            spreads: None,
        }
    }
}

/// Card count policy for spreads without a fixed count
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TarotConfig {
    pub min_cards: usize,
    pub max_cards: usize,
    pub default_cards: usize,
}

impl Default for TarotConfig {
    fn default() -> Self {
        Self {
            min_cards: 1,
            max_cards: 5,
            default_cards: 3,
        }
    }
}

/// Which generation backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions over HTTP
    #[serde(rename = "openai")]
    OpenAi,
    /// An external CLI that takes the prompt as an argument
    Command,
}

/// Generation service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: BackendKind,

    pub api_key: Option<String>,

    pub base_url: String,

    /// Command backend: program to run
    pub command: String,

    /// Command backend: arguments (use {prompt} as placeholder)
    pub args: Vec<String>,

    /// Request parameters for the reading itself
    pub reading: CompletionConfig,

    /// Optional follow-up call over the reading
    pub summary: SummaryConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenAi,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            command: "ollama".to_string(),
            args: vec!["run".to_string(), "llama3".to_string(), "{prompt}".to_string()],
            reading: CompletionConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

/// Per-call request parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Number of samples
    pub n: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            n: None,
            temperature: None,
            top_p: None,
        }
    }
}

/// Chained summarization of the first response
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,

    /// Prompt template; [response] is replaced with the reading
    pub template: String,

    #[serde(flatten)]
    pub request: CompletionConfig,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            template: "Describe the overall sentiment of the following tarot card reading \
                       in a single word (positive, negative, or mixed): [response]"
                .to_string(),
            request: CompletionConfig::default(),
        }
    }
}

/// Reading history database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// SQLite file; defaults to ~/.local/share/tarobot/readings.db
    pub path: Option<PathBuf>,

    pub busy_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tarobot")
                .join("readings.db")
        })
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load() -> Result<Self> {
        let config_path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        if config.generation.api_key.is_none() {
            config.generation.api_key = env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        }

        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tarobot")
            .join("config.toml")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to load config from {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the card count policy is self-consistent
    pub fn validate(&self) -> Result<()> {
        let t = &self.tarot;
        if t.min_cards < 1 {
            bail!("tarot.min_cards must be at least 1");
        }
        if t.max_cards < t.min_cards {
            bail!("tarot.max_cards ({}) is below tarot.min_cards ({})", t.max_cards, t.min_cards);
        }
        if t.max_cards > CARD_COUNT {
            bail!("tarot.max_cards ({}) exceeds the {} cards in a deck", t.max_cards, CARD_COUNT);
        }
        if !(t.min_cards..=t.max_cards).contains(&t.default_cards) {
            bail!(
                "tarot.default_cards ({}) is outside [{}-{}]",
                t.default_cards,
                t.min_cards,
                t.max_cards
            );
        }
        Ok(())
    }

    /// Alias resolver from the configured file, or the built-in aliases
    pub fn card_resolver(&self) -> Result<CardResolver> {
        let resolver = match &self.aliases {
            Some(path) => CardResolver::load(path),
            None => CardResolver::builtin(),
        };
        resolver.context("Failed to load card aliases")
    }

    /// Spread registry from the configured file, or the built-in spreads
    pub fn spread_registry(&self) -> Result<SpreadRegistry> {
        let registry = match &self.spreads {
            Some(path) => SpreadRegistry::load(path),
            None => SpreadRegistry::builtin(),
        };
        registry.context("Failed to load spread templates")
    }
}
