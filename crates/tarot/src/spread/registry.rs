//! Spread template registry
//!
//! Loads spread definitions from TOML and pre-processes them once: descriptions
//! are de-indented and each definition is reduced to a single placeholder-bearing
//! template string, whichever text format it was written in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{Result, TarotError};

/// Built-in spread configuration
pub const BUILTIN_SPREADS: &str = include_str!("../../config/spreads.toml");

/// A named parameter a spread template accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub description: String,

    /// Value used when the caller does not supply one
    #[serde(default)]
    pub default: Option<String>,
}

/// Persona-driven template text, joined in this order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaText {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub belief: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub disclaimer: String,
}

impl PersonaText {
    fn fragments(&self) -> [&str; 4] {
        [&self.role, &self.belief, &self.body, &self.disclaimer]
    }
}

/// One [[spread]] entry as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadRecord {
    #[serde(rename = "type")]
    pub spread_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub card_count: Option<usize>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,

    /// Plain format
    #[serde(default)]
    pub template: Option<String>,

    /// Persona format
    #[serde(default)]
    pub persona: Option<PersonaText>,
}

#[derive(Debug, Deserialize)]
struct SpreadFile {
    #[serde(default, rename = "spread")]
    spreads: Vec<SpreadRecord>,
}

/// A pre-processed spread template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadTemplate {
    pub spread_type: String,
    pub description: String,
    /// Fixed card count; `None` defers to the configured min/max policy
    pub card_count: Option<usize>,
    pub parameters: BTreeMap<String, ParameterSpec>,
    pub template: String,
}

impl SpreadTemplate {
    fn from_record(record: SpreadRecord) -> Result<Self> {
        let template = match (&record.template, &record.persona) {
            (Some(text), None) => dedent(text),
            (None, Some(persona)) => persona
                .fragments()
                .iter()
                .map(|fragment| dedent(fragment))
                .filter(|fragment| !fragment.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            (Some(_), Some(_)) => {
                return Err(TarotError::Config(format!(
                    "spread {} has both a template and a persona",
                    record.spread_type
                )))
            }
            (None, None) => {
                return Err(TarotError::Config(format!(
                    "spread {} has no template text",
                    record.spread_type
                )))
            }
        };

        if record.card_count == Some(0) {
            return Err(TarotError::Config(format!(
                "spread {} requires zero cards",
                record.spread_type
            )));
        }

        Ok(Self {
            description: dedent(&record.description),
            spread_type: record.spread_type,
            card_count: record.card_count,
            parameters: record.parameters,
            template,
        })
    }

    /// Names of parameters the caller must supply (those without a default)
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.default.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// Allowed card counts: the fixed count if declared, else `min..=max`
    pub fn card_range(&self, min: usize, max: usize) -> RangeInclusive<usize> {
        match self.card_count {
            Some(count) => count..=count,
            None => min..=max,
        }
    }
}

/// All configured spread templates, in configuration order
#[derive(Debug, Clone)]
pub struct SpreadRegistry {
    templates: Vec<SpreadTemplate>,
}

impl SpreadRegistry {
    pub fn new(records: Vec<SpreadRecord>) -> Result<Self> {
        let mut templates: Vec<SpreadTemplate> = Vec::with_capacity(records.len());
        for record in records {
            if templates.iter().any(|t| t.spread_type == record.spread_type) {
                return Err(TarotError::Config(format!(
                    "duplicate spread type {}",
                    record.spread_type
                )));
            }
            templates.push(SpreadTemplate::from_record(record)?);
        }

        tracing::debug!(count = templates.len(), "spread templates loaded");
        Ok(Self { templates })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: SpreadFile = toml::from_str(content)
            .map_err(|e| TarotError::Config(format!("invalid spread config: {}", e)))?;
        Self::new(file.spreads)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TarotError::Config(format!("failed to read spread config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Registry over the spreads shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_SPREADS)
    }

    pub fn get(&self, spread_type: &str) -> Option<&SpreadTemplate> {
        self.templates.iter().find(|t| t.spread_type == spread_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpreadTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Strip surrounding blank lines and the indentation common to every
/// non-blank line
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();

    // Counted in chars so multibyte whitespace is stripped whole
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| strip_chars(line, indent).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// `line` without its first `count` chars; blank lines may be shorter
fn strip_chars(line: &str, count: usize) -> &str {
    match line.char_indices().nth(count) {
        Some((offset, _)) => &line[offset..],
        None => "",
    }
}
