//! Declarative grammar definitions
//!
//! A [`GrammarDef`] is the uncompiled form of a grammar. It is built in
//! Rust for the built-in grammars, or read from a TOML or JSON file:
//!
//! ```toml
//! name = "INI"
//! aliases = ["conf"]
//!
//! [[contains]]
//! kind = "token"
//! class = "comment"
//! begin = ";.*$"
//!
//! [[contains]]
//! kind = "region"
//! class = "section"
//! begin = '\['
//! end = '\]'
//! illegal = '\n'
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::rules::{KeywordSets, Rule};
use crate::error::{HighlightError, Result};

/// An uncompiled grammar
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarDef {
    /// Display name (e.g. "Nest", "C")
    pub name: String,
    /// Alternate lookup names
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    /// Skip this grammar during auto-detection
    #[serde(default)]
    pub disable_autodetect: bool,
    /// Keywords applied to top-level text
    #[serde(default)]
    pub keywords: Option<KeywordSets>,
    /// Pattern marking text the grammar cannot contain
    #[serde(default)]
    pub illegal: Option<String>,
    /// Top-level rules, tried in order
    #[serde(default)]
    pub contains: Vec<Rule>,
}

impl GrammarDef {
    /// Create an empty definition
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            case_insensitive: false,
            disable_autodetect: false,
            keywords: None,
            illegal: None,
            contains: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn disable_autodetect(mut self) -> Self {
        self.disable_autodetect = true;
        self
    }

    pub fn keywords(mut self, keywords: KeywordSets) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn illegal(mut self, pattern: &str) -> Self {
        self.illegal = Some(pattern.to_string());
        self
    }

    pub fn contains<I: IntoIterator<Item = Rule>>(mut self, rules: I) -> Self {
        self.contains.extend(rules);
        self
    }

    /// Parse a definition from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Parse a definition from JSON
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Load a definition file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("toml") => Self::from_toml_str(&fs::read_to_string(path)?),
            Some("json") => Self::from_json_str(&fs::read_to_string(path)?),
            _ => Err(HighlightError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}
