//! Configuration file support
//!
//! Loads settings from ~/.nest-hl.conf (or %USERPROFILE%\.nest-hl.conf on Windows)
//!
//! Format: simple key=value pairs, one per line
//! Lines starting with # are comments
//!
//! Example:
//! ```text
//! # nest-hl configuration
//! format = ansi
//! max-depth = 32
//! grammar-dir = /usr/share/nest-hl/grammars
//! log-level = debug
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::syntax::{Format, Limits};

/// Configuration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deepest region nesting the engine follows
    pub max_depth: usize,
    /// Steps allowed without progress before a scan is aborted
    pub stall_limit: usize,
    /// Step budget multiplier
    pub iteration_factor: usize,
    /// Default output format
    pub format: Format,
    /// Directory of extra grammar files loaded at startup
    pub grammar_dir: Option<PathBuf>,
    /// Log filter for stderr output
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_depth: limits.max_depth,
            stall_limit: limits.stall_limit,
            iteration_factor: limits.iteration_factor,
            format: Format::default(),
            grammar_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".nest-hl.conf"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".nest-hl.conf"))
        }
    }

    /// Load configuration from the default file, if there is one
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Some(path) = Self::config_path() {
            if let Ok(contents) = fs::read_to_string(&path) {
                let settings = Self::parse(&contents);
                config.apply(&settings);
            }
        }

        config
    }

    /// Load configuration from an explicit file; a missing file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Config::default();
        config.apply(&Self::parse(&contents));
        Ok(config)
    }

    /// Engine limits from these settings
    pub fn limits(&self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            stall_limit: self.stall_limit,
            iteration_factor: self.iteration_factor,
        }
    }

    /// Parse config file contents into key-value pairs
    fn parse(contents: &str) -> HashMap<String, String> {
        let mut settings = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key = value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().to_string();
                settings.insert(key, value);
            }
        }

        settings
    }

    /// Apply settings from parsed config
    fn apply(&mut self, settings: &HashMap<String, String>) {
        if let Some(value) = settings.get("max-depth") {
            if let Ok(n) = value.parse::<usize>() {
                self.max_depth = n.clamp(1, 1024);
            }
        }

        if let Some(value) = settings.get("stall-limit") {
            if let Ok(n) = value.parse::<usize>() {
                self.stall_limit = n.clamp(1, 65536);
            }
        }

        if let Some(value) = settings.get("iteration-factor") {
            if let Ok(n) = value.parse::<usize>() {
                self.iteration_factor = n.clamp(1, 64);
            }
        }

        if let Some(format) = settings.get("format").and_then(|v| Format::from_name(v)) {
            self.format = format;
        }

        if let Some(value) = settings.get("grammar-dir") {
            self.grammar_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }

        if let Some(value) = settings.get("log-level") {
            if !value.is_empty() {
                self.log_level = value.to_lowercase();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let contents = r#"
# Comment
format = ansi
max-depth = 32
Grammar-Dir = /tmp/grammars
        "#;

        let settings = Config::parse(contents);
        assert_eq!(settings.get("format"), Some(&"ansi".to_string()));
        assert_eq!(settings.get("max-depth"), Some(&"32".to_string()));
        assert_eq!(settings.get("grammar-dir"), Some(&"/tmp/grammars".to_string()));
        assert_eq!(settings.len(), 3);
    }

    #[test]
    fn test_apply_settings() {
        let mut config = Config::default();
        let mut settings = HashMap::new();
        settings.insert("max-depth".to_string(), "16".to_string());
        settings.insert("stall-limit".to_string(), "100".to_string());
        settings.insert("iteration-factor".to_string(), "8".to_string());
        settings.insert("format".to_string(), "spans".to_string());
        settings.insert("grammar-dir".to_string(), "grammars".to_string());
        settings.insert("log-level".to_string(), "DEBUG".to_string());

        config.apply(&settings);

        assert_eq!(
            config.limits(),
            Limits {
                max_depth: 16,
                stall_limit: 100,
                iteration_factor: 8
            }
        );
        assert_eq!(config.format, Format::Spans);
        assert_eq!(config.grammar_dir, Some(PathBuf::from("grammars")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_values_are_ignored_or_clamped() {
        let mut config = Config::default();
        let mut settings = HashMap::new();
        settings.insert("max-depth".to_string(), "0".to_string());
        settings.insert("stall-limit".to_string(), "lots".to_string());
        settings.insert("format".to_string(), "pdf".to_string());
        settings.insert("unknown-key".to_string(), "1".to_string());

        config.apply(&settings);

        assert_eq!(config.max_depth, 1);
        assert_eq!(config.stall_limit, Limits::default().stall_limit);
        assert_eq!(config.format, Format::Html);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nest-hl.conf");
        fs::write(&path, "iteration-factor = 2\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().iteration_factor, 2);
        assert!(Config::load_from(&dir.path().join("missing.conf")).is_err());
    }
}
