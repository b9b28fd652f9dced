//! Error types for nest-hl

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for highlighting operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighting error types
#[derive(Error, Debug)]
pub enum HighlightError {
    /// A rule in a grammar definition could not be compiled
    #[error("Invalid grammar rule {rule}: {message}")]
    GrammarDefinition { rule: String, message: String },

    #[error("No grammar named: {0}")]
    NotFound(String),

    /// The scanner stopped making progress
    #[error("Rule {rule} loops without progress at offset {offset}")]
    RuleLoop { rule: String, offset: usize },

    #[error("No grammar available for auto-detection")]
    NoGrammar,

    /// Bad command line arguments
    #[error("{0}")]
    Usage(String),

    #[error("Unsupported grammar file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HighlightError {
    pub(crate) fn definition(rule: impl Into<String>, message: impl ToString) -> Self {
        HighlightError::GrammarDefinition {
            rule: rule.into(),
            message: message.to_string(),
        }
    }
}
