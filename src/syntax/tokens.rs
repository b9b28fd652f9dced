//! Token classes for syntax highlighting
//!
//! This module defines the semantic classes a rule can assign to
//! matched text and their default terminal styles. The set is open:
//! grammars may introduce their own class names.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::style::{Color, Style};

/// Semantic token classes for syntax highlighting
///
/// Classes compare by name, so `Other("comment")` equals `Comment`.
#[derive(Debug, Clone)]
pub enum TokenClass {
    /// Source code comments
    Comment,
    /// String literals
    String,
    /// Numeric literals (integers, floats)
    Number,
    /// Language keywords and keyword-like operators
    Keyword,
    /// Built-in functions, variables and operators
    BuiltIn,
    /// Literal constants (true, false, null)
    Literal,
    /// Type names
    Type,
    /// Names being defined or called
    Title,
    /// Parameter lists
    Params,
    /// Preprocessor directives
    Meta,
    /// Keywords inside a preprocessor directive
    MetaKeyword,
    /// Strings inside a preprocessor directive
    MetaString,
    /// Function declarations
    Function,
    /// Class, struct, enum and union declarations
    Class,
    /// Substitutions and escapes inside strings
    Subst,
    /// Text of a rule aborted by its illegal pattern
    Invalid,
    /// Any other class declared by a grammar
    Other(String),
}

impl TokenClass {
    /// Get the default style for this token class
    pub fn default_style(&self) -> Style {
        match self {
            TokenClass::Comment => Style::fg(Color::BrightBlack).with_italic(),
            TokenClass::String | TokenClass::MetaString => Style::fg(Color::Green),
            TokenClass::Number => Style::fg(Color::Cyan),
            TokenClass::Keyword => Style::fg(Color::Magenta).with_bold(),
            TokenClass::BuiltIn => Style::fg(Color::BrightCyan),
            TokenClass::Literal => Style::fg(Color::BrightRed),
            TokenClass::Type => Style::fg(Color::Yellow),
            TokenClass::Title | TokenClass::Function => Style::fg(Color::Blue),
            TokenClass::Params => Style::default(),
            TokenClass::Meta => Style::fg(Color::BrightMagenta),
            TokenClass::MetaKeyword => Style::fg(Color::BrightMagenta).with_bold(),
            TokenClass::Class => Style::fg(Color::BrightBlue),
            TokenClass::Subst => Style::fg(Color::BrightYellow),
            TokenClass::Invalid => Style::fg(Color::Red).with_underline(),
            TokenClass::Other(_) => Style::default(),
        }
    }

    /// Get the class name as used in grammar files and HTML output
    pub fn name(&self) -> &str {
        match self {
            TokenClass::Comment => "comment",
            TokenClass::String => "string",
            TokenClass::Number => "number",
            TokenClass::Keyword => "keyword",
            TokenClass::BuiltIn => "built_in",
            TokenClass::Literal => "literal",
            TokenClass::Type => "type",
            TokenClass::Title => "title",
            TokenClass::Params => "params",
            TokenClass::Meta => "meta",
            TokenClass::MetaKeyword => "meta-keyword",
            TokenClass::MetaString => "meta-string",
            TokenClass::Function => "function",
            TokenClass::Class => "class",
            TokenClass::Subst => "subst",
            TokenClass::Invalid => "invalid",
            TokenClass::Other(name) => name,
        }
    }

    /// Parse a token class from its name
    ///
    /// Unknown names become [`TokenClass::Other`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "comment" => TokenClass::Comment,
            "string" => TokenClass::String,
            "number" => TokenClass::Number,
            "keyword" => TokenClass::Keyword,
            "built_in" => TokenClass::BuiltIn,
            "literal" => TokenClass::Literal,
            "type" => TokenClass::Type,
            "title" => TokenClass::Title,
            "params" => TokenClass::Params,
            "meta" => TokenClass::Meta,
            "meta-keyword" => TokenClass::MetaKeyword,
            "meta-string" => TokenClass::MetaString,
            "function" => TokenClass::Function,
            "class" => TokenClass::Class,
            "subst" => TokenClass::Subst,
            "invalid" => TokenClass::Invalid,
            other => TokenClass::Other(other.to_string()),
        }
    }
}

impl PartialEq for TokenClass {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for TokenClass {}

impl Hash for TokenClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl From<&str> for TokenClass {
    fn from(name: &str) -> Self {
        TokenClass::from_name(name)
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TokenClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TokenClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(TokenClass::from_name(&name))
    }
}
