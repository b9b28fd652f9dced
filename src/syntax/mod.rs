//! Grammars and highlighting
//!
//! This module provides the grammar model and the matching engine:
//! - Rule definitions, built in Rust or loaded from TOML/JSON files
//! - Compiled, shareable grammars
//! - A registry with auto-detection
//! - HTML and terminal renderers

mod builtin;
mod definition;
mod engine;
mod language;
mod registry;
mod render;
mod rules;
mod style;
mod tokens;

pub use builtin::{all_grammars, Fragments};
pub use definition::GrammarDef;
pub use engine::{highlight, Highlighted, Limits, Token, TokenKind};
pub use language::Grammar;
pub use registry::{Detected, Registry};
pub use render::{escape_html, render, to_ansi, to_html, Format};
pub use rules::{KeywordCategory, KeywordRule, KeywordSets, RegionRule, Rule, TokenRule};
pub use style::{Color, Style};
pub use tokens::TokenClass;
