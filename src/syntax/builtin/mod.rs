//! Built-in grammar definitions
//!
//! This module provides the grammars every registry created with
//! `Registry::with_builtin` starts with.

mod better_c;
mod fragments;
mod nest;

pub use fragments::Fragments;

use super::definition::GrammarDef;

/// Get all built-in grammar definitions with their registry keys
pub fn all_grammars() -> Vec<(&'static str, GrammarDef)> {
    let fragments = Fragments::standard();
    vec![
        ("nest", nest::nest_grammar(&fragments)),
        ("better-c", better_c::better_c_grammar(&fragments)),
    ]
}
