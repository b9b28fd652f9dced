//! nest-hl - syntax highlighting grammars for the Nest language
//!
//! Grammars are trees of begin/end rules compiled into an immutable
//! arena; the engine walks a text against one and returns classified,
//! nested spans.
//!
//! ```
//! use nest_hl::syntax::{Registry, TokenClass};
//!
//! let registry = Registry::with_builtin().unwrap();
//! let result = registry.highlight("-- a comment\n", Some("nest")).unwrap();
//! assert_eq!(result.with_class(&TokenClass::Comment).count(), 1);
//! ```

pub mod config;
pub mod error;
pub mod syntax;

pub use error::{HighlightError, Result};
