//! Rule fragments shared between built-in grammars
//!
//! Fragments are plain rule values. Grammar builders take a
//! `&Fragments` and clone the pieces they need into their own trees.

use crate::syntax::rules::{RegionRule, Rule, TokenRule};
use crate::syntax::tokens::TokenClass;

/// Common building blocks for C-like grammars
#[derive(Debug, Clone)]
pub struct Fragments {
    /// A backslash and the character after it
    pub backslash_escape: Rule,
    /// A backslash ending a line, continuing the construct on the next one
    pub line_continuation: Rule,
    /// Markers such as `TODO:` inside comments
    pub doctag: Rule,
}

impl Fragments {
    pub fn standard() -> Self {
        Self {
            backslash_escape: TokenRule::plain(r"\\(?s:.)")
                .name("backslash_escape")
                .relevance(0)
                .into(),
            line_continuation: TokenRule::plain(r"\\\n")
                .name("line_continuation")
                .relevance(0)
                .into(),
            doctag: TokenRule::new(
                TokenClass::from("doctag"),
                r"\b(?:TODO|FIXME|NOTE|BUG|OPTIMIZE|HACK|XXX):",
            )
            .name("doctag")
            .relevance(0)
            .into(),
        }
    }

    /// A comment running from `begin` to `end`
    pub fn comment(&self, begin: &str, end: &str) -> RegionRule {
        RegionRule::new(begin, end)
            .class(TokenClass::Comment)
            .contains([self.doctag.clone()])
    }

    /// `//` comment to end of line, continued by a trailing backslash
    pub fn c_line_comment(&self) -> Rule {
        self.comment("//", "$")
            .name("line_comment")
            .contains([self.line_continuation.clone()])
            .into()
    }

    pub fn c_block_comment(&self) -> Rule {
        self.comment(r"/\*", r"\*/").name("block_comment").into()
    }
}

impl Default for Fragments {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::definition::GrammarDef;
    use crate::syntax::language::Grammar;

    fn comments() -> Grammar {
        let fragments = Fragments::standard();
        let def = GrammarDef::new("Comments").contains([fragments.c_line_comment(), fragments.c_block_comment()]);
        Grammar::compile(def).unwrap()
    }

    #[test]
    fn test_line_comment_continues_after_backslash() {
        let text = "// one \\\ntwo\nthree";
        let result = comments().highlight(text).unwrap();
        let comment = result.with_class(&TokenClass::Comment).next().unwrap();
        assert_eq!(&text[comment.range()], "// one \\\ntwo");
    }

    #[test]
    fn test_doctag_inside_comment() {
        let text = "/* TODO: fix */";
        let result = comments().highlight(text).unwrap();
        let doctag = TokenClass::from("doctag");
        let tag = result.with_class(&doctag).next().unwrap();
        assert_eq!(&text[tag.range()], "TODO:");
        assert_eq!(tag.depth, 1);
    }
}
