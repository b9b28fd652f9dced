//! Rules for syntax highlighting
//!
//! This module defines the declarative rule tree a grammar is built
//! from, and the compiled [`Pattern`] type rules are matched with.
//!
//! A rule is one of four shapes:
//!
//! - [`TokenRule`]: a single match classified as a whole
//! - [`KeywordRule`]: a list of literal words, matched as whole words
//! - [`RegionRule`]: a `begin` ... `end` context with nested children
//! - [`Rule::Recurse`]: the enclosing region itself, for balanced nesting
//!
//! Rules can be written as Rust builders or deserialized from grammar
//! files, where the shape is selected by a `kind` field.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::tokens::TokenClass;

/// Identifier-like lexemes eligible for keyword lookup
pub const DEFAULT_KEYWORD_PATTERN: &str = r"\w+";

fn default_relevance() -> u32 {
    1
}

fn default_keyword_pattern() -> String {
    DEFAULT_KEYWORD_PATTERN.to_string()
}

/// A compiled regex pattern
///
/// Patterns are compiled in multi-line mode: `^` and `$` match at line
/// boundaries. Matching starts at an offset into the full text, so
/// word boundaries and line anchors see the surrounding context.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    anchored: bool,
}

impl Pattern {
    /// Compile a pattern
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .multi_line(true)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            regex,
            anchored: false,
        })
    }

    /// Compile a pattern matching any of `words` as a whole word
    pub fn words<S: AsRef<str>>(words: &[S], case_insensitive: bool) -> Result<Self, regex::Error> {
        let mut sorted: Vec<&str> = words.iter().map(|w| w.as_ref()).collect();
        // Longest first so that alternation prefers "..?" over ".."
        sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternatives: Vec<String> = sorted
            .iter()
            .map(|word| {
                let escaped = regex::escape(word);
                let head = if starts_with_word_char(word) { r"\b" } else { "" };
                let tail = if ends_with_word_char(word) { r"\b" } else { "" };
                format!("{head}{escaped}{tail}")
            })
            .collect();
        Self::new(&format!("(?:{})", alternatives.join("|")), case_insensitive)
    }

    /// Only accept matches starting exactly at the search offset
    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Find the leftmost match at or after `start`, ignoring anchoring
    pub fn search(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        if start > text.len() {
            return None;
        }
        self.regex.find_at(text, start).map(|m| (m.start(), m.end()))
    }

    /// Find the first match in text starting at position
    pub fn find_at(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        self.search(text, start)
            .filter(|&(found, _)| !self.anchored || found == start)
    }

    /// Check whether the pattern can match the empty string
    pub fn matches_empty(&self) -> bool {
        self.regex.is_match("")
    }

    /// Get the pattern source
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Number of capture groups, not counting the whole match
    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Text of the first group of the match starting exactly at `start`
    ///
    /// A group that did not take part in the match reads as empty.
    pub fn first_group<'t>(&self, text: &'t str, start: usize) -> Option<&'t str> {
        if start > text.len() {
            return None;
        }
        let caps = self.regex.captures_at(text, start)?;
        if caps.get(0)?.start() != start {
            return None;
        }
        Some(caps.get(1).map_or("", |m| m.as_str()))
    }

    /// Leftmost match at or after `start` whose first group reads `group`
    pub fn search_same_group(&self, text: &str, start: usize, group: &str) -> Option<(usize, usize)> {
        let mut from = start;
        while from <= text.len() {
            let caps = self.regex.captures_at(text, from)?;
            let whole = caps.get(0)?;
            if caps.get(1).map_or("", |m| m.as_str()) == group {
                return Some((whole.start(), whole.end()));
            }
            from = whole.start() + text[whole.start()..].chars().next().map_or(1, char::len_utf8);
        }
        None
    }
}

fn starts_with_word_char(word: &str) -> bool {
    word.chars().next().map_or(false, |c| c.is_alphanumeric() || c == '_')
}

fn ends_with_word_char(word: &str) -> bool {
    word.chars().last().map_or(false, |c| c.is_alphanumeric() || c == '_')
}

/// Split a keyword entry into its literal and relevance
///
/// `"dynamic_cast|10"` yields `("dynamic_cast", 10)`; entries without a
/// numeric suffix have relevance 1.
pub fn parse_keyword(entry: &str) -> (&str, u32) {
    if let Some((word, weight)) = entry.rsplit_once('|') {
        if !word.is_empty() {
            if let Ok(weight) = weight.parse() {
                return (word, weight);
            }
        }
    }
    (entry, 1)
}

/// One keyword category: a class and its literal words
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordCategory {
    pub class: TokenClass,
    pub words: Vec<String>,
}

/// Keyword sets used to reclassify identifier-like lexemes
///
/// Categories are consulted in order; the first one containing a
/// lexeme decides its class.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSets {
    /// Pattern delimiting lexemes eligible for lookup
    #[serde(rename = "$pattern", default = "default_keyword_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub categories: Vec<KeywordCategory>,
}

impl KeywordSets {
    /// Create empty keyword sets with the given lexeme pattern
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            categories: Vec::new(),
        }
    }

    /// Builder: add a category from a whitespace separated word list
    pub fn category(self, class: TokenClass, words: &str) -> Self {
        self.category_words(class, words.split_whitespace())
    }

    /// Builder: add a category from individual words
    pub fn category_words<I, S>(mut self, class: TokenClass, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.push(KeywordCategory {
            class,
            words: words.into_iter().map(Into::into).collect(),
        });
        self
    }
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_PATTERN)
    }
}

/// A single-shot rule: the `begin` match is one classified token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRule {
    /// Name for diagnostics
    #[serde(default)]
    pub name: Option<String>,
    /// Class of the match; `None` consumes it as plain text
    #[serde(default)]
    pub class: Option<TokenClass>,
    pub begin: String,
    #[serde(default = "default_relevance")]
    pub relevance: u32,
    /// Only match at the current scan offset
    #[serde(default)]
    pub anchored: bool,
}

impl TokenRule {
    pub fn new(class: TokenClass, begin: &str) -> Self {
        Self {
            name: None,
            class: Some(class),
            begin: begin.to_string(),
            relevance: 1,
            anchored: false,
        }
    }

    /// A rule that consumes its match without classifying it
    pub fn plain(begin: &str) -> Self {
        Self {
            name: None,
            class: None,
            begin: begin.to_string(),
            relevance: 1,
            anchored: false,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn relevance(mut self, relevance: u32) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }
}

/// A literal keyword rule: any listed word, matched as a whole word
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    #[serde(default)]
    pub name: Option<String>,
    pub class: TokenClass,
    pub words: Vec<String>,
    #[serde(default = "default_relevance")]
    pub relevance: u32,
}

impl KeywordRule {
    /// Create a rule from a whitespace separated word list
    pub fn new(class: TokenClass, words: &str) -> Self {
        Self {
            name: None,
            class,
            words: words.split_whitespace().map(str::to_string).collect(),
            relevance: 1,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn relevance(mut self, relevance: u32) -> Self {
        self.relevance = relevance;
        self
    }
}

/// A `begin` ... `end` rule with nested children
#[derive(Debug, Clone, Deserialize)]
pub struct RegionRule {
    #[serde(default)]
    pub name: Option<String>,
    /// Class of the whole region; `None` groups children without styling
    #[serde(default)]
    pub class: Option<TokenClass>,
    pub begin: String,
    pub end: String,
    /// Pattern that aborts the region when found before `end`
    #[serde(default)]
    pub illegal: Option<String>,
    /// The begin lexeme belongs to the parent
    #[serde(default)]
    pub exclude_begin: bool,
    /// The end lexeme belongs to the parent
    #[serde(default)]
    pub exclude_end: bool,
    /// The begin lexeme is rescanned inside the region
    #[serde(default)]
    pub return_begin: bool,
    /// The end lexeme is rescanned by the parent
    #[serde(default)]
    pub return_end: bool,
    /// The first group of `end` must repeat the first group of `begin`
    #[serde(default)]
    pub end_same_as_begin: bool,
    #[serde(default)]
    pub anchored: bool,
    #[serde(default = "default_relevance")]
    pub relevance: u32,
    #[serde(default)]
    pub keywords: Option<KeywordSets>,
    #[serde(default)]
    pub contains: Vec<Rule>,
}

impl RegionRule {
    pub fn new(begin: &str, end: &str) -> Self {
        Self {
            name: None,
            class: None,
            begin: begin.to_string(),
            end: end.to_string(),
            illegal: None,
            exclude_begin: false,
            exclude_end: false,
            return_begin: false,
            return_end: false,
            end_same_as_begin: false,
            anchored: false,
            relevance: 1,
            keywords: None,
            contains: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn class(mut self, class: TokenClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn illegal(mut self, pattern: &str) -> Self {
        self.illegal = Some(pattern.to_string());
        self
    }

    pub fn exclude_begin(mut self) -> Self {
        self.exclude_begin = true;
        self
    }

    pub fn exclude_end(mut self) -> Self {
        self.exclude_end = true;
        self
    }

    pub fn return_begin(mut self) -> Self {
        self.return_begin = true;
        self
    }

    pub fn return_end(mut self) -> Self {
        self.return_end = true;
        self
    }

    pub fn end_same_as_begin(mut self) -> Self {
        self.end_same_as_begin = true;
        self
    }

    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }

    pub fn relevance(mut self, relevance: u32) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn keywords(mut self, keywords: KeywordSets) -> Self {
        self.keywords = Some(keywords);
        self
    }

    /// Builder: append children, tried in order
    pub fn contains<I: IntoIterator<Item = Rule>>(mut self, rules: I) -> Self {
        self.contains.extend(rules);
        self
    }
}

/// A grammar rule
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Token(TokenRule),
    Keyword(KeywordRule),
    Region(RegionRule),
    /// The region this rule is a child of
    Recurse,
}

impl Rule {
    /// Name for diagnostics, if one was given
    pub fn name(&self) -> Option<&str> {
        match self {
            Rule::Token(rule) => rule.name.as_deref(),
            Rule::Keyword(rule) => rule.name.as_deref(),
            Rule::Region(rule) => rule.name.as_deref(),
            Rule::Recurse => Some("self"),
        }
    }
}

impl From<TokenRule> for Rule {
    fn from(rule: TokenRule) -> Self {
        Rule::Token(rule)
    }
}

impl From<KeywordRule> for Rule {
    fn from(rule: KeywordRule) -> Self {
        Rule::Keyword(rule)
    }
}

impl From<RegionRule> for Rule {
    fn from(rule: RegionRule) -> Self {
        Rule::Region(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_find_at() {
        let pattern = Pattern::new(r"\d+", false).unwrap();
        assert_eq!(pattern.find_at("abc 123 def", 0), Some((4, 7)));
        assert_eq!(pattern.find_at("abc 123 def", 5), Some((5, 7)));
        assert_eq!(pattern.find_at("no numbers", 0), None);
        assert_eq!(pattern.find_at("abc", 10), None);
    }

    #[test]
    fn test_pattern_sees_context() {
        // Searching from 5 must not treat "23" as a word start
        let pattern = Pattern::new(r"\b\d+\b", false).unwrap();
        assert_eq!(pattern.find_at("abc 123 45", 5), Some((8, 10)));
    }

    #[test]
    fn test_pattern_multi_line() {
        let pattern = Pattern::new(r"^#\w+", false).unwrap();
        assert_eq!(pattern.find_at("x\n#define", 0), Some((2, 9)));
        let eol = Pattern::new("$", false).unwrap();
        assert_eq!(eol.find_at("ab\ncd", 0), Some((2, 2)));
    }

    #[test]
    fn test_anchored_pattern() {
        let pattern = Pattern::new(r"[a-z]+", false).unwrap().anchored();
        assert_eq!(pattern.find_at("12 abc", 0), None);
        assert_eq!(pattern.find_at("12 abc", 3), Some((3, 6)));
    }

    #[test]
    fn test_words_pattern() {
        let pattern = Pattern::words(&["new", "return"], false).unwrap();
        assert_eq!(pattern.find_at("renew return", 0), Some((6, 12)));

        let symbols = Pattern::words(&["..", "..?"], false).unwrap();
        assert_eq!(symbols.find_at("a ..? b", 0), Some((2, 5)));
    }

    #[test]
    fn test_case_insensitive_pattern() {
        let pattern = Pattern::new("select", true).unwrap();
        assert_eq!(pattern.find_at("SELECT *", 0), Some((0, 6)));
    }

    #[test]
    fn test_matches_empty() {
        assert!(Pattern::new(r"a*", false).unwrap().matches_empty());
        assert!(!Pattern::new(r"a+", false).unwrap().matches_empty());
    }

    #[test]
    fn test_same_group_search() {
        let end = Pattern::new(r#"\)([a-z]*)""#, false).unwrap();
        assert_eq!(end.group_count(), 1);
        let text = r#")" )x" )ab""#;
        assert_eq!(end.search_same_group(text, 0, "ab"), Some((7, 11)));
        assert_eq!(end.search_same_group(text, 0, ""), Some((0, 2)));
        assert_eq!(end.search_same_group(text, 3, ""), None);

        let begin = Pattern::new(r#"R"([a-z]*)\("#, false).unwrap();
        assert_eq!(begin.first_group(r#"x R"ab(q"#, 2), Some("ab"));
        assert_eq!(begin.first_group(r#"x R"ab(q"#, 0), None);
    }

    #[test]
    fn test_parse_keyword() {
        assert_eq!(parse_keyword("int"), ("int", 1));
        assert_eq!(parse_keyword("dynamic_cast|10"), ("dynamic_cast", 10));
        assert_eq!(parse_keyword("|"), ("|", 1));
        assert_eq!(parse_keyword("a|b"), ("a|b", 1));
    }

    #[test]
    fn test_region_builder() {
        let rule = RegionRule::new("\"", "\"")
            .class(TokenClass::String)
            .illegal(r"\n")
            .exclude_end()
            .relevance(0);
        assert_eq!(rule.class, Some(TokenClass::String));
        assert_eq!(rule.illegal.as_deref(), Some(r"\n"));
        assert!(rule.exclude_end);
        assert!(!rule.exclude_begin);
        assert_eq!(rule.relevance, 0);
    }

    #[test]
    fn test_rule_deserialize() {
        let json = r#"{
            "kind": "region",
            "name": "parens",
            "begin": "\\(",
            "end": "\\)",
            "contains": [
                { "kind": "recurse" },
                { "kind": "token", "class": "number", "begin": "\\d+", "relevance": 0 }
            ]
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        let Rule::Region(region) = rule else {
            panic!("expected a region");
        };
        assert_eq!(region.name.as_deref(), Some("parens"));
        assert_eq!(region.relevance, 1);
        assert!(matches!(region.contains[0], Rule::Recurse));
        assert!(matches!(&region.contains[1], Rule::Token(t) if t.relevance == 0));
    }

    #[test]
    fn test_token_without_class_is_plain() {
        let rule: Rule = serde_json::from_str(r#"{ "kind": "token", "begin": "x" }"#).unwrap();
        assert!(matches!(&rule, Rule::Token(t) if t.class.is_none() && t.relevance == 1));
        assert_eq!(TokenRule::plain("x").class, None);
    }

    #[test]
    fn test_keyword_sets_builder() {
        let keywords = KeywordSets::default()
            .category(TokenClass::Keyword, "if else")
            .category_words(TokenClass::Literal, ["true", "false"]);
        assert_eq!(keywords.pattern, DEFAULT_KEYWORD_PATTERN);
        assert_eq!(keywords.categories.len(), 2);
        assert_eq!(keywords.categories[0].words, vec!["if", "else"]);
    }
}
