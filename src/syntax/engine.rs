//! Matching engine
//!
//! Walks a text against a compiled [`Grammar`] and produces classified
//! token spans. Scanning keeps a stack of active regions; at every step
//! the earliest of three candidates decides what happens next:
//!
//! 1. the begin of a child of the innermost region (declaration order
//!    breaks ties between children),
//! 2. the end of the innermost region (wins ties against children),
//! 3. the illegal pattern of the innermost region (must come strictly
//!    before both).
//!
//! There is no backtracking. Regions still open at end of input close
//! there. Region spans are emitted before their contents, and plain
//! text is emitted as unclassified leaves, so leaves tile the input.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde::Serialize;
use tracing::{trace, warn};

use super::language::{Grammar, Node, RegionNode, RuleId};
use super::rules::Pattern;
use super::tokens::TokenClass;
use crate::error::{HighlightError, Result};

/// Bounds that keep pathological grammars from hanging a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest region nesting; child regions beyond it are ignored
    pub max_depth: usize,
    /// Consecutive steps allowed without the scan offset advancing
    pub stall_limit: usize,
    /// Step budget per byte of input per nesting level
    pub iteration_factor: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            stall_limit: 256,
            iteration_factor: 4,
        }
    }
}

/// Whether a span covers a whole region or a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// A region, enclosing the tokens that follow it at a greater depth
    Region,
    /// A leaf: plain text, a keyword or a single-shot match
    Text,
}

/// A classified span of the input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    /// Byte offset where this span starts (inclusive)
    pub start: usize,
    /// Byte offset where this span ends (exclusive)
    pub end: usize,
    /// Class of the span; `None` for unclassified text
    pub class: Option<TokenClass>,
    /// Number of regions enclosing this span
    pub depth: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Check if this span contains a byte position
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Get the length of this span in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == TokenKind::Text
    }

    /// Check if this span has the given class
    pub fn is(&self, class: &TokenClass) -> bool {
        self.class.as_ref() == Some(class)
    }
}

/// Result of highlighting a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlighted {
    /// Name of the grammar used
    pub grammar: String,
    /// Spans in pre-order: each region precedes its contents
    pub tokens: Vec<Token>,
    /// Sum of the relevance of every distinct rule and keyword matched
    pub relevance: u32,
}

impl Highlighted {
    /// Leaf spans, in text order
    pub fn leaves(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_leaf())
    }

    /// Spans of a given class
    pub fn with_class<'a>(&'a self, class: &'a TokenClass) -> impl Iterator<Item = &'a Token> {
        self.tokens.iter().filter(move |t| t.is(class))
    }
}

/// Highlight `text` with `grammar`
pub fn highlight(grammar: &Grammar, text: &str, limits: &Limits) -> Result<Highlighted> {
    Scanner::new(grammar, text, limits).run()
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Begin { rule: RuleId, start: usize, end: usize },
    End { start: usize, end: usize },
    Illegal { start: usize, end: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Begin,
    End,
    Illegal,
}

/// A remembered search: the leftmost match at or after `from`
#[derive(Debug, Clone, Copy)]
struct Cached {
    from: usize,
    found: Option<(usize, usize)>,
}

#[derive(Debug)]
struct Frame {
    rule: RuleId,
    /// Index of this region's span in the output; `None` for the root
    token: Option<usize>,
    depth: usize,
    /// Text the end pattern's first group must repeat
    delimiter: Option<String>,
}

struct Scanner<'a> {
    grammar: &'a Grammar,
    text: &'a str,
    limits: &'a Limits,
    tokens: Vec<Token>,
    stack: Vec<Frame>,
    offset: usize,
    /// Start of text not yet emitted for the innermost region
    pending: usize,
    searches: HashMap<(RuleId, Slot), Cached>,
    triggered: HashSet<RuleId>,
    keywords_seen: HashSet<(RuleId, usize, String)>,
    relevance: u32,
    last_rule: RuleId,
}

impl<'a> Scanner<'a> {
    fn new(grammar: &'a Grammar, text: &'a str, limits: &'a Limits) -> Self {
        Self {
            grammar,
            text,
            limits,
            tokens: Vec::new(),
            stack: vec![Frame {
                rule: Grammar::ROOT,
                token: None,
                depth: 0,
                delimiter: None,
            }],
            offset: 0,
            pending: 0,
            searches: HashMap::new(),
            triggered: HashSet::new(),
            keywords_seen: HashSet::new(),
            relevance: 0,
            last_rule: Grammar::ROOT,
        }
    }

    fn run(mut self) -> Result<Highlighted> {
        let len = self.text.len();
        let budget = (len + 1)
            .saturating_mul(self.limits.max_depth + 1)
            .saturating_mul(self.limits.iteration_factor.max(1));
        let mut steps = 0usize;
        let mut stalled = 0usize;

        while self.offset < len {
            let Some(event) = self.next_event() else {
                break;
            };
            let before = self.offset;
            self.apply(event);

            steps += 1;
            stalled = if self.offset == before { stalled + 1 } else { 0 };
            if stalled > self.limits.stall_limit || steps > budget {
                return Err(self.loop_error());
            }
        }

        self.flush(len);
        while self.stack.len() > 1 {
            self.close(len, false);
        }

        Ok(Highlighted {
            grammar: self.grammar.name().to_string(),
            tokens: self.tokens,
            relevance: self.relevance,
        })
    }

    fn loop_error(&self) -> HighlightError {
        let rule = self.grammar.node(self.last_rule).label().to_string();
        warn!(rule = %rule, offset = self.offset, "highlighting stopped making progress");
        HighlightError::RuleLoop {
            rule,
            offset: self.offset,
        }
    }

    fn top(&self) -> &Frame {
        // The root frame is never popped
        &self.stack[self.stack.len() - 1]
    }

    fn top_region(&self) -> &'a RegionNode {
        let grammar = self.grammar;
        match grammar.node(self.top().rule) {
            Node::Region(region) => region,
            Node::Token(_) => unreachable!("only regions are pushed"),
        }
    }

    /// Leftmost match of a rule pattern at or after the current offset
    fn search(&mut self, rule: RuleId, slot: Slot, pattern: &Pattern) -> Option<(usize, usize)> {
        let offset = self.offset;
        if let Some(cached) = self.searches.get(&(rule, slot)) {
            let still_valid = cached.from <= offset
                && cached.found.map_or(true, |(start, _)| start >= offset);
            if still_valid {
                return cached.found.filter(|&(start, _)| !pattern.is_anchored() || start == offset);
            }
        }
        let found = pattern.search(self.text, offset);
        self.searches.insert((rule, slot), Cached { from: offset, found });
        found.filter(|&(start, _)| !pattern.is_anchored() || start == offset)
    }

    fn next_event(&mut self) -> Option<Event> {
        let grammar = self.grammar;
        let frame_rule = self.top().rule;
        let region = self.top_region();
        let at_root = self.stack.len() == 1;
        let regions_allowed = self.stack.len() <= self.limits.max_depth;

        let mut begin: Option<Event> = None;
        let mut begin_at = usize::MAX;
        for &child in &region.children {
            let node = grammar.node(child);
            if matches!(node, Node::Region(_)) && !regions_allowed {
                continue;
            }
            let Some(pattern) = node.begin() else {
                continue;
            };
            if let Some((start, end)) = self.search(child, Slot::Begin, pattern) {
                if start < begin_at {
                    begin_at = start;
                    begin = Some(Event::Begin { rule: child, start, end });
                }
            }
        }

        let mut event = begin;
        let mut event_at = begin_at;
        if let Some(pattern) = &region.end {
            // Delimited ends depend on the frame, so they bypass the search cache
            let found = match self.top().delimiter.clone() {
                Some(delimiter) => pattern.search_same_group(self.text, self.offset, &delimiter),
                None => self.search(frame_rule, Slot::End, pattern),
            };
            if let Some((start, end)) = found {
                if start <= event_at {
                    event = Some(Event::End { start, end });
                    event_at = start;
                }
            }
        }
        if let Some(pattern) = &region.illegal {
            if let Some((start, end)) = self.search(frame_rule, Slot::Illegal, pattern) {
                // An empty illegal match cannot be consumed at the root
                let usable = !at_root || end > start;
                if usable && start < event_at {
                    event = Some(Event::Illegal { start, end });
                }
            }
        }
        event
    }

    fn apply(&mut self, event: Event) {
        let grammar = self.grammar;
        match event {
            Event::Begin { rule, start, end } => {
                self.last_rule = rule;
                self.trigger(rule);
                match grammar.node(rule) {
                    Node::Token(token) => {
                        self.flush(start);
                        let depth = self.top().depth;
                        self.leaf(start, end, token.class.clone(), depth);
                        self.pending = end;
                        self.offset = end;
                    }
                    Node::Region(region) => {
                        let delimiter = if region.end_same_as_begin {
                            region
                                .begin
                                .as_ref()
                                .and_then(|pattern| pattern.first_group(self.text, start))
                                .map(str::to_string)
                        } else {
                            None
                        };
                        if region.return_begin {
                            self.flush(start);
                            self.open(rule, start, delimiter);
                            self.offset = start;
                        } else if region.exclude_begin {
                            self.flush(end);
                            self.open(rule, end, delimiter);
                            self.offset = end;
                        } else {
                            self.flush(start);
                            self.open(rule, start, delimiter);
                            self.offset = end;
                        }
                    }
                }
            }
            Event::End { start, end } => {
                let region = self.top_region();
                self.last_rule = self.top().rule;
                if region.return_end {
                    self.flush(start);
                    self.close(start, false);
                    self.offset = start;
                } else if region.exclude_end {
                    self.flush(start);
                    self.close(start, false);
                    self.offset = end;
                } else {
                    self.flush(end);
                    self.close(end, false);
                    self.offset = end;
                }
            }
            Event::Illegal { start, end } => {
                self.last_rule = self.top().rule;
                self.flush(start);
                if self.stack.len() == 1 {
                    self.leaf(start, end, Some(TokenClass::Invalid), 0);
                    self.pending = end;
                    self.offset = end;
                } else {
                    self.close(start, true);
                    self.offset = start;
                }
            }
        }
    }

    fn trigger(&mut self, rule: RuleId) {
        if self.triggered.insert(rule) {
            self.relevance += self.grammar.node(rule).relevance();
        }
    }

    fn open(&mut self, rule: RuleId, at: usize, delimiter: Option<String>) {
        let grammar = self.grammar;
        let class = grammar.region(rule).and_then(|r| r.class.clone());
        let depth = self.top().depth;
        trace!(rule = grammar.node(rule).label(), at, depth, "open region");
        self.tokens.push(Token {
            start: at,
            end: at,
            class,
            depth,
            kind: TokenKind::Region,
        });
        self.stack.push(Frame {
            rule,
            token: Some(self.tokens.len() - 1),
            depth: depth + 1,
            delimiter,
        });
        self.pending = at;
    }

    fn close(&mut self, at: usize, invalid: bool) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(frame) = self.stack.pop() {
            trace!(rule = self.grammar.node(frame.rule).label(), at, invalid, "close region");
            if let Some(index) = frame.token {
                let token = &mut self.tokens[index];
                token.end = at;
                if invalid {
                    token.class = Some(TokenClass::Invalid);
                }
            }
        }
        self.pending = at;
    }

    fn leaf(&mut self, start: usize, end: usize, class: Option<TokenClass>, depth: usize) {
        if start >= end {
            return;
        }
        if class.is_none() {
            if let Some(last) = self.tokens.last_mut() {
                if last.kind == TokenKind::Text
                    && last.class.is_none()
                    && last.depth == depth
                    && last.end == start
                {
                    last.end = end;
                    return;
                }
            }
        }
        self.tokens.push(Token {
            start,
            end,
            class,
            depth,
            kind: TokenKind::Text,
        });
    }

    /// Emit pending text of the innermost region up to `to`
    fn flush(&mut self, to: usize) {
        if to <= self.pending {
            return;
        }
        let from = self.pending;
        self.pending = to;
        let depth = self.top().depth;
        let rule = self.top().rule;
        let region = self.top_region();

        let Some(table) = &region.keywords else {
            self.leaf(from, to, None, depth);
            return;
        };

        let text = self.text;
        let haystack = &text[..to];
        let mut cursor = from;
        let mut pos = from;
        while pos < to {
            let Some((start, end)) = table.pattern.find_at(haystack, pos) else {
                break;
            };
            if end == start {
                pos = start + text[start..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            if let Some(hit) = table.lookup(&text[start..end]) {
                self.leaf(cursor, start, None, depth);
                self.leaf(start, end, Some(hit.class.clone()), depth);
                if self.keywords_seen.insert((rule, hit.category, text[start..end].to_string())) {
                    self.relevance += hit.relevance;
                }
                cursor = end;
            }
            pos = end;
        }
        self.leaf(cursor, to, None, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::definition::GrammarDef;
    use crate::syntax::rules::{KeywordRule, KeywordSets, RegionRule, Rule, TokenRule};

    fn create_test_grammar() -> Grammar {
        let def = GrammarDef::new("Test")
            .keywords(
                KeywordSets::default()
                    .category(TokenClass::Keyword, "let if|5")
                    .category(TokenClass::Literal, "true"),
            )
            .contains([
                TokenRule::new(TokenClass::Comment, "//.*$").name("line_comment").into(),
                RegionRule::new(r"/\*", r"\*/")
                    .name("block_comment")
                    .class(TokenClass::Comment)
                    .into(),
                RegionRule::new("\"", "\"")
                    .name("string")
                    .class(TokenClass::String)
                    .illegal(r"\n")
                    .contains([TokenRule::new(TokenClass::Subst, r"\\.").name("escape").into()])
                    .into(),
                TokenRule::new(TokenClass::Number, r"\b\d+\b")
                    .name("number")
                    .relevance(0)
                    .into(),
            ]);
        Grammar::compile(def).unwrap()
    }

    fn classes(result: &Highlighted, text: &str) -> Vec<(String, String)> {
        result
            .tokens
            .iter()
            .filter_map(|t| {
                t.class
                    .as_ref()
                    .map(|c| (c.name().to_string(), text[t.range()].to_string()))
            })
            .collect()
    }

    fn assert_tiled(result: &Highlighted, text: &str) {
        let mut pos = 0;
        for leaf in result.leaves() {
            assert_eq!(leaf.start, pos, "gap or overlap at {pos}");
            pos = leaf.end;
        }
        assert_eq!(pos, text.len());
    }

    #[test]
    fn test_simple_highlighting() {
        let grammar = create_test_grammar();
        let text = "let x = 42;";
        let result = grammar.highlight(text).unwrap();

        assert_eq!(
            classes(&result, text),
            vec![
                ("keyword".to_string(), "let".to_string()),
                ("number".to_string(), "42".to_string())
            ]
        );
        assert_tiled(&result, text);
        assert_eq!(result.grammar, "Test");
    }

    #[test]
    fn test_line_comment() {
        let grammar = create_test_grammar();
        let text = "x // let\ny";
        let result = grammar.highlight(text).unwrap();

        // Keywords inside the comment are not classified
        assert_eq!(classes(&result, text), vec![("comment".to_string(), "// let".to_string())]);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_region_nesting() {
        let grammar = create_test_grammar();
        let text = r#"a "b\"c" d"#;
        let result = grammar.highlight(text).unwrap();

        let string = result.with_class(&TokenClass::String).next().unwrap();
        assert_eq!(&text[string.range()], r#""b\"c""#);
        assert_eq!(string.depth, 0);
        assert_eq!(string.kind, TokenKind::Region);

        let escape = result.with_class(&TokenClass::Subst).next().unwrap();
        assert_eq!(&text[escape.range()], r#"\""#);
        assert_eq!(escape.depth, 1);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_unterminated_region_closes_at_end() {
        let grammar = create_test_grammar();
        let text = "x /* open\nstill open";
        let result = grammar.highlight(text).unwrap();

        let comment = result.with_class(&TokenClass::Comment).next().unwrap();
        assert_eq!(comment.range(), 2..text.len());
        assert_tiled(&result, text);
    }

    #[test]
    fn test_illegal_aborts_region() {
        let grammar = create_test_grammar();
        let text = "\"ab\nlet";
        let result = grammar.highlight(text).unwrap();

        let aborted = result.with_class(&TokenClass::Invalid).next().unwrap();
        assert_eq!(aborted.range(), 0..3);
        assert!(result.with_class(&TokenClass::String).next().is_none());
        // Text after the newline is scanned in the parent again
        let keyword = result.with_class(&TokenClass::Keyword).next().unwrap();
        assert_eq!(&text[keyword.range()], "let");
        assert_eq!(keyword.depth, 0);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_end_wins_tie_with_child() {
        // Both the end and the child begin match at the closing quote
        let def = GrammarDef::new("Tie").contains([RegionRule::new("<", ">")
            .class(TokenClass::Meta)
            .contains([TokenRule::new(TokenClass::String, ">+").into()])
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let text = "<a>>";
        let result = grammar.highlight(text).unwrap();

        let meta = result.with_class(&TokenClass::Meta).next().unwrap();
        assert_eq!(meta.range(), 0..3);
        assert!(result.with_class(&TokenClass::String).next().is_none());
    }

    #[test]
    fn test_earliest_child_wins_then_declaration_order() {
        let def = GrammarDef::new("Order").contains([
            TokenRule::new(TokenClass::Keyword, "b").into(),
            TokenRule::new(TokenClass::Number, "a").into(),
            TokenRule::new(TokenClass::String, "a").into(),
        ]);
        let grammar = Grammar::compile(def).unwrap();
        let text = "ab";
        let result = grammar.highlight(text).unwrap();
        assert_eq!(
            classes(&result, text),
            vec![
                ("number".to_string(), "a".to_string()),
                ("keyword".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn test_exclude_and_return_end() {
        let def = GrammarDef::new("Ends").contains([
            RegionRule::new("@", r"[^\w]")
                .class(TokenClass::Title)
                .exclude_end()
                .into(),
            RegionRule::new("#", r"\[")
                .class(TokenClass::Meta)
                .return_end()
                .into(),
            RegionRule::new(r"\[", r"\]").class(TokenClass::Params).into(),
        ]);
        let grammar = Grammar::compile(def).unwrap();

        let text = "@call;";
        let result = grammar.highlight(text).unwrap();
        let title = result.with_class(&TokenClass::Title).next().unwrap();
        assert_eq!(&text[title.range()], "@call");
        assert_tiled(&result, text);

        let text = "#fn[x]";
        let result = grammar.highlight(text).unwrap();
        let meta = result.with_class(&TokenClass::Meta).next().unwrap();
        assert_eq!(&text[meta.range()], "#fn");
        let params = result.with_class(&TokenClass::Params).next().unwrap();
        assert_eq!(&text[params.range()], "[x]");
        assert_tiled(&result, text);
    }

    #[test]
    fn test_return_and_exclude_begin() {
        let def = GrammarDef::new("Begins").contains([
            RegionRule::new(r"\w+\(", r"\)")
                .class(TokenClass::Function)
                .return_begin()
                .contains([TokenRule::new(TokenClass::Title, r"\w+").anchored().into()])
                .into(),
            RegionRule::new("'", "'")
                .class(TokenClass::String)
                .exclude_begin()
                .into(),
        ]);
        let grammar = Grammar::compile(def).unwrap();

        let text = "f(x) 'q'";
        let result = grammar.highlight(text).unwrap();
        let function = result.with_class(&TokenClass::Function).next().unwrap();
        assert_eq!(&text[function.range()], "f(x)");
        // The anchored title only matches right at the region start
        let titles: Vec<_> = result.with_class(&TokenClass::Title).collect();
        assert_eq!(titles.len(), 1);
        assert_eq!(&text[titles[0].range()], "f");

        let string = result.with_class(&TokenClass::String).next().unwrap();
        assert_eq!(&text[string.range()], "q'");
        assert_tiled(&result, text);
    }

    #[test]
    fn test_self_reference_nests() {
        let def = GrammarDef::new("Parens").contains([RegionRule::new(r"\(", r"\)")
            .class(TokenClass::Params)
            .contains([Rule::Recurse])
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let text = "((a)(b))c";
        let result = grammar.highlight(text).unwrap();

        let spans: Vec<(usize, Range<usize>)> = result
            .with_class(&TokenClass::Params)
            .map(|t| (t.depth, t.range()))
            .collect();
        assert_eq!(spans, vec![(0, 0..8), (1, 1..4), (1, 4..7)]);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_depth_limit_degrades() {
        let def = GrammarDef::new("Parens").contains([RegionRule::new(r"\(", r"\)")
            .class(TokenClass::Params)
            .contains([Rule::Recurse])
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let limits = Limits {
            max_depth: 2,
            ..Limits::default()
        };
        let text = "((((x))))";
        let result = grammar.highlight_with(text, &limits).unwrap();
        assert!(result.tokens.iter().all(|t| t.depth <= 2));
        assert_eq!(result.with_class(&TokenClass::Params).count(), 2);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_zero_length_loop_is_an_error() {
        let def = GrammarDef::new("Loop").contains([RegionRule::new(r"\b", r"\b")
            .name("empty")
            .class(TokenClass::Meta)
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        match grammar.highlight("word") {
            Err(HighlightError::RuleLoop { rule, offset }) => {
                assert_eq!(rule, "Loop/empty");
                assert_eq!(offset, 0);
            }
            other => panic!("expected a loop error, got {:?}", other),
        }
    }

    #[test]
    fn test_step_budget_is_an_error() {
        // The stall guard is out of reach, so only the step budget can stop this scan
        let def = GrammarDef::new("Budget").contains([RegionRule::new(r"\b", r"\b")
            .name("empty")
            .class(TokenClass::Meta)
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let limits = Limits {
            max_depth: 1,
            stall_limit: usize::MAX,
            iteration_factor: 1,
        };
        match grammar.highlight_with("word", &limits) {
            Err(HighlightError::RuleLoop { rule, offset }) => {
                assert_eq!(rule, "Budget/empty");
                assert_eq!(offset, 0);
            }
            other => panic!("expected a loop error, got {:?}", other),
        }
    }

    #[test]
    fn test_step_budget_fits_advancing_scan() {
        // Two steps per byte: open on "a", close on the empty end
        let def = GrammarDef::new("Pairs").contains([RegionRule::new("a", "(?:)")
            .class(TokenClass::Meta)
            .return_end()
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let limits = Limits {
            max_depth: 1,
            stall_limit: 1,
            iteration_factor: 1,
        };
        let text = "a".repeat(8);
        let result = grammar.highlight_with(&text, &limits).unwrap();
        assert_eq!(result.with_class(&TokenClass::Meta).count(), 8);
        assert_tiled(&result, &text);
    }

    #[test]
    fn test_end_must_repeat_begin_group() {
        let def = GrammarDef::new("Heredoc").contains([RegionRule::new(r"<<(\w+)", r"^(\w+)$")
            .name("heredoc")
            .class(TokenClass::String)
            .end_same_as_begin()
            .into()]);
        let grammar = Grammar::compile(def).unwrap();
        let text = "<<EOT\nabc\nEND\nEOT\nx";
        let result = grammar.highlight(text).unwrap();
        let string = result.with_class(&TokenClass::String).next().unwrap();
        assert_eq!(&text[string.range()], "<<EOT\nabc\nEND\nEOT");
        assert_tiled(&result, text);
    }

    #[test]
    fn test_root_illegal_marks_lexeme() {
        let def = GrammarDef::new("Strict")
            .illegal("</")
            .contains([KeywordRule::new(TokenClass::Keyword, "int").into()]);
        let grammar = Grammar::compile(def).unwrap();
        let text = "int </b> int";
        let result = grammar.highlight(text).unwrap();

        let invalid = result.with_class(&TokenClass::Invalid).next().unwrap();
        assert_eq!(&text[invalid.range()], "</");
        assert_eq!(result.with_class(&TokenClass::Keyword).count(), 2);
        assert_tiled(&result, text);
    }

    #[test]
    fn test_relevance_counts_distinct_rules_and_keywords() {
        let grammar = create_test_grammar();
        // line_comment (1) + string (1) + if (5); "if" twice counts once, numbers are 0
        let result = grammar.highlight("if if 1 2 \"s\" // c").unwrap();
        assert_eq!(result.relevance, 7);
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let def = GrammarDef::new("Sql")
            .case_insensitive()
            .keywords(KeywordSets::default().category(TokenClass::Keyword, "select from"));
        let grammar = Grammar::compile(def).unwrap();
        let text = "SELECT a FROM t";
        let result = grammar.highlight(text).unwrap();
        assert_eq!(result.with_class(&TokenClass::Keyword).count(), 2);
    }

    #[test]
    fn test_multibyte_text() {
        let grammar = create_test_grammar();
        let text = "let é = \"ü\" // ß";
        let result = grammar.highlight(text).unwrap();
        assert_tiled(&result, text);
        assert_eq!(result.with_class(&TokenClass::String).count(), 1);
    }

    #[test]
    fn test_empty_input() {
        let grammar = create_test_grammar();
        let result = grammar.highlight("").unwrap();
        assert!(result.tokens.is_empty());
        assert_eq!(result.relevance, 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn nesting_grammar() -> Grammar {
            let def = GrammarDef::new("Props")
                .keywords(KeywordSets::default().category(TokenClass::Keyword, "if let"))
                .contains([
                    RegionRule::new(r"\(", r"\)")
                        .class(TokenClass::Params)
                        .contains([Rule::Recurse, TokenRule::new(TokenClass::Number, r"\d+").into()])
                        .into(),
                    RegionRule::new("\"", "\"")
                        .class(TokenClass::String)
                        .illegal(r"\n")
                        .into(),
                    TokenRule::new(TokenClass::Comment, "#.*$").into(),
                ]);
            Grammar::compile(def).unwrap()
        }

        proptest! {
            #[test]
            fn highlight_terminates_and_tiles(text in r##"[a-z0-9 ()"#\n]{0,64}"##) {
                let grammar = nesting_grammar();
                let result = grammar.highlight(&text).unwrap();
                let mut pos = 0;
                for leaf in result.leaves() {
                    prop_assert_eq!(leaf.start, pos);
                    pos = leaf.end;
                }
                prop_assert_eq!(pos, text.len());
            }

            #[test]
            fn highlight_is_deterministic(text in r##"[a-z0-9 ()"#\n]{0,64}"##) {
                let grammar = nesting_grammar();
                prop_assert_eq!(grammar.highlight(&text).unwrap(), grammar.highlight(&text).unwrap());
            }

            #[test]
            fn spans_nest_inside_their_regions(text in r##"[a-z0-9 ()"#\n]{0,64}"##) {
                let grammar = nesting_grammar();
                let result = grammar.highlight(&text).unwrap();
                let mut open: Vec<&Token> = Vec::new();
                for token in &result.tokens {
                    while open.len() > token.depth {
                        open.pop();
                    }
                    prop_assert_eq!(open.len(), token.depth);
                    if let Some(parent) = open.last() {
                        prop_assert!(parent.start <= token.start && token.end <= parent.end);
                    }
                    if token.kind == TokenKind::Region {
                        open.push(token);
                    }
                }
            }
        }
    }
}
