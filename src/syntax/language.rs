//! Compiled grammars
//!
//! [`Grammar::compile`] turns a [`GrammarDef`] into an immutable arena of
//! rule nodes. Compilation is two-phase: every rule is declared first,
//! then `Recurse` placeholders are linked to the region that contains
//! them. A grammar never changes once compiled, so it can be shared
//! freely between threads.

use std::collections::HashMap;

use super::definition::GrammarDef;
use super::engine::{self, Highlighted, Limits};
use super::rules::{parse_keyword, KeywordRule, KeywordSets, Pattern, RegionRule, Rule, TokenRule};
use super::tokens::TokenClass;
use crate::error::{HighlightError, Result};

/// Index of a rule node inside its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

/// Compiled keyword sets
#[derive(Debug)]
pub(crate) struct KeywordTable {
    pub pattern: Pattern,
    categories: Vec<(TokenClass, HashMap<String, u32>)>,
    case_insensitive: bool,
}

/// A keyword lookup hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeywordHit<'a> {
    pub category: usize,
    pub class: &'a TokenClass,
    pub relevance: u32,
}

impl KeywordTable {
    fn compile(sets: &KeywordSets, case_insensitive: bool) -> std::result::Result<Self, regex::Error> {
        let pattern = Pattern::new(&sets.pattern, case_insensitive)?;
        let categories = sets
            .categories
            .iter()
            .map(|category| {
                let words = category
                    .words
                    .iter()
                    .map(|entry| {
                        let (word, relevance) = parse_keyword(entry);
                        (fold(word, case_insensitive), relevance)
                    })
                    .filter(|(word, _)| !word.is_empty())
                    .collect();
                (category.class.clone(), words)
            })
            .collect();
        Ok(Self {
            pattern,
            categories,
            case_insensitive,
        })
    }

    /// Look up a lexeme, first matching category wins
    pub fn lookup(&self, lexeme: &str) -> Option<KeywordHit<'_>> {
        let key = fold(lexeme, self.case_insensitive);
        self.categories
            .iter()
            .enumerate()
            .find_map(|(category, (class, words))| {
                words.get(key.as_str()).map(|&relevance| KeywordHit {
                    category,
                    class,
                    relevance,
                })
            })
    }
}

fn fold(word: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        word.to_lowercase()
    } else {
        word.to_string()
    }
}

/// A single-shot node
#[derive(Debug)]
pub(crate) struct TokenNode {
    pub label: String,
    pub class: Option<TokenClass>,
    pub begin: Pattern,
    pub relevance: u32,
}

/// A begin/end node; the grammar root is a region without patterns
#[derive(Debug)]
pub(crate) struct RegionNode {
    pub label: String,
    pub class: Option<TokenClass>,
    pub begin: Option<Pattern>,
    pub end: Option<Pattern>,
    pub illegal: Option<Pattern>,
    pub children: Vec<RuleId>,
    pub keywords: Option<KeywordTable>,
    pub relevance: u32,
    pub exclude_begin: bool,
    pub exclude_end: bool,
    pub return_begin: bool,
    pub return_end: bool,
    pub end_same_as_begin: bool,
}

#[derive(Debug)]
pub(crate) enum Node {
    Token(TokenNode),
    Region(RegionNode),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Token(node) => &node.label,
            Node::Region(node) => &node.label,
        }
    }

    pub fn begin(&self) -> Option<&Pattern> {
        match self {
            Node::Token(node) => Some(&node.begin),
            Node::Region(node) => node.begin.as_ref(),
        }
    }

    pub fn relevance(&self) -> u32 {
        match self {
            Node::Token(node) => node.relevance,
            Node::Region(node) => node.relevance,
        }
    }
}

/// A compiled, immutable grammar
#[derive(Debug)]
pub struct Grammar {
    name: String,
    aliases: Vec<String>,
    case_insensitive: bool,
    disable_autodetect: bool,
    nodes: Vec<Node>,
}

impl Grammar {
    /// The root region is always the first node
    pub(crate) const ROOT: RuleId = RuleId(0);

    /// Compile a grammar definition
    ///
    /// Fails with [`HighlightError::GrammarDefinition`] naming the first
    /// rule whose patterns do not compile.
    pub fn compile(def: GrammarDef) -> Result<Self> {
        let mut builder = Builder::new(def.case_insensitive);
        builder.declare_root(&def)?;
        let nodes = builder.link();
        Ok(Self {
            name: def.name,
            aliases: def.aliases,
            case_insensitive: def.case_insensitive,
            disable_autodetect: def.disable_autodetect,
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Whether this grammar takes part in auto-detection
    pub fn autodetect(&self) -> bool {
        !self.disable_autodetect
    }

    /// Number of compiled rules, the root included
    pub fn rule_count(&self) -> usize {
        self.nodes.len()
    }

    /// Highlight text with the default engine limits
    pub fn highlight(&self, text: &str) -> Result<Highlighted> {
        engine::highlight(self, text, &Limits::default())
    }

    /// Highlight text with explicit engine limits
    pub fn highlight_with(&self, text: &str, limits: &Limits) -> Result<Highlighted> {
        engine::highlight(self, text, limits)
    }

    pub(crate) fn node(&self, id: RuleId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn region(&self, id: RuleId) -> Option<&RegionNode> {
        match self.node(id) {
            Node::Region(region) => Some(region),
            Node::Token(_) => None,
        }
    }
}

/// A child reference before linking
enum ChildRef {
    Rule(RuleId),
    Recurse,
}

/// Two-phase grammar compiler
struct Builder {
    case_insensitive: bool,
    nodes: Vec<Option<Node>>,
    /// Unlinked children of every region, by region id
    pending: Vec<(RuleId, Vec<ChildRef>)>,
}

impl Builder {
    fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            nodes: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn reserve(&mut self) -> RuleId {
        self.nodes.push(None);
        RuleId(self.nodes.len() - 1)
    }

    fn pattern(&self, path: &str, field: &str, source: &str) -> Result<Pattern> {
        Pattern::new(source, self.case_insensitive)
            .map_err(|e| HighlightError::definition(format!("{path} ({field})"), e))
    }

    fn optional_pattern(&self, path: &str, field: &str, source: Option<&str>) -> Result<Option<Pattern>> {
        source.map(|s| self.pattern(path, field, s)).transpose()
    }

    fn keywords(&self, path: &str, sets: Option<&KeywordSets>) -> Result<Option<KeywordTable>> {
        sets.map(|sets| {
            KeywordTable::compile(sets, self.case_insensitive)
                .map_err(|e| HighlightError::definition(format!("{path} ($pattern)"), e))
        })
        .transpose()
    }

    fn declare_root(&mut self, def: &GrammarDef) -> Result<()> {
        let path = def.name.clone();
        let id = self.reserve();
        let illegal = self.optional_pattern(&path, "illegal", def.illegal.as_deref())?;
        let keywords = self.keywords(&path, def.keywords.as_ref())?;
        let mut children = Vec::with_capacity(def.contains.len());
        for (index, rule) in def.contains.iter().enumerate() {
            let child_path = child_path(&path, index, rule);
            match rule {
                Rule::Recurse => {
                    return Err(HighlightError::definition(
                        child_path,
                        "self reference outside of a region",
                    ))
                }
                _ => children.push(ChildRef::Rule(self.declare(rule, &child_path)?)),
            }
        }
        self.nodes[id.0] = Some(Node::Region(RegionNode {
            label: path,
            class: None,
            begin: None,
            end: None,
            illegal,
            children: Vec::new(),
            keywords,
            relevance: 0,
            exclude_begin: false,
            exclude_end: false,
            return_begin: false,
            return_end: false,
            end_same_as_begin: false,
        }));
        self.pending.push((id, children));
        Ok(())
    }

    fn declare(&mut self, rule: &Rule, path: &str) -> Result<RuleId> {
        match rule {
            Rule::Token(token) => self.declare_token(token, path),
            Rule::Keyword(keyword) => self.declare_keyword(keyword, path),
            Rule::Region(region) => self.declare_region(region, path),
            // Handled by the enclosing region
            Rule::Recurse => unreachable!("self references are linked, not declared"),
        }
    }

    fn declare_token(&mut self, rule: &TokenRule, path: &str) -> Result<RuleId> {
        let mut begin = self.pattern(path, "begin", &rule.begin)?;
        if begin.matches_empty() {
            return Err(HighlightError::definition(
                format!("{path} (begin)"),
                format!("token pattern `{}` matches the empty string", begin.as_str()),
            ));
        }
        if rule.anchored {
            begin = begin.anchored();
        }
        let id = self.reserve();
        self.nodes[id.0] = Some(Node::Token(TokenNode {
            label: path.to_string(),
            class: rule.class.clone(),
            begin,
            relevance: rule.relevance,
        }));
        Ok(id)
    }

    fn declare_keyword(&mut self, rule: &KeywordRule, path: &str) -> Result<RuleId> {
        let words: Vec<&str> = rule.words.iter().map(String::as_str).filter(|w| !w.is_empty()).collect();
        if words.is_empty() {
            return Err(HighlightError::definition(path, "keyword rule has no words"));
        }
        let begin = Pattern::words(&words, self.case_insensitive)
            .map_err(|e| HighlightError::definition(format!("{path} (words)"), e))?;
        if begin.matches_empty() {
            return Err(HighlightError::definition(
                format!("{path} (words)"),
                format!("keyword pattern `{}` matches the empty string", begin.as_str()),
            ));
        }
        let id = self.reserve();
        self.nodes[id.0] = Some(Node::Token(TokenNode {
            label: path.to_string(),
            class: Some(rule.class.clone()),
            begin,
            relevance: rule.relevance,
        }));
        Ok(id)
    }

    fn declare_region(&mut self, rule: &RegionRule, path: &str) -> Result<RuleId> {
        let id = self.reserve();
        let mut begin = self.pattern(path, "begin", &rule.begin)?;
        if rule.anchored {
            begin = begin.anchored();
        }
        let end = self.pattern(path, "end", &rule.end)?;
        if rule.end_same_as_begin {
            for (field, pattern) in [("begin", &begin), ("end", &end)] {
                if pattern.group_count() == 0 {
                    return Err(HighlightError::definition(
                        format!("{path} ({field})"),
                        format!("pattern `{}` needs a group to compare", pattern.as_str()),
                    ));
                }
            }
        }
        let illegal = self.optional_pattern(path, "illegal", rule.illegal.as_deref())?;
        let keywords = self.keywords(path, rule.keywords.as_ref())?;

        let mut children = Vec::with_capacity(rule.contains.len());
        for (index, child) in rule.contains.iter().enumerate() {
            match child {
                Rule::Recurse => children.push(ChildRef::Recurse),
                _ => {
                    let child_path = child_path(path, index, child);
                    children.push(ChildRef::Rule(self.declare(child, &child_path)?));
                }
            }
        }

        self.nodes[id.0] = Some(Node::Region(RegionNode {
            label: path.to_string(),
            class: rule.class.clone(),
            begin: Some(begin),
            end: Some(end),
            illegal,
            children: Vec::new(),
            keywords,
            relevance: rule.relevance,
            exclude_begin: rule.exclude_begin,
            exclude_end: rule.exclude_end,
            return_begin: rule.return_begin,
            return_end: rule.return_end,
            end_same_as_begin: rule.end_same_as_begin,
        }));
        self.pending.push((id, children));
        Ok(id)
    }

    /// Second phase: resolve self references and freeze the arena
    fn link(self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .nodes
            .into_iter()
            .map(|node| node.expect("every reserved rule is declared"))
            .collect();
        for (id, refs) in self.pending {
            let children = refs
                .into_iter()
                .map(|child| match child {
                    ChildRef::Rule(child) => child,
                    ChildRef::Recurse => id,
                })
                .collect();
            if let Node::Region(region) = &mut nodes[id.0] {
                region.children = children;
            }
        }
        nodes
    }
}

fn child_path(parent: &str, index: usize, rule: &Rule) -> String {
    match rule.name() {
        Some(name) => format!("{parent}/{name}"),
        None => format!("{parent}/{index}"),
    }
}
