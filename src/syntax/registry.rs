//! Grammar registry
//!
//! The [`Registry`] maps grammar names and aliases to compiled grammars
//! and picks a grammar for a text by auto-detection. Grammars are held
//! as `Arc`s behind a lock: lookups clone the `Arc` and release the lock
//! before any scanning happens, so a grammar being replaced never
//! disturbs a highlight already in progress.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::builtin;
use super::definition::GrammarDef;
use super::engine::{Highlighted, Limits};
use super::language::Grammar;
use crate::error::{HighlightError, Result};

/// Outcome of auto-detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// Registry key of the chosen grammar
    pub language: String,
    /// Highlighting produced by the chosen grammar
    pub result: Highlighted,
    /// Registry key of the runner-up, if more than one grammar took part
    pub second_best: Option<String>,
}

#[derive(Default)]
struct Entries {
    /// Grammars in registration order, by registry key
    grammars: Vec<(String, Arc<Grammar>)>,
    /// Lower-cased keys, display names and aliases to an index in `grammars`
    lookup: HashMap<String, usize>,
}

impl Entries {
    fn reindex(&mut self) {
        self.lookup.clear();
        // Keys are inserted last so they shadow a clashing alias or display name
        for (index, (_, grammar)) in self.grammars.iter().enumerate() {
            for alias in grammar.aliases() {
                self.lookup.insert(alias.to_lowercase(), index);
            }
        }
        for (index, (_, grammar)) in self.grammars.iter().enumerate() {
            self.lookup.insert(grammar.name().to_lowercase(), index);
        }
        for (index, (key, _)) in self.grammars.iter().enumerate() {
            self.lookup.insert(key.clone(), index);
        }
    }

    fn get(&self, name: &str) -> Option<&(String, Arc<Grammar>)> {
        self.lookup
            .get(&name.to_lowercase())
            .and_then(|&index| self.grammars.get(index))
    }
}

/// Registry of compiled grammars
pub struct Registry {
    entries: RwLock<Entries>,
    limits: Limits,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            limits: Limits::default(),
        }
    }

    /// Create a registry holding the built-in grammars
    pub fn with_builtin() -> Result<Self> {
        let registry = Self::new();
        for (name, def) in builtin::all_grammars() {
            registry.register(name, def)?;
        }
        Ok(registry)
    }

    /// Builder: set the engine limits used by this registry
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        // Entries are only swapped whole, so a poisoned lock still holds a consistent map
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Compile and register a grammar under `name`
    ///
    /// Names are case-insensitive. Registering an existing name replaces
    /// the grammar in place, keeping its position for auto-detection ties.
    /// If compilation fails the registry is left unchanged.
    pub fn register(&self, name: &str, def: GrammarDef) -> Result<Arc<Grammar>> {
        let grammar = Arc::new(Grammar::compile(def)?);
        self.register_grammar(name, Arc::clone(&grammar));
        Ok(grammar)
    }

    /// Register an already compiled grammar
    pub fn register_grammar(&self, name: &str, grammar: Arc<Grammar>) {
        let key = name.to_lowercase();
        debug!(key = %key, grammar = grammar.name(), rules = grammar.rule_count(), "registering grammar");

        let mut entries = self.write();
        match entries.grammars.iter().position(|(k, _)| *k == key) {
            Some(index) => entries.grammars[index].1 = grammar,
            None => entries.grammars.push((key, grammar)),
        }
        entries.reindex();
    }

    /// Look up a grammar by key, display name or alias
    pub fn resolve(&self, name: &str) -> Result<Arc<Grammar>> {
        self.read()
            .get(name)
            .map(|(_, grammar)| Arc::clone(grammar))
            .ok_or_else(|| HighlightError::NotFound(name.to_string()))
    }

    /// Aliases of a registered grammar
    pub fn list_aliases(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.resolve(name)?.aliases().to_vec())
    }

    /// Registry keys, in registration order
    pub fn names(&self) -> Vec<String> {
        self.read().grammars.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highlight with a named grammar, or auto-detect when `name` is `None`
    pub fn highlight(&self, text: &str, name: Option<&str>) -> Result<Highlighted> {
        match name {
            Some(name) => self.resolve(name)?.highlight_with(text, &self.limits),
            None => Ok(self.highlight_auto(text)?.result),
        }
    }

    /// Highlight with every auto-detectable grammar and keep the most relevant
    ///
    /// Ties go to the grammar registered first. A grammar that fails with a
    /// rule loop is skipped.
    pub fn highlight_auto(&self, text: &str) -> Result<Detected> {
        let candidates: Vec<(String, Arc<Grammar>)> = self
            .read()
            .grammars
            .iter()
            .filter(|(_, grammar)| grammar.autodetect())
            .map(|(key, grammar)| (key.clone(), Arc::clone(grammar)))
            .collect();

        let mut best: Option<(String, Highlighted)> = None;
        let mut second_best: Option<(String, u32)> = None;
        for (key, grammar) in candidates {
            let result = match grammar.highlight_with(text, &self.limits) {
                Ok(result) => result,
                Err(e @ HighlightError::RuleLoop { .. }) => {
                    warn!(grammar = %key, error = %e, "skipping grammar during auto-detection");
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!(grammar = %key, relevance = result.relevance, "auto-detection candidate");

            let beats_best = best
                .as_ref()
                .map_or(true, |(_, current)| result.relevance > current.relevance);
            if beats_best {
                if let Some((previous, current)) = best.take() {
                    second_best = Some((previous, current.relevance));
                }
                best = Some((key, result));
            } else if second_best.as_ref().map_or(true, |(_, r)| result.relevance > *r) {
                second_best = Some((key, result.relevance));
            }
        }

        let (language, result) = best.ok_or(HighlightError::NoGrammar)?;
        debug!(language = %language, relevance = result.relevance, "auto-detected grammar");
        Ok(Detected {
            language,
            result,
            second_best: second_best.map(|(key, _)| key),
        })
    }

    /// Load and register a grammar file, keyed by its file stem
    pub fn load_file(&self, path: &Path) -> Result<Arc<Grammar>> {
        let def = GrammarDef::load(path)?;
        let key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| def.name.clone());
        self.register(&key, def)
    }

    /// Load every `.toml` and `.json` grammar in a directory
    ///
    /// Files are loaded in name order. Other files are skipped; the first
    /// grammar that fails to load stops the scan.
    pub fn load_dir(&self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            if !matches!(ext.as_deref(), Some("toml") | Some("json")) {
                warn!(path = %path.display(), "skipping file that is not a grammar");
                continue;
            }
            self.load_file(&path)?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
