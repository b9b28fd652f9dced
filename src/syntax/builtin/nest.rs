//! Nest language grammar

use super::fragments::Fragments;
use crate::syntax::definition::GrammarDef;
use crate::syntax::rules::{KeywordSets, RegionRule, Rule, TokenRule};
use crate::syntax::tokens::TokenClass;

fn keywords() -> KeywordSets {
    // Operators made of punctuation are looked up like words
    KeywordSets::new(r"[?.;><#!:=]+|\w+")
        .category(TokenClass::Keyword, "?.. ..? ... .. ; ?? ?! ? : =>")
        .category(TokenClass::BuiltIn, "_vars_ _globals_ _cwd_ _args_ >>> <<< !! ::")
        .category(TokenClass::Literal, "true false null")
        .category(
            TokenClass::Type,
            "Int Real Byte Map Array Vector Iter Func Null IOFile Str Type",
        )
}

fn string_escape() -> Rule {
    TokenRule::new(
        TokenClass::Subst,
        r#"\\(?:[abefnrtv\\"']|x[0-9a-fA-F]{2}|u[0-9a-fA-F]{4}|U[0-9a-fA-F]{8}|[0-7]{1,3})"#,
    )
    .name("escape")
    .relevance(0)
    .into()
}

fn strings() -> Vec<Rule> {
    vec![
        RegionRule::new("\"", "\"")
            .name("double_quote_string")
            .class(TokenClass::String)
            .illegal(r"\n")
            .contains([string_escape()])
            .into(),
        RegionRule::new("'", "'")
            .name("single_quote_string")
            .class(TokenClass::String)
            .illegal(r"\n")
            .contains([string_escape()])
            .into(),
    ]
}

fn number() -> Rule {
    TokenRule::new(
        TokenClass::Number,
        concat!(
            r"[+-]?\b(?:",
            r"0[bB][01][01_]*[bB]?",
            r"|0[oO][0-7][0-7_]*[bB]?",
            r"|0[xXhH][0-9a-fA-F][0-9a-fA-F_]*",
            r"|\d[\d_]*\.\d[\d_]*(?:[eE][+-]?\d[\d_]*)?",
            r"|\d[\d_]*[bB]?",
            r")\b",
        ),
    )
    .name("number")
    .relevance(0)
    .into()
}

/// `#name a b => ...` and `## a b => ...`; the body starts at `=>` or `[`
fn function_definition() -> Rule {
    RegionRule::new(r"##|#\s*[A-Za-z_]\w*", r"=>|\[")
        .name("func_def")
        .class(TokenClass::Keyword)
        .return_end()
        .relevance(0)
        .contains([TokenRule::new(TokenClass::Params, r"[A-Za-z_]\w*").name("param").into()])
        .into()
}

/// `@name` and `@@name`, including dotted member access
fn function_call() -> Rule {
    RegionRule::new("@@|@", r"[^A-Za-z0-9_.]")
        .name("func_call")
        .class(TokenClass::Keyword)
        .return_end()
        .relevance(10)
        .contains([TokenRule::new(TokenClass::Title, r"[A-Za-z_]\w*").name("title").into()])
        .into()
}

pub fn nest_grammar(fragments: &Fragments) -> GrammarDef {
    let line_comment = fragments
        .comment("--", "$")
        .name("line_comment")
        .contains([fragments.line_continuation.clone()]);
    let block_comment = fragments.comment("-/", "/-").name("block_comment");

    GrammarDef::new("Nest")
        .keywords(keywords())
        .contains([
            function_definition(),
            line_comment.into(),
            TokenRule::new(TokenClass::Keyword, r"\|>").name("match").into(),
            function_call(),
            TokenRule::new(TokenClass::BuiltIn, r"\|#\|").name("import").into(),
            block_comment.into(),
        ])
        .contains(strings())
        .contains([number()])
}
