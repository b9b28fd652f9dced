//! C grammar with Nest C-API names
//!
//! A C/C++ grammar that also recognises the `Nst_` prefixed functions
//! and types of the Nest runtime as built-ins.

use super::fragments::Fragments;
use crate::syntax::definition::GrammarDef;
use crate::syntax::rules::{KeywordRule, KeywordSets, RegionRule, Rule, TokenRule};
use crate::syntax::tokens::TokenClass;

const KEYWORDS: &str = "i8 u8 i16 u16 i32 u32 i64 u64 f32 f64 usize isize int float while private char \
    char8_t char16_t char32_t catch import module export virtual operator sizeof dynamic_cast|10 typedef \
    const_cast|10 const for static_cast|10 union namespace unsigned long volatile static protected bool \
    template mutable if public friend do goto auto void enum else break extern using asm case typeid \
    wchar_t short reinterpret_cast|10 default double register explicit signed typename try this switch \
    continue inline delete alignas alignof constexpr consteval constinit decltype concept co_await \
    co_return co_yield requires noexcept static_assert thread_local restrict final override atomic_bool \
    atomic_char atomic_schar atomic_uchar atomic_short atomic_ushort atomic_int atomic_uint atomic_long \
    atomic_ulong atomic_llong atomic_ullong new throw return and and_eq bitand bitor compl not not_eq \
    or or_eq xor xor_eq";

const BUILT_INS: &str = "std string wstring cin cout cerr clog stdin stdout stderr stringstream \
    istringstream ostringstream auto_ptr deque list queue stack vector map set pair bitset multiset \
    multimap unordered_set unordered_map unordered_multiset unordered_multimap priority_queue make_pair \
    array shared_ptr abort terminate abs acos asin atan2 atan calloc ceil cosh cos exit exp fabs floor \
    fmod fprintf fputs free frexp fscanf future isalnum isalpha iscntrl isdigit isgraph islower isprint \
    ispunct isspace isupper isxdigit tolower toupper labs ldexp log10 log malloc realloc memchr memcmp \
    memcpy memset modf pow printf putchar puts scanf sinh sin snprintf sprintf sqrt sscanf strcat strchr \
    strcmp strcpy strcspn strlen strncat strncmp strncpy strpbrk strrchr strspn strstr tanh tan vfprintf \
    vprintf vsprintf endl initializer_list unique_ptr _Bool complex _Complex imaginary _Imaginary";

const PREPROCESSOR_KEYWORDS: &str =
    "if else elif endif define undef warning error line pragma _Pragma ifdef ifndef include";

/// Optional `Namespace::` qualifier
const NAMESPACE: &str = r"(?:[a-zA-Z_]\w*::)?";

fn keywords() -> KeywordSets {
    KeywordSets::default()
        .category(TokenClass::Keyword, KEYWORDS)
        .category(TokenClass::BuiltIn, BUILT_INS)
        .category(TokenClass::Literal, "true false nullptr NULL")
}

/// Rules used in several places of the grammar
struct Parts {
    nest_names: Rule,
    type_suffix: Rule,
    line_comment: Rule,
    block_comment: Rule,
    numbers: Vec<Rule>,
    strings: Vec<Rule>,
    preprocessor: Rule,
}

impl Parts {
    fn new(fragments: &Fragments) -> Self {
        let line_comment = fragments.c_line_comment();
        let block_comment = fragments.c_block_comment();

        let preprocessor = RegionRule::new(r"#\s*[a-z]+\b", "$")
            .name("preprocessor")
            .class(TokenClass::Meta)
            .keywords(KeywordSets::default().category(TokenClass::MetaKeyword, PREPROCESSOR_KEYWORDS))
            .contains([fragments.line_continuation.clone()])
            .contains(strings(fragments, TokenClass::MetaString))
            .contains([
                TokenRule::new(TokenClass::MetaString, "<.*?>").name("include_path").into(),
                line_comment.clone(),
                block_comment.clone(),
            ]);

        Self {
            nest_names: TokenRule::new(TokenClass::BuiltIn, r"_?(?:Nst|nst|NST)_\w+")
                .name("nest_names")
                .relevance(0)
                .into(),
            type_suffix: TokenRule::new(TokenClass::Keyword, r"\b[a-z\d_]*_t\b")
                .name("type_suffix")
                .into(),
            line_comment,
            block_comment,
            numbers: numbers(),
            strings: strings(fragments, TokenClass::String),
            preprocessor: preprocessor.into(),
        }
    }

    /// Preprocessor lines, `_t` types, comments, numbers and strings
    fn common(&self) -> Vec<Rule> {
        let mut rules = vec![
            self.preprocessor.clone(),
            self.type_suffix.clone(),
            self.line_comment.clone(),
            self.block_comment.clone(),
        ];
        rules.extend(self.numbers.iter().cloned());
        rules.extend(self.strings.iter().cloned());
        rules
    }
}

fn strings(fragments: &Fragments, class: TokenClass) -> Vec<Rule> {
    vec![
        RegionRule::new(r#"(?:u8?|U|L)?""#, "\"")
            .name("string")
            .class(class.clone())
            .illegal(r"\n")
            .contains([fragments.backslash_escape.clone()])
            .into(),
        RegionRule::new(
            r"(?:u8?|U|L)?'(?:\\(?:x[0-9A-Fa-f]{2}|u[0-9A-Fa-f]{4,8}|[0-7]{3}|\S)|.)",
            "'",
        )
        .name("char")
        .class(class.clone())
        .illegal(".")
        .into(),
        RegionRule::new(r#"(?:u8?|U|L)?R"([^()\\ ]{0,16})\("#, r#"\)([^()\\ ]{0,16})""#)
            .name("raw_string")
            .class(class)
            .end_same_as_begin()
            .into(),
    ]
}

fn numbers() -> Vec<Rule> {
    [
        r"\b0b[01']+",
        r"-?\b(?:[\d']+(?:\.[\d']*)?|\.[\d']+)(?:(?:ll|LL|l|L)(?:u|U)?|(?:u|U)(?:ll|LL|l|L)?|f|F|b|B)",
        r"-?(?:\b0[xX][a-fA-F0-9']+|(?:\b[\d']+(?:\.[\d']*)?|\.[\d']+)(?:[eE][-+]?[\d']+)?)",
    ]
    .into_iter()
    .map(|begin| TokenRule::new(TokenClass::Number, begin).name("number").relevance(0).into())
    .collect()
}

/// Parenthesised group that may nest itself
fn nested_parens(parts: &Parts) -> Rule {
    RegionRule::new(r"\(", r"\)")
        .name("parens")
        .keywords(keywords())
        .relevance(0)
        .contains([parts.nest_names.clone(), Rule::Recurse])
        .contains([parts.line_comment.clone(), parts.block_comment.clone()])
        .contains(parts.strings.iter().cloned())
        .contains(parts.numbers.iter().cloned())
        .contains([parts.type_suffix.clone()])
        .into()
}

/// Assignments, calls and statements started by `new`, `throw`, `return` or `else`
fn expressions(parts: &Parts) -> Vec<Rule> {
    let inner_parens = RegionRule::new(r"\(", r"\)")
        .name("parens")
        .keywords(keywords())
        .relevance(0)
        .contains(parts.common())
        .contains([Rule::Recurse]);
    let body = |region: RegionRule| -> Rule {
        region
            .keywords(keywords())
            .relevance(0)
            .contains(parts.common())
            .contains([parts.nest_names.clone(), inner_parens.clone().into()])
            .into()
    };
    vec![
        body(RegionRule::new("=", ";").name("assignment")),
        body(RegionRule::new(r"\(", r"\)").name("call")),
        body(RegionRule::new(r"\b(?:new|throw|return|else)\b", ";").name("statement")),
    ]
}

fn function(parts: &Parts) -> Rule {
    let type_name = format!(r"(?:decltype\(auto\)|{NAMESPACE}[a-zA-Z_]\w*(?:<[^<>]+>)?)");
    let declarator = format!(r"{NAMESPACE}[a-zA-Z_]\w*\s*\(");

    let title = RegionRule::new(&declarator, r"\(")
        .name("declarator")
        .return_begin()
        .return_end()
        .relevance(0)
        .contains([TokenRule::new(TokenClass::Title, &format!(r"{NAMESPACE}[a-zA-Z_]\w*"))
            .name("title")
            .relevance(0)
            .into()]);

    let params = RegionRule::new(r"\(", r"\)")
        .name("params")
        .class(TokenClass::Params)
        .keywords(keywords())
        .relevance(0)
        .contains([
            parts.nest_names.clone(),
            parts.line_comment.clone(),
            parts.block_comment.clone(),
        ])
        .contains(parts.strings.iter().cloned())
        .contains(parts.numbers.iter().cloned())
        .contains([parts.type_suffix.clone(), nested_parens(parts)]);

    RegionRule::new(&format!(r"(?:{type_name}[\*&\s]+)+{declarator}"), "[{;=]")
        .name("function")
        .class(TokenClass::Function)
        .return_begin()
        .exclude_end()
        .keywords(keywords())
        .illegal(r"[^\w\s\*&:<>.]")
        .contains([
            parts.nest_names.clone(),
            TokenRule::new(TokenClass::Keyword, r"decltype\(auto\)")
                .name("decltype")
                .relevance(0)
                .into(),
            title.into(),
            params.into(),
            parts.type_suffix.clone(),
            parts.line_comment.clone(),
            parts.block_comment.clone(),
            parts.preprocessor.clone(),
        ])
        .into()
}

fn declarations(parts: &Parts) -> Vec<Rule> {
    let container = RegionRule::new(
        r"\b(?:deque|list|queue|priority_queue|pair|stack|vector|map|set|bitset|multiset|multimap|unordered_map|unordered_set|unordered_multiset|unordered_multimap|array)\s*<",
        ">",
    )
    .name("container")
    .keywords(keywords())
    .contains([parts.nest_names.clone(), Rule::Recurse, parts.type_suffix.clone()]);

    // Closes right after the qualifier so only its name is looked up
    let qualifier = RegionRule::new(r"\b[a-zA-Z_]\w*::", r"\B|\b")
        .name("qualifier")
        .keywords(keywords())
        .contains([parts.nest_names.clone()]);

    let class = RegionRule::new(r"\b(?:enum|class|struct|union)\b", "[{;:<>=]")
        .name("class")
        .class(TokenClass::Class)
        .keywords(KeywordSets::default().category(TokenClass::Keyword, "enum class struct union"))
        .contains([
            KeywordRule::new(TokenClass::Keyword, "final class struct").name("specifier").into(),
            TokenRule::new(TokenClass::Title, r"[A-Za-z_]\w*").name("title").relevance(0).into(),
        ]);

    vec![
        container.into(),
        qualifier.into(),
        class.into(),
    ]
}

pub fn better_c_grammar(fragments: &Fragments) -> GrammarDef {
    let parts = Parts::new(fragments);

    GrammarDef::new("C")
        .alias("h")
        .keywords(keywords())
        .illegal("</")
        .contains([parts.nest_names.clone()])
        .contains(expressions(&parts))
        .contains([function(&parts)])
        .contains(parts.common())
        .contains(declarations(&parts))
}
