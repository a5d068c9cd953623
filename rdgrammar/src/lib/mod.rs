#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]
#![forbid(unsafe_code)]

//! The grammar model of a self-hosting, backtracking recursive descent parser generator.
//!
//! A [`Grammar`](grammar/struct.Grammar.html) is a named, insertion-ordered collection of
//! *rules*, each of which is a [`Matcher`](matcher/struct.Matcher.html): a tagged variant
//! describing how one rule matches input. Rules refer to each other by name. The available
//! matcher kinds are:
//!
//!   * *token*: a regular expression anchored at the current input position;
//!   * *sequence*: an ordered list of (possibly optional, possibly labelled) items;
//!   * *choice*: ordered alternatives, the first to succeed wins;
//!   * *list*: `pre? item (separator item)* post?`;
//!   * *set*: alternatives that may each match at most once, in any order;
//!   * *operator*: a binary operator chain with declared associativity;
//!   * *import*: a rule of another, separately registered, grammar.
//!
//! Grammars become visible to `import` rules only once they are explicitly added to a
//! [`Registry`](registry/struct.Registry.html), which validates them first. After
//! registration a grammar is shared immutably.
//!
//! This crate only models grammars: matching input against them is the job of the `rdpar`
//! crate.

use std::{error::Error, fmt};

mod builtins;
pub mod grammar;
pub mod matcher;
pub mod newlinecache;
pub mod registry;
pub mod span;
pub mod value;

pub use crate::{
    builtins::BuiltinToken,
    grammar::{Grammar, RIdx},
    matcher::{
        Assoc, ImportMatcher, ListMatcher, Matcher, MatcherKind, OperatorMatcher, RuleOptions,
        SequenceItem, SetMatcher, TokenMatcher,
    },
    newlinecache::NewlineCache,
    registry::Registry,
    span::Span,
    value::Value,
};

/// The various different possible errors found when constructing a grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefinitionErrorKind {
    /// A rule of this name is already part of the grammar.
    DuplicateRule,
    /// No rule of this name exists.
    UnknownRule,
    /// A rule refers to another rule which does not exist.
    UnknownRuleRef { referenced: String },
    /// A token's regular expression does not compile.
    InvalidRegex(String),
    /// A literal clashes with a token which is not a keyword.
    KeywordConflict,
    /// An option name not understood in its context.
    UnknownOption(String),
    /// An option was given a value of the wrong type.
    InvalidOptionValue(String),
    /// A list must have between 1 and 4 positional parts.
    ListArity(usize),
    /// A set separator clause must have 1 or 3 positional parts.
    SetArity(usize),
    /// The grammar names no start rule and none was supplied.
    NoStartRule,
    /// The start rule names a rule that does not exist.
    InvalidStartRule(String),
    /// A list repetition consumed no input, so it would never terminate.
    EmptyRepetition { item: String },
    /// Grammar source text could not be parsed.
    MalformedSource(String),
    /// A definition node in grammar source was not recognised.
    UnknownDefinition(String),
}

/// Any error from constructing a grammar, whether by hand or from grammar source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinitionError {
    pub kind: DefinitionErrorKind,
    /// The name of the rule the error relates to, if there is one.
    pub rule: Option<String>,
}

impl DefinitionError {
    pub fn new(kind: DefinitionErrorKind) -> Self {
        DefinitionError { kind, rule: None }
    }

    pub fn for_rule(kind: DefinitionErrorKind, rule: &str) -> Self {
        DefinitionError {
            kind,
            rule: Some(rule.to_owned()),
        }
    }
}

impl Error for DefinitionError {}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            DefinitionErrorKind::DuplicateRule => "Rule already exists".to_owned(),
            DefinitionErrorKind::UnknownRule => "Unknown rule".to_owned(),
            DefinitionErrorKind::UnknownRuleRef { ref referenced } => {
                format!("Reference to unknown rule '{}'", referenced)
            }
            DefinitionErrorKind::InvalidRegex(ref msg) => {
                format!("Invalid regular expression: {}", msg)
            }
            DefinitionErrorKind::KeywordConflict => {
                "Literal is already defined by a non-keyword token".to_owned()
            }
            DefinitionErrorKind::UnknownOption(ref o) => format!("Unknown option '{}'", o),
            DefinitionErrorKind::InvalidOptionValue(ref o) => {
                format!("Invalid value for option '{}'", o)
            }
            DefinitionErrorKind::ListArity(n) => format!(
                "A list must have between 1 and 4 parts, but {} were given",
                n
            ),
            DefinitionErrorKind::SetArity(n) => format!(
                "A set separator must have 1 or 3 parts, but {} were given",
                n
            ),
            DefinitionErrorKind::NoStartRule => "Grammar has no start rule".to_owned(),
            DefinitionErrorKind::InvalidStartRule(ref n) => {
                format!("Start rule '{}' does not exist", n)
            }
            DefinitionErrorKind::EmptyRepetition { ref item } => format!(
                "List never ends: item '{}' can match an empty string",
                item
            ),
            DefinitionErrorKind::MalformedSource(ref msg) => {
                format!("Malformed grammar source: {}", msg)
            }
            DefinitionErrorKind::UnknownDefinition(ref n) => {
                format!("Unknown definition kind '{}'", n)
            }
        };
        match self.rule {
            Some(ref r) => write!(f, "{} (rule '{}')", s, r),
            None => write!(f, "{}", s),
        }
    }
}

/// Looking up a grammar by name in a [`Registry`] failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotFoundError {
    pub name: String,
}

impl Error for NotFoundError {}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "No grammar named '{}' is registered", self.name)
    }
}
