#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! A backtracking recursive descent parser driven by [`rdgrammar`] grammars.
//!
//! Grammars are normally loaded from text in the grammar definition language, which is itself
//! parsed by a hand-built bootstrap grammar (see [`bootstrap_grammar`]):
//!
//! ```text
//! language Calc [usedefaulttokens, startsymbol: expr]
//! token number = /\d+/;
//! operator mul = '*' number;
//! operator add [right] = '+' mul;
//! choice expr = add;
//! ```
//!
//! A loaded grammar is registered in an explicit [`Registry`] under its name, which makes it
//! available to other grammars' `import` rules, and can then be used to parse input into an
//! AST of [`Node`]s:
//!
//! ```rust,ignore
//! let mut reg = Registry::new();
//! let calc = load_grammar(&mut reg, CALC_SRC)?;
//! let ast = parse(&reg, &calc, "1 + 2 * 3", None)?;
//! assert_eq!(ast.to_string(), "(add '+' '1' (mul '*' '2' '3'))");
//! ```
//!
//! Parsing is ordered-choice recursive descent with unlimited backtracking. Terminals are
//! regular expressions anchored at the current position; whitespace tokens are skipped
//! automatically. When a parse fails, the error reports the furthest position any terminal was
//! tried at, and the terminals expected there.

use std::{error::Error, fmt, sync::Arc};

use rdgrammar::{DefinitionError, Grammar, NotFoundError, Registry};

mod ast;
mod bootstrap;
mod builder;
mod diagnostics;
mod matchtree;
mod memo;
mod parser;

pub use crate::{
    ast::{Node, NodeKind, Token},
    bootstrap::{GRAMMAR_DEFINITION_NAME, GRAMMAR_DEFINITION_SOURCE, bootstrap_grammar},
    builder::grammar_from_ast,
    diagnostics::{ParseError, ParseErrorKind},
    memo::MemoPolicy,
    parser::{ParserBuilder, ParserOptions},
};

/// A grammar `import` could not be resolved while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportResolutionError {
    /// The grammar that was asked for.
    pub grammar: String,
    /// If the grammar was found but lacked the imported rule, that rule's name.
    pub rule: Option<String>,
}

impl Error for ImportResolutionError {}

impl fmt::Display for ImportResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.rule {
            Some(ref r) => write!(
                f,
                "Grammar import '{}.{}' could not be resolved: grammar '{}' has no rule '{}'",
                self.grammar, r, self.grammar, r
            ),
            None => write!(
                f,
                "Grammar import '{}' could not be resolved: no such grammar is registered",
                self.grammar
            ),
        }
    }
}

/// Anything that can go wrong while parsing input.
#[derive(Debug)]
pub enum EngineError {
    /// The grammar (or the requested start rule) is not usable.
    Definition(DefinitionError),
    /// The input does not match the grammar, or the parse exceeded its depth limit.
    Parse(ParseError),
    /// An `import` rule names a grammar or rule that does not exist.
    ImportResolution(ImportResolutionError),
}

impl Error for EngineError {}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EngineError::Definition(ref e) => write!(f, "{}", e),
            EngineError::Parse(ref e) => write!(f, "{}", e),
            EngineError::ImportResolution(ref e) => write!(f, "{}", e),
        }
    }
}

impl From<DefinitionError> for EngineError {
    fn from(err: DefinitionError) -> EngineError {
        EngineError::Definition(err)
    }
}

impl From<ParseError> for EngineError {
    fn from(err: ParseError) -> EngineError {
        EngineError::Parse(err)
    }
}

impl From<ImportResolutionError> for EngineError {
    fn from(err: ImportResolutionError) -> EngineError {
        EngineError::ImportResolution(err)
    }
}

/// Parse `src`, a grammar in the grammar definition language, build the grammar it describes,
/// and register it in `registry` under its declared name.
///
/// The grammar definition language is itself looked up in `registry` under
/// [`GRAMMAR_DEFINITION_NAME`], and the bootstrap grammar registered there if it is absent.
/// Registering a grammar of that name from text therefore changes how later grammars are read.
///
/// If `src` is not valid grammar text, the [`ParseError`] (with its position in `src` and the
/// expected terminals) is returned as [`EngineError::Parse`]; a grammar that parses but is not
/// well formed gives [`EngineError::Definition`].
pub fn load_grammar(registry: &mut Registry, src: &str) -> Result<Arc<Grammar>, EngineError> {
    let defn = match registry.get(GRAMMAR_DEFINITION_NAME) {
        Ok(g) => g,
        Err(_) => {
            log::debug!("Registering the bootstrap grammar definition language");
            registry.register(bootstrap_grammar()?)?
        }
    };
    let ast = ParserBuilder::new(registry, &defn).parse(src)?;
    let grm = grammar_from_ast(&ast)?;
    Ok(registry.register(grm)?)
}

/// Look up a previously registered grammar by name.
pub fn get_grammar(registry: &Registry, name: &str) -> Result<Arc<Grammar>, NotFoundError> {
    registry.get(name)
}

/// Parse `input` with `grm`, starting from `start` (or, if `None`, the grammar's own start
/// rule), using the default [`ParserOptions`].
pub fn parse(
    registry: &Registry,
    grm: &Arc<Grammar>,
    input: &str,
    start: Option<&str>,
) -> Result<Node, EngineError> {
    let mut pb = ParserBuilder::new(registry, grm);
    if let Some(s) = start {
        pb = pb.start_rule(s);
    }
    pb.parse(input)
}
