use std::{mem, sync::Arc};

use cactus::Cactus;
use rdgrammar::{
    DefinitionError, DefinitionErrorKind, Grammar, ImportMatcher, ListMatcher, MatcherKind,
    NewlineCache, OperatorMatcher, Registry, SequenceItem, SetMatcher, Span, TokenMatcher,
};
use vob::Vob;

use crate::{
    EngineError, ImportResolutionError, Node,
    ast::{AstBuilder, Token},
    diagnostics::{BestFailure, Frame, ParseError, ParseErrorKind},
    matchtree::{MIdx, MatchTree, Producer},
    memo::{Memo, MemoPolicy},
};

/// The grammar a parse was started with is always the first entry in the parser's grammar table.
const MAIN_GRAMMAR: usize = 0;

/// Parse-time configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserOptions {
    pub memo_policy: MemoPolicy,
    /// If set, overrides the grammar's own maximum rule nesting depth.
    pub max_depth: Option<usize>,
    /// Record the rule stack in parse errors, and log each rule attempt at `trace` level.
    pub verbose: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            memo_policy: MemoPolicy::Terminals,
            max_depth: None,
            verbose: false,
        }
    }
}

impl ParserOptions {
    pub fn with_memo_policy(mut self, memo_policy: MemoPolicy) -> Self {
        self.memo_policy = memo_policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// The state of a single parse. Everything here is discarded when the parse finishes.
pub(crate) struct Parser<'a> {
    registry: &'a Registry,
    input: &'a str,
    nlc: NewlineCache,
    verbose: bool,
    max_depth: Option<usize>,
    /// The grammars this parse has used so far: the main grammar first, then any imported
    /// grammars in the order they were first needed.
    grammars: Vec<Arc<Grammar>>,
    tree: MatchTree,
    memo: Memo,
    stack: Cactus<Frame>,
    depth: usize,
    best: BestFailure,
}

impl<'a> Parser<'a> {
    fn new(
        registry: &'a Registry,
        grm: &Arc<Grammar>,
        input: &'a str,
        opts: &ParserOptions,
    ) -> Self {
        Parser {
            registry,
            input,
            nlc: NewlineCache::new(input),
            verbose: opts.verbose,
            max_depth: opts.max_depth.or(grm.max_depth()),
            grammars: vec![Arc::clone(grm)],
            tree: MatchTree::new(),
            memo: Memo::new(opts.memo_policy),
            stack: Cactus::new(),
            depth: 0,
            best: BestFailure::new(),
        }
    }

    /// Match the whole input against `start` (or the main grammar's start rule).
    fn parse(&mut self, start: Option<&str>) -> Result<(), EngineError> {
        let grm = Arc::clone(&self.grammars[MAIN_GRAMMAR]);
        let start = match start.or(grm.start_rule()) {
            Some(s) => s,
            None => return Err(DefinitionError::new(DefinitionErrorKind::NoStartRule).into()),
        };
        let root = self.tree.root();
        self.consume_whitespace(MAIN_GRAMMAR, root)?;
        if !self.consume(MAIN_GRAMMAR, root, start)? {
            let pos = self.best.pos().unwrap_or(self.tree.pos());
            return Err(self.failure_at(pos).into());
        }
        let pos = self.tree.pos();
        if pos < self.input.len() {
            // If some token got further than the successful match, that is where the real
            // problem lies.
            return match self.best.pos() {
                Some(best) if best > pos => Err(self.failure_at(best).into()),
                _ => Err(self.error(ParseErrorKind::TrailingInput, pos).into()),
            };
        }
        log::debug!(
            "Parsed {} bytes with grammar '{}' ({} memoised token outcomes)",
            self.input.len(),
            grm.name(),
            self.memo.len()
        );
        Ok(())
    }

    fn failure_at(&self, pos: usize) -> ParseError {
        let kind = match self.input.get(pos..).and_then(|s| s.chars().next()) {
            Some(c) => ParseErrorKind::UnexpectedInput(c),
            None => ParseErrorKind::UnexpectedEof,
        };
        self.error(kind, pos)
    }

    fn error(&self, kind: ParseErrorKind, pos: usize) -> ParseError {
        let stack = if self.verbose {
            Some(self.best.stack())
        } else {
            None
        };
        ParseError::new(
            kind,
            self.input,
            &self.nlc,
            pos,
            self.best.expected_at(pos),
            stack,
        )
    }

    /// Try to match the rule `rule` of grammar `grm` at the current position, as a new child of
    /// `parent`. Returns `Ok(false)` if the rule does not match, in which case the match tree is
    /// left as it was; errors are reserved for problems that must abort the whole parse.
    fn consume(&mut self, grm: usize, parent: MIdx, rule: &str) -> Result<bool, EngineError> {
        let outer = self.stack.clone();
        self.stack = self.stack.child(Frame {
            rule: rule.to_owned(),
            alt: 0,
        });
        self.depth += 1;
        let r = self.consume_rule(grm, parent, rule);
        self.stack = outer;
        self.depth -= 1;
        r
    }

    fn consume_rule(&mut self, grm: usize, parent: MIdx, rule: &str) -> Result<bool, EngineError> {
        let pos = self.tree.pos();
        if let Some(max) = self.max_depth {
            if self.depth > max {
                return Err(self.error(ParseErrorKind::DepthExceeded(max), pos).into());
            }
        }
        let g = Arc::clone(&self.grammars[grm]);
        let ridx = g
            .rule_idx(rule)
            .ok_or_else(|| DefinitionError::for_rule(DefinitionErrorKind::UnknownRule, rule))?;
        let matcher = g.rule(ridx);
        let prod = Producer { grm, ridx };
        if matcher.is_token() {
            self.best.record(pos, rule, &self.stack);
        }
        if self.verbose {
            self.trace(pos, rule, "?");
        }

        let m = self.tree.open(parent, prod, false);
        let matched = match *matcher.kind() {
            MatcherKind::Token(ref t) => self.match_token(m, prod, rule, t),
            MatcherKind::Sequence(ref items) => self.match_sequence(grm, m, items)?,
            MatcherKind::Choice(ref alts) => self.match_choice(grm, m, alts)?,
            MatcherKind::List(ref l) => self.match_list(grm, m, rule, l)?,
            MatcherKind::Set(ref s) => self.match_set(grm, m, s)?,
            MatcherKind::Operator(ref o) => self.match_operator(grm, m, prod, o)?,
            MatcherKind::Import(ref i) => self.match_import(m, i)?,
        };
        if self.verbose {
            self.trace(pos, rule, if matched { "V" } else { "X" });
        }
        if !matched {
            self.tree.discard(m);
            return Ok(false);
        }
        self.tree.close(m);
        self.consume_whitespace(grm, parent)?;
        Ok(true)
    }

    fn trace(&self, pos: usize, rule: &str, outcome: &str) {
        let (line, col) = self
            .nlc
            .byte_to_line_and_col(self.input, pos)
            .unwrap_or((0, 0));
        log::trace!(
            "[{}:{}] {}{} {}",
            line,
            col,
            " ".repeat(self.depth),
            rule,
            outcome
        );
    }

    /// Record which item of the current rule is being tried, for diagnostics.
    fn set_alt(&mut self, alt: usize) {
        let Some(rule) = self.stack.val().map(|f| f.rule.clone()) else {
            return;
        };
        if let Some(parent) = self.stack.parent() {
            self.stack = parent.child(Frame { rule, alt });
        }
    }

    /// Skip all whitespace tokens of grammar `grm` at the current position, adding them as
    /// children of `parent`.
    fn consume_whitespace(&mut self, grm: usize, parent: MIdx) -> Result<(), EngineError> {
        let g = Arc::clone(&self.grammars[grm]);
        if g.auto_whitespace_disabled() {
            return Ok(());
        }
        loop {
            let mut progressed = false;
            for &ridx in g.whitespace_rules() {
                let matcher = g.rule(ridx);
                let Some(t) = matcher.as_token() else {
                    continue;
                };
                let pos = self.tree.pos();
                // A whitespace token which matches the empty string would never let this loop
                // finish.
                if let Some(tok) = self
                    .scan(pos, matcher.name(), t)
                    .filter(|tok| !tok.text().is_empty())
                {
                    let m = self.tree.open(parent, Producer { grm, ridx }, true);
                    self.tree.set_token(m, tok);
                    self.tree.close(m);
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    /// Try matching the token `t` at `pos`, without altering the match tree.
    fn scan(&self, pos: usize, name: &str, t: &TokenMatcher) -> Option<Token> {
        let rest = self.input.get(pos..)?;
        let len = t.find(rest)?;
        let line_col = self
            .nlc
            .byte_to_line_and_col(self.input, pos)
            .unwrap_or((0, 0));
        Some(Token::new(
            &rest[..len],
            Span::new(pos, pos + len),
            line_col,
            name,
            t.is_whitespace(),
        ))
    }

    fn match_token(&mut self, m: MIdx, prod: Producer, name: &str, t: &TokenMatcher) -> bool {
        let pos = self.tree.pos();
        let outcome = match self.memo.get(pos, prod) {
            Some(cached) => cached.clone(),
            None => {
                let outcome = self.scan(pos, name, t);
                self.memo.store(pos, prod, outcome.clone());
                outcome
            }
        };
        match outcome {
            Some(tok) => {
                self.tree.set_token(m, tok);
                true
            }
            None => false,
        }
    }

    fn match_sequence(
        &mut self,
        grm: usize,
        m: MIdx,
        items: &[SequenceItem],
    ) -> Result<bool, EngineError> {
        for (i, item) in items.iter().enumerate() {
            self.set_alt(i);
            if self.consume(grm, m, &item.rule)? {
                continue;
            }
            if item.required {
                return Ok(false);
            }
            self.tree.add_lambda(m, &item.rule);
        }
        Ok(true)
    }

    fn match_choice(&mut self, grm: usize, m: MIdx, alts: &[String]) -> Result<bool, EngineError> {
        for (i, alt) in alts.iter().enumerate() {
            self.set_alt(i);
            if self.consume(grm, m, alt)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn match_list(
        &mut self,
        grm: usize,
        m: MIdx,
        name: &str,
        l: &ListMatcher,
    ) -> Result<bool, EngineError> {
        if let Some(ref pre) = l.pre {
            if !self.consume(grm, m, pre)? {
                return Ok(false);
            }
        }
        if let Some(ref post) = l.post {
            if self.consume(grm, m, post)? {
                return Ok(l.nullable);
            }
        }
        if !self.consume(grm, m, &l.item)? {
            return Ok(l.nullable && self.consume_opt(grm, m, l.post.as_deref())?);
        }
        let mut last_pos: Option<usize> = None;
        let mut i = 0;
        loop {
            if let Some(ref sep) = l.separator {
                if !self.consume(grm, m, sep)? {
                    break;
                }
            }
            let pos = self.tree.pos();
            if last_pos.is_some_and(|lp| pos <= lp) {
                return Err(DefinitionError::for_rule(
                    DefinitionErrorKind::EmptyRepetition {
                        item: l.item.clone(),
                    },
                    name,
                )
                .into());
            }
            last_pos = Some(pos);
            i += 1;
            self.set_alt(i);
            if let Some(ref post) = l.post {
                if self.consume(grm, m, post)? {
                    // Directly after a separator, the list has a dangling separator.
                    return Ok(l.separator.is_none() || l.allow_trailing);
                }
            }
            if !self.consume(grm, m, &l.item)? {
                if l.separator.is_some() && !l.allow_trailing {
                    return Ok(false);
                }
                return Ok(l.post.is_none());
            }
        }
        self.consume_opt(grm, m, l.post.as_deref())
    }

    /// Consume `rule` if there is one; succeed trivially if not.
    fn consume_opt(
        &mut self,
        grm: usize,
        m: MIdx,
        rule: Option<&str>,
    ) -> Result<bool, EngineError> {
        match rule {
            Some(r) => self.consume(grm, m, r),
            None => Ok(true),
        }
    }

    fn match_set(&mut self, grm: usize, m: MIdx, s: &SetMatcher) -> Result<bool, EngineError> {
        if !self.consume_opt(grm, m, s.pre.as_deref())? {
            return Ok(false);
        }
        let mut available = Vob::from_elem(true, s.items.len());
        let mut dangling_sep = false;
        'scan: loop {
            let mut matched = false;
            for i in available.iter_set_bits(..).collect::<Vec<_>>() {
                self.set_alt(i);
                if !self.consume(grm, m, &s.items[i])? {
                    continue;
                }
                available.set(i, false);
                matched = true;
                if let Some(ref sep) = s.separator {
                    dangling_sep = self.consume(grm, m, sep)?;
                    if !dangling_sep {
                        break 'scan;
                    }
                }
                // Restart from the first remaining alternative.
                break;
            }
            if !matched || available.iter_set_bits(..).next().is_none() {
                break;
            }
        }
        if dangling_sep {
            return Ok(false);
        }
        self.consume_opt(grm, m, s.post.as_deref())
    }

    fn match_operator(
        &mut self,
        grm: usize,
        m: MIdx,
        prod: Producer,
        o: &OperatorMatcher,
    ) -> Result<bool, EngineError> {
        if self.is_repeating(m, prod) {
            return Ok(false);
        }
        if !self.consume(grm, m, &o.operand)? {
            return Ok(false);
        }
        let mut i = 0;
        while self.consume(grm, m, &o.operator)? {
            i += 1;
            self.set_alt(i);
            if !self.consume(grm, m, &o.operand)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Is the operator rule `prod`, whose new match is `m`, already being matched further up the
    /// tree without any input having been consumed by something other than an operator or a
    /// choice in between? If so, trying it again here would recurse forever.
    fn is_repeating(&self, m: MIdx, prod: Producer) -> bool {
        let mut cur = self.tree.node(m).parent;
        while let Some(a) = cur {
            let an = self.tree.node(a);
            let Some(aprod) = an.producer else {
                break;
            };
            match self.grammars[aprod.grm].rule(aprod.ridx).kind() {
                MatcherKind::Operator(_) | MatcherKind::Choice(_) => (),
                _ if self.tree.consumed(a) > 0 => return false,
                _ => (),
            }
            if aprod == prod {
                return true;
            }
            cur = an.parent;
        }
        false
    }

    fn match_import(&mut self, m: MIdx, i: &ImportMatcher) -> Result<bool, EngineError> {
        let fgrm = self.resolve_grammar(&i.grammar)?;
        if !self.grammars[fgrm].has_rule(&i.rule) {
            return Err(ImportResolutionError {
                grammar: i.grammar.clone(),
                rule: Some(i.rule.clone()),
            }
            .into());
        }
        // The imported rule keeps its own record of how far it got, which replaces ours only if
        // it got further.
        let inner = BestFailure::starting_at(self.best.pos());
        let outer = mem::replace(&mut self.best, inner);
        let r = self
            .consume_whitespace(fgrm, m)
            .and_then(|_| self.consume(fgrm, m, &i.rule));
        let inner = mem::replace(&mut self.best, outer);
        self.best.merge(inner);
        r
    }

    /// Return the index in the grammar table of the grammar called `name`, loading it from the
    /// registry if this parse has not needed it before.
    fn resolve_grammar(&mut self, name: &str) -> Result<usize, ImportResolutionError> {
        if let Some(i) = self.grammars.iter().position(|g| g.name() == name) {
            return Ok(i);
        }
        let g = self.registry.get(name).map_err(|_| ImportResolutionError {
            grammar: name.to_owned(),
            rule: None,
        })?;
        self.grammars.push(g);
        Ok(self.grammars.len() - 1)
    }
}

/// Configures and runs parses with a given grammar.
pub struct ParserBuilder<'a> {
    registry: &'a Registry,
    grm: Arc<Grammar>,
    opts: ParserOptions,
    start: Option<String>,
}

impl<'a> ParserBuilder<'a> {
    /// Create a builder for parsing with `grm`. Any grammars `grm` imports are looked up in
    /// `registry` when first needed.
    pub fn new(registry: &'a Registry, grm: &Arc<Grammar>) -> Self {
        ParserBuilder {
            registry,
            grm: Arc::clone(grm),
            opts: ParserOptions::default(),
            start: None,
        }
    }

    pub fn options(mut self, opts: ParserOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Start parsing from the rule `name` instead of the grammar's start rule.
    pub fn start_rule(mut self, name: &str) -> Self {
        self.start = Some(name.to_owned());
        self
    }

    /// Parse `input`, returning its AST.
    pub fn parse(&self, input: &str) -> Result<Node, EngineError> {
        let mut p = Parser::new(self.registry, &self.grm, input, &self.opts);
        p.parse(self.start.as_deref())?;
        AstBuilder::new(&p.tree, &p.grammars, input)
            .build()
            .ok_or_else(|| DefinitionError::new(DefinitionErrorKind::NoStartRule).into())
    }

    /// Parse `input`, returning a rendering of the raw match tree rather than an AST. Useful when
    /// debugging grammars.
    pub fn parse_match_string(&self, input: &str) -> Result<String, EngineError> {
        let mut p = Parser::new(self.registry, &self.grm, input, &self.opts);
        p.parse(self.start.as_deref())?;
        Ok(p.tree.match_string(p.tree.root(), &p.grammars))
    }
}
