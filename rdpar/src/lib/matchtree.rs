use std::sync::Arc;

use rdgrammar::{Grammar, RIdx};

use crate::ast::Token;

/// An index into a [`MatchTree`].
pub(crate) type MIdx = usize;

/// Identifies the rule that produced a match: a grammar (as an index into the parser's table of
/// grammars) and a rule within it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Producer {
    pub grm: usize,
    pub ridx: RIdx,
}

#[derive(Debug)]
pub(crate) struct MatchNode {
    pub start: usize,
    /// Only meaningful once the match has been closed: while the match is in progress, its end is
    /// the tree's current position.
    pub end: usize,
    /// `None` for the root and for lambdas.
    pub producer: Option<Producer>,
    pub parent: Option<MIdx>,
    pub children: Vec<MIdx>,
    pub token: Option<Token>,
    /// For a lambda, the name of the rule that was absent.
    pub lambda: Option<String>,
    pub whitespace: bool,
}

/// The tree of in-progress and completed matches built during a parse.
///
/// Nodes are stored in an arena in the order they are opened. Because the parser is recursive
/// descent, a failed match is always the most recently opened child of its parent, and all nodes
/// opened after it are its descendants: discarding it is thus a truncation of the arena, and
/// resets the current position to where it started.
#[derive(Debug)]
pub(crate) struct MatchTree {
    nodes: Vec<MatchNode>,
    pos: usize,
}

impl MatchTree {
    pub(crate) fn new() -> Self {
        MatchTree {
            nodes: vec![MatchNode {
                start: 0,
                end: 0,
                producer: None,
                parent: None,
                children: Vec::new(),
                token: None,
                lambda: None,
                whitespace: false,
            }],
            pos: 0,
        }
    }

    pub(crate) fn root(&self) -> MIdx {
        0
    }

    /// The current input position.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn node(&self, m: MIdx) -> &MatchNode {
        &self.nodes[m]
    }

    /// Start a new match as the last child of `parent`.
    pub(crate) fn open(&mut self, parent: MIdx, producer: Producer, whitespace: bool) -> MIdx {
        let m = self.nodes.len();
        self.nodes.push(MatchNode {
            start: self.pos,
            end: self.pos,
            producer: Some(producer),
            parent: Some(parent),
            children: Vec::new(),
            token: None,
            lambda: None,
            whitespace,
        });
        self.nodes[parent].children.push(m);
        m
    }

    /// Record that `m` matched `token`, consuming its text.
    pub(crate) fn set_token(&mut self, m: MIdx, token: Token) {
        self.pos += token.text().len();
        self.nodes[m].token = Some(token);
    }

    /// Finish the match `m` successfully.
    pub(crate) fn close(&mut self, m: MIdx) {
        self.nodes[m].end = self.pos;
    }

    /// Undo the match `m`, which must be the most recently opened child of its parent, along
    /// with all its descendants.
    pub(crate) fn discard(&mut self, m: MIdx) {
        if let Some(p) = self.nodes[m].parent {
            debug_assert_eq!(self.nodes[p].children.last(), Some(&m));
            self.nodes[p].children.pop();
        }
        self.pos = self.nodes[m].start;
        self.nodes.truncate(m);
    }

    /// Record that the optional rule `name` was absent, as a new, empty, child of `parent`.
    pub(crate) fn add_lambda(&mut self, parent: MIdx, name: &str) -> MIdx {
        let m = self.nodes.len();
        self.nodes.push(MatchNode {
            start: self.pos,
            end: self.pos,
            producer: None,
            parent: Some(parent),
            children: Vec::new(),
            token: None,
            lambda: Some(name.to_owned()),
            whitespace: false,
        });
        self.nodes[parent].children.push(m);
        m
    }

    /// How much input the in-progress match `m` has consumed so far.
    pub(crate) fn consumed(&self, m: MIdx) -> usize {
        self.pos - self.nodes[m].start
    }

    pub(crate) fn non_ws_children(&self, m: MIdx) -> impl Iterator<Item = MIdx> + '_ {
        self.nodes[m]
            .children
            .iter()
            .copied()
            .filter(move |&c| !self.nodes[c].whitespace)
    }

    /// The end of the last non-whitespace input within the completed match `m`, or its start if
    /// it consumed only whitespace.
    pub(crate) fn content_end(&self, m: MIdx) -> usize {
        self.last_token_end(m).unwrap_or(self.nodes[m].start)
    }

    /// The end of the last non-empty token under `m`. Lambdas and empty matches have none, and
    /// their start may lie past trailing whitespace.
    fn last_token_end(&self, m: MIdx) -> Option<usize> {
        let n = &self.nodes[m];
        if let Some(ref t) = n.token {
            return (!t.text().is_empty()).then_some(n.end);
        }
        n.children
            .iter()
            .rev()
            .filter(|&&c| !self.nodes[c].whitespace)
            .find_map(|&c| self.last_token_end(c))
    }

    /// Render the completed match `m` for debugging: `(rule: child ...)`, with keywords shown
    /// bare, other tokens quoted, and lambdas as `-`. The root is rendered as its first
    /// non-whitespace child.
    pub(crate) fn match_string(&self, m: MIdx, grammars: &[Arc<Grammar>]) -> String {
        let n = &self.nodes[m];
        if n.lambda.is_some() {
            return "-".to_owned();
        }
        let Some(prod) = n.producer else {
            return self
                .non_ws_children(m)
                .next()
                .map(|c| self.match_string(c, grammars))
                .unwrap_or_default();
        };
        let matcher = grammars[prod.grm].rule(prod.ridx);
        if let Some(ref t) = n.token {
            return match matcher.as_token().and_then(|tm| tm.keyword()) {
                Some(_) => t.text().to_owned(),
                None => format!("'{}'", t.text()),
            };
        }
        let mut s = format!("({}:", matcher.name());
        for c in self.non_ws_children(m) {
            s.push(' ');
            s.push_str(&self.match_string(c, grammars));
        }
        s.push(')');
        s
    }
}
