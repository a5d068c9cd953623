use std::{fmt, ptr, sync::Arc};

use indexmap::IndexMap;
use rdgrammar::{Assoc, Grammar, MatcherKind, Span, Value};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::matchtree::{MIdx, MatchTree};

/// A terminal matched in the input.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token {
    text: String,
    span: Span,
    line: usize,
    column: usize,
    rule: String,
    whitespace: bool,
}

impl Token {
    pub(crate) fn new(
        text: &str,
        span: Span,
        (line, column): (usize, usize),
        rule: &str,
        whitespace: bool,
    ) -> Self {
        Token {
            text: text.to_owned(),
            span,
            line,
            column,
            rule: rule.to_owned(),
            whitespace,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The 1-based line the token starts on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1-based column (in characters) the token starts at.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The name of the token rule which matched this token.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn is_whitespace(&self) -> bool {
        self.whitespace
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    Terminal(Token),
    /// An optional item that was not present.
    Lambda,
    Internal {
        children: Vec<Node>,
        /// Maps the labels of labelled sequence items to indices into `children`.
        labels: IndexMap<String, usize>,
    },
}

/// A node of an abstract syntax tree. Whitespace never appears in an AST, and keywords only
/// appear where they carry information (e.g. an optional keyword which was present).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    name: String,
    kind: NodeKind,
    span: Span,
    input: Arc<str>,
}

impl Node {
    /// The name of the rule which produced this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal(_))
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self.kind, NodeKind::Lambda)
    }

    pub fn token(&self) -> Option<&Token> {
        match self.kind {
            NodeKind::Terminal(ref t) => Some(t),
            _ => None,
        }
    }

    /// The text of a terminal node.
    pub fn text(&self) -> Option<&str> {
        self.token().map(|t| t.text())
    }

    /// The bytes of the input this node covers.
    pub fn span(&self) -> Span {
        self.span
    }

    /// The input text this node covers.
    pub fn source(&self) -> &str {
        self.span.slice(&self.input).unwrap_or("")
    }

    pub fn children(&self) -> &[Node] {
        match self.kind {
            NodeKind::Internal { ref children, .. } => children,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.children().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Node> {
        self.children().get(i)
    }

    pub fn first(&self) -> Option<&Node> {
        self.get(0)
    }

    /// The child given label `label` in a sequence rule.
    pub fn get_label(&self, label: &str) -> Option<&Node> {
        match self.kind {
            NodeKind::Internal {
                ref children,
                ref labels,
            } => labels.get(label).and_then(|&i| children.get(i)),
            _ => None,
        }
    }

    pub fn has(&self, label: &str) -> bool {
        self.get_label(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        let labels = match self.kind {
            NodeKind::Internal { ref labels, .. } => Some(labels.keys().map(|k| k.as_str())),
            _ => None,
        };
        labels.into_iter().flatten()
    }

    /// This node if it is a terminal, or else its first terminal descendant.
    pub fn terminal(&self) -> Option<&Node> {
        if self.is_terminal() {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.terminal())
    }

    /// The text of the first terminal in child `i`.
    pub fn find_text(&self, i: usize) -> Option<&str> {
        self.get(i)?.terminal()?.text()
    }

    /// The first child labelled `label` in this node or its descendants, searched depth first.
    pub fn find(&self, label: &str) -> Option<&Node> {
        if let Some(n) = self.get_label(label) {
            return Some(n);
        }
        self.children().iter().find_map(|c| c.find(label))
    }

    /// The text of this terminal node coerced to a primitive value.
    pub fn value(&self) -> Option<Value> {
        self.text().map(Value::from_text)
    }

    /// The texts of all terminals in this subtree, in input order.
    pub fn all_texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        self.walk(&mut |n| {
            if let Some(t) = n.text() {
                texts.push(t);
            }
            true
        });
        texts
    }

    /// Visit this node and its descendants depth first, parents before children. If `f` returns
    /// `false` the walk stops early, and `walk` returns `false`.
    pub fn walk<'a, F>(&'a self, f: &mut F) -> bool
    where
        F: FnMut(&'a Node) -> bool,
    {
        if !f(self) {
            return false;
        }
        self.children().iter().all(|c| c.walk(f))
    }

    /// Find the parent of `target` within this subtree, comparing nodes by identity.
    pub fn parent_of(&self, target: &Node) -> Option<&Node> {
        for c in self.children() {
            if ptr::eq(c, target) {
                return Some(self);
            }
            if let Some(p) = c.parent_of(target) {
                return Some(p);
            }
        }
        None
    }

    /// Pretty print this subtree, one node per line, with children indented below their parent.
    pub fn pp(&self) -> String {
        let mut st = vec![(0, self)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, n)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            match n.kind {
                NodeKind::Terminal(ref t) => s.push_str(&format!("{} {}\n", n.name, t.text())),
                NodeKind::Lambda => s.push_str(&format!("{} -\n", n.name)),
                NodeKind::Internal { ref children, .. } => {
                    s.push_str(&format!("{}\n", n.name));
                    for c in children.iter().rev() {
                        st.push((indent + 1, c));
                    }
                }
            }
        }
        s
    }

    fn internal(name: &str, children: Vec<Node>, span: Span, input: &Arc<str>) -> Node {
        Node {
            name: name.to_owned(),
            kind: NodeKind::Internal {
                children,
                labels: IndexMap::new(),
            },
            span,
            input: Arc::clone(input),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            NodeKind::Terminal(ref t) => write!(f, "'{}'", t.text()),
            NodeKind::Lambda => write!(f, "-"),
            NodeKind::Internal { ref children, .. } => {
                write!(f, "({}", self.name)?;
                for c in children {
                    write!(f, " {}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Converts a completed match tree into an AST.
pub(crate) struct AstBuilder<'a> {
    tree: &'a MatchTree,
    grammars: &'a [Arc<Grammar>],
    input: Arc<str>,
}

impl<'a> AstBuilder<'a> {
    pub(crate) fn new(tree: &'a MatchTree, grammars: &'a [Arc<Grammar>], input: &str) -> Self {
        AstBuilder {
            tree,
            grammars,
            input: Arc::from(input),
        }
    }

    /// Build the AST for the tree's root: that is, for the start rule's match.
    pub(crate) fn build(&self) -> Option<Node> {
        let root = self.tree.root();
        self.tree.non_ws_children(root).next().map(|m| self.node(m))
    }

    fn node(&self, m: MIdx) -> Node {
        let mn = self.tree.node(m);
        // Whitespace trailing a node's last child is not part of the node's source.
        let span = Span::new(mn.start, self.tree.content_end(m));
        if let Some(ref name) = mn.lambda {
            return Node {
                name: name.clone(),
                kind: NodeKind::Lambda,
                span: Span::empty_at(mn.start),
                input: Arc::clone(&self.input),
            };
        }
        let Some(prod) = mn.producer else {
            // Only the root has no producer.
            return Node::internal("", self.children_of(m), span, &self.input);
        };
        let matcher = self.grammars[prod.grm].rule(prod.ridx);
        let name = matcher.name();
        match *matcher.kind() {
            MatcherKind::Token(_) => match mn.token {
                Some(ref t) => Node {
                    name: name.to_owned(),
                    kind: NodeKind::Terminal(t.clone()),
                    span: t.span(),
                    input: Arc::clone(&self.input),
                },
                None => Node::internal(name, Vec::new(), span, &self.input),
            },
            MatcherKind::Sequence(ref items) => {
                let mut children = Vec::new();
                let mut labels = IndexMap::new();
                for (item, c) in items.iter().zip(self.tree.non_ws_children(m)) {
                    if item.required && self.is_keyword(c) {
                        continue;
                    }
                    if let Some(ref l) = item.label {
                        labels.insert(l.clone(), children.len());
                    }
                    children.push(self.node(c));
                }
                Node {
                    name: name.to_owned(),
                    kind: NodeKind::Internal { children, labels },
                    span,
                    input: Arc::clone(&self.input),
                }
            }
            MatcherKind::Choice(_) | MatcherKind::Import(_) => {
                let mut inner = self.children_of(m);
                if !matcher.wraps() && inner.len() == 1 {
                    if let Some(n) = inner.pop() {
                        return n;
                    }
                }
                Node::internal(name, inner, span, &self.input)
            }
            MatcherKind::List(ref l) => {
                let kids = self.tree.non_ws_children(m).collect::<Vec<_>>();
                let items = strip_delimiters(
                    &kids,
                    l.pre.is_some(),
                    l.separator.is_some(),
                    l.post.is_some(),
                );
                let children = items.into_iter().map(|c| self.node(c)).collect();
                Node::internal(name, children, span, &self.input)
            }
            MatcherKind::Set(ref s) => {
                let kids = self.tree.non_ws_children(m).collect::<Vec<_>>();
                let items = strip_delimiters(
                    &kids,
                    s.pre.is_some(),
                    s.separator.is_some(),
                    s.post.is_some(),
                );
                let children = items.into_iter().map(|c| self.node(c)).collect();
                Node::internal(name, children, span, &self.input)
            }
            MatcherKind::Operator(ref o) => {
                let kids = self.tree.non_ws_children(m).collect::<Vec<_>>();
                self.fold_operator(name, &kids, o.assoc)
                    .unwrap_or_else(|| Node::internal(name, Vec::new(), span, &self.input))
            }
        }
    }

    fn children_of(&self, m: MIdx) -> Vec<Node> {
        self.tree
            .non_ws_children(m)
            .map(|c| self.node(c))
            .collect()
    }

    fn is_keyword(&self, m: MIdx) -> bool {
        self.tree
            .node(m)
            .producer
            .is_some_and(|p| self.grammars[p.grm].rule(p.ridx).is_keyword())
    }

    /// Fold `operand (operator operand)*` into a binary tree of `(operator left right)` nodes,
    /// nesting on the left for left associativity and on the right for right associativity.
    fn fold_operator(&self, name: &str, kids: &[MIdx], assoc: Assoc) -> Option<Node> {
        match kids.len() {
            0 => None,
            1 => Some(self.node(kids[0])),
            n => {
                let (op, lhs, rhs) = match assoc {
                    Assoc::Left => (
                        self.node(kids[n - 2]),
                        self.fold_operator(name, &kids[..n - 2], assoc)?,
                        self.node(kids[n - 1]),
                    ),
                    Assoc::Right => (
                        self.node(kids[1]),
                        self.node(kids[0]),
                        self.fold_operator(name, &kids[2..], assoc)?,
                    ),
                };
                let span = lhs.span().cover(rhs.span());
                Some(Node::internal(name, vec![op, lhs, rhs], span, &self.input))
            }
        }
    }
}

/// Remove the optional leading `pre`, trailing `post`, and interleaved separators from the
/// matches of a list or set, leaving only its items.
fn strip_delimiters(kids: &[MIdx], pre: bool, sep: bool, post: bool) -> Vec<MIdx> {
    let lo = usize::from(pre).min(kids.len());
    let hi = if post {
        kids.len().saturating_sub(1).max(lo)
    } else {
        kids.len()
    };
    let body = &kids[lo..hi];
    if sep {
        body.iter().step_by(2).copied().collect()
    } else {
        body.to_vec()
    }
}

#[cfg(test)]
mod test {
    use rdgrammar::{Assoc, Grammar, ListMatcher, SequenceItem, SetMatcher};

    use super::{Node, strip_delimiters};
    use crate::test_utils::parse_with;

    #[test]
    fn delimiters() {
        let kids = [0, 1, 2, 3, 4, 5, 6];
        assert_eq!(strip_delimiters(&kids, true, true, true), vec![1, 3, 5]);
        assert_eq!(strip_delimiters(&kids[..6], true, true, false), vec![1, 3, 5]);
        assert_eq!(strip_delimiters(&kids[..3], false, false, false), vec![0, 1, 2]);
        assert_eq!(strip_delimiters(&kids[..2], true, false, true), Vec::<usize>::new());
        assert_eq!(strip_delimiters(&kids[..1], false, false, true), Vec::<usize>::new());
    }

    fn calc_grammar(mul: Assoc, add: Assoc) -> Grammar {
        let mut g = Grammar::new("calc");
        g.add_token("number", r"\d+", false).unwrap();
        g.add_token("ws", r"\s+", true).unwrap();
        let times = g.keyword("*").unwrap();
        let plus = g.keyword("+").unwrap();
        g.add_operator("mul", &times, "number", mul).unwrap();
        g.add_operator("add", &plus, "mul", add).unwrap();
        g.set_start_rule("add");
        g
    }

    #[test]
    fn operator_folding() {
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Right), "1 * 2 * 3").unwrap();
        assert_eq!(ast.to_string(), "(mul '*' (mul '*' '1' '2') '3')");
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Right), "1 + 2 + 3").unwrap();
        assert_eq!(ast.to_string(), "(add '+' '1' (add '+' '2' '3'))");
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Right), "1 * 2 + 3 * 4").unwrap();
        assert_eq!(
            ast.to_string(),
            "(add '+' (mul '*' '1' '2') (mul '*' '3' '4'))"
        );
        let ast = parse_with(calc_grammar(Assoc::Right, Assoc::Left), "1 * 2 * 3").unwrap();
        assert_eq!(ast.to_string(), "(mul '*' '1' (mul '*' '2' '3'))");
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Right), "7").unwrap();
        assert_eq!(ast.to_string(), "'7'");
    }

    #[test]
    fn operator_spans() {
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Left), "1 * 2 * 3 ").unwrap();
        assert_eq!(ast.source(), "1 * 2 * 3");
        assert_eq!(ast.get(1).unwrap().source(), "1 * 2");
    }

    fn list_grammar() -> Grammar {
        let mut g = Grammar::new("lists");
        g.add_token("id", r"\w+", false).unwrap();
        g.add_token("ws", r"\s+", true).unwrap();
        let other = g.keyword("other").unwrap();
        let planet = g.keyword("planet").unwrap();
        let comma = g.keyword(",").unwrap();
        g.add_list("list1", ListMatcher::new("id").pre(&other).post(&planet))
            .unwrap();
        g.add_list(
            "list2",
            ListMatcher::new("id")
                .pre(&other)
                .separator(&comma)
                .post(&planet)
                .allow_trailing(true),
        )
        .unwrap();
        g
    }

    #[test]
    fn lists_strip_brackets() {
        let mut g = list_grammar();
        g.set_start_rule("list1");
        let ast = parse_with(g, "other blaat blaat planet").unwrap();
        assert_eq!(ast.to_string(), "(list1 'blaat' 'blaat')");
        assert_eq!(ast.all_texts(), vec!["blaat", "blaat"]);
        assert_eq!(ast.source(), "other blaat blaat planet");

        let mut g = list_grammar();
        g.set_start_rule("list2");
        let ast = parse_with(g, "other hoi , hoi, planet").unwrap();
        assert_eq!(ast.to_string(), "(list2 'hoi' 'hoi')");

        let mut g = list_grammar();
        g.set_start_rule("list1");
        let ast = parse_with(g, "other planet").unwrap();
        assert_eq!(ast.to_string(), "(list1)");
        assert!(ast.is_empty());
    }

    #[test]
    fn sequence_labels_and_keywords() {
        let mut g = Grammar::new("seq");
        g.add_token("id", r"[a-z]+", false).unwrap();
        g.add_token("ws", r"\s+", true).unwrap();
        let let_ = g.keyword("let").unwrap();
        let eq = g.keyword("=").unwrap();
        let mut_ = g.keyword("mut").unwrap();
        g.add_sequence(
            "binding",
            vec![
                SequenceItem::required(&let_),
                SequenceItem::optional(&mut_).labelled("mutable"),
                SequenceItem::required("id").labelled("name"),
                SequenceItem::required(&eq),
                SequenceItem::required("id").labelled("value"),
            ],
        )
        .unwrap();
        g.set_start_rule("binding");

        let ast = parse_with(g.clone(), "let x = y").unwrap();
        assert_eq!(ast.to_string(), "(binding - 'x' 'y')");
        assert!(ast.get_label("mutable").unwrap().is_lambda());
        assert_eq!(ast.get_label("name").unwrap().text(), Some("x"));
        assert_eq!(ast.labels().collect::<Vec<_>>(), vec!["mutable", "name", "value"]);

        let ast = parse_with(g, "let mut x = y").unwrap();
        assert_eq!(ast.to_string(), "(binding 'mut' 'x' 'y')");
        assert_eq!(ast.find_text(0), Some("mut"));
        let name = ast.find("name").unwrap();
        assert_eq!(name.token().unwrap().column(), 9);
        assert!(ptr_eq(ast.parent_of(name).unwrap(), &ast));
    }

    fn ptr_eq(a: &Node, b: &Node) -> bool {
        std::ptr::eq(a, b)
    }

    #[test]
    fn sets_keep_match_order() {
        let mut g = Grammar::new("sets");
        g.add_token("ws", r"\s+", true).unwrap();
        let a = g.keyword("a").unwrap();
        let b = g.keyword("b").unwrap();
        let c = g.keyword("c").unwrap();
        let comma = g.keyword(",").unwrap();
        let lb = g.keyword("{").unwrap();
        let rb = g.keyword("}").unwrap();
        g.add_set(
            "s",
            SetMatcher::new(&[&a, &b, &c]).separator(&comma).brackets(&lb, &rb),
        )
        .unwrap();
        g.set_start_rule("s");
        let ast = parse_with(g, "{ c, a }").unwrap();
        assert_eq!(ast.to_string(), "(s 'c' 'a')");
    }

    #[test]
    fn walking() {
        let ast = parse_with(calc_grammar(Assoc::Left, Assoc::Left), "1 * 2 * 3").unwrap();
        let mut seen = Vec::new();
        let finished = ast.walk(&mut |n| {
            seen.push(n.name().to_owned());
            seen.len() < 3
        });
        assert!(!finished);
        assert_eq!(seen, vec!["mul", "'*'", "mul"]);
        assert_eq!(ast.all_texts(), vec!["*", "*", "1", "2", "3"]);
        assert_eq!(
            ast.pp(),
            "mul\n '*' *\n mul\n  '*' *\n  number 1\n  number 2\n number 3\n"
        );
    }
}
