use std::fmt;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

use crate::Value;

/// The associativity of an operator rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// A terminal: a regular expression which is only ever matched at the very start of the
/// remaining input.
#[derive(Clone, Debug)]
pub struct TokenMatcher {
    regex: Regex,
    re_str: String,
    case_insensitive: bool,
    whitespace: bool,
    keyword: Option<String>,
}

impl TokenMatcher {
    /// Compile `re_str`, anchored to the start of whatever input it will later be asked to match.
    /// If `keyword` is `Some`, this token was interned for that literal.
    pub fn new(
        re_str: &str,
        case_insensitive: bool,
        whitespace: bool,
        keyword: Option<String>,
    ) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!("\\A(?:{})", re_str))
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(TokenMatcher {
            regex,
            re_str: re_str.to_owned(),
            case_insensitive,
            whitespace,
            keyword,
        })
    }

    /// If this token matches at the start of `rest`, return the length in bytes of the match.
    pub fn find(&self, rest: &str) -> Option<usize> {
        self.regex.find(rest).map(|m| m.end())
    }

    /// The regular expression as it was given, without the anchoring added by `new`.
    pub fn re_str(&self) -> &str {
        &self.re_str
    }

    pub fn is_whitespace(&self) -> bool {
        self.whitespace
    }

    /// The literal this token was interned for, if it is a keyword.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }
}

impl PartialEq for TokenMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.re_str == other.re_str
            && self.case_insensitive == other.case_insensitive
            && self.whitespace == other.whitespace
            && self.keyword == other.keyword
    }
}

/// One item of a sequence rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceItem {
    pub rule: String,
    pub required: bool,
    pub label: Option<String>,
}

impl SequenceItem {
    pub fn required(rule: &str) -> Self {
        SequenceItem {
            rule: rule.to_owned(),
            required: true,
            label: None,
        }
    }

    pub fn optional(rule: &str) -> Self {
        SequenceItem {
            rule: rule.to_owned(),
            required: false,
            label: None,
        }
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_owned());
        self
    }
}

/// `pre? item (separator item)* post?`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListMatcher {
    pub item: String,
    pub separator: Option<String>,
    pub pre: Option<String>,
    pub post: Option<String>,
    /// May the list contain no items at all?
    pub nullable: bool,
    /// Is a separator with no item following it accepted?
    pub allow_trailing: bool,
}

impl ListMatcher {
    /// A nullable list of `item` with no separator or brackets.
    pub fn new(item: &str) -> Self {
        ListMatcher {
            item: item.to_owned(),
            separator: None,
            pre: None,
            post: None,
            nullable: true,
            allow_trailing: false,
        }
    }

    pub fn separator(mut self, sep: &str) -> Self {
        self.separator = Some(sep.to_owned());
        self
    }

    pub fn pre(mut self, pre: &str) -> Self {
        self.pre = Some(pre.to_owned());
        self
    }

    pub fn post(mut self, post: &str) -> Self {
        self.post = Some(post.to_owned());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn allow_trailing(mut self, allow_trailing: bool) -> Self {
        self.allow_trailing = allow_trailing;
        self
    }
}

/// Alternatives which may each match at most once, in any order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetMatcher {
    pub items: Vec<String>,
    pub separator: Option<String>,
    pub pre: Option<String>,
    pub post: Option<String>,
}

impl SetMatcher {
    pub fn new(items: &[&str]) -> Self {
        SetMatcher {
            items: items.iter().map(|s| (*s).to_owned()).collect(),
            separator: None,
            pre: None,
            post: None,
        }
    }

    pub fn separator(mut self, sep: &str) -> Self {
        self.separator = Some(sep.to_owned());
        self
    }

    pub fn brackets(mut self, pre: &str, post: &str) -> Self {
        self.pre = Some(pre.to_owned());
        self.post = Some(post.to_owned());
        self
    }
}

/// `operand (operator operand)*`, folded according to `assoc` when converted to an AST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorMatcher {
    pub operator: String,
    pub operand: String,
    pub assoc: Assoc,
}

/// A rule of another registered grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportMatcher {
    pub grammar: String,
    pub rule: String,
}

/// The configuration specific to each kind of rule.
#[derive(Clone, Debug, PartialEq)]
pub enum MatcherKind {
    Token(TokenMatcher),
    Sequence(Vec<SequenceItem>),
    Choice(Vec<String>),
    List(ListMatcher),
    Set(SetMatcher),
    Operator(OperatorMatcher),
    Import(ImportMatcher),
}

impl MatcherKind {
    /// A short lower case name for this kind of rule, as used in grammar source.
    pub fn kind_name(&self) -> &'static str {
        match *self {
            MatcherKind::Token(_) => "token",
            MatcherKind::Sequence(_) => "sequence",
            MatcherKind::Choice(_) => "choice",
            MatcherKind::List(_) => "list",
            MatcherKind::Set(_) => "set",
            MatcherKind::Operator(_) => "operator",
            MatcherKind::Import(_) => "import",
        }
    }

    /// The options a rule of this kind understands.
    pub fn known_options(&self) -> &'static [&'static str] {
        match *self {
            MatcherKind::Token(_) => &["whitespace"],
            MatcherKind::Sequence(_) | MatcherKind::Set(_) => &[],
            MatcherKind::Choice(_) | MatcherKind::Import(_) => &["wrap"],
            MatcherKind::List(_) => &["nullable", "allowtrailing"],
            MatcherKind::Operator(_) => &["left", "right"],
        }
    }
}

/// The per-rule option map. Options which configure a rule's kind (e.g. a list's `nullable`) are
/// mirrored here from the kind itself, so this map always reflects the rule's actual behaviour.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleOptions {
    opts: IndexMap<String, Value>,
}

impl RuleOptions {
    pub fn new() -> Self {
        RuleOptions::default()
    }

    pub fn insert(&mut self, key: &str, val: Value) {
        self.opts.insert(key.to_owned(), val);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.opts.get(key)
    }

    /// The boolean value of `key`, or `default` if it is absent or not a boolean.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.opts
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.opts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }
}

/// A single named rule of a grammar.
#[derive(Clone, Debug, PartialEq)]
pub struct Matcher {
    name: String,
    kind: MatcherKind,
    options: RuleOptions,
}

impl Matcher {
    pub fn new(name: &str, kind: MatcherKind) -> Self {
        let mut options = RuleOptions::new();
        match kind {
            MatcherKind::Token(ref t) => options.insert("whitespace", Value::Bool(t.whitespace)),
            MatcherKind::List(ref l) => {
                options.insert("nullable", Value::Bool(l.nullable));
                options.insert("allowtrailing", Value::Bool(l.allow_trailing));
            }
            MatcherKind::Operator(ref o) => {
                options.insert("right", Value::Bool(o.assoc == Assoc::Right))
            }
            _ => (),
        }
        Matcher {
            name: name.to_owned(),
            kind,
            options,
        }
    }

    /// Set an option which has no counterpart in the rule's kind (e.g. `wrap`).
    pub fn with_option(mut self, key: &str, val: Value) -> Self {
        self.options.insert(key, val);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &MatcherKind {
        &self.kind
    }

    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub fn as_token(&self) -> Option<&TokenMatcher> {
        match self.kind {
            MatcherKind::Token(ref t) => Some(t),
            _ => None,
        }
    }

    pub fn is_token(&self) -> bool {
        self.as_token().is_some()
    }

    pub fn is_whitespace(&self) -> bool {
        self.as_token().is_some_and(|t| t.is_whitespace())
    }

    pub fn is_keyword(&self) -> bool {
        self.as_token().is_some_and(|t| t.keyword().is_some())
    }

    /// Should the AST node this rule produces be wrapped in a node carrying the rule's own name?
    /// Choices unwrap by default; imports wrap by default. Other kinds always produce their own
    /// node (or, for operators and tokens, decide for themselves).
    pub fn wraps(&self) -> bool {
        match self.kind {
            MatcherKind::Choice(_) => self.options.get_bool("wrap", false),
            MatcherKind::Import(_) => self.options.get_bool("wrap", true),
            _ => true,
        }
    }

    /// The names of the rules, in this rule's grammar, that this rule refers to.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        match self.kind {
            MatcherKind::Token(_) | MatcherKind::Import(_) => (),
            MatcherKind::Sequence(ref items) => refs.extend(items.iter().map(|i| i.rule.as_str())),
            MatcherKind::Choice(ref alts) => refs.extend(alts.iter().map(|a| a.as_str())),
            MatcherKind::List(ref l) => {
                refs.extend(l.pre.as_deref());
                refs.push(l.item.as_str());
                refs.extend(l.separator.as_deref());
                refs.extend(l.post.as_deref());
            }
            MatcherKind::Set(ref s) => {
                refs.extend(s.pre.as_deref());
                refs.extend(s.items.iter().map(|a| a.as_str()));
                refs.extend(s.separator.as_deref());
                refs.extend(s.post.as_deref());
            }
            MatcherKind::Operator(ref o) => {
                refs.push(o.operator.as_str());
                refs.push(o.operand.as_str());
            }
        }
        refs
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind.kind_name(), self.name)?;
        let extra = self
            .options
            .iter()
            .filter(|(_, v)| **v != Value::Bool(false))
            .map(|(k, v)| match *v {
                Value::Bool(true) => k.to_owned(),
                _ => format!("{}: {}", k, v),
            })
            .collect::<Vec<_>>();
        if !extra.is_empty() {
            write!(f, " [{}]", extra.join(", "))?;
        }
        write!(f, " =")?;
        match self.kind {
            MatcherKind::Token(ref t) => write!(f, " /{}/", t.re_str().replace('/', "\\/")),
            MatcherKind::Sequence(ref items) => {
                for i in items {
                    match i.label {
                        Some(ref l) => write!(f, " {}: {}", l, i.rule)?,
                        None => write!(f, " {}", i.rule)?,
                    }
                    if !i.required {
                        write!(f, "?")?;
                    }
                }
                Ok(())
            }
            MatcherKind::Choice(ref alts) => write!(f, " {}", alts.join(" | ")),
            MatcherKind::List(ref l) => {
                for p in [&l.pre, &Some(l.item.clone()), &l.separator, &l.post]
                    .into_iter()
                    .flatten()
                {
                    write!(f, " {}", p)?;
                }
                Ok(())
            }
            MatcherKind::Set(ref s) => {
                write!(f, " {}", s.items.join(" | "))?;
                if let Some(ref sep) = s.separator {
                    write!(f, " using")?;
                    match (&s.pre, &s.post) {
                        (Some(pre), Some(post)) => write!(f, " {} {} {}", pre, sep, post)?,
                        _ => write!(f, " {}", sep)?,
                    }
                }
                Ok(())
            }
            MatcherKind::Operator(ref o) => write!(f, " {} {}", o.operator, o.operand),
            MatcherKind::Import(ref i) => write!(f, " {}.{}", i.grammar, i.rule),
        }
    }
}
