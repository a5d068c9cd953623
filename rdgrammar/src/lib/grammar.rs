use std::collections::HashMap;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    Assoc, BuiltinToken, DefinitionError, DefinitionErrorKind, ImportMatcher, ListMatcher,
    Matcher, MatcherKind, OperatorMatcher, SequenceItem, SetMatcher, TokenMatcher,
};

lazy_static! {
    static ref RE_WORD: Regex = Regex::new(r"^[a-zA-Z_]+$").unwrap();
}

/// A rule index: the position of a rule within its grammar.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RIdx(pub usize);

impl From<RIdx> for usize {
    fn from(ridx: RIdx) -> usize {
        ridx.0
    }
}

/// A named grammar: an insertion-ordered collection of rules plus grammar-wide settings.
///
/// Rules may only be added, never removed or replaced. A grammar is normally built up
/// completely, then handed to a [`Registry`](../registry/struct.Registry.html), after which it is
/// only shared immutably.
#[derive(Clone, Debug)]
pub struct Grammar {
    name: String,
    rules: IndexMap<String, Matcher>,
    case_insensitive: bool,
    auto_whitespace_disabled: bool,
    start_rule: Option<String>,
    /// Tokens which are skipped automatically, in the order they were added.
    whitespace: Vec<RIdx>,
    max_depth: Option<usize>,
    /// Maps the regular expression of each keyword to the keyword's rule.
    keywords: HashMap<String, RIdx>,
    subrules: usize,
}

impl Grammar {
    pub fn new(name: &str) -> Self {
        Grammar {
            name: name.to_owned(),
            rules: IndexMap::new(),
            case_insensitive: false,
            auto_whitespace_disabled: false,
            start_rule: None,
            whitespace: Vec::new(),
            max_depth: None,
            keywords: HashMap::new(),
            subrules: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Set whether tokens are matched case insensitively. This only affects tokens added
    /// after the call.
    pub fn set_case_insensitive(&mut self, case_insensitive: bool) {
        self.case_insensitive = case_insensitive;
    }

    pub fn auto_whitespace_disabled(&self) -> bool {
        self.auto_whitespace_disabled
    }

    pub fn set_auto_whitespace_disabled(&mut self, disabled: bool) {
        self.auto_whitespace_disabled = disabled;
    }

    pub fn start_rule(&self) -> Option<&str> {
        self.start_rule.as_deref()
    }

    pub fn set_start_rule(&mut self, name: &str) {
        self.start_rule = Some(name.to_owned());
    }

    /// The maximum rule nesting depth a parse may reach before it is aborted.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: Option<usize>) {
        self.max_depth = max_depth;
    }

    pub fn rules_len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter_rules(&self) -> impl Iterator<Item = &Matcher> {
        self.rules.values()
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule_idx(&self, name: &str) -> Option<RIdx> {
        self.rules.get_index_of(name).map(RIdx)
    }

    /// Return the rule at `ridx`.
    ///
    /// # Panics
    ///
    /// If `ridx` is not a valid index of this grammar.
    pub fn rule(&self, ridx: RIdx) -> &Matcher {
        &self.rules[ridx.0]
    }

    /// Look up the rule called `name`.
    pub fn matcher(&self, name: &str) -> Result<&Matcher, DefinitionError> {
        self.rules
            .get(name)
            .ok_or_else(|| DefinitionError::for_rule(DefinitionErrorKind::UnknownRule, name))
    }

    /// The whitespace tokens, in the order in which they are tried.
    pub fn whitespace_rules(&self) -> &[RIdx] {
        &self.whitespace
    }

    /// Add a fully constructed rule. Fails if a rule of the same name already exists.
    pub fn add_rule(&mut self, matcher: Matcher) -> Result<RIdx, DefinitionError> {
        if self.rules.contains_key(matcher.name()) {
            return Err(DefinitionError::for_rule(
                DefinitionErrorKind::DuplicateRule,
                matcher.name(),
            ));
        }
        let ridx = RIdx(self.rules.len());
        if matcher.is_whitespace() {
            self.whitespace.push(ridx);
        }
        self.rules.insert(matcher.name().to_owned(), matcher);
        Ok(ridx)
    }

    pub fn add_token(
        &mut self,
        name: &str,
        re_str: &str,
        whitespace: bool,
    ) -> Result<RIdx, DefinitionError> {
        let t = self.compile_token(name, re_str, whitespace, None)?;
        self.add_rule(Matcher::new(name, MatcherKind::Token(t)))
    }

    pub fn add_sequence(
        &mut self,
        name: &str,
        items: Vec<SequenceItem>,
    ) -> Result<RIdx, DefinitionError> {
        self.add_rule(Matcher::new(name, MatcherKind::Sequence(items)))
    }

    pub fn add_choice(&mut self, name: &str, alts: &[&str]) -> Result<RIdx, DefinitionError> {
        let alts = alts.iter().map(|a| (*a).to_owned()).collect();
        self.add_rule(Matcher::new(name, MatcherKind::Choice(alts)))
    }

    pub fn add_list(&mut self, name: &str, list: ListMatcher) -> Result<RIdx, DefinitionError> {
        self.add_rule(Matcher::new(name, MatcherKind::List(list)))
    }

    pub fn add_set(&mut self, name: &str, set: SetMatcher) -> Result<RIdx, DefinitionError> {
        self.add_rule(Matcher::new(name, MatcherKind::Set(set)))
    }

    pub fn add_operator(
        &mut self,
        name: &str,
        operator: &str,
        operand: &str,
        assoc: Assoc,
    ) -> Result<RIdx, DefinitionError> {
        self.add_rule(Matcher::new(
            name,
            MatcherKind::Operator(OperatorMatcher {
                operator: operator.to_owned(),
                operand: operand.to_owned(),
                assoc,
            }),
        ))
    }

    pub fn add_import(
        &mut self,
        name: &str,
        grammar: &str,
        rule: &str,
    ) -> Result<RIdx, DefinitionError> {
        self.add_rule(Matcher::new(
            name,
            MatcherKind::Import(ImportMatcher {
                grammar: grammar.to_owned(),
                rule: rule.to_owned(),
            }),
        ))
    }

    /// Return the name of the token matching exactly `literal`, creating it if necessary.
    ///
    /// Keywords are interned: asking for the same literal twice yields the same rule. A
    /// keyword consisting only of letters and underscores must be followed by a word
    /// boundary, so the keyword `if` does not match the start of `ifx`. A keyword's rule is
    /// named after its literal in single quotes, e.g. `'if'`.
    pub fn keyword(&mut self, literal: &str) -> Result<String, DefinitionError> {
        let mut re_str = regex::escape(literal);
        if RE_WORD.is_match(literal) {
            re_str.push_str("\\b");
        }
        if let Some(&ridx) = self.keywords.get(&re_str) {
            return Ok(self.rule(ridx).name().to_owned());
        }
        let name = format!("'{}'", literal);
        if self.rules.contains_key(&name) {
            return Err(DefinitionError::for_rule(
                DefinitionErrorKind::KeywordConflict,
                &name,
            ));
        }
        let t = self.compile_token(&name, &re_str, false, Some(literal.to_owned()))?;
        let ridx = self.add_rule(Matcher::new(&name, MatcherKind::Token(t)))?;
        self.keywords.insert(re_str, ridx);
        Ok(name)
    }

    /// Add every built-in token not already defined by the grammar.
    pub fn add_default_tokens(&mut self) -> Result<(), DefinitionError> {
        for t in BuiltinToken::ALL {
            if !self.rules.contains_key(t.name()) {
                self.add_token(t.name(), t.regex(), t.is_whitespace())?;
            }
        }
        Ok(())
    }

    /// Return a fresh name for an anonymous (inline) rule.
    pub fn next_subrule_name(&mut self) -> String {
        self.subrules += 1;
        format!("subrule_{}", self.subrules)
    }

    /// Check that every rule reference, and the start rule, resolve within this grammar.
    /// Imports are resolved only when a parse reaches them.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for m in self.rules.values() {
            for r in m.references() {
                if !self.rules.contains_key(r) {
                    return Err(DefinitionError::for_rule(
                        DefinitionErrorKind::UnknownRuleRef {
                            referenced: r.to_owned(),
                        },
                        m.name(),
                    ));
                }
            }
        }
        if let Some(ref s) = self.start_rule {
            if !self.rules.contains_key(s) {
                return Err(DefinitionError::new(DefinitionErrorKind::InvalidStartRule(
                    s.clone(),
                )));
            }
        }
        Ok(())
    }

    /// Do `self` and `other` define the same rules with the same behaviour, regardless of the
    /// order in which the rules were added?
    pub fn equivalent(&self, other: &Grammar) -> bool {
        self.case_insensitive == other.case_insensitive
            && self.auto_whitespace_disabled == other.auto_whitespace_disabled
            && self.start_rule == other.start_rule
            && self.max_depth == other.max_depth
            && self.rules.len() == other.rules.len()
            && self
                .rules
                .iter()
                .all(|(n, m)| other.rules.get(n).is_some_and(|om| om == m))
    }

    fn compile_token(
        &self,
        name: &str,
        re_str: &str,
        whitespace: bool,
        keyword: Option<String>,
    ) -> Result<TokenMatcher, DefinitionError> {
        TokenMatcher::new(re_str, self.case_insensitive, whitespace, keyword).map_err(|e| {
            DefinitionError::for_rule(DefinitionErrorKind::InvalidRegex(e.to_string()), name)
        })
    }
}
