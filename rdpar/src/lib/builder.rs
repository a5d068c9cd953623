use rdgrammar::{
    Assoc, DefinitionError, DefinitionErrorKind, Grammar, ImportMatcher, ListMatcher, Matcher,
    MatcherKind, OperatorMatcher, SequenceItem, SetMatcher, TokenMatcher, Value,
};

use crate::Node;

/// Options as written in grammar source: lower cased names paired with their values. A bare
/// name is a flag, and has the value `true`.
type Options = Vec<(String, Value)>;

/// Build a grammar from the AST of a grammar definition, as produced by parsing grammar source
/// with the grammar definition language.
pub fn grammar_from_ast(ast: &Node) -> Result<Grammar, DefinitionError> {
    if !ast.is("langdef") {
        return Err(malformed(&format!(
            "expected a language definition, not '{}'",
            ast.name()
        )));
    }
    let name = ast
        .find_text(0)
        .ok_or_else(|| malformed("language has no name"))?;
    let mut gb = GrammarBuilder {
        grm: Grammar::new(name),
    };
    if let Some(opts) = ast.get(1) {
        gb.grammar_options(&options(opts)?)?;
    }
    let defs = ast
        .get(2)
        .ok_or_else(|| malformed("language has no definitions"))?;
    for d in defs.children() {
        gb.definition(d)?;
    }
    gb.grm.validate()?;
    log::debug!(
        "Built grammar '{}' with {} rules",
        gb.grm.name(),
        gb.grm.rules_len()
    );
    Ok(gb.grm)
}

fn malformed(msg: &str) -> DefinitionError {
    DefinitionError::new(DefinitionErrorKind::MalformedSource(msg.to_owned()))
}

/// Convert an `options` node (or the lambda standing in for an absent one).
fn options(node: &Node) -> Result<Options, DefinitionError> {
    let mut opts = Vec::new();
    for o in node.children() {
        if let Some(flag) = o.text() {
            opts.push((flag.to_lowercase(), Value::Bool(true)));
        } else if o.is("valueoption") {
            let key = o
                .find_text(0)
                .ok_or_else(|| malformed("option has no name"))?;
            let val = o
                .get(1)
                .and_then(|v| v.value())
                .ok_or_else(|| malformed("option has no value"))?;
            opts.push((key.to_lowercase(), val));
        } else {
            return Err(malformed(&format!("unexpected option node '{}'", o.name())));
        }
    }
    Ok(opts)
}

fn invalid_value(key: &str) -> DefinitionErrorKind {
    DefinitionErrorKind::InvalidOptionValue(key.to_owned())
}

/// The boolean option `key` of rule `rule`, or `default` if it was not given.
fn flag(rule: &str, opts: &Options, key: &str, default: bool) -> Result<bool, DefinitionError> {
    match opts.iter().rev().find(|(k, _)| k == key) {
        Some((_, v)) => v
            .as_bool()
            .ok_or_else(|| DefinitionError::for_rule(invalid_value(key), rule)),
        None => Ok(default),
    }
}

struct GrammarBuilder {
    grm: Grammar,
}

impl GrammarBuilder {
    fn grammar_options(&mut self, opts: &Options) -> Result<(), DefinitionError> {
        // Default tokens must be compiled with the grammar's final case sensitivity, so they are
        // added once every other option has been applied.
        let mut default_tokens = false;
        for (k, v) in opts {
            let bad = || DefinitionError::new(invalid_value(k));
            match k.as_str() {
                "casesensitive" => self
                    .grm
                    .set_case_insensitive(!v.as_bool().ok_or_else(bad)?),
                "disableautowhitespace" => self
                    .grm
                    .set_auto_whitespace_disabled(v.as_bool().ok_or_else(bad)?),
                "startsymbol" => self.grm.set_start_rule(v.as_str().ok_or_else(bad)?),
                "maxdepth" => {
                    let d = v
                        .as_int()
                        .and_then(|i| usize::try_from(i).ok())
                        .ok_or_else(bad)?;
                    self.grm.set_max_depth(Some(d));
                }
                "usedefaulttokens" => default_tokens = v.as_bool().ok_or_else(bad)?,
                _ => {
                    return Err(DefinitionError::new(DefinitionErrorKind::UnknownOption(
                        k.clone(),
                    )));
                }
            }
        }
        if default_tokens {
            self.grm.add_default_tokens()?;
        }
        Ok(())
    }

    /// Add the rule defined by `def`, along with any inline sub-rules it contains.
    fn definition(&mut self, def: &Node) -> Result<(), DefinitionError> {
        let name = def
            .find_text(0)
            .ok_or_else(|| malformed(&format!("'{}' has no name", def.name())))?;
        let opts = match def.get(1) {
            Some(o) => options(o)?,
            None => Vec::new(),
        };
        let parts = def.children().get(2..).unwrap_or(&[]);
        let kind = match def.name() {
            "tokenDef" => self.token(name, &opts, parts)?,
            "choiceDef" => self.choice(name, parts)?,
            "sequenceDef" => self.sequence(name, parts)?,
            "listDef" => {
                let values = parts.first().map_or(&[][..], |v| v.children());
                MatcherKind::List(self.list(name, &opts, values)?)
            }
            "setDef" => self.set(name, parts)?,
            "opDef" => self.operator(name, &opts, parts)?,
            "importDef" => {
                let texts = parts.iter().filter_map(|n| n.text()).collect::<Vec<_>>();
                let [grammar, rule] = texts.as_slice() else {
                    return Err(malformed(&format!("import '{}' is incomplete", name)));
                };
                MatcherKind::Import(ImportMatcher {
                    grammar: (*grammar).to_owned(),
                    rule: (*rule).to_owned(),
                })
            }
            other => {
                return Err(DefinitionError::for_rule(
                    DefinitionErrorKind::UnknownDefinition(other.to_owned()),
                    name,
                ));
            }
        };
        for (k, _) in &opts {
            if !kind.known_options().contains(&k.as_str()) {
                return Err(DefinitionError::for_rule(
                    DefinitionErrorKind::UnknownOption(k.clone()),
                    name,
                ));
            }
        }
        let mut m = Matcher::new(name, kind);
        if let Some((_, v)) = opts.iter().rev().find(|(k, _)| k == "wrap") {
            let wrap = v
                .as_bool()
                .ok_or_else(|| DefinitionError::for_rule(invalid_value("wrap"), name))?;
            m = m.with_option("wrap", Value::Bool(wrap));
        }
        self.grm.add_rule(m)?;
        Ok(())
    }

    fn token(
        &mut self,
        name: &str,
        opts: &Options,
        parts: &[Node],
    ) -> Result<MatcherKind, DefinitionError> {
        let re = match parts.first().and_then(|n| n.value()) {
            Some(Value::Regex(re)) => re,
            _ => return Err(malformed(&format!("token '{}' has no regular expression", name))),
        };
        let ws = flag(name, opts, "whitespace", false)?;
        let t = TokenMatcher::new(&re, self.grm.case_insensitive(), ws, None).map_err(|e| {
            DefinitionError::for_rule(DefinitionErrorKind::InvalidRegex(e.to_string()), name)
        })?;
        Ok(MatcherKind::Token(t))
    }

    fn choice(&mut self, name: &str, parts: &[Node]) -> Result<MatcherKind, DefinitionError> {
        let alts = parts
            .first()
            .ok_or_else(|| malformed(&format!("choice '{}' has no alternatives", name)))?;
        Ok(MatcherKind::Choice(self.rule_refs(alts.children())?))
    }

    fn sequence(&mut self, name: &str, parts: &[Node]) -> Result<MatcherKind, DefinitionError> {
        let items = parts
            .first()
            .ok_or_else(|| malformed(&format!("sequence '{}' has no items", name)))?;
        let items = items
            .children()
            .iter()
            .map(|i| self.sequence_item(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MatcherKind::Sequence(items))
    }

    /// Convert a `sequenceItem` node: `label:`, then a value, then `?` if the item is optional.
    fn sequence_item(&mut self, item: &Node) -> Result<SequenceItem, DefinitionError> {
        let (Some(label), Some(value), Some(question)) = (item.get(0), item.get(1), item.get(2))
        else {
            return Err(malformed("incomplete sequence item"));
        };
        let rule = self.rule_ref(value)?;
        let si = if question.is_lambda() {
            SequenceItem::required(&rule)
        } else {
            SequenceItem::optional(&rule)
        };
        Ok(match label.find_text(0) {
            Some(l) => si.labelled(l),
            None => si,
        })
    }

    /// Build a list from its 1 to 4 positional parts: `item`, `item sep`, `pre item post`, or
    /// `pre item sep post`.
    fn list(
        &mut self,
        name: &str,
        opts: &Options,
        values: &[Node],
    ) -> Result<ListMatcher, DefinitionError> {
        let refs = self.rule_refs(values)?;
        let l = match refs.as_slice() {
            [item] => ListMatcher::new(item),
            [item, sep] => ListMatcher::new(item).separator(sep),
            [pre, item, post] => ListMatcher::new(item).pre(pre).post(post),
            [pre, item, sep, post] => ListMatcher::new(item).pre(pre).separator(sep).post(post),
            _ => {
                return Err(DefinitionError::for_rule(
                    DefinitionErrorKind::ListArity(refs.len()),
                    name,
                ));
            }
        };
        Ok(l
            .nullable(flag(name, opts, "nullable", true)?)
            .allow_trailing(flag(name, opts, "allowtrailing", false)?))
    }

    /// A set is `alt | alt ... using [pre] sep [post]`, where the `using` clause is optional.
    fn set(&mut self, name: &str, parts: &[Node]) -> Result<MatcherKind, DefinitionError> {
        let (Some(alts), Some(using), Some(values)) = (parts.first(), parts.get(1), parts.get(2))
        else {
            return Err(malformed(&format!("set '{}' is incomplete", name)));
        };
        let items = self.rule_refs(alts.children())?;
        let items = items.iter().map(String::as_str).collect::<Vec<_>>();
        let set = SetMatcher::new(&items);
        if using.is_lambda() {
            if !values.is_lambda() {
                return Err(malformed(&format!(
                    "set '{}' has delimiters but no 'using'",
                    name
                )));
            }
            return Ok(MatcherKind::Set(set));
        }
        let delims = self.rule_refs(values.children())?;
        let set = match delims.as_slice() {
            [sep] => set.separator(sep),
            [pre, sep, post] => set.brackets(pre, post).separator(sep),
            _ => {
                return Err(DefinitionError::for_rule(
                    DefinitionErrorKind::SetArity(delims.len()),
                    name,
                ));
            }
        };
        Ok(MatcherKind::Set(set))
    }

    fn operator(
        &mut self,
        name: &str,
        opts: &Options,
        parts: &[Node],
    ) -> Result<MatcherKind, DefinitionError> {
        let refs = self.rule_refs(parts)?;
        let [operator, operand] = refs.as_slice() else {
            return Err(malformed(&format!(
                "operator '{}' needs an operator and an operand",
                name
            )));
        };
        let assoc = if flag(name, opts, "right", false)? {
            Assoc::Right
        } else {
            Assoc::Left
        };
        Ok(MatcherKind::Operator(OperatorMatcher {
            operator: operator.clone(),
            operand: operand.clone(),
            assoc,
        }))
    }

    fn rule_refs(&mut self, values: &[Node]) -> Result<Vec<String>, DefinitionError> {
        values.iter().map(|v| self.rule_ref(v)).collect()
    }

    /// Return the name of the rule that the value `v` refers to. Quoted literals become keywords,
    /// and inline sub-rules are added to the grammar under a fresh name.
    fn rule_ref(&mut self, v: &Node) -> Result<String, DefinitionError> {
        if let Some(text) = v.text() {
            if v.is("IDENTIFIER") {
                return Ok(text.to_owned());
            }
            return match v.value() {
                Some(Value::Str(lit)) => self.grm.keyword(&lit),
                _ => Err(malformed(&format!("'{}' is not a rule reference", text))),
            };
        }
        // Sub-rules are named before their contents are built, so outer sub-rules are numbered
        // before the sub-rules nested within them.
        let name = self.grm.next_subrule_name();
        let kind = match v.name() {
            "listSubrule" => {
                let values = v.first().map_or(&[][..], |n| n.children());
                MatcherKind::List(self.list(&name, &Vec::new(), values)?)
            }
            "choiceSubrule" => MatcherKind::Choice(self.rule_refs(v.children())?),
            "sequenceSubrule" => MatcherKind::Sequence(
                v.children()
                    .iter()
                    .map(|i| self.sequence_item(i))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            other => {
                return Err(malformed(&format!(
                    "'{}' is not a rule reference",
                    other
                )));
            }
        };
        self.grm.add_rule(Matcher::new(&name, kind))?;
        Ok(name)
    }
}
