//! The grammar definition language, built by hand.
//!
//! Every grammar loaded from text is parsed with the grammar registered under
//! [`GRAMMAR_DEFINITION_NAME`]. Initially that is the grammar returned by [`bootstrap_grammar`];
//! [`GRAMMAR_DEFINITION_SOURCE`] describes the same grammar in its own language, so loading it
//! yields a grammar equivalent to the one it was parsed with.

use rdgrammar::{DefinitionError, Grammar, ListMatcher, SequenceItem};

/// The name under which the grammar definition language is registered.
pub const GRAMMAR_DEFINITION_NAME: &str = "rdgrammar";

/// The grammar definition language, written in itself.
pub const GRAMMAR_DEFINITION_SOURCE: &str = r#"
language rdgrammar [casesensitive: false, usedefaulttokens, startsymbol: langdef]

sequence langdef = 'language' IDENTIFIER options? definitions;
list options = '[' option ',' ']';
choice option = valueoption | IDENTIFIER;
sequence valueoption = IDENTIFIER ':' optionvalue;
choice optionvalue = SINGLEQUOTEDSTRING | DOUBLEQUOTEDSTRING | INTEGER | IDENTIFIER;
list definitions [nullable: false, allowtrailing] = definition ';';
choice definition = tokenDef | choiceDef | sequenceDef | listDef | setDef | opDef | importDef;

sequence tokenDef = 'token' IDENTIFIER options? '=' REGULAREXPRESSION;
sequence choiceDef = 'choice' IDENTIFIER options? '=' choices;
list choices [nullable: false] = value '|';
sequence sequenceDef = 'sequence' IDENTIFIER options? '=' sequenceItems;
list sequenceItems [nullable: false] = sequenceItem;
sequence sequenceItemName = IDENTIFIER ':';
sequence sequenceItem = sequenceItemName? value '?'?;
sequence listDef = 'list' IDENTIFIER options? '=' values;
sequence setDef = 'set' IDENTIFIER options? '=' choices 'using'? values?;
sequence opDef = 'operator' IDENTIFIER options? '=' value value;
sequence importDef = 'import' IDENTIFIER options? '=' IDENTIFIER '.' IDENTIFIER;

list values [nullable: false] = value;
choice value = SINGLEQUOTEDSTRING | DOUBLEQUOTEDSTRING | IDENTIFIER | subRule;
choice subRule = listSubrule | choiceSubrule | sequenceSubrule;
// (a b)*
sequence listSubrule = '(' values ')' '*';
// (a | b)
list choiceSubrule [nullable: false] = '(' value '|' ')';
// (a b? c)
list sequenceSubrule [nullable: false] = '(' sequenceItem ')';
"#;

/// Build the grammar definition language directly, without parsing anything.
pub fn bootstrap_grammar() -> Result<Grammar, DefinitionError> {
    let mut g = Grammar::new(GRAMMAR_DEFINITION_NAME);
    g.set_case_insensitive(true);
    g.add_default_tokens()?;
    g.set_start_rule("langdef");

    let req = SequenceItem::required;
    let opt = SequenceItem::optional;

    let language = g.keyword("language")?;
    g.add_sequence(
        "langdef",
        vec![
            req(&language),
            req("IDENTIFIER"),
            opt("options"),
            req("definitions"),
        ],
    )?;
    let lsquare = g.keyword("[")?;
    let comma = g.keyword(",")?;
    let rsquare = g.keyword("]")?;
    g.add_list(
        "options",
        ListMatcher::new("option")
            .pre(&lsquare)
            .separator(&comma)
            .post(&rsquare),
    )?;
    g.add_choice("option", &["valueoption", "IDENTIFIER"])?;
    let colon = g.keyword(":")?;
    g.add_sequence(
        "valueoption",
        vec![req("IDENTIFIER"), req(&colon), req("optionvalue")],
    )?;
    g.add_choice(
        "optionvalue",
        &[
            "SINGLEQUOTEDSTRING",
            "DOUBLEQUOTEDSTRING",
            "INTEGER",
            "IDENTIFIER",
        ],
    )?;
    let semi = g.keyword(";")?;
    g.add_list(
        "definitions",
        ListMatcher::new("definition")
            .separator(&semi)
            .nullable(false)
            .allow_trailing(true),
    )?;
    g.add_choice(
        "definition",
        &[
            "tokenDef",
            "choiceDef",
            "sequenceDef",
            "listDef",
            "setDef",
            "opDef",
            "importDef",
        ],
    )?;

    // Every definition starts `kind name options? =`.
    let eq = g.keyword("=")?;
    let header = |g: &mut Grammar, kind: &str| -> Result<Vec<SequenceItem>, DefinitionError> {
        let kw = g.keyword(kind)?;
        Ok(vec![
            req(&kw),
            req("IDENTIFIER"),
            opt("options"),
            req(&eq),
        ])
    };

    let mut items = header(&mut g, "token")?;
    items.push(req("REGULAREXPRESSION"));
    g.add_sequence("tokenDef", items)?;

    let mut items = header(&mut g, "choice")?;
    items.push(req("choices"));
    g.add_sequence("choiceDef", items)?;
    let bar = g.keyword("|")?;
    g.add_list(
        "choices",
        ListMatcher::new("value").separator(&bar).nullable(false),
    )?;

    let mut items = header(&mut g, "sequence")?;
    items.push(req("sequenceItems"));
    g.add_sequence("sequenceDef", items)?;
    g.add_list(
        "sequenceItems",
        ListMatcher::new("sequenceItem").nullable(false),
    )?;
    g.add_sequence(
        "sequenceItemName",
        vec![req("IDENTIFIER"), req(&colon)],
    )?;
    let question = g.keyword("?")?;
    g.add_sequence(
        "sequenceItem",
        vec![opt("sequenceItemName"), req("value"), opt(&question)],
    )?;

    let mut items = header(&mut g, "list")?;
    items.push(req("values"));
    g.add_sequence("listDef", items)?;

    let mut items = header(&mut g, "set")?;
    let using = g.keyword("using")?;
    items.extend([req("choices"), opt(&using), opt("values")]);
    g.add_sequence("setDef", items)?;

    let mut items = header(&mut g, "operator")?;
    items.extend([req("value"), req("value")]);
    g.add_sequence("opDef", items)?;

    let mut items = header(&mut g, "import")?;
    let dot = g.keyword(".")?;
    items.extend([req("IDENTIFIER"), req(&dot), req("IDENTIFIER")]);
    g.add_sequence("importDef", items)?;

    g.add_list("values", ListMatcher::new("value").nullable(false))?;
    g.add_choice(
        "value",
        &[
            "SINGLEQUOTEDSTRING",
            "DOUBLEQUOTEDSTRING",
            "IDENTIFIER",
            "subRule",
        ],
    )?;
    g.add_choice(
        "subRule",
        &["listSubrule", "choiceSubrule", "sequenceSubrule"],
    )?;
    let lparen = g.keyword("(")?;
    let rparen = g.keyword(")")?;
    let star = g.keyword("*")?;
    g.add_sequence(
        "listSubrule",
        vec![req(&lparen), req("values"), req(&rparen), req(&star)],
    )?;
    g.add_list(
        "choiceSubrule",
        ListMatcher::new("value")
            .pre(&lparen)
            .separator(&bar)
            .post(&rparen)
            .nullable(false),
    )?;
    g.add_list(
        "sequenceSubrule",
        ListMatcher::new("sequenceItem")
            .pre(&lparen)
            .post(&rparen)
            .nullable(false),
    )?;

    g.validate()?;
    Ok(g)
}
