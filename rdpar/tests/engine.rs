use rdgrammar::{Registry, Span, Value};
use rdpar::{
    EngineError, GRAMMAR_DEFINITION_NAME, GRAMMAR_DEFINITION_SOURCE, MemoPolicy, ParseErrorKind,
    ParserBuilder, ParserOptions, bootstrap_grammar, get_grammar, load_grammar, parse,
};

const EXPR: &str = r"
language test4 [usedefaulttokens, startsymbol: expr, maxdepth: 50]
token number = /\d+/;
operator mul = '*' expr;
operator add [right] = '+' expr;
sequence paren = '(' expr ')';
choice expr = add | mul | number | paren;
";

fn parse_error(r: Result<rdpar::Node, EngineError>) -> rdpar::ParseError {
    match r {
        Err(EngineError::Parse(e)) => e,
        r => panic!("Expected a parse error, got {:?}", r),
    }
}

#[test]
fn self_hosting_fixed_point() {
    let mut reg = Registry::new();
    let mut prev = bootstrap_grammar().unwrap();
    for _ in 0..3 {
        // Each round parses the definition with the grammar the previous round registered.
        let g = load_grammar(&mut reg, GRAMMAR_DEFINITION_SOURCE).unwrap();
        assert_eq!(g.name(), GRAMMAR_DEFINITION_NAME);
        assert!(g.equivalent(&prev));
        prev = (*g).clone();
    }
    assert_eq!(reg.len(), 1);
}

#[test]
fn deterministic_parses() {
    let mut reg = Registry::new();
    let g = load_grammar(&mut reg, EXPR).unwrap();
    let a = parse(&reg, &g, "1 + (2 + 3) * 4", None).unwrap();
    let b = parse(&reg, &g, "1 + (2 + 3) * 4", None).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn operators_from_text() {
    let mut reg = Registry::new();
    let g = load_grammar(&mut reg, EXPR).unwrap();
    let ast = parse(&reg, &g, "(1 + 2) + 3", None).unwrap();
    assert_eq!(ast.to_string(), "(add '+' (paren (add '+' '1' '2')) '3')");
    let ast = parse(&reg, &g, "1 + (2 + 3) * 4 * (5 * 6)", None).unwrap();
    assert_eq!(
        ast.to_string(),
        "(add '+' '1' (mul '*' (mul '*' (paren (add '+' '2' '3')) '4') (paren (mul '*' '5' '6'))))"
    );
    assert_eq!(ast.get(2).unwrap().source(), "(2 + 3) * 4 * (5 * 6)");
}

#[test]
fn sugar_subrules() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "language sugar [usedefaulttokens, startsymbol: test]
         sequence test = 'sublist' ids: (IDENTIFIER)* '>'
                         'subchoice' string: (SINGLEQUOTEDSTRING | IDENTIFIER)
                         'subcomp' jatoch: ('maybe'? IDENTIFIER);",
    )
    .unwrap();
    let ast = parse(
        &reg,
        &g,
        "sublist bla boe > subchoice 'hoi' subcomp zeker",
        None,
    )
    .unwrap();
    assert_eq!(
        ast.to_string(),
        "(test (subrule_1 'bla' 'boe') ''hoi'' (subrule_3 - 'zeker'))"
    );
    assert_eq!(ast.get_label("string").unwrap().value(), Some(Value::Str("hoi".to_owned())));
    assert!(ast.has("jatoch"));
    assert_eq!(ast.find_text(0), Some("bla"));
}

#[test]
fn malformed_grammars_report_positions() {
    let mut reg = Registry::new();
    let e = match load_grammar(&mut reg, "language x\ntoken a = ;") {
        Err(EngineError::Parse(e)) => e,
        r => panic!("Expected a parse error, got {:?}", r),
    };
    assert_eq!(e.kind, ParseErrorKind::UnexpectedInput(';'));
    assert_eq!((e.line, e.column), (2, 11));
    assert_eq!(e.expected, vec!["REGULAREXPRESSION"]);
    assert!(!reg.contains("x"));
}

#[test]
fn error_locality() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "language x [startsymbol: x] token ws [whitespace] = /\\s+/; choice x = 'x';",
    )
    .unwrap();
    let e = parse_error(parse(&reg, &g, "x x", None));
    assert_eq!(e.kind, ParseErrorKind::TrailingInput);
    assert_eq!((e.line, e.column), (1, 3));
    assert_eq!(e.expected, Vec::<String>::new());
}

#[test]
fn expected_sets() {
    let mut reg = Registry::new();
    let g = load_grammar(&mut reg, EXPR).unwrap();
    let e = parse_error(parse(&reg, &g, "(1 + )", None));
    assert_eq!(e.kind, ParseErrorKind::UnexpectedInput(')'));
    assert_eq!(e.column, 6);
    assert_eq!(e.expected, vec!["number", "'('"]);
    assert_eq!(
        e.to_string(),
        "Unexpected ')' at line 1 column 6:\n1| (1 + )\n        ^\nExpected: number or '('"
    );

    let e = parse_error(parse(&reg, &g, "1 +\n", None));
    assert_eq!(e.kind, ParseErrorKind::UnexpectedEof);
    assert_eq!((e.line, e.column), (2, 1));
}

#[test]
fn verbose_errors_carry_the_rule_stack() {
    let mut reg = Registry::new();
    let g = load_grammar(&mut reg, EXPR).unwrap();
    let e = parse_error(
        ParserBuilder::new(&reg, &g)
            .options(ParserOptions::default().with_verbose(true))
            .parse("(1"),
    );
    let stack = e.stack.clone().unwrap();
    assert_eq!(stack.first().map(|(r, _)| r.as_str()), Some("expr"));
    assert!(stack.iter().any(|(r, alt)| r == "paren" && *alt == 1));
    assert!(e.to_string().contains("\nRule stack:\n"));
}

#[test]
fn memoisation_policies_agree() {
    let mut reg = Registry::new();
    let g = load_grammar(&mut reg, EXPR).unwrap();
    for input in ["1 + (2 + 3) * 4 * (5 * 6)", "((1) * 2", "1 2"] {
        let mut results = [MemoPolicy::Disabled, MemoPolicy::Terminals]
            .into_iter()
            .map(|p| {
                ParserBuilder::new(&reg, &g)
                    .options(ParserOptions::default().with_memo_policy(p))
                    .parse(input)
                    .map_err(|e| e.to_string())
            })
            .collect::<Vec<_>>();
        let b = results.pop().unwrap();
        let a = results.pop().unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn depth_limits() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        &EXPR.replace("maxdepth: 50", "maxdepth: 10"),
    )
    .unwrap();
    let e = parse_error(parse(&reg, &g, "((((1))))", None));
    assert_eq!(e.kind, ParseErrorKind::DepthExceeded(10));
    assert!(e.to_string().starts_with("Maximum rule nesting depth (10) exceeded"));

    let ast = ParserBuilder::new(&reg, &g)
        .options(ParserOptions::default().with_max_depth(100))
        .parse("((((1))))")
        .unwrap();
    assert_eq!(ast.all_texts(), vec!["1"]);
}

#[test]
fn zero_length_list_items() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "language loop [startsymbol: l] token maybe = /a*/; list l = maybe;",
    )
    .unwrap();
    match parse(&reg, &g, "aab", None) {
        Err(EngineError::Definition(e)) => {
            assert_eq!(
                e.kind,
                rdgrammar::DefinitionErrorKind::EmptyRepetition {
                    item: "maybe".to_owned()
                }
            );
        }
        r => panic!("{:?}", r),
    }
}

const NUM: &str = r"
language Num [startsymbol: number]
token digits = /\d+/;
sequence number = '-'? digits;
";

#[test]
fn imports() {
    let mut reg = Registry::new();
    load_grammar(&mut reg, NUM).unwrap();
    let g = load_grammar(
        &mut reg,
        "language Pair [usedefaulttokens, startsymbol: pair]
         import n = Num.number;
         sequence pair = left: n ',' right: n;",
    )
    .unwrap();
    let ast = parse(&reg, &g, "-1, 2", None).unwrap();
    assert_eq!(
        ast.to_string(),
        "(pair (n (number '-' '1')) (n (number - '2')))"
    );
    assert_eq!(ast.get_label("left").unwrap().source(), "-1");

    let e = parse_error(parse(&reg, &g, "-1, -", None));
    assert_eq!(e.column, 6);
    assert_eq!(e.expected, vec!["digits"]);
}

#[test]
fn unresolved_imports() {
    let mut reg = Registry::new();
    load_grammar(&mut reg, NUM).unwrap();
    let g = load_grammar(
        &mut reg,
        "language Broken [startsymbol: n] import n = Nowhere.number;",
    )
    .unwrap();
    match parse(&reg, &g, "1", None) {
        Err(EngineError::ImportResolution(e)) => {
            assert_eq!(e.grammar, "Nowhere");
            assert_eq!(e.rule, None);
        }
        r => panic!("{:?}", r),
    }
    let g = load_grammar(
        &mut reg,
        "language Broken [startsymbol: n] import n = Num.nothing;",
    )
    .unwrap();
    match parse(&reg, &g, "1", None) {
        Err(EngineError::ImportResolution(e)) => {
            assert_eq!(e.grammar, "Num");
            assert_eq!(e.rule.as_deref(), Some("nothing"));
        }
        r => panic!("{:?}", r),
    }
}

#[test]
fn registry_lookups() {
    let mut reg = Registry::new();
    assert_eq!(get_grammar(&reg, "Num").unwrap_err().name, "Num");
    let g = load_grammar(&mut reg, NUM).unwrap();
    let h = get_grammar(&reg, "Num").unwrap();
    assert!(g.equivalent(&h));
    let ast = parse(&reg, &h, "12", Some("digits")).unwrap();
    assert_eq!(ast.text(), Some("12"));
}

#[test]
fn match_strings() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        r"language lists [startsymbol: list1]
          token id = /\w+/;
          token ws [whitespace] = /\s+/;
          list list1 = 'other' id 'planet';",
    )
    .unwrap();
    let pb = ParserBuilder::new(&reg, &g);
    assert_eq!(
        pb.parse_match_string("other blaat blaat planet").unwrap(),
        "(list1: other 'blaat' 'blaat' planet)"
    );
    assert_eq!(
        pb.parse("other blaat blaat planet").unwrap().to_string(),
        "(list1 'blaat' 'blaat')"
    );
}

#[test]
fn value_coercion() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "language vals [usedefaulttokens, startsymbol: items]
         list items = item;
         choice item = BOOLEAN | FLOAT | SINGLEQUOTEDSTRING | REGULAREXPRESSION | IDENTIFIER;",
    )
    .unwrap();
    let ast = parse(&reg, &g, r"true 42 -1.5 'it\'s' /a\/b/ name", None).unwrap();
    let vals = ast
        .children()
        .iter()
        .map(|n| n.value().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        vals,
        vec![
            Value::Bool(true),
            Value::Int(42),
            Value::Float(-1.5),
            Value::Str("it's".to_owned()),
            Value::Regex("a/b".to_owned()),
            Value::Raw("name".to_owned()),
        ]
    );
}

#[test]
fn comments_are_whitespace() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "// A grammar with comments.
         language c [usedefaulttokens, startsymbol: ids]
         /* Identifiers,
            separated by commas. */
         list ids = IDENTIFIER ','; // trailing",
    )
    .unwrap();
    let ast = parse(&reg, &g, "a, /* b, */ c // d", None).unwrap();
    assert_eq!(ast.to_string(), "(ids 'a' 'c')");
}

#[test]
fn spans_exclude_trailing_whitespace() {
    let mut reg = Registry::new();
    let g = load_grammar(
        &mut reg,
        "language spans [usedefaulttokens, startsymbol: decl]
         sequence decl = 'let' IDENTIFIER init?;
         sequence init = '=' INTEGER;
         sequence call = IDENTIFIER args;
         list args = IDENTIFIER;
         list items = item ',';
         sequence item = IDENTIFIER INTEGER?;",
    )
    .unwrap();

    let ast = parse(&reg, &g, "let a  // done\n", None).unwrap();
    assert_eq!(ast.source(), "let a");
    assert_eq!(ast.span(), Span::new(0, 5));
    let ast = parse(&reg, &g, "let a = 1 ", None).unwrap();
    assert_eq!(ast.source(), "let a = 1");

    let ast = parse(&reg, &g, "f /* no args */ ", Some("call")).unwrap();
    assert_eq!(ast.source(), "f");
    assert_eq!(ast.span(), Span::new(0, 1));

    let ast = parse(&reg, &g, "a 1, b  /* c */ ", Some("items")).unwrap();
    assert_eq!(ast.source(), "a 1, b");
    assert_eq!(ast.get(0).unwrap().source(), "a 1");
    assert_eq!(ast.get(1).unwrap().source(), "b");
}
