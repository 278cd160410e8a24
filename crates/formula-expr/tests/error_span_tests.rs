use std::sync::Arc;

use formula_expr::{get_value, ErrorKind, ExprError, ParseOptions, Parser, TypeRegistry, Value};
use pretty_assertions::assert_eq;

fn parse_err(formula: &str) -> ExprError {
    Parser::new(Arc::new(TypeRegistry::with_builtins()))
        .parse(formula)
        .unwrap_err()
}

#[track_caller]
fn assert_error(formula: &str, kind: ErrorKind, position: usize, len: usize) {
    let err = parse_err(formula);
    assert_eq!(
        (err.kind, err.position(), err.len()),
        (kind, position, len),
        "{formula}: {err}"
    );
}

#[test]
fn unterminated_constructs() {
    let err = parse_err("(1+2");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.position() >= 4);
    assert!(err.message.contains("`)`"), "{}", err.message);

    assert_error("\"abc", ErrorKind::UnterminatedText, 0, 4);
    assert_error("1 + \"abc\\\"", ErrorKind::UnterminatedText, 4, 6);
    assert_error("Math.Max(1, 2", ErrorKind::Syntax, 13, 1);
}

#[test]
fn lexical_errors() {
    assert_error("1 + $", ErrorKind::InvalidCharacter, 4, 1);
    assert_error("1 <> 2", ErrorKind::InvalidOperator, 2, 2);
    assert_error("1 == 2", ErrorKind::InvalidOperator, 2, 2);
    assert_error("1 => 2", ErrorKind::InvalidOperator, 2, 2);
    assert_error("abc.", ErrorKind::InvalidName, 0, 4);
}

#[test]
fn numeric_format_and_range_errors_are_distinct() {
    assert_error("99999999999", ErrorKind::NumberOverflow, 0, 11);
    assert_error("1e999", ErrorKind::NumberOverflow, 0, 5);
    assert_error("1e50f", ErrorKind::NumberOverflow, 0, 4);
    assert_error("1.5e", ErrorKind::MalformedNumber, 0, 4);
    assert_error("1e5m", ErrorKind::MalformedNumber, 0, 3);
    assert_error("1.0e+5", ErrorKind::MalformedNumber, 0, 4);
    assert_error(
        "99999999999999999999999999999999.0m",
        ErrorKind::NumberOverflow,
        0,
        34,
    );
}

#[test]
fn structural_errors() {
    let err = parse_err("1 2");
    assert_eq!((err.kind, err.position()), (ErrorKind::Syntax, 2));
    assert!(err.message.contains("expected `||` or end of formula"), "{}", err.message);

    assert_error("1 +", ErrorKind::Syntax, 3, 1);
    assert_error(")", ErrorKind::Syntax, 0, 1);
    assert_error("Math.Max(1,)", ErrorKind::Syntax, 11, 1);
    assert_error("Math.Max(1 2)", ErrorKind::Syntax, 11, 1);
    assert_error("(1).", ErrorKind::Syntax, 4, 1);
    assert_error("(1).(2)", ErrorKind::Syntax, 4, 1);
}

#[test]
fn operator_mismatch_points_at_the_operator() {
    assert_error("1 + 2.0", ErrorKind::OperatorMismatch, 2, 1);
    assert_error("1.5f < 1.5", ErrorKind::OperatorMismatch, 5, 1);
    assert_error("-\"x\"", ErrorKind::OperatorMismatch, 0, 1);
    assert_error("!1.0", ErrorKind::OperatorMismatch, 0, 1);
    assert_error("true + false", ErrorKind::OperatorMismatch, 5, 1);
    assert_error("1 << 2.0", ErrorKind::OperatorMismatch, 2, 2);
}

#[test]
fn limits_are_enforced() {
    let registry = Arc::new(TypeRegistry::with_builtins());

    let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
    let err = Parser::new(registry.clone()).parse(&deep).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimit);

    let negations = format!("{}1", "-".repeat(100));
    let err = Parser::new(registry.clone()).parse(&negations).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimit);

    let options = ParseOptions {
        max_formula_len: 8,
        ..ParseOptions::default()
    };
    let mut parser = Parser::new(registry.clone()).with_options(options);
    let err = parser.parse("1 + 2 + 3 + 4").unwrap_err();
    assert_eq!(err.kind, ErrorKind::FormulaTooLong);
    assert!(parser.parse("1 + 2").is_ok());

    let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
    assert!(Parser::new(registry).parse(&shallow).is_ok());
}

#[test]
fn long_operator_chains_hit_the_tree_height_limit() {
    let registry = Arc::new(TypeRegistry::with_builtins());

    let chain = vec!["1"; 4096].join("+");
    assert!(chain.len() <= ParseOptions::default().max_formula_len);
    let err = Parser::new(registry.clone()).compile(&chain).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimit);
    assert_eq!(err.position(), 0);

    let calls = format!("\"a\"{}", ".Trim()".repeat(300));
    let err = Parser::new(registry.clone()).parse(&calls).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimit);

    let short = vec!["1"; 200].join("+");
    assert_eq!(
        get_value(&short, None, &registry).unwrap(),
        Value::Int(200)
    );

    let options = ParseOptions {
        max_tree_height: 4,
        ..ParseOptions::default()
    };
    let mut parser = Parser::new(registry).with_options(options);
    assert!(parser.parse("1 + 2 + 3").is_ok());
    let err = parser.parse("1 + 2 + 3 + 4 + 5").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NestingLimit);
    assert_eq!(err.span.range(), 0..1);
}

#[test]
fn snippet_selects_the_offending_text() {
    let formula = "Math.Pow(2.0, 3)";
    let err = parse_err(formula);
    assert_eq!(err.kind, ErrorKind::NoMatchingMethod);
    assert_eq!(err.snippet(formula), "Pow");

    let formula = "2 * Math.Nope";
    let err = parse_err(formula);
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.snippet(formula), "Nope");
}

#[test]
fn errors_serialize_for_ui_consumers() {
    let err = parse_err("1 + $");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "InvalidCharacter");
    assert_eq!(json["span"]["start"], 4);
    let back: ExprError = serde_json::from_value(json).unwrap();
    assert_eq!(back, err);
}
