mod common;

use formula_expr::{ErrorKind, Parser, Type, Value};
use pretty_assertions::assert_eq;

use common::{library, registry};

fn parser() -> Parser {
    Parser::new(registry()).with_context(library("ada", 3))
}

fn eval(formula: &str) -> Value {
    parser().compile(formula).unwrap().evaluate().unwrap()
}

fn error_kind(formula: &str) -> ErrorKind {
    parser().parse(formula).unwrap_err().kind
}

#[test]
fn unqualified_names_bind_to_context_members() {
    assert_eq!(eval("Name"), Value::from("ada"));
    assert_eq!(eval("Count + 1"), Value::Int(4));
    assert_eq!(parser().parse("Name").unwrap().ty, Type::Text);
}

#[test]
fn dotted_name_and_chained_access_resolve_identically() {
    let mut parser = parser();
    let dotted = parser.parse("Inner.B").unwrap();
    let chained = parser.parse("Inner . B").unwrap();
    let grouped = parser.parse("(Inner).B").unwrap();

    assert_eq!(dotted.to_string(), "Inner.B");
    assert_eq!(chained.to_string(), dotted.to_string());
    assert_eq!(grouped.to_string(), dotted.to_string());
    assert_eq!(chained.ty, Type::Int);
    assert_eq!(eval("Inner.B"), Value::Int(30));
    assert_eq!(eval("(Inner).B"), Value::Int(30));
}

#[test]
fn overloads_are_matched_by_exact_parameter_types() {
    assert_eq!(eval("Scale(2)"), Value::Int(6));
    assert_eq!(eval("Scale(2.5)"), Value::Double(7.5));
    assert_eq!(parser().parse("Scale(2)").unwrap().ty, Type::Int);
    assert_eq!(parser().parse("Scale(2.5)").unwrap().ty, Type::Double);

    // No widening from float to double, no parsing of strings.
    assert_eq!(error_kind("Scale(2.5f)"), ErrorKind::NoMatchingMethod);
    assert_eq!(error_kind("Scale(\"2\")"), ErrorKind::NoMatchingMethod);
    assert_eq!(error_kind("Scale(1, 2)"), ErrorKind::NoMatchingMethod);
}

#[test]
fn no_matching_method_names_the_attempted_signature() {
    let err = parser().parse("Scale(2.5f)").unwrap_err();
    assert!(err.message.contains("(float)"), "{}", err.message);
    assert_eq!(err.span.range(), 0..5);

    let err = parser().parse("Missing(1, \"a\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoMatchingMethod);
    assert!(err.message.contains("Missing(int, string)"), "{}", err.message);
}

#[test]
fn zero_argument_calls() {
    assert_eq!(eval("Greet()"), Value::from("hello ada"));
    assert_eq!(eval("Greet().Length"), Value::Int(9));
    assert_eq!(eval("Greet( )"), Value::from("hello ada"));
    assert_eq!(error_kind("Greet(1)"), ErrorKind::NoMatchingMethod);
}

#[test]
fn dotted_method_prefix_walks_context_members() {
    assert_eq!(eval("Inner.Twice(4)"), Value::Int(8));
    assert_eq!(eval("Inner.Twice(Inner.B)"), Value::Int(60));
    assert_eq!(eval("Greet().ToUpper()"), Value::from("HELLO ADA"));
}

#[test]
fn indexers_on_context_and_members() {
    assert_eq!(eval("[2]"), Value::Int(5));
    assert_eq!(eval("[\"k\"]"), Value::from("ada:k"));
    assert_eq!(eval("Items[1]"), Value::Int(20));
    assert_eq!(eval("Items[1] + Items.Count"), Value::Int(23));
    assert_eq!(eval("Name[0]"), Value::from("a"));
    assert_eq!(error_kind("Items[1.0]"), ErrorKind::NoMatchingIndexer);
    assert_eq!(error_kind("Items[1, 2]"), ErrorKind::NoMatchingIndexer);
    assert_eq!(error_kind("Count[1]"), ErrorKind::NoMatchingIndexer);
}

#[test]
fn indexer_failures_surface_at_evaluation() {
    let compiled = parser().compile("Items[7]").unwrap();
    let err = compiled.evaluate().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("index 7 is out of range"), "{}", err.message);
}

#[test]
fn static_members_use_longest_type_prefix() {
    assert_eq!(eval("Test.Units.Meter"), Value::Double(1.0));
    assert_eq!(eval("Test.Units"), Value::Int(7));
    assert_eq!(eval("Test.Units.Convert(2.0)"), Value::Double(200.0));
    assert_eq!(eval("Math.PI"), Value::Double(std::f64::consts::PI));
    assert_eq!(eval("int.MaxValue"), Value::Int(i32::MAX));
    assert_eq!(
        eval("Math.Pow(2.0, 3.0).ToString()"),
        Value::from("8")
    );
}

#[test]
fn statics_do_not_need_a_context() {
    let mut parser = Parser::new(registry());
    let value = parser.compile("Math.Max(2, 9)").unwrap().evaluate().unwrap();
    assert_eq!(value, Value::Int(9));
}

#[test]
fn unqualified_lookups_fail_without_a_context() {
    let mut parser = Parser::new(registry());
    for formula in ["Name", "Greet()", "[1]"] {
        let err = parser.parse(formula).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoContext, "{formula}");
    }
}

#[test]
fn unknown_names_point_at_the_unresolved_segment() {
    let err = parser().parse("1 + Nope").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.span.range(), 4..8);

    let err = parser().parse("Inner.Nope").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.span.range(), 6..10);

    let err = parser().parse("Test.Units.Yard").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.span.range(), 11..15);

    // A void result has no members.
    assert_eq!(error_kind("Nothing().X"), ErrorKind::NotFound);
}

#[test]
fn evaluation_is_left_to_right() {
    let mut parser = parser();
    let compiled = parser.compile("Next() * 10 + Next()").unwrap();
    assert_eq!(compiled.evaluate().unwrap(), Value::Int(12));
    // The context's state is observed on every evaluation.
    assert_eq!(compiled.evaluate().unwrap(), Value::Int(34));
}

#[test]
fn parsing_twice_gives_equivalent_evaluators() {
    let mut parser = parser();
    let first = parser.compile("Scale(3) + Count * Inner.B").unwrap();
    let second = parser.compile("Scale(3) + Count * Inner.B").unwrap();
    assert_eq!(first.evaluate().unwrap(), second.evaluate().unwrap());
    assert_eq!(first.evaluate().unwrap(), Value::Int(99));
}

#[test]
fn evaluate_with_uses_a_fresh_context_of_the_same_type() {
    let compiled = parser().compile("Count * 2 + Inner.B").unwrap();
    assert_eq!(compiled.evaluate().unwrap(), Value::Int(36));
    assert_eq!(
        compiled.evaluate_with(&library("bob", 5)).unwrap(),
        Value::Int(60)
    );

    let other = formula_expr::Object::new("Test.Inner", common::Inner { b: 1 });
    let err = compiled.evaluate_with(&other).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
}

#[test]
fn host_errors_become_runtime_errors_with_the_node_span() {
    let compiled = parser().compile("1 + Fail()").unwrap();
    let err = compiled.evaluate().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.span.range(), 4..10);
    assert!(err.message.contains("boom"), "{}", err.message);
}

#[test]
fn display_reparses_to_the_same_tree() {
    let mut parser = parser();
    for formula in [
        "Inner.B + Scale(2) * [1]",
        "-Items.Count",
        "Items[Count - 2] << 1",
        "Test.Units.Convert(Math.PI) > 1.0",
        "(-Count).ToString()",
        "-(Inner).Twice(Count)",
        "!(Name).Contains(\"d\") || -(\"abc\").Length < 0",
        "!(Count = 3) && \"a\\\"b\".Contains(Name)",
    ] {
        let tree = parser.parse(formula).unwrap();
        let printed = tree.to_string();
        let reparsed = parser.parse(&printed).unwrap();
        assert_eq!(reparsed.to_string(), printed, "{formula}");
        assert_eq!(reparsed.ty, tree.ty, "{formula}");
    }
}
