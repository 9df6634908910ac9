use std::sync::Arc;

use metaschema_metapath::{
    AtomicValue, DynamicContext, DynamicContextBuilder, Sequence, StaticContextBuilder, compile_metapath,
    compile_metapath_with_context,
};
use rstest::rstest;

fn eval_strings(expr: &str) -> Vec<String> {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(None, &mut DynamicContext::default())
        .unwrap()
        .iter()
        .map(|i| i.string_value().unwrap())
        .collect()
}

fn eval_string(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate_string(None, &mut DynamicContext::default()).unwrap()
}

#[rstest]
#[case::for_single("for $x in 1 to 3 return $x * 2", vec!["2", "4", "6"])]
#[case::for_multi("for $x in (1, 2), $y in (10, 20) return $x + $y", vec!["11", "21", "12", "22"])]
#[case::for_dependent("for $x in 1 to 3, $y in $x to 3 return $y", vec!["1", "2", "3", "2", "3", "3"])]
#[case::let_chain("let $a := 2, $b := $a * 3 return $b + $a", vec!["8"])]
#[case::let_shadowing("let $x := 1 return (let $x := 2 return $x, $x)", vec!["2", "1"])]
#[case::simple_map("(1, 2, 3) ! (. * .)", vec!["1", "4", "9"])]
#[case::simple_map_position("('a', 'b') ! position()", vec!["1", "2"])]
#[case::arrow("'abc' => upper-case()", vec!["ABC"])]
#[case::arrow_chain("'  a b ' => normalize-space() => string-length()", vec!["3"])]
#[case::arrow_with_args("'a-b-c' => tokenize('-')", vec!["a", "b", "c"])]
fn binding_expressions(#[case] expr: &str, #[case] expected: Vec<&str>) {
    assert_eq!(eval_strings(expr), expected);
}

#[rstest]
#[case::some_true("some $x in (1, 2, 3) satisfies $x > 2", true)]
#[case::some_empty("some $x in () satisfies true()", false)]
#[case::every_true("every $x in (1, 2, 3) satisfies $x > 0", true)]
#[case::every_false("every $x in (1, 2, 3) satisfies $x > 1", false)]
#[case::every_empty("every $x in () satisfies false()", true)]
#[case::multi_binding("some $x in (1, 2), $y in (2, 3) satisfies $x = $y", true)]
fn quantified_expressions(#[case] expr: &str, #[case] expected: bool) {
    let compiled = compile_metapath(expr).unwrap();
    assert_eq!(
        compiled.evaluate_boolean(None, &mut DynamicContext::default()).unwrap(),
        expected
    );
}

#[rstest]
#[case::inline_call("let $f := function($x) { $x + 1 } return $f(41)", "42")]
#[case::typed_params("let $f := function($a as xs:integer, $b as xs:integer) as xs:integer { $a * $b } return $f(6, 7)", "42")]
#[case::closure_capture("let $n := 10, $f := function($x) { $x + $n } return $f(5)", "15")]
#[case::named_reference("let $f := upper-case#1 return $f('x')", "X")]
#[case::higher_order("for-each((1, 2), function($x) { $x * 10 }) => string-join(',')", "10,20")]
#[case::fold("fold-left(1 to 4, 0, function($acc, $x) { $acc + $x })", "10")]
fn function_items(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[test]
fn inline_function_argument_is_coerced() {
    let compiled = compile_metapath("let $f := function($x as xs:string) { $x } return $f(1)").unwrap();
    let err = compiled.evaluate(None, &mut DynamicContext::default()).unwrap_err();
    assert_eq!(err.format_code(), "err:MPTY0004");
}

#[test]
fn unbound_variable_is_a_static_error() {
    let err = compile_metapath("$missing + 1").unwrap_err();
    assert_eq!(err.format_code(), "err:MPST0008");
}

#[test]
fn external_variables_are_visible() {
    let static_ctx = Arc::new(StaticContextBuilder::new().with_variable("limit").build());
    let compiled = compile_metapath_with_context("(1 to 10)[. > $limit]", &static_ctx).unwrap();
    let mut ctx = DynamicContextBuilder::new()
        .with_static_context(Arc::clone(&static_ctx))
        .with_variable("limit", Sequence::of(AtomicValue::Integer(7)))
        .build();
    let out = compiled.evaluate(None, &mut ctx).unwrap();
    assert_eq!(out.size(), 3);
}

#[test]
fn bindings_do_not_leak_between_evaluations() {
    let compiled = compile_metapath("let $x := 5 return $x").unwrap();
    let mut ctx = DynamicContext::default();
    for _ in 0..3 {
        assert_eq!(compiled.evaluate_string(None, &mut ctx).unwrap(), "5");
    }
}
