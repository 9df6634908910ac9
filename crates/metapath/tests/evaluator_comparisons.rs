use metaschema_metapath::model::{assembly, document, field};
use metaschema_metapath::{DynamicContext, Item, compile_metapath};
use rstest::rstest;

fn eval_bool(expr: &str) -> bool {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate_boolean(None, &mut DynamicContext::default()).unwrap()
}

fn eval_err_code(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(None, &mut DynamicContext::default())
        .unwrap_err()
        .format_code()
}

#[rstest]
#[case::eq_int("1 eq 1", true)]
#[case::eq_mixed_numeric("1 eq 1.0", true)]
#[case::eq_double("1 eq 1e0", true)]
#[case::ne("'a' ne 'b'", true)]
#[case::lt_string("'abc' lt 'abd'", true)]
#[case::ge_decimal("2.5 ge 2", true)]
#[case::boolean_order("false() lt true()", true)]
#[case::date_order("date('2024-01-01') lt date('2024-06-01')", true)]
#[case::duration_equal("xs:dayTimeDuration('PT24H') eq xs:dayTimeDuration('P1D')", true)]
#[case::nan_not_equal("(0e0 div 0) eq (0e0 div 0)", false)]
#[case::nan_ne("(0e0 div 0) ne (0e0 div 0)", true)]
fn value_comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(eval_bool(expr), expected);
}

#[test]
fn value_comparison_with_empty_operand_is_empty() {
    let compiled = compile_metapath("() eq 1").unwrap();
    let out = compiled.evaluate(None, &mut DynamicContext::default()).unwrap();
    assert!(out.is_empty());
}

#[rstest]
#[case::sequence_operand("(1, 2) eq 1")]
#[case::incomparable_types("1 eq 'a'")]
#[case::ordered_duration_mix("xs:yearMonthDuration('P1M') lt xs:dayTimeDuration('P1D')")]
fn value_comparison_type_errors(#[case] expr: &str) {
    assert_eq!(eval_err_code(expr), "err:MPTY0004");
}

#[rstest]
#[case::existential("(1, 2) = 2", true)]
#[case::existential_none("(1, 2) = 3", false)]
#[case::both_sequences("(1, 2) = (3, 2)", true)]
#[case::ne_existential("(1, 1) != 1", false)]
#[case::empty_is_false("() = ()", false)]
#[case::untyped_vs_number("xs:untypedAtomic('10') = 10", true)]
#[case::untyped_vs_string("xs:untypedAtomic('10') = '10'", true)]
#[case::untyped_vs_untyped("xs:untypedAtomic('a') < xs:untypedAtomic('b')", true)]
#[case::mixed_duration_equality("xs:yearMonthDuration('P0M') = xs:dayTimeDuration('PT0S')", true)]
fn general_comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(eval_bool(expr), expected);
}

#[test]
fn untyped_cast_failure_in_general_comparison() {
    assert_eq!(eval_err_code("xs:untypedAtomic('abc') = 1"), "err:FORG0001");
}

#[test]
fn comparisons_do_not_chain() {
    assert!(compile_metapath("1 < 2 < 3").is_err());
}

#[test]
fn field_values_compare_through_atomization() {
    let doc = document()
        .child(assembly("catalog").child(field("count", 4_i64)).child(field("label", "four")))
        .build();
    let compiled = compile_metapath("/catalog[count > 3 and label = 'four']").unwrap();
    let out = compiled
        .evaluate(Some(Item::Node(doc)), &mut DynamicContext::default())
        .unwrap();
    assert_eq!(out.size(), 1);
}
