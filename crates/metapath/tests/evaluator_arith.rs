use metaschema_metapath::{AtomicValue, DynamicContext, ErrorKind, Item, compile_metapath};
use rstest::rstest;

fn eval_string(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate_string(None, &mut DynamicContext::default()).unwrap()
}

fn eval_err_code(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(None, &mut DynamicContext::default())
        .unwrap_err()
        .format_code()
}

#[rstest]
#[case::add("1 + 2", "3")]
#[case::sub("10 - 4", "6")]
#[case::mul("6 * 7", "42")]
#[case::div_widens_to_decimal("7 div 2", "3.5")]
#[case::div_exact("10 div 4", "2.5")]
#[case::idiv_truncates("7 idiv -2", "-3")]
#[case::mod_sign_follows_dividend("-7 mod 3", "-1")]
#[case::mod_positive("7 mod -3", "1")]
#[case::decimal_add("0.1 + 0.2", "0.3")]
#[case::unary_minus("-(3 - 5)", "2")]
#[case::double_mixed("1.5e0 + 1", "2.5")]
fn numeric_arithmetic(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::double_div_zero("1e0 div 0", "INF")]
#[case::double_neg_div_zero("-1e0 div 0", "-INF")]
#[case::double_nan("0e0 div 0", "NaN")]
fn double_division_follows_ieee(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::integer_div("1 div 0")]
#[case::integer_idiv("1 idiv 0")]
#[case::integer_mod("1 mod 0")]
#[case::decimal_div("1.0 div 0.0")]
#[case::double_idiv("1e0 idiv 0")]
fn division_by_zero_is_an_error(#[case] expr: &str) {
    let compiled = compile_metapath(expr).unwrap();
    let err = compiled.evaluate(None, &mut DynamicContext::default()).unwrap_err();
    assert_eq!(err.format_code(), "err:FOAR0001");
    assert_eq!(err.kind(), ErrorKind::DynamicType);
}

#[rstest]
#[case::left("() + 1")]
#[case::right("1 * ()")]
#[case::both("() - ()")]
fn empty_operand_yields_empty(#[case] expr: &str) {
    let compiled = compile_metapath(expr).unwrap();
    let out = compiled.evaluate(None, &mut DynamicContext::default()).unwrap();
    assert!(out.is_empty());
}

#[rstest]
#[case::date_difference("date('2025-01-01') - date('2024-01-01')", "P366D")]
#[case::date_plus_days("date('2024-02-28') + xs:dayTimeDuration('P2D')", "2024-03-01")]
#[case::month_end_clamps("date('2024-01-31') + xs:yearMonthDuration('P1M')", "2024-02-29")]
#[case::duration_scaled("xs:dayTimeDuration('PT1H') * 2", "PT2H")]
#[case::duration_sum("xs:yearMonthDuration('P1Y') + xs:yearMonthDuration('P2M')", "P1Y2M")]
#[case::duration_ratio("xs:dayTimeDuration('P1D') div xs:dayTimeDuration('PT12H')", "2")]
fn temporal_arithmetic(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[test]
fn untyped_operands_compute_as_double() {
    assert_eq!(eval_string("xs:untypedAtomic('2') * 3"), "6");
    let compiled = compile_metapath("xs:untypedAtomic('2') * 3").unwrap();
    let value = compiled
        .evaluate_single(None, &mut DynamicContext::default())
        .unwrap()
        .unwrap();
    assert!(matches!(value, Item::Atomic(AtomicValue::Double(d)) if d == 6.0));
}

#[rstest]
#[case::string_operand("'a' + 1")]
#[case::boolean_operand("true() * 2")]
#[case::date_plus_date("date('2024-01-01') + date('2024-01-01')")]
fn incompatible_operands_are_type_errors(#[case] expr: &str) {
    assert_eq!(eval_err_code(expr), "err:MPTY0004");
}

#[test]
fn sequence_operand_is_a_type_error() {
    assert_eq!(eval_err_code("(1, 2) + 1"), "err:MPTY0004");
}

#[test]
fn integer_overflow_is_reported() {
    assert_eq!(eval_err_code("9223372036854775807 + 1"), "err:FOAR0002");
}
