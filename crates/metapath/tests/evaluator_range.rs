use metaschema_metapath::{AtomicValue, DynamicContext, Item, compile_metapath};
use rstest::rstest;

fn integers(expr: &str) -> Vec<i64> {
    let compiled = compile_metapath(expr).unwrap();
    let out = compiled.evaluate(None, &mut DynamicContext::default()).unwrap();
    out.iter()
        .map(|item| match item {
            Item::Atomic(AtomicValue::Integer(i)) => *i,
            other => panic!("expected integer, got {other:?}"),
        })
        .collect()
}

#[rstest]
#[case::upward("2 to 5", vec![2, 3, 4, 5])]
#[case::single("3 to 3", vec![3])]
#[case::downward_empty("5 to 2", vec![])]
#[case::empty_operand("() to 2", vec![])]
#[case::negative("-2 to 0", vec![-2, -1, 0])]
#[case::reversed("reverse(1 to 3)", vec![3, 2, 1])]
fn range_to_operator(#[case] expr: &str, #[case] expected: Vec<i64>) {
    assert_eq!(integers(expr), expected);
}

#[test]
fn range_size_counts_members() {
    assert_eq!(integers("count(1 to 1000)"), vec![1000]);
}

#[test]
fn range_accepts_untyped_bounds() {
    let compiled = compile_metapath("xs:untypedAtomic('2') to 4").unwrap();
    let out = compiled.evaluate(None, &mut DynamicContext::default()).unwrap();
    assert_eq!(out.size(), 3);
}

#[test]
fn range_rejects_non_integer_bounds() {
    let compiled = compile_metapath("1.5 to 3").unwrap();
    let err = compiled.evaluate(None, &mut DynamicContext::default()).unwrap_err();
    assert_eq!(err.format_code(), "err:MPTY0004");
}
