use metaschema_metapath::model::{assembly, document, field, flag};
use metaschema_metapath::{DynamicContext, Error, ErrorCode, ErrorKind, Item, compile_metapath};
use rstest::rstest;

#[rstest]
fn enum_roundtrip_known() {
    let codes = [
        ErrorCode::MPST0003,
        ErrorCode::MPST0017,
        ErrorCode::MPTY0004,
        ErrorCode::MPDY0002,
        ErrorCode::FOAR0001,
        ErrorCode::FORG0001,
        ErrorCode::FORX0002,
        ErrorCode::FOJS0003,
    ];
    for c in codes {
        assert_eq!(ErrorCode::from_code(c.as_str()), c);
        assert_eq!(ErrorCode::from_code(&c.to_string()), c);
    }
}

#[rstest]
fn enum_unknown_fallback() {
    assert_eq!(ErrorCode::from_code("err:DOESNOTEXIST"), ErrorCode::Unknown);
}

#[rstest]
#[case::static_code(ErrorCode::MPST0008, ErrorKind::Static)]
#[case::cast(ErrorCode::FORG0001, ErrorKind::Cast)]
#[case::axis(ErrorCode::MPTY0020, ErrorKind::AxisNavigation)]
#[case::dynamic_type(ErrorCode::MPTY0004, ErrorKind::DynamicType)]
#[case::dynamic(ErrorCode::MPDY0002, ErrorKind::Dynamic)]
fn codes_map_to_kinds(#[case] code: ErrorCode, #[case] kind: ErrorKind) {
    assert_eq!(Error::from_code(code, "x").kind(), kind);
}

#[rstest]
fn format_code_is_prefixed() {
    let err = Error::from_code(ErrorCode::FOAR0001, "division by zero");
    assert_eq!(err.format_code(), "err:FOAR0001");
    assert!(err.to_string().contains("division by zero"));
}

#[rstest]
#[case::unbalanced("(1, 2")]
#[case::dangling_operator("1 +")]
#[case::empty("")]
#[case::bad_token("1 ? ? 2")]
fn syntax_errors_are_static(#[case] expr: &str) {
    let err = compile_metapath(expr).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPST0003);
    assert_eq!(err.kind(), ErrorKind::Static);
}

#[rstest]
#[case::unknown_function("nope()", ErrorCode::MPST0017)]
#[case::wrong_arity("upper-case('a', 'b')", ErrorCode::MPST0017)]
#[case::unknown_prefix("foo:bar()", ErrorCode::MPST0081)]
#[case::unknown_variable("$x", ErrorCode::MPST0008)]
fn static_errors(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(compile_metapath(expr).unwrap_err().code, code);
}

fn eval_err(expr: &str, focus: Option<Item>) -> Error {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate(focus, &mut DynamicContext::default()).unwrap_err()
}

#[rstest]
#[case::context_item(".")]
#[case::relative_path("title")]
#[case::position("position()")]
#[case::zero_arg_string("string()")]
fn missing_focus_is_reported(#[case] expr: &str) {
    assert_eq!(eval_err(expr, None).code, ErrorCode::MPDY0002);
}

#[rstest]
fn path_over_atomic_sequence() {
    assert_eq!(eval_err("(1, 2)/title", None).code, ErrorCode::MPTY0019);
}

#[rstest]
fn assembly_without_value_has_no_typed_value() {
    let doc = document().child(assembly("a").flag(flag("id", "x"))).build();
    let err = eval_err("data(/a)", Some(Item::Node(doc)));
    assert_eq!(err.code, ErrorCode::FOTY0012);
}

#[rstest]
fn function_items_cannot_be_atomized() {
    assert_eq!(eval_err("data(upper-case#1)", None).code, ErrorCode::FOTY0013);
}

#[rstest]
#[case::default_code("error()", ErrorCode::FOER0000)]
#[case::known_code("error('err:FORG0001')", ErrorCode::FORG0001)]
#[case::eqname_code("error('Q{http://www.w3.org/2005/xqt-errors}FOAR0001', 'custom')", ErrorCode::FOAR0001)]
#[case::unknown_code("error('err:MY0001')", ErrorCode::Unknown)]
fn error_function_raises_codes(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(eval_err(expr, None).code, code);
}

#[rstest]
fn error_function_keeps_description() {
    let err = eval_err("error('err:FOER0000', 'stop here')", None);
    assert_eq!(err.message, "stop here");
}

#[rstest]
fn typed_value_of_field_is_preserved() {
    let doc = document().child(assembly("a").child(field("n", 2_i64))).build();
    let compiled = compile_metapath("/a/n * 2").unwrap();
    let out = compiled
        .evaluate_string(Some(Item::Node(doc)), &mut DynamicContext::default())
        .unwrap();
    assert_eq!(out, "4");
}
