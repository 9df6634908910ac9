use metaschema_metapath::{AtomicType, DynamicContext, ErrorCode, ItemType, compile_metapath};
use rstest::rstest;

fn static_type(expr: &str) -> ItemType {
    compile_metapath(expr).unwrap().static_result_type().clone()
}

#[rstest]
#[case::integer_literal("42", AtomicType::Integer)]
#[case::decimal_literal("4.2", AtomicType::Decimal)]
#[case::double_literal("4.2e1", AtomicType::Double)]
#[case::string_literal("'x'", AtomicType::String)]
#[case::integer_sum("1 + 2", AtomicType::Integer)]
#[case::integer_div("1 div 2", AtomicType::Decimal)]
#[case::idiv("7.5 idiv 2", AtomicType::Integer)]
#[case::negate_decimal("-(1.5)", AtomicType::Decimal)]
#[case::range("1 to 3", AtomicType::Integer)]
#[case::comparison("1 = 2", AtomicType::Boolean)]
#[case::quantified("some $x in (1, 2) satisfies $x > 1", AtomicType::Boolean)]
#[case::concat("1 || 2", AtomicType::String)]
#[case::function_return("count((1, 2))", AtomicType::Integer)]
#[case::constructor("meta:date('2024-01-01')", AtomicType::Date)]
#[case::cast("'1' cast as double", AtomicType::Double)]
#[case::date_difference("date('2024-01-02') - date('2024-01-01')", AtomicType::DayTimeDuration)]
#[case::let_body("let $x := 'a' return 1.5", AtomicType::Decimal)]
#[case::homogeneous_sequence("(1, 2, 3)", AtomicType::Integer)]
#[case::numeric_sequence("(1, 2.5)", AtomicType::Decimal)]
fn atomic_static_types(#[case] expr: &str, #[case] expected: AtomicType) {
    assert_eq!(static_type(expr), ItemType::from(expected));
}

#[rstest]
#[case::mixed_sequence("(1, 'a')", ItemType::any_atomic())]
#[case::variable("let $x := 1 return $x", ItemType::AnyItem)]
#[case::path("/catalog/group", ItemType::any_node())]
#[case::inline_function("function() { 1 }", ItemType::AnyFunction)]
#[case::map("map { }", ItemType::Map(None))]
#[case::array("[1, 2]", ItemType::Array(None))]
fn structural_static_types(#[case] expr: &str, #[case] expected: ItemType) {
    assert_eq!(static_type(expr), expected);
}

#[test]
fn static_type_does_not_require_evaluation() {
    let compiled = compile_metapath("1 div 0").unwrap();
    assert_eq!(compiled.static_result_type(), &ItemType::from(AtomicType::Decimal));
    assert_eq!(compiled.text(), "1 div 0");
}

fn instance_of(expr: &str) -> bool {
    compile_metapath(expr)
        .unwrap()
        .evaluate_boolean(None, &mut DynamicContext::default())
        .unwrap()
}

#[rstest]
#[case::one_item_is_not_empty("1 instance of empty-sequence()", false)]
#[case::empty_is_empty("() instance of empty-sequence()", true)]
#[case::one_accepts_one("1 instance of integer", true)]
#[case::one_rejects_empty("() instance of integer", false)]
#[case::one_rejects_many("(1, 2) instance of integer", false)]
#[case::optional_accepts_empty("() instance of integer?", true)]
#[case::optional_rejects_many("(1, 2) instance of integer?", false)]
#[case::star_accepts_empty("() instance of integer*", true)]
#[case::star_accepts_many("(1, 2, 3) instance of integer*", true)]
#[case::plus_rejects_empty("() instance of integer+", false)]
#[case::plus_accepts_many("(1, 2) instance of integer+", true)]
#[case::item_type_checked("(1, 'a') instance of integer*", false)]
fn occurrence_laws(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(instance_of(expr), expected, "{expr}");
}

#[rstest]
#[case::typed_map("map(string, integer*)", "map(meta:string,meta:integer*)")]
#[case::any_map("map(*)", "map(*)")]
#[case::typed_array("array(boolean?)", "array(meta:boolean?)")]
#[case::nested_array("array(array(*)+)", "array(array(*)+)")]
#[case::assembly_with_definition("assembly(control, ctl)", "assembly(control,ctl)")]
#[case::field_wildcard("field(*, title)+", "field(*,title)+")]
#[case::document_test("document-node(assembly(catalog))", "document-node(assembly(catalog))")]
#[case::empty_sequence("empty-sequence()", "empty-sequence()")]
fn required_type_signature_in_treat_error(#[case] sequence_type: &str, #[case] rendered: &str) {
    let expr = format!("'x' treat as {sequence_type}");
    let err = compile_metapath(&expr)
        .unwrap()
        .evaluate(None, &mut DynamicContext::default())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MPDY0050);
    assert!(
        err.message.ends_with(&format!("the required type {rendered}")),
        "{}",
        err.message
    );
}
