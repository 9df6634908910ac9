use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeDelta};
use metaschema_metapath::model::{assembly, document, field, flag};
use metaschema_metapath::{
    AtomicValue, DynamicContext, DynamicContextBuilder, ErrorCode, Item, NodeRef, Sequence, StaticContext,
    StaticContextBuilder, compile_metapath, compile_metapath_with_context,
};
use rstest::{fixture, rstest};

fn eval_string(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate_string(None, &mut DynamicContext::default()).unwrap()
}

fn eval_strings(expr: &str) -> Vec<String> {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(None, &mut DynamicContext::default())
        .unwrap()
        .iter()
        .map(|i| i.string_value().unwrap())
        .collect()
}

#[rstest]
#[case::concat("concat('a', 1, (), true())", "a1true")]
#[case::string_join("string-join(('a', 'b', 'c'), '-')", "a-b-c")]
#[case::substring("substring('metaschema', 5)", "schema")]
#[case::substring_len("substring('metaschema', 1, 4)", "meta")]
#[case::substring_rounds("substring('12345', 1.5, 2.6)", "234")]
#[case::substring_before("substring-before('key=value', '=')", "key")]
#[case::substring_after("substring-after('key=value', '=')", "value")]
#[case::string_length("string-length('héllo')", "5")]
#[case::upper("upper-case('abc')", "ABC")]
#[case::lower("lower-case('ABC')", "abc")]
#[case::normalize_space("normalize-space('  a   b  ')", "a b")]
#[case::translate("translate('bar', 'abc', 'ABC')", "BAr")]
#[case::translate_removes("translate('--aaa--', 'a-', 'A')", "AAA")]
#[case::contains("contains('metapath', 'tap')", "true")]
#[case::starts_with("starts-with('metapath', 'meta')", "true")]
#[case::ends_with("ends-with('metapath', 'math')", "false")]
#[case::compare("compare('a', 'b')", "-1")]
#[case::matches("matches('abc123', '^[a-z]+\\d+$')", "true")]
#[case::matches_flags("matches('ABC', 'abc', 'i')", "true")]
#[case::replace("replace('2024-01-02', '(\\d+)-(\\d+)-(\\d+)', '$3.$2.$1')", "02.01.2024")]
#[case::normalize_unicode("string-length(normalize-unicode('e\u{301}'))", "1")]
fn string_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[test]
fn tokenize_splits_on_pattern() {
    assert_eq!(eval_strings("tokenize('a, b,c', ',\\s*')"), vec!["a", "b", "c"]);
    assert_eq!(eval_strings("tokenize('  a  b ')"), vec!["a", "b"]);
}

#[test]
fn invalid_regex_is_reported() {
    let compiled = compile_metapath("matches('a', '(')").unwrap();
    let err = compiled.evaluate(None, &mut DynamicContext::default()).unwrap_err();
    assert_eq!(err.format_code(), "err:FORX0002");
}

#[rstest]
#[case::count("count((1, 2, 3))", "3")]
#[case::empty("empty(())", "true")]
#[case::exists("exists((1))", "true")]
#[case::head("head((4, 5, 6))", "4")]
#[case::index_of("string-join(index-of((1, 2, 1), 1), ',')", "1,3")]
#[case::subsequence("string-join(subsequence(1 to 5, 2, 3), ',')", "2,3,4")]
#[case::remove("string-join(remove((1, 2, 3), 2), ',')", "1,3")]
#[case::insert_before("string-join(insert-before((1, 3), 2, 2), ',')", "1,2,3")]
#[case::distinct("string-join(distinct-values((1, 1.0, 2, 'a', 'a')), ',')", "1,2,a")]
#[case::deep_equal("deep-equal((1, 'a'), (1, 'a'))", "true")]
#[case::deep_equal_length("deep-equal((1, 2), (1))", "false")]
#[case::tail("string-join(tail((1, 2, 3)), ',')", "2,3")]
#[case::last("(10, 20, 30)[last()]", "30")]
#[case::position("string-join((5, 6, 7)[position() > 1], ',')", "6,7")]
fn sequence_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::zero_or_one("zero-or-one((1, 2))", "err:FORG0003")]
#[case::one_or_more("one-or-more(())", "err:FORG0004")]
#[case::exactly_one("exactly-one(())", "err:FORG0005")]
fn cardinality_checks(#[case] expr: &str, #[case] code: &str) {
    let compiled = compile_metapath(expr).unwrap();
    let err = compiled.evaluate(None, &mut DynamicContext::default()).unwrap_err();
    assert_eq!(err.format_code(), code);
}

#[rstest]
#[case::sum("sum((1, 2, 3))", "6")]
#[case::sum_empty("sum(())", "0")]
#[case::sum_zero_arg("sum((), 'none')", "none")]
#[case::sum_mixed("sum((1, 2.5))", "3.5")]
#[case::sum_durations("sum((xs:dayTimeDuration('PT1H'), xs:dayTimeDuration('PT30M')))", "PT1H30M")]
#[case::avg("avg((1, 2, 3, 4))", "2.5")]
#[case::min("min((3, 1, 2))", "1")]
#[case::max_strings("max(('a', 'c', 'b'))", "c")]
#[case::abs("abs(-3)", "3")]
#[case::ceiling("ceiling(1.2)", "2")]
#[case::floor("floor(-1.2)", "-2")]
#[case::round_half_up("round(2.5)", "3")]
#[case::round_negative_half("round(-2.5)", "-2")]
#[case::round_precision("round(3.14159, 2)", "3.14")]
#[case::round_negative_precision("round(1250, -2)", "1300")]
#[case::math_sqrt("math:sqrt(16)", "4")]
#[case::math_pow("math:pow(2, 10)", "1024")]
fn numeric_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[test]
fn math_pi_is_a_double() {
    let compiled = compile_metapath("math:pi()").unwrap();
    let value = compiled
        .evaluate_single(None, &mut DynamicContext::default())
        .unwrap()
        .unwrap();
    assert!(matches!(value, Item::Atomic(metaschema_metapath::AtomicValue::Double(d)) if (d - std::f64::consts::PI).abs() < 1e-12));
}

#[test]
fn avg_of_empty_is_empty() {
    let compiled = compile_metapath("avg(())").unwrap();
    assert!(compiled.evaluate(None, &mut DynamicContext::default()).unwrap().is_empty());
}

fn fixed_context() -> DynamicContext {
    let now = DateTime::<FixedOffset>::parse_from_rfc3339("2024-05-06T07:08:09.5+02:00").unwrap();
    DynamicContextBuilder::new().with_now(now).build()
}

#[rstest]
#[case::current_date("current-date()", "2024-05-06+02:00")]
#[case::current_date_time("current-dateTime()", "2024-05-06T07:08:09.5+02:00")]
#[case::implicit_timezone("implicit-timezone()", "PT2H")]
#[case::year("year-from-date(current-date())", "2024")]
#[case::month("month-from-date(current-date())", "5")]
#[case::hours("hours-from-dateTime(current-dateTime())", "7")]
#[case::seconds("seconds-from-dateTime(current-dateTime())", "9.5")]
#[case::duration_days("days-from-duration(xs:dayTimeDuration('P3DT4H'))", "3")]
#[case::duration_years("years-from-duration(xs:yearMonthDuration('P2Y5M'))", "2")]
fn date_time_functions(#[case] expr: &str, #[case] expected: &str) {
    let compiled = compile_metapath(expr).unwrap();
    assert_eq!(compiled.evaluate_string(None, &mut fixed_context()).unwrap(), expected);
}

#[test]
fn current_date_time_is_stable_within_an_evaluation() {
    let compiled = compile_metapath("current-dateTime() eq current-dateTime()").unwrap();
    assert!(compiled.evaluate_boolean(None, &mut DynamicContext::default()).unwrap());
}

fn adjust_static_context() -> Arc<StaticContext> {
    Arc::new(StaticContextBuilder::new().with_variable("tz-10").build())
}

/// Implicit timezone of -05:00 with `$tz-10` bound to `-PT10H`.
fn adjust_context() -> DynamicContext {
    DynamicContextBuilder::new()
        .with_implicit_timezone(FixedOffset::west_opt(5 * 3600).unwrap())
        .with_variable("tz-10", Sequence::of(AtomicValue::DayTimeDuration(TimeDelta::hours(-10))))
        .build()
}

fn eval_adjusted(expr: &str) -> Result<Vec<String>, ErrorCode> {
    let compiled = compile_metapath_with_context(expr, &adjust_static_context()).unwrap();
    compiled
        .evaluate(None, &mut adjust_context())
        .map(|seq| seq.iter().map(|i| i.string_value().unwrap()).collect())
        .map_err(|e| e.code)
}

#[rstest]
#[case::implicit("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00'))", &["2002-03-07T10:00:00-05:00"])]
#[case::implicit_shift("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00-07:00'))", &["2002-03-07T12:00:00-05:00"])]
#[case::attach("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00'), $tz-10)", &["2002-03-07T10:00:00-10:00"])]
#[case::shift_west("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00-07:00'), $tz-10)", &["2002-03-07T07:00:00-10:00"])]
#[case::shift_east(
    "adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00-07:00'), xs:dayTimeDuration('PT10H'))",
    &["2002-03-08T03:00:00+10:00"]
)]
#[case::previous_day(
    "adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T00:00:00+01:00'), xs:dayTimeDuration('-PT8H'))",
    &["2002-03-06T15:00:00-08:00"]
)]
#[case::remove_absent("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00'), ())", &["2002-03-07T10:00:00"])]
#[case::remove_present("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00-07:00'), ())", &["2002-03-07T10:00:00"])]
#[case::empty("adjust-dateTime-to-timezone((), ())", &[])]
#[case::empty_with_tz("adjust-dateTime-to-timezone((), $tz-10)", &[])]
#[case::date_implicit("adjust-date-to-timezone(xs:date('2002-03-07'))", &["2002-03-07-05:00"])]
#[case::date_shift("adjust-date-to-timezone(xs:date('2002-03-07-07:00'), $tz-10)", &["2002-03-06-10:00"])]
#[case::date_remove("adjust-date-to-timezone(xs:date('2002-03-07-07:00'), ())", &["2002-03-07"])]
#[case::time_implicit("adjust-time-to-timezone(xs:time('10:00:00-07:00'))", &["12:00:00-05:00"])]
#[case::time_wraps("adjust-time-to-timezone(xs:time('10:00:00-07:00'), xs:dayTimeDuration('PT10H'))", &["03:00:00+10:00"])]
#[case::time_remove("adjust-time-to-timezone(xs:time('10:00:00-07:00'), ())", &["10:00:00"])]
fn adjust_to_timezone(#[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(eval_adjusted(expr).unwrap(), expected);
}

#[rstest]
#[case::too_far("adjust-dateTime-to-timezone(xs:dateTime('2002-03-07T10:00:00'), xs:dayTimeDuration('PT15H'))")]
#[case::seconds("adjust-time-to-timezone(xs:time('10:00:00'), xs:dayTimeDuration('PT1M30S'))")]
fn adjust_rejects_invalid_timezone(#[case] expr: &str) {
    assert_eq!(eval_adjusted(expr).unwrap_err(), ErrorCode::FODT0003);
}

#[rstest]
#[case::local("dateTime(xs:date('2024-05-06'), xs:time('07:08:09'))", &["2024-05-06T07:08:09"])]
#[case::date_zone("dateTime(xs:date('2024-05-06Z'), xs:time('07:08:09'))", &["2024-05-06T07:08:09Z"])]
#[case::time_zone("dateTime(xs:date('2024-05-06'), xs:time('07:08:09+02:00'))", &["2024-05-06T07:08:09+02:00"])]
#[case::same_zone("dateTime(xs:date('2024-05-06+02:00'), xs:time('07:08:09+02:00'))", &["2024-05-06T07:08:09+02:00"])]
#[case::empty("dateTime((), xs:time('07:08:09'))", &[])]
fn date_time_from_parts(#[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(eval_adjusted(expr).unwrap(), expected);
}

#[test]
fn date_time_rejects_conflicting_timezones() {
    let err = eval_adjusted("dateTime(xs:date('2024-05-06+02:00'), xs:time('07:08:09Z'))").unwrap_err();
    assert_eq!(err, ErrorCode::FORG0008);
}

#[rstest]
#[case::prefixed("function-lookup('fn:upper-case', 1)('a')", &["A"])]
#[case::default_namespace("function-lookup('concat', 3)('a', 'b', 'c')", &["abc"])]
#[case::unknown_name("function-lookup('fn:no-such-function', 1)", &[])]
#[case::wrong_arity("function-lookup('fn:upper-case', 2)", &[])]
#[case::exists("exists(function-lookup('fn:count', 1))", &["true"])]
fn function_lookup(#[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(eval_strings(expr), expected);
}

#[test]
fn static_base_uri_comes_from_the_static_context() {
    let static_ctx = Arc::new(StaticContextBuilder::new().with_base_uri("https://example.org/base/").build());
    let compiled = compile_metapath_with_context("static-base-uri()", &static_ctx).unwrap();
    assert_eq!(
        compiled.evaluate_string(None, &mut DynamicContext::default()).unwrap(),
        "https://example.org/base/"
    );
    assert!(compile_metapath("static-base-uri()")
        .unwrap()
        .evaluate(None, &mut DynamicContext::default())
        .unwrap()
        .is_empty());
}

#[fixture]
fn profile() -> NodeRef {
    document()
        .base_uri("https://example.org/profiles/base.xml")
        .child(
            assembly("profile")
                .flag(flag("uuid", "p-1"))
                .child(assembly("import").flag(flag("href", "catalog.xml")))
                .child(
                    assembly("merge")
                        .child(assembly("group").child(assembly("group").child(field("title", "Inner")))),
                ),
        )
        .build()
}

fn node_strings(doc: &NodeRef, expr: &str) -> Vec<String> {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(Some(Item::Node(doc.clone())), &mut DynamicContext::default())
        .unwrap()
        .iter()
        .map(|i| i.string_value().unwrap())
        .collect()
}

#[rstest]
#[case::name("name(/profile/import)", "import")]
#[case::local_name("local-name(/profile/@uuid)", "uuid")]
#[case::path("path(/profile/merge/group/group/title)", "/profile[1]/merge[1]/group[1]/group[1]/title[1]")]
#[case::path_flag("path(/profile/import/@href)", "/profile[1]/import[1]/@href")]
#[case::has_children("has-children(/profile/import)", "false")]
#[case::root_is_document("root(/profile/import) is /", "true")]
#[case::base_uri("base-uri(/profile)", "https://example.org/profiles/base.xml")]
#[case::resolve_uri("resolve-uri(/profile/import/@href, base-uri(/profile))", "https://example.org/profiles/catalog.xml")]
#[case::resolve_absolute("resolve-uri('https://other.org/x')", "https://other.org/x")]
#[case::innermost("count(innermost(//group))", "1")]
#[case::outermost("count(outermost(//group))", "1")]
#[case::name_of_context("/profile/merge/name()", "merge")]
#[case::document_uri("document-uri(/)", "https://example.org/profiles/base.xml")]
#[case::document_uri_of_context("/document-uri()", "https://example.org/profiles/base.xml")]
fn node_functions(profile: NodeRef, #[case] expr: &str, #[case] expected: &str) {
    assert_eq!(node_strings(&profile, expr), vec![expected]);
}

#[rstest]
fn recurse_depth_walks_depth_first(profile: NodeRef) {
    assert_eq!(
        node_strings(&profile, "recurse-depth(/profile/merge, 'group') ! name()"),
        vec!["merge", "group", "group"]
    );
    assert_eq!(
        node_strings(&profile, "/profile/merge/recurse-depth('*') ! local-name()"),
        vec!["merge", "group", "group", "title"]
    );
}

#[test]
fn base64_round_trip() {
    assert_eq!(eval_string("base64-encode('hello')"), "aGVsbG8=");
    assert_eq!(eval_string("base64-decode(base64-encode('hello'))"), "hello");
}

#[rstest]
#[case::fox(
    "The quick brown fox jumps over the lazy dog",
    "VGhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVyIHRoZSBsYXp5IGRvZw=="
)]
#[case::watson("Mr. Watson, come here, I need you", "TXIuIFdhdHNvbiwgY29tZSBoZXJlLCBJIG5lZWQgeW91")]
fn base64_text_round_trip(#[case] text: &str, #[case] encoded: &str) {
    assert_eq!(eval_string(&format!("base64-encode-text('{text}')")), encoded);
    assert_eq!(eval_string(&format!("base64-decode-text('{encoded}')")), text);
    assert_eq!(eval_string(&format!("base64-decode-text(base64-encode-text('{text}'))")), text);
}

#[rstest]
fn document_uri_is_empty_for_other_nodes(profile: NodeRef) {
    assert!(node_strings(&profile, "document-uri(/profile)").is_empty());
}

#[test]
fn string_and_data_of_fields() {
    let doc = document().child(assembly("a").child(field("n", 3_i64))).build();
    let compiled = compile_metapath("(string(/a/n), data(/a/n) + 1)").unwrap();
    let out: Vec<String> = compiled
        .evaluate(Some(Item::Node(doc)), &mut DynamicContext::default())
        .unwrap()
        .iter()
        .map(|i| i.string_value().unwrap())
        .collect();
    assert_eq!(out, vec!["3", "4"]);
}
