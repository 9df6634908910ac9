use metaschema_metapath::types::AdapterRegistry;
use metaschema_metapath::{AtomicType, DynamicContext, compile_metapath};
use rstest::rstest;

fn eval_string(expr: &str) -> String {
    let compiled = compile_metapath(expr).unwrap();
    compiled.evaluate_string(None, &mut DynamicContext::default()).unwrap()
}

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
#[case::string_to_integer("' 12 ' cast as xs:integer", "12")]
#[case::double_to_integer_truncates("3.9e0 cast as meta:integer", "3")]
#[case::decimal_to_double("1.5 cast as xs:double", "1.5")]
#[case::integer_to_boolean("0 cast as boolean", "false")]
#[case::string_to_boolean("'1' cast as boolean", "true")]
#[case::boolean_to_string("true() cast as string", "true")]
#[case::date_time_to_date("xs:dateTime('2024-03-04T05:06:07Z') cast as date", "2024-03-04Z")]
#[case::date_to_date_time("date('2024-03-04') cast as date-time", "2024-03-04T00:00:00")]
#[case::duration_to_day_time("xs:duration('P1Y2DT3H') cast as day-time-duration", "P2DT3H")]
#[case::token_collapses("'  a   b ' cast as token", "a b")]
#[case::optional_empty("count(() cast as integer?)", "0")]
#[case::base64("string('aGk=' cast as base64)", "aGk=")]
#[case::ip("'192.168.0.1' cast as ip-v4-address", "192.168.0.1")]
fn cast_expressions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::meta_constructor("meta:integer('42') + 1", "43")]
#[case::unprefixed_constructor("integer('42') + 1", "43")]
#[case::xs_alias("xs:date('2024-02-29')", "2024-02-29")]
#[case::uuid("uuid('6ba7b810-9dad-11d1-80b4-00c04fd430c8')", "6ba7b810-9dad-11d1-80b4-00c04fd430c8")]
#[case::empty("count(integer(()))", "0")]
fn constructor_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::invalid_integer("'abc' cast as integer", "err:FORG0001")]
#[case::invalid_date("date('2024-02-30')", "err:FORG0001")]
#[case::negative_non_negative("-1 cast as non-negative-integer", "err:FORG0001")]
#[case::positive_zero("positive-integer(0)", "err:FORG0001")]
#[case::email_without_at("email-address('nobody')", "err:FORG0001")]
#[case::infinity_to_integer("(1e0 div 0) cast as integer", "err:FOCA0002")]
#[case::timezone_required("'2024-01-01' cast as date-with-timezone", "err:FORG0001")]
#[case::empty_not_allowed("() cast as integer", "err:MPTY0004")]
#[case::unsupported_pair("true() cast as date", "err:MPTY0004")]
fn cast_errors(#[case] expr: &str, #[case] code: &str) {
    assert_eq!(eval_err_code(expr), code);
}

#[test]
fn cast_to_abstract_type_is_a_static_error() {
    let err = compile_metapath("1 cast as numeric").unwrap_err();
    assert_eq!(err.format_code(), "err:MPST0080");
}

#[test]
fn unknown_type_is_a_static_error() {
    let err = compile_metapath("1 cast as xs:nope").unwrap_err();
    assert_eq!(err.format_code(), "err:MPST0051");
}

#[rstest]
#[case::castable("'12' castable as integer", true)]
#[case::not_castable("'x' castable as integer", false)]
#[case::empty_optional("() castable as integer?", true)]
#[case::empty_required("() castable as integer", false)]
#[case::sequence("(1, 2) castable as integer", false)]
#[case::instance_integer("5 instance of integer", true)]
#[case::instance_subtype("5 instance of numeric", true)]
#[case::instance_supertype("5.0 instance of integer", false)]
#[case::instance_occurrence("(1, 2) instance of integer+", true)]
#[case::instance_empty("() instance of empty-sequence()", true)]
#[case::instance_optional("() instance of integer?", true)]
#[case::instance_item("(1, 'a') instance of item()*", true)]
#[case::instance_function("upper-case#1 instance of function(*)", true)]
#[case::instance_map("map { 'a': 1 } instance of map(*)", true)]
#[case::instance_array("[1] instance of array(*)", true)]
#[case::map_is_function("map { } instance of function(*)", true)]
fn type_tests(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(eval_bool(expr), expected);
}

#[test]
fn treat_as_passes_matching_values() {
    assert_eq!(eval_string("(5 treat as integer) + 1"), "6");
}

#[test]
fn treat_as_rejects_mismatches() {
    assert_eq!(eval_err_code("'5' treat as integer"), "err:MPDY0050");
}

const ROUND_TRIPS: &[(AtomicType, &str)] = &[
    (AtomicType::UntypedAtomic, " raw text "),
    (AtomicType::String, "hello world"),
    (AtomicType::Token, "  a   token "),
    (AtomicType::NcName, "control-id"),
    (AtomicType::EmailAddress, "someone@example.org"),
    (AtomicType::Hostname, "www.example.org"),
    (AtomicType::Uuid, "5f0a3e27-8c0b-4b8e-9d3e-2a7c1f6b9e10"),
    (AtomicType::MarkupLine, "some **bold** text"),
    (AtomicType::MarkupMultiline, "# Title\n\nparagraph"),
    (AtomicType::UriReference, "../profiles/base.xml#frag"),
    (AtomicType::Uri, "https://example.org/a?b=c"),
    (AtomicType::Boolean, "1"),
    (AtomicType::Boolean, "false"),
    (AtomicType::Decimal, "-12.500"),
    (AtomicType::Decimal, "0.25"),
    (AtomicType::Integer, "-9223372036854775808"),
    (AtomicType::NonNegativeInteger, "0"),
    (AtomicType::PositiveInteger, "+42"),
    (AtomicType::Double, "1.5e7"),
    (AtomicType::Double, "-0.000000125"),
    (AtomicType::Double, "-INF"),
    (AtomicType::Date, "2024-02-29"),
    (AtomicType::Date, "2024-01-01-05:00"),
    (AtomicType::DateWithTimezone, "2024-01-01Z"),
    (AtomicType::DateTime, "2024-05-06T07:08:09.500"),
    (AtomicType::DateTime, "2024-05-06T07:08:09+00:00"),
    (AtomicType::DateTimeWithTimezone, "2024-02-29T12:30:00.125+05:30"),
    (AtomicType::Time, "23:59:59.75-14:00"),
    (AtomicType::Time, "00:00:00"),
    (AtomicType::Duration, "-P1Y2M3DT4H5M6.5S"),
    (AtomicType::Duration, "P0D"),
    (AtomicType::DayTimeDuration, "-PT90M"),
    (AtomicType::DayTimeDuration, "P1DT0.000000001S"),
    (AtomicType::YearMonthDuration, "-P14M"),
    (AtomicType::Base64, "aGVs bG8g d29y bGQ="),
    (AtomicType::IpV4Address, "192.0.2.10"),
    (AtomicType::IpV6Address, "2001:0db8:0000:0000:0000:0000:0000:0001"),
    (AtomicType::IpV6Address, "::ffff:192.0.2.1"),
];

#[rstest]
fn lexical_round_trip_is_stable() {
    let registry = AdapterRegistry::standard();
    for (ty, lexical) in ROUND_TRIPS {
        let parsed = registry.parse(*ty, lexical).unwrap();
        let text = registry.adapter(*ty).unwrap().as_string(&parsed);
        let reparsed = registry.parse(*ty, &text).unwrap();
        assert_eq!(reparsed, parsed, "{ty} '{lexical}' rendered as '{text}'");
        assert_eq!(registry.adapter(*ty).unwrap().as_string(&reparsed), text);
    }
}

#[rstest]
fn round_trip_table_covers_every_registered_type() {
    let registry = AdapterRegistry::standard();
    for ty in registry.types() {
        assert!(
            ROUND_TRIPS.iter().any(|(t, _)| *t == ty),
            "no lexical form listed for {ty}"
        );
    }
}

#[rstest]
#[case(AtomicType::DateTime, "2024-05-06T07:08:09.500", "2024-05-06T07:08:09.5")]
#[case(AtomicType::DateTime, "2024-05-06T07:08:09+00:00", "2024-05-06T07:08:09Z")]
#[case(AtomicType::Decimal, "-12.500", "-12.5")]
#[case(AtomicType::Duration, "P0D", "PT0S")]
#[case(AtomicType::DayTimeDuration, "-PT90M", "-PT1H30M")]
#[case(AtomicType::YearMonthDuration, "-P14M", "-P1Y2M")]
#[case(AtomicType::IpV6Address, "2001:0db8:0000:0000:0000:0000:0000:0001", "2001:db8::1")]
#[case(AtomicType::Base64, "aGVs bG8g d29y bGQ=", "aGVsbG8gd29ybGQ=")]
fn canonical_lexical_form(#[case] ty: AtomicType, #[case] lexical: &str, #[case] expected: &str) {
    let registry = AdapterRegistry::standard();
    let value = registry.parse(ty, lexical).unwrap();
    assert_eq!(registry.adapter(ty).unwrap().as_string(&value), expected);
}
