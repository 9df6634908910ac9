use metaschema_metapath::{DynamicContext, compile_metapath};
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
#[case::size("array:size([1, (2, 3), ()])", "3")]
#[case::curly_flattens("array:size(array { 1, (2, 3) })", "3")]
#[case::get("array:get(['a', 'b'], 2)", "b")]
#[case::call_as_function("['a', 'b'](1)", "a")]
#[case::lookup("['a', 'b']?2", "b")]
#[case::lookup_wildcard("string-join(['a', 'b']?*, ',')", "a,b")]
#[case::put("string-join(array:put([1, 2, 3], 2, 9)?*, ',')", "1,9,3")]
#[case::append("array:size(array:append([1], 2))", "2")]
#[case::subarray("string-join(array:subarray([1, 2, 3, 4], 2, 2)?*, ',')", "2,3")]
#[case::subarray_tail("string-join(array:subarray([1, 2, 3], 2)?*, ',')", "2,3")]
#[case::remove("string-join(array:remove([1, 2, 3], (1, 3))?*, ',')", "2")]
#[case::insert_before("string-join(array:insert-before([1, 3], 2, 2)?*, ',')", "1,2,3")]
#[case::head("array:head([7, 8])", "7")]
#[case::tail("string-join(array:tail([7, 8, 9])?*, ',')", "8,9")]
#[case::reverse("string-join(array:reverse([1, 2, 3])?*, ',')", "3,2,1")]
#[case::join("array:size(array:join(([1], [2, 3])))", "3")]
#[case::flatten("string-join(array:flatten([1, [2, [3]]]), ',')", "1,2,3")]
#[case::for_each("string-join(array:for-each([1, 2], function($x) { $x * 2 })?*, ',')", "2,4")]
#[case::filter("string-join(array:filter([1, 2, 3, 4], function($x) { $x mod 2 = 0 })?*, ',')", "2,4")]
fn array_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::get_out_of_bounds("array:get([1], 2)", "err:FOAY0001")]
#[case::lookup_zero("[1, 2]?0", "err:FOAY0001")]
#[case::head_of_empty("array:head([])", "err:FOAY0001")]
#[case::negative_length("array:subarray([1, 2], 1, -1)", "err:FOAY0002")]
#[case::filter_non_boolean("array:filter([1], function($x) { $x })", "err:MPTY0004")]
fn array_errors(#[case] expr: &str, #[case] code: &str) {
    assert_eq!(eval_err_code(expr), code);
}

#[rstest]
#[case::size("map:size(map { 'a': 1, 'b': 2 })", "2")]
#[case::get("map:get(map { 'a': 1 }, 'a')", "1")]
#[case::call_as_function("map { 'a': 1 }('a')", "1")]
#[case::lookup_ncname("map { 'key': 'v' }?key", "v")]
#[case::lookup_missing("count(map { 'a': 1 }?b)", "0")]
#[case::numeric_keys_unify("map { 1: 'x' }(1.0)", "x")]
#[case::contains("map:contains(map { 'a': 1 }, 'a')", "true")]
#[case::keys("string-join(map:keys(map { 'a': 1, 'b': 2 }), ',')", "a,b")]
#[case::put("map:put(map { 'a': 1 }, 'a', 5)?a", "5")]
#[case::remove("map:size(map:remove(map { 'a': 1, 'b': 2 }, 'a'))", "1")]
#[case::entry("map:entry('k', 3)?k", "3")]
#[case::merge_default_first("map:merge((map { 'a': 1 }, map { 'a': 2 }))?a", "1")]
#[case::merge_use_last("map:merge((map { 'a': 1 }, map { 'a': 2 }), map { 'duplicates': 'use-last' })?a", "2")]
#[case::merge_combine("string-join(map:merge((map { 'a': 1 }, map { 'a': 2 }), map { 'duplicates': 'combine' })?a, ',')", "1,2")]
#[case::find("array:size(map:find([map { 'x': 1 }, map { 'y': map { 'x': 2 } }], 'x'))", "2")]
#[case::for_each("string-join(map:for-each(map { 'a': 1, 'b': 2 }, function($k, $v) { $k || $v }), ',')", "a1,b2")]
fn map_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[rstest]
#[case::merge_reject("map:merge((map { 'a': 1 }, map { 'a': 2 }), map { 'duplicates': 'reject' })", "err:FOJS0003")]
#[case::merge_bad_option("map:merge((), map { 'duplicates': 'other' })", "err:FORG0006")]
#[case::constructor_duplicate("map { 'a': 1, 'a': 2 }", "err:FOJS0003")]
fn map_errors(#[case] expr: &str, #[case] code: &str) {
    assert_eq!(eval_err_code(expr), code);
}

#[rstest]
#[case::filter("string-join(filter(1 to 6, function($x) { $x mod 3 = 0 }), ',')", "3,6")]
#[case::for_each_named("string-join(for-each(('a', 'b'), upper-case#1), '')", "AB")]
#[case::fold_left("fold-left(('a', 'b', 'c'), '', concat#2)", "abc")]
#[case::arity("function-arity(substring#3)", "3")]
#[case::arity_inline("function-arity(function($a, $b) { $a })", "2")]
#[case::name("function-name(upper-case#1)", "Q{http://csrc.nist.gov/ns/metaschema/metapath-functions}upper-case")]
#[case::anonymous_name("count(function-name(function() { 1 }))", "0")]
fn higher_order_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(eval_string(expr), expected);
}

#[test]
fn unknown_function_reference_is_a_static_error() {
    let err = compile_metapath("no-such-function#1").unwrap_err();
    assert_eq!(err.format_code(), "err:MPST0017");
}
