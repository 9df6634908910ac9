use metaschema_metapath::model::{assembly, document, field, flag};
use metaschema_metapath::{DynamicContext, Item, NodeRef, compile_metapath};
use rstest::{fixture, rstest};

#[fixture]
fn catalog() -> NodeRef {
    document()
        .child(
            assembly("catalog")
                .flag(flag("id", "cat-1"))
                .child(assembly("metadata").child(field("title", "Sample")).child(field("version", "1.0")))
                .child(
                    assembly("group")
                        .flag(flag("id", "g1"))
                        .child(assembly("control").flag(flag("id", "c1")).child(field("title", "Access")))
                        .child(assembly("control").flag(flag("id", "c2")).child(field("title", "Audit"))),
                )
                .child(
                    assembly("group")
                        .flag(flag("id", "g2"))
                        .child(assembly("control").flag(flag("id", "c3")).child(field("title", "Backup"))),
                ),
        )
        .build()
}

fn eval(doc: &NodeRef, expr: &str) -> Vec<Item> {
    let compiled = compile_metapath(expr).unwrap();
    compiled
        .evaluate(Some(Item::Node(doc.clone())), &mut DynamicContext::default())
        .unwrap()
        .into_items()
}

fn strings(doc: &NodeRef, expr: &str) -> Vec<String> {
    eval(doc, expr).iter().map(|i| i.string_value().unwrap()).collect()
}

fn names(doc: &NodeRef, expr: &str) -> Vec<String> {
    eval(doc, expr)
        .iter()
        .map(|i| match i {
            Item::Node(n) => n.name().map_or_else(|| "#doc".to_string(), |q| q.local_name().to_string()),
            other => panic!("expected node, got {other:?}"),
        })
        .collect()
}

#[rstest]
#[case::child_path("/catalog/group/@id", vec!["g1", "g2"])]
#[case::descendant_abbrev("//control/@id", vec!["c1", "c2", "c3"])]
#[case::descendant_axis("/catalog/descendant::title", vec!["Sample", "Access", "Audit", "Backup"])]
#[case::positional("/catalog/group[2]/control/title", vec!["Backup"])]
#[case::flag_predicate("//control[@id = 'c2']/title", vec!["Audit"])]
#[case::last("(//control)[last()]/@id", vec!["c3"])]
#[case::flag_axis("/catalog/flag::id", vec!["cat-1"])]
#[case::parent_abbrev("//title[. = 'Audit']/../@id", vec!["c2"])]
fn forward_paths(catalog: NodeRef, #[case] expr: &str, #[case] expected: Vec<&str>) {
    assert_eq!(strings(&catalog, expr), expected);
}

#[rstest]
fn following_and_preceding_siblings(catalog: NodeRef) {
    assert_eq!(names(&catalog, "/catalog/metadata/following-sibling::*"), vec!["group", "group"]);
    assert_eq!(strings(&catalog, "/catalog/group[2]/preceding-sibling::group/@id"), vec!["g1"]);
    assert!(eval(&catalog, "/catalog/metadata/preceding-sibling::*").is_empty());
}

#[rstest]
fn reverse_axes_return_document_order(catalog: NodeRef) {
    assert_eq!(
        names(&catalog, "//control[@id = 'c3']/ancestor::*"),
        vec!["catalog", "group"]
    );
    assert_eq!(
        names(&catalog, "//control[@id = 'c3']/ancestor-or-self::node()"),
        vec!["#doc", "catalog", "group", "control"]
    );
    assert_eq!(strings(&catalog, "//control[@id = 'c3']/preceding::control/@id"), vec!["c1", "c2"]);
}

#[rstest]
fn reverse_axis_predicates_count_backwards(catalog: NodeRef) {
    assert_eq!(strings(&catalog, "//control[@id = 'c3']/preceding::control[1]/@id"), vec!["c2"]);
    assert_eq!(names(&catalog, "//title[. = 'Backup']/ancestor::*[1]"), vec!["control"]);
}

#[rstest]
fn following_axis_excludes_descendants(catalog: NodeRef) {
    assert_eq!(strings(&catalog, "/catalog/group[1]/following::control/@id"), vec!["c3"]);
}

#[rstest]
#[case::assembly_test("/catalog/assembly()", 3)]
#[case::named_assembly_test("/catalog/assembly(group)", 2)]
#[case::field_test("//field()", 5)]
#[case::flag_test("//flag(id)", 6)]
#[case::node_test("/catalog/node()", 3)]
#[case::document_test("/self::document-node()", 1)]
#[case::document_element_test("/self::document-node(assembly(catalog))", 1)]
#[case::document_element_mismatch("/self::document-node(assembly(group))", 0)]
#[case::wildcard("/catalog/*", 3)]
fn kind_tests(catalog: NodeRef, #[case] expr: &str, #[case] expected: usize) {
    assert_eq!(eval(&catalog, expr).len(), expected);
}

#[rstest]
fn path_results_are_deduplicated(catalog: NodeRef) {
    assert_eq!(eval(&catalog, "//control/../control").len(), 3);
    assert_eq!(eval(&catalog, "//control | //control").len(), 3);
}

#[rstest]
fn set_operations(catalog: NodeRef) {
    assert_eq!(strings(&catalog, "//control[@id != 'c1'] intersect //group[1]/control").len(), 1);
    assert_eq!(strings(&catalog, "(//control except //group[1]/control)/@id"), vec!["c3"]);
    assert_eq!(
        strings(&catalog, "(//group[2]/control union //group[1]/control)/@id"),
        vec!["c1", "c2", "c3"]
    );
}

#[rstest]
fn node_comparisons(catalog: NodeRef) {
    let compiled = compile_metapath("(//control)[1] << (//control)[2]").unwrap();
    let focus = Some(Item::Node(catalog.clone()));
    assert!(compiled.evaluate_boolean(focus.clone(), &mut DynamicContext::default()).unwrap());
    let compiled = compile_metapath("(//control)[1] is /catalog/group[1]/control[1]").unwrap();
    assert!(compiled.evaluate_boolean(focus, &mut DynamicContext::default()).unwrap());
}

#[rstest]
fn atomic_path_step_results_keep_order(catalog: NodeRef) {
    assert_eq!(strings(&catalog, "//control/string(@id)"), vec!["c1", "c2", "c3"]);
}

#[rstest]
fn mixed_path_step_result_is_an_error(catalog: NodeRef) {
    let compiled = compile_metapath("/catalog/(metadata, 'x')").unwrap();
    let err = compiled
        .evaluate(Some(Item::Node(catalog)), &mut DynamicContext::default())
        .unwrap_err();
    assert_eq!(err.format_code(), "err:MPTY0018");
}

#[rstest]
fn path_over_atomic_context_is_an_error() {
    let compiled = compile_metapath("child::x").unwrap();
    let err = compiled
        .evaluate(Some(Item::from(metaschema_metapath::AtomicValue::Integer(1))), &mut DynamicContext::default())
        .unwrap_err();
    assert_eq!(err.format_code(), "err:MPTY0020");
}

#[rstest]
fn root_of_detached_tree_is_an_error() {
    let lone = assembly("control").child(field("title", "x")).build();
    let compiled = compile_metapath("/title").unwrap();
    let err = compiled
        .evaluate(Some(Item::Node(lone)), &mut DynamicContext::default())
        .unwrap_err();
    assert_eq!(err.format_code(), "err:MPDY0050");
}

#[test]
fn namespace_axis_is_unsupported() {
    let err = compile_metapath("namespace::*").unwrap_err();
    assert_eq!(err.format_code(), "err:MPST0010");
}

#[fixture]
fn defined() -> NodeRef {
    document()
        .child(
            assembly("a")
                .child(
                    assembly("x")
                        .definition("ctl")
                        .flag(flag("id", "x1").definition("ident"))
                        .child(field("title", "First").definition("label")),
                )
                .child(assembly("x").definition("grp").flag(flag("id", "x2")))
                .child(
                    assembly("y")
                        .definition("ctl")
                        .child(field("note", "Second").definition("label")),
                ),
        )
        .build()
}

#[rstest]
#[case::matching_definition("/a/assembly(x, ctl)/@id", vec!["x1"])]
#[case::other_definition("/a/assembly(x, grp)/@id", vec!["x2"])]
#[case::unknown_definition("/a/assembly(x, nope)/@id", vec![])]
#[case::wildcard_name("/a/assembly(*, ctl)/*", vec!["First", "Second"])]
#[case::field_definition("//field(*, label)", vec!["First", "Second"])]
#[case::flag_definition("//flag(*, ident)", vec!["x1"])]
#[case::undefined_node("//flag(id, ident)/../@id", vec!["x1"])]
fn kind_tests_by_definition(defined: NodeRef, #[case] expr: &str, #[case] expected: Vec<&str>) {
    assert_eq!(strings(&defined, expr), expected);
}

#[rstest]
fn definition_test_is_stable_across_evaluations(defined: NodeRef) {
    let compiled = compile_metapath("count(/a/assembly(*, ctl))").unwrap();
    let focus = Some(Item::Node(defined));
    for _ in 0..2 {
        let count = compiled
            .evaluate_string(focus.clone(), &mut DynamicContext::default())
            .unwrap();
        assert_eq!(count, "2");
    }
}

#[rstest]
fn treat_as_definition_mismatch(defined: NodeRef) {
    let compiled = compile_metapath("/a/assembly(x) treat as assembly(x, grp)+").unwrap();
    let err = compiled
        .evaluate(Some(Item::Node(defined)), &mut DynamicContext::default())
        .unwrap_err();
    assert_eq!(err.format_code(), "err:MPDY0050");
}
