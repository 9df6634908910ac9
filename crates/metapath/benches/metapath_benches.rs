use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use metaschema_metapath::compiler::{CompiledExpression, compile_metapath};
use metaschema_metapath::model::{assembly, document, field, flag};
use metaschema_metapath::parser::parse_metapath;
use metaschema_metapath::{DynamicContext, Error, Item, MetapathCompiler, NodeRef};

fn sample_queries() -> Vec<&'static str> {
    vec![
        "1 + 2 * 3",
        "string-length('Lorem ipsum dolor sit amet, consectetur adipiscing elit.')",
        "/catalog/group/control[@class = 'a'][position() < 5]/@id",
        "for $n in 1 to 100 return $n * $n",
        "if (exists(//control[@status = 'withdrawn'])) then 'withdrawn' else 'none'",
        "count(recurse-depth(/catalog/group, 'group'))",
        "map:merge(//control ! map { string(@id): title })?* => count()",
    ]
}

fn benchmark_parser(c: &mut Criterion) {
    let queries = sample_queries();
    c.bench_function("parser/parse_metapath", |b| {
        b.iter(|| {
            for q in &queries {
                let ast = parse_metapath(black_box(q)).expect("parse failure");
                black_box(ast);
            }
        })
    });
}

fn benchmark_compiler(c: &mut Criterion) {
    let queries = sample_queries();
    c.bench_function("compiler/compile_metapath", |b| {
        b.iter(|| {
            for q in &queries {
                let compiled = compile_metapath(black_box(q)).expect("compile failure");
                black_box(compiled);
            }
        })
    });

    let cached = MetapathCompiler::default().with_cache_capacity(32);
    c.bench_function("compiler/cached_compile", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(cached.compile(black_box(q)).expect("compile failure"));
            }
        })
    });
}

fn control(id: &str, class: &str, title: &str) -> metaschema_metapath::model::NodeBuilder {
    assembly("control")
        .flag(flag("id", id))
        .flag(flag("class", class))
        .child(field("title", title))
}

fn build_sample_document() -> NodeRef {
    let groups = (1..=10).map(|g| {
        let controls = (1..=20).map(move |c| {
            let class = if c % 2 == 0 { "a" } else { "b" };
            control(&format!("g{g}-c{c}"), class, &format!("Control {g}.{c}"))
        });
        assembly("group")
            .flag(flag("id", format!("g{g}")))
            .child(field("title", format!("Group {g}")))
            .children(controls)
            .child(assembly("group").flag(flag("id", format!("g{g}-sub"))))
    });
    document()
        .child(
            assembly("catalog")
                .flag(flag("uuid", "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724"))
                .child(assembly("metadata").child(field("title", "Benchmark Catalog")))
                .children(groups),
        )
        .build()
}

fn prepared_compiled_queries() -> Result<Vec<(String, CompiledExpression)>, Error> {
    sample_queries()
        .into_iter()
        .map(|q| compile_metapath(q).map(|c| (q.to_string(), c)))
        .collect()
}

fn benchmark_evaluator(c: &mut Criterion) {
    let document = build_sample_document();
    let compiled = prepared_compiled_queries().expect("compile failure");

    let mut group = c.benchmark_group("evaluator/evaluate");
    for (name, expr) in &compiled {
        group.bench_with_input(BenchmarkId::from_parameter(name), expr, |b, expr| {
            let mut ctx = DynamicContext::default();
            b.iter(|| {
                let result = expr
                    .evaluate(Some(Item::Node(document.clone())), black_box(&mut ctx))
                    .expect("eval failure");
                black_box(result.size());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_parser,
    benchmark_compiler,
    benchmark_evaluator
);
criterion_main!(benches);
