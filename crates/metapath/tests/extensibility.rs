use std::sync::Arc;

use metaschema_metapath::types::{AdapterRegistry, BuiltinAdapter, DataTypeAdapter};
use metaschema_metapath::{
    AtomicType, AtomicValue, DynamicContextBuilder, Error, ErrorCode, FunctionLibrary, QName, Sequence,
    SequenceType, StaticContextBuilder, compile_metapath_with_context,
};
use rstest::rstest;

const EXT_NS: &str = "http://example.org/ext";

fn eval_with(static_ctx: StaticContextBuilder, expr: &str) -> Result<String, Error> {
    let static_ctx = Arc::new(static_ctx.build());
    let compiled = compile_metapath_with_context(expr, &static_ctx)?;
    let mut ctx = DynamicContextBuilder::new().with_static_context(static_ctx).build();
    compiled.evaluate_string(None, &mut ctx)
}

#[rstest]
fn user_functions_are_callable() {
    let mut builder = FunctionLibrary::builder().with_standard_functions();
    builder.register(
        EXT_NS,
        "double-it",
        &[SequenceType::one(AtomicType::Integer)],
        SequenceType::one(AtomicType::Integer),
        |_ctx, args| {
            let n = args[0]
                .atomize()?
                .first()
                .and_then(AtomicValue::as_i64)
                .unwrap_or_default();
            Ok(Sequence::of(AtomicValue::Integer(n * 2)))
        },
    );
    let static_ctx = StaticContextBuilder::new()
        .with_namespace("ext", EXT_NS)
        .with_function_library(Arc::new(builder.build()));
    assert_eq!(eval_with(static_ctx, "ext:double-it(21)").unwrap(), "42");
}

#[rstest]
fn arguments_are_coerced_to_declared_types() {
    let mut builder = FunctionLibrary::builder().with_standard_functions();
    builder.register(
        EXT_NS,
        "kind",
        &[SequenceType::one(AtomicType::Double)],
        SequenceType::one(AtomicType::String),
        |_ctx, args| {
            let kind = match args[0].atomize()?.first() {
                Some(AtomicValue::Double(_)) => "double",
                _ => "other",
            };
            Ok(Sequence::of(AtomicValue::string(kind)))
        },
    );
    let static_ctx = StaticContextBuilder::new()
        .with_namespace("ext", EXT_NS)
        .with_function_library(Arc::new(builder.build()));
    assert_eq!(eval_with(static_ctx, "ext:kind(1)").unwrap(), "double");
}

#[derive(Debug)]
struct LowercaseHostname;

impl DataTypeAdapter for LowercaseHostname {
    fn atomic_type(&self) -> AtomicType {
        AtomicType::Hostname
    }

    fn names(&self) -> Vec<QName> {
        vec![AtomicType::Hostname.qname()]
    }

    fn parse(&self, lexical: &str) -> Result<AtomicValue, Error> {
        let trimmed = lexical.trim();
        if trimmed.is_empty() {
            return Err(Error::from_code(ErrorCode::FORG0001, "empty hostname"));
        }
        Ok(AtomicValue::Hostname(trimmed.to_ascii_lowercase()))
    }

    fn cast(&self, value: &AtomicValue) -> Result<AtomicValue, Error> {
        self.parse(&value.lexical())
    }
}

#[rstest]
fn later_adapter_registration_wins() {
    let registry = AdapterRegistry::builder()
        .with_builtin_types()
        .register(LowercaseHostname)
        .build();
    let static_ctx = StaticContextBuilder::new().with_adapter_registry(Arc::new(registry));
    assert_eq!(eval_with(static_ctx, "hostname('Example.ORG')").unwrap(), "example.org");
}

#[rstest]
fn missing_adapter_is_reported() {
    let registry = AdapterRegistry::builder()
        .register(BuiltinAdapter::new(AtomicType::String))
        .build();
    let static_ctx = StaticContextBuilder::new().with_adapter_registry(Arc::new(registry));
    let err = eval_with(static_ctx, "'1' cast as meta:integer").unwrap_err();
    assert_eq!(err.code, ErrorCode::MPST0051);
}
