//! The compiled expression tree.
//!
//! Every name in the tree is already expanded and every function call bound to
//! an implementation; evaluation never consults the query text again.

use std::sync::Arc;

use crate::engine::functions::FunctionSignature;
use crate::item::AtomicValue;
use crate::model::{Axis, QName};
use crate::types::{AtomicType, ItemType, KindTest, NameTest, SequenceType};

pub use crate::parser::ast::{BinaryOp, ComparisonOp, NodeComp, Quantifier, SetOp};

/// One node of the expression tree together with its inferred result type.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub static_type: ItemType,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        let static_type = super::static_type::infer(&kind);
        Self { kind, static_type }
    }

    /// Most specific item type known for this expression's results.
    pub fn static_result_type(&self) -> &ItemType {
        &self.static_type
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(AtomicValue),
    ContextItem,
    /// Root document of the context node.
    Root,
    Variable(QName),
    Sequence(Vec<Expr>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Arithmetic {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    StringConcat(Vec<Expr>),
    ValueComparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    GeneralComparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    NodeComparison {
        left: Box<Expr>,
        op: NodeComp,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    SetOperation {
        left: Box<Expr>,
        op: SetOp,
        right: Box<Expr>,
    },
    /// `left/right`: `right` is evaluated once per node of `left`.
    Path {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Step {
        axis: Axis,
        test: StepTest,
        predicates: Vec<Expr>,
    },
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },
    For {
        var: QName,
        input: Box<Expr>,
        body: Box<Expr>,
    },
    Let {
        var: QName,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<(QName, Expr)>,
        satisfies: Box<Expr>,
    },
    SimpleMap {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    FunctionCall {
        function: Arc<FunctionSignature>,
        args: Vec<Expr>,
    },
    DynamicCall {
        base: Box<Expr>,
        args: Vec<Expr>,
    },
    NamedFunctionRef(Arc<FunctionSignature>),
    InlineFunction(Arc<InlineFunctionDef>),
    MapConstructor(Vec<(Expr, Expr)>),
    /// `[a, b]`: one member per expression.
    ArrayConstructor(Vec<Expr>),
    /// `array { e }`: one member per item of `e`.
    CurlyArray(Box<Expr>),
    Lookup {
        base: Box<Expr>,
        key: KeySpecifier,
    },
    UnaryLookup(KeySpecifier),
    InstanceOf {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    TreatAs {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    CastAs {
        expr: Box<Expr>,
        target: AtomicType,
        allow_empty: bool,
    },
    CastableAs {
        expr: Box<Expr>,
        target: AtomicType,
        allow_empty: bool,
    },
}

/// Node filter of an axis step. A name test selects the principal node kind
/// of its axis: flags on the `flag` axis, assemblies and fields elsewhere.
#[derive(Debug, Clone)]
pub enum StepTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone)]
pub enum KeySpecifier {
    Wildcard,
    Name(String),
    Integer(i64),
    Expr(Box<Expr>),
}

/// Body and signature of an inline function expression.
#[derive(Debug)]
pub struct InlineFunctionDef {
    pub params: Vec<(QName, SequenceType)>,
    pub return_type: SequenceType,
    pub body: Expr,
}
