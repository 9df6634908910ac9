//! Syntax tree produced from the pest parse tree.
//!
//! Names are kept lexical (prefix plus local part) here; expansion against the
//! static context happens when the compiler builds the expression tree.

use rust_decimal::Decimal;

use crate::model::Axis;
use crate::types::Occurrence;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

/// Shared by the value (`eq`) and general (`=`) comparison families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeComp {
    Is,
    Precedes,
    Follows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    Every,
}

/// A lexical name: `prefix:local`, `local`, or `Q{uri}local`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn parse(lexical: &str) -> Self {
        if let Some(body) = lexical.strip_prefix("Q{") {
            if let Some((uri, local)) = body.split_once('}') {
                return QName {
                    prefix: None,
                    local: local.to_string(),
                    ns_uri: Some(uri.to_string()),
                };
            }
        }
        match lexical.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
                ns_uri: None,
            },
            None => QName {
                prefix: None,
                local: lexical.to_string(),
                ns_uri: None,
            },
        }
    }

    pub fn lexical(&self) -> String {
        match (&self.ns_uri, &self.prefix) {
            (Some(uri), _) => format!("Q{{{uri}}}{}", self.local),
            (None, Some(prefix)) => format!("{prefix}:{}", self.local),
            (None, None) => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VarRef(QName),
    ContextItem,
    Sequence(Vec<Expr>),
    Binary {
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
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    IfThenElse {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    For {
        bindings: Vec<(QName, Expr)>,
        body: Box<Expr>,
    },
    Let {
        bindings: Vec<(QName, Expr)>,
        body: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<(QName, Expr)>,
        satisfies: Box<Expr>,
    },
    SetOp {
        left: Box<Expr>,
        op: SetOp,
        right: Box<Expr>,
    },
    Path(PathExpr),
    SimpleMap(Vec<Expr>),
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },
    FunctionCall {
        name: QName,
        args: Vec<Expr>,
    },
    DynamicCall {
        base: Box<Expr>,
        args: Vec<Expr>,
    },
    NamedFunctionRef {
        name: QName,
        arity: usize,
    },
    InlineFunction {
        params: Vec<(QName, Option<SequenceType>)>,
        return_type: Option<SequenceType>,
        body: Box<Expr>,
    },
    MapConstructor(Vec<(Expr, Expr)>),
    SquareArray(Vec<Expr>),
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
        ty: SingleType,
    },
    CastableAs {
        expr: Box<Expr>,
        ty: SingleType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeySpecifier {
    Wildcard,
    Name(String),
    Integer(i64),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStart {
    Root,
    RootDescendant,
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Axis {
        axis: AxisName,
        test: NodeTest,
        predicates: Vec<Expr>,
    },
    Expr(Expr),
    /// Implicit `descendant-or-self::node()` introduced by `//`.
    DescendantOrSelf,
}

/// Axis as written; `namespace` is recognised so it can be rejected with a
/// proper static error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisName {
    Axis(Axis),
    Namespace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
    Any,
    Name(QName),
    /// `prefix:*`
    Prefix(String),
    /// `Q{uri}*`
    Uri(String),
    /// `*:local`
    Local(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KindTest {
    AnyNode,
    Document(Option<Box<KindTest>>),
    Assembly(Option<NameTest>, Option<QName>),
    Field(Option<NameTest>, Option<QName>),
    Flag(Option<NameTest>, Option<QName>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
    AnyItem,
    Atomic(QName),
    Kind(KindTest),
    AnyFunction,
    Map(Option<Box<(QName, SequenceType)>>),
    Array(Option<Box<SequenceType>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceType {
    Empty,
    Typed(ItemType, Occurrence),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleType {
    pub name: QName,
    pub allow_empty: bool,
}
