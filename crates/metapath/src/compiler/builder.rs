//! Lowers the syntax tree into the expression tree.
//!
//! All names are expanded here against the static context; an unresolvable
//! variable, prefix, type or function fails compilation.

use std::sync::Arc;

use crate::compiler::expr::{Expr, ExprKind, InlineFunctionDef, KeySpecifier, StepTest};
use crate::consts::NS_METAPATH;
use crate::engine::functions::FunctionSignature;
use crate::engine::runtime::{Error, ErrorCode, NameRole, StaticContext};
use crate::item::AtomicValue;
use crate::model::{Atom, Axis, NodeKind, QName};
use crate::parser::ast;
use crate::types::{AtomicType, DefinitionName, ItemType, KindTest, NameTest, SequenceType};

type CResult<T> = Result<T, Error>;

pub(crate) struct Builder<'a> {
    static_ctx: &'a StaticContext,
    /// Local variables visible at the current point, innermost last.
    scope: Vec<QName>,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(static_ctx: &'a StaticContext) -> Self {
        Self {
            static_ctx,
            scope: Vec::new(),
        }
    }

    pub(crate) fn lower_expr(&mut self, e: &ast::Expr) -> CResult<Expr> {
        use ast::Expr as E;
        let kind = match e {
            E::Literal(literal) => ExprKind::Literal(match literal {
                ast::Literal::Integer(i) => AtomicValue::Integer(*i),
                ast::Literal::Decimal(d) => AtomicValue::Decimal(*d),
                ast::Literal::Double(d) => AtomicValue::Double(*d),
                ast::Literal::String(s) => AtomicValue::String(s.clone()),
            }),
            E::VarRef(name) => ExprKind::Variable(self.resolve_variable(name)?),
            E::ContextItem => ExprKind::ContextItem,
            E::Sequence(items) => ExprKind::Sequence(self.lower_all(items)?),
            E::Binary { left, op, right } => ExprKind::Arithmetic {
                left: self.lower_boxed(left)?,
                op: *op,
                right: self.lower_boxed(right)?,
            },
            E::Negate(operand) => ExprKind::Negate(self.lower_boxed(operand)?),
            E::StringConcat(parts) => ExprKind::StringConcat(self.lower_all(parts)?),
            E::ValueComparison { left, op, right } => ExprKind::ValueComparison {
                left: self.lower_boxed(left)?,
                op: *op,
                right: self.lower_boxed(right)?,
            },
            E::GeneralComparison { left, op, right } => ExprKind::GeneralComparison {
                left: self.lower_boxed(left)?,
                op: *op,
                right: self.lower_boxed(right)?,
            },
            E::NodeComparison { left, op, right } => ExprKind::NodeComparison {
                left: self.lower_boxed(left)?,
                op: *op,
                right: self.lower_boxed(right)?,
            },
            E::And(parts) => ExprKind::And(self.lower_all(parts)?),
            E::Or(parts) => ExprKind::Or(self.lower_all(parts)?),
            E::Range { start, end } => ExprKind::Range {
                start: self.lower_boxed(start)?,
                end: self.lower_boxed(end)?,
            },
            E::IfThenElse {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::If {
                cond: self.lower_boxed(cond)?,
                then_expr: self.lower_boxed(then_expr)?,
                else_expr: self.lower_boxed(else_expr)?,
            },
            E::For { bindings, body } => return self.lower_for(bindings, body),
            E::Let { bindings, body } => return self.lower_let(bindings, body),
            E::Quantified {
                quantifier,
                bindings,
                satisfies,
            } => {
                let mark = self.scope.len();
                let mut lowered = Vec::with_capacity(bindings.len());
                for (name, input) in bindings {
                    let input = self.lower_expr(input)?;
                    let name = self.expand(name, NameRole::Variable)?;
                    self.scope.push(name.clone());
                    lowered.push((name, input));
                }
                let satisfies = self.lower_boxed(satisfies);
                self.scope.truncate(mark);
                ExprKind::Quantified {
                    quantifier: *quantifier,
                    bindings: lowered,
                    satisfies: satisfies?,
                }
            }
            E::SetOp { left, op, right } => ExprKind::SetOperation {
                left: self.lower_boxed(left)?,
                op: *op,
                right: self.lower_boxed(right)?,
            },
            E::Path(path) => return self.lower_path(path),
            E::SimpleMap(parts) => {
                let mut parts = self.lower_all(parts)?.into_iter();
                let first = parts
                    .next()
                    .ok_or_else(|| Error::from_code(ErrorCode::MPST0003, "empty simple map expression"))?;
                return Ok(parts.fold(first, |left, right| {
                    Expr::new(ExprKind::SimpleMap {
                        left: Box::new(left),
                        right: Box::new(right),
                    })
                }));
            }
            E::Filter { base, predicates } => ExprKind::Filter {
                base: self.lower_boxed(base)?,
                predicates: self.lower_all(predicates)?,
            },
            E::FunctionCall { name, args } => ExprKind::FunctionCall {
                function: self.resolve_function(name, args.len())?,
                args: self.lower_all(args)?,
            },
            E::DynamicCall { base, args } => ExprKind::DynamicCall {
                base: self.lower_boxed(base)?,
                args: self.lower_all(args)?,
            },
            E::NamedFunctionRef { name, arity } => {
                ExprKind::NamedFunctionRef(self.resolve_function(name, *arity)?)
            }
            E::InlineFunction {
                params,
                return_type,
                body,
            } => ExprKind::InlineFunction(Arc::new(self.lower_inline_function(
                params,
                return_type.as_ref(),
                body,
            )?)),
            E::MapConstructor(entries) => {
                let mut lowered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    lowered.push((self.lower_expr(key)?, self.lower_expr(value)?));
                }
                ExprKind::MapConstructor(lowered)
            }
            E::SquareArray(members) => ExprKind::ArrayConstructor(self.lower_all(members)?),
            E::CurlyArray(content) => ExprKind::CurlyArray(self.lower_boxed(content)?),
            E::Lookup { base, key } => ExprKind::Lookup {
                base: self.lower_boxed(base)?,
                key: self.lower_key(key)?,
            },
            E::UnaryLookup(key) => ExprKind::UnaryLookup(self.lower_key(key)?),
            E::InstanceOf { expr, ty } => ExprKind::InstanceOf {
                expr: self.lower_boxed(expr)?,
                ty: self.lower_sequence_type(ty)?,
            },
            E::TreatAs { expr, ty } => ExprKind::TreatAs {
                expr: self.lower_boxed(expr)?,
                ty: self.lower_sequence_type(ty)?,
            },
            E::CastAs { expr, ty } => ExprKind::CastAs {
                expr: self.lower_boxed(expr)?,
                target: self.cast_target(&ty.name)?,
                allow_empty: ty.allow_empty,
            },
            E::CastableAs { expr, ty } => ExprKind::CastableAs {
                expr: self.lower_boxed(expr)?,
                target: self.cast_target(&ty.name)?,
                allow_empty: ty.allow_empty,
            },
        };
        Ok(Expr::new(kind))
    }

    fn lower_boxed(&mut self, e: &ast::Expr) -> CResult<Box<Expr>> {
        self.lower_expr(e).map(Box::new)
    }

    fn lower_all(&mut self, items: &[ast::Expr]) -> CResult<Vec<Expr>> {
        items.iter().map(|e| self.lower_expr(e)).collect()
    }

    // ===== Names =====

    fn expand(&self, name: &ast::QName, role: NameRole) -> CResult<QName> {
        if let Some(uri) = &name.ns_uri {
            return Ok(QName::new(Some(uri), &name.local));
        }
        self.static_ctx.expand(name.prefix.as_deref(), &name.local, role)
    }

    fn resolve_variable(&self, name: &ast::QName) -> CResult<QName> {
        let expanded = self.expand(name, NameRole::Variable)?;
        if self.scope.contains(&expanded) || self.static_ctx.in_scope_variables.contains(&expanded) {
            Ok(expanded)
        } else {
            Err(Error::from_code(
                ErrorCode::MPST0008,
                format!("variable ${} is not defined", name.lexical()),
            ))
        }
    }

    /// Binds a function by name and arity. An unprefixed name that is not a
    /// function in the default namespace may still name a type constructor.
    fn resolve_function(&self, name: &ast::QName, arity: usize) -> CResult<Arc<FunctionSignature>> {
        let functions = &self.static_ctx.functions;
        let expanded = self.expand(name, NameRole::Function)?;
        match functions.resolve(&expanded, arity) {
            Ok(function) => Ok(function),
            Err(err) if name.prefix.is_none() && name.ns_uri.is_none() => {
                let constructor = QName::new(Some(NS_METAPATH), &name.local);
                if functions.contains(&constructor) {
                    functions.resolve(&constructor, arity)
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_atomic_type(&self, name: &ast::QName) -> CResult<AtomicType> {
        let expanded = self.expand(name, NameRole::Type)?;
        self.static_ctx
            .adapters
            .resolve(&expanded)
            .or_else(|| AtomicType::from_qname(&expanded))
            .ok_or_else(|| {
                Error::from_code(
                    ErrorCode::MPST0051,
                    format!("unknown atomic type {}", name.lexical()),
                )
            })
    }

    fn cast_target(&self, name: &ast::QName) -> CResult<AtomicType> {
        let target = self.resolve_atomic_type(name)?;
        if target.is_abstract() {
            return Err(Error::from_code(
                ErrorCode::MPST0080,
                format!("cannot cast to the abstract type {target}"),
            ));
        }
        Ok(target)
    }

    // ===== Binding constructs =====

    fn lower_for(&mut self, bindings: &[(ast::QName, ast::Expr)], body: &ast::Expr) -> CResult<Expr> {
        let Some(((name, input), rest)) = bindings.split_first() else {
            return self.lower_expr(body);
        };
        let input = self.lower_boxed(input)?;
        let var = self.expand(name, NameRole::Variable)?;
        self.scope.push(var.clone());
        let body = self.lower_for(rest, body);
        self.scope.pop();
        Ok(Expr::new(ExprKind::For {
            var,
            input,
            body: Box::new(body?),
        }))
    }

    fn lower_let(&mut self, bindings: &[(ast::QName, ast::Expr)], body: &ast::Expr) -> CResult<Expr> {
        let Some(((name, value), rest)) = bindings.split_first() else {
            return self.lower_expr(body);
        };
        let value = self.lower_boxed(value)?;
        let var = self.expand(name, NameRole::Variable)?;
        self.scope.push(var.clone());
        let body = self.lower_let(rest, body);
        self.scope.pop();
        Ok(Expr::new(ExprKind::Let {
            var,
            value,
            body: Box::new(body?),
        }))
    }

    fn lower_inline_function(
        &mut self,
        params: &[(ast::QName, Option<ast::SequenceType>)],
        return_type: Option<&ast::SequenceType>,
        body: &ast::Expr,
    ) -> CResult<InlineFunctionDef> {
        let mut lowered = Vec::with_capacity(params.len());
        for (name, ty) in params {
            let ty = match ty {
                Some(ty) => self.lower_sequence_type(ty)?,
                None => SequenceType::any(),
            };
            lowered.push((self.expand(name, NameRole::Variable)?, ty));
        }
        let return_type = match return_type {
            Some(ty) => self.lower_sequence_type(ty)?,
            None => SequenceType::any(),
        };
        let mark = self.scope.len();
        self.scope.extend(lowered.iter().map(|(name, _)| name.clone()));
        let body = self.lower_expr(body);
        self.scope.truncate(mark);
        Ok(InlineFunctionDef {
            params: lowered,
            return_type,
            body: body?,
        })
    }

    fn lower_key(&mut self, key: &ast::KeySpecifier) -> CResult<KeySpecifier> {
        Ok(match key {
            ast::KeySpecifier::Wildcard => KeySpecifier::Wildcard,
            ast::KeySpecifier::Name(name) => KeySpecifier::Name(name.clone()),
            ast::KeySpecifier::Integer(i) => KeySpecifier::Integer(*i),
            ast::KeySpecifier::Expr(e) => KeySpecifier::Expr(self.lower_boxed(e)?),
        })
    }

    // ===== Paths =====

    fn lower_path(&mut self, path: &ast::PathExpr) -> CResult<Expr> {
        let mut current = match path.start {
            ast::PathStart::Relative => None,
            ast::PathStart::Root => Some(Expr::new(ExprKind::Root)),
            ast::PathStart::RootDescendant => Some(Expr::new(ExprKind::Path {
                left: Box::new(Expr::new(ExprKind::Root)),
                right: Box::new(descendant_or_self()),
            })),
        };
        for step in &path.steps {
            let step = self.lower_step(step)?;
            current = Some(match current {
                None => step,
                Some(left) => Expr::new(ExprKind::Path {
                    left: Box::new(left),
                    right: Box::new(step),
                }),
            });
        }
        Ok(current.unwrap_or_else(|| Expr::new(ExprKind::Root)))
    }

    fn lower_step(&mut self, step: &ast::Step) -> CResult<Expr> {
        match step {
            ast::Step::DescendantOrSelf => Ok(descendant_or_self()),
            ast::Step::Expr(e) => self.lower_expr(e),
            ast::Step::Axis {
                axis,
                test,
                predicates,
            } => {
                let ast::AxisName::Axis(axis) = *axis else {
                    return Err(Error::from_code(
                        ErrorCode::MPST0010,
                        "the namespace axis is not supported",
                    ));
                };
                let role = if axis == Axis::Flag {
                    NameRole::Flag
                } else {
                    NameRole::Model
                };
                let test = match test {
                    ast::NodeTest::Name(name) => StepTest::Name(self.lower_name_test(name, role)?),
                    ast::NodeTest::Kind(kind) => StepTest::Kind(self.lower_kind_test(kind)?),
                };
                tracing::trace!(axis = %axis, "lowered axis step");
                Ok(Expr::new(ExprKind::Step {
                    axis,
                    test,
                    predicates: self.lower_all(predicates)?,
                }))
            }
        }
    }

    fn lower_name_test(&self, test: &ast::NameTest, role: NameRole) -> CResult<NameTest> {
        Ok(match test {
            ast::NameTest::Any => NameTest::Any,
            ast::NameTest::Name(name) => NameTest::Name(self.expand(name, role)?),
            ast::NameTest::Prefix(prefix) => {
                let uri = self.static_ctx.resolve_prefix(prefix)?;
                NameTest::Namespace(Some(uri).filter(|u| !u.is_empty()).map(Atom::from))
            }
            ast::NameTest::Uri(uri) => {
                NameTest::Namespace(Some(uri.as_str()).filter(|u| !u.is_empty()).map(Atom::from))
            }
            ast::NameTest::Local(local) => NameTest::Local(Atom::from(local.as_str())),
        })
    }

    fn lower_kind_test(&self, test: &ast::KindTest) -> CResult<KindTest> {
        let named = |kind: NodeKind,
                     name: &Option<ast::NameTest>,
                     ty: &Option<ast::QName>,
                     role: NameRole|
         -> CResult<KindTest> {
            let name = match name {
                Some(name) => self.lower_name_test(name, role)?,
                None => NameTest::Any,
            };
            let definition = ty.as_ref().map(|q| DefinitionName::new(q.lexical()));
            Ok(KindTest::of_kind(kind, name, definition))
        };
        match test {
            ast::KindTest::AnyNode => Ok(KindTest::any_node()),
            ast::KindTest::Document(element) => {
                let element = match element {
                    Some(element) => Some(self.lower_kind_test(element)?),
                    None => None,
                };
                Ok(KindTest::document(element))
            }
            ast::KindTest::Assembly(name, ty) => named(NodeKind::Assembly, name, ty, NameRole::Model),
            ast::KindTest::Field(name, ty) => named(NodeKind::Field, name, ty, NameRole::Model),
            ast::KindTest::Flag(name, ty) => named(NodeKind::Flag, name, ty, NameRole::Flag),
        }
    }

    // ===== Types =====

    fn lower_sequence_type(&self, ty: &ast::SequenceType) -> CResult<SequenceType> {
        match ty {
            ast::SequenceType::Empty => Ok(SequenceType::empty()),
            ast::SequenceType::Typed(item, occurrence) => {
                Ok(SequenceType::new(self.lower_item_type(item)?, *occurrence))
            }
        }
    }

    fn lower_item_type(&self, ty: &ast::ItemType) -> CResult<ItemType> {
        Ok(match ty {
            ast::ItemType::AnyItem => ItemType::AnyItem,
            ast::ItemType::AnyFunction => ItemType::AnyFunction,
            ast::ItemType::Atomic(name) => ItemType::Atomic(self.resolve_atomic_type(name)?),
            ast::ItemType::Kind(kind) => ItemType::Kind(self.lower_kind_test(kind)?),
            ast::ItemType::Map(None) => ItemType::Map(None),
            ast::ItemType::Map(Some(entry)) => {
                let (key, value) = entry.as_ref();
                ItemType::Map(Some(Box::new((
                    self.resolve_atomic_type(key)?,
                    self.lower_sequence_type(value)?,
                ))))
            }
            ast::ItemType::Array(None) => ItemType::Array(None),
            ast::ItemType::Array(Some(member)) => {
                ItemType::Array(Some(Box::new(self.lower_sequence_type(member)?)))
            }
        })
    }
}

fn descendant_or_self() -> Expr {
    Expr::new(ExprKind::Step {
        axis: Axis::DescendantOrSelf,
        test: StepTest::Kind(KindTest::any_node()),
        predicates: Vec::new(),
    })
}
