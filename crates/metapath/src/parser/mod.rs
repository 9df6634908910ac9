//! Metapath query text to syntax tree.

use std::sync::Arc;

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use rust_decimal::Decimal;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::Axis;
use crate::types::Occurrence;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "parser/metapath.pest"]
pub struct MetapathParser;

impl From<pest::error::Error<Rule>> for Error {
    fn from(e: pest::error::Error<Rule>) -> Self {
        Error::from_code(ErrorCode::MPST0003, format!("syntax error: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

type BuildResult<T> = Result<T, Error>;

/// Parses `input` into a syntax tree.
pub fn parse_metapath(input: &str) -> Result<ast::Expr, Error> {
    let mut pairs = MetapathParser::parse(Rule::metapath, input)?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::from_code(ErrorCode::MPST0003, "empty query"))?;
    let expr = root
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| Error::from_code(ErrorCode::MPST0003, "empty query"))?;
    build_expr(expr)
}

fn unexpected(pair: &Pair<'_, Rule>) -> Error {
    let (line, col) = pair.line_col();
    Error::from_code(
        ErrorCode::MPST0003,
        format!(
            "unexpected {:?} '{}' at {line}:{col}",
            pair.as_rule(),
            pair.as_str()
        ),
    )
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, parent: &Pair<'i, Rule>) -> BuildResult<Pair<'i, Rule>> {
    pairs.next().ok_or_else(|| unexpected(parent))
}

/// `expr`: one or more comma separated expressions.
fn build_expr(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut items = pair
        .into_inner()
        .map(build_single)
        .collect::<BuildResult<Vec<_>>>()?;
    if items.len() == 1 {
        Ok(items.remove(0))
    } else {
        Ok(ast::Expr::Sequence(items))
    }
}

fn build_single(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    match pair.as_rule() {
        Rule::expr => build_expr(pair),
        Rule::for_expr => build_for(pair),
        Rule::let_expr => build_let(pair),
        Rule::quantified_expr => build_quantified(pair),
        Rule::if_expr => build_if(pair),
        Rule::or_expr => build_logical(pair, true),
        Rule::and_expr => build_logical(pair, false),
        Rule::comparison_expr => build_comparison(pair),
        Rule::string_concat_expr => build_string_concat(pair),
        Rule::range_expr => build_range(pair),
        Rule::additive_expr | Rule::multiplicative_expr => build_arithmetic(pair),
        Rule::union_expr | Rule::intersect_except_expr => build_set_op(pair),
        Rule::instanceof_expr | Rule::treat_expr => build_sequence_type_op(pair),
        Rule::castable_expr | Rule::cast_expr => build_cast(pair),
        Rule::arrow_expr => build_arrow(pair),
        Rule::unary_expr => build_unary(pair),
        Rule::simple_map_expr => build_simple_map(pair),
        Rule::path_expr => build_path(pair),
        _ => build_primary(pair),
    }
}

fn build_var_name(pair: Pair<'_, Rule>) -> BuildResult<ast::QName> {
    // var_name > eqname
    let eqname = pair.into_inner().next();
    match eqname {
        Some(name) => Ok(ast::QName::parse(name.as_str())),
        None => Err(Error::from_code(ErrorCode::MPST0003, "missing variable name")),
    }
}

fn build_bindings<'i>(
    pairs: impl Iterator<Item = Pair<'i, Rule>>,
) -> BuildResult<Vec<(ast::QName, ast::Expr)>> {
    pairs
        .filter(|p| matches!(p.as_rule(), Rule::simple_for_binding | Rule::simple_let_binding))
        .map(|binding| {
            let parent = binding.clone();
            let mut inner = binding.into_inner().filter(|p| p.as_rule() != Rule::K_IN);
            let name = build_var_name(next_pair_filtered(&mut inner, &parent)?)?;
            let value = build_single(next_pair_filtered(&mut inner, &parent)?)?;
            Ok((name, value))
        })
        .collect()
}

fn next_pair_filtered<'i>(
    iter: &mut impl Iterator<Item = Pair<'i, Rule>>,
    parent: &Pair<'i, Rule>,
) -> BuildResult<Pair<'i, Rule>> {
    iter.next().ok_or_else(|| unexpected(parent))
}

fn last_operand(pair: &Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let last = pair
        .clone()
        .into_inner()
        .last()
        .ok_or_else(|| unexpected(pair))?;
    build_single(last)
}

fn build_for(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let body = last_operand(&pair)?;
    let bindings = build_bindings(pair.into_inner())?;
    Ok(ast::Expr::For {
        bindings,
        body: Box::new(body),
    })
}

fn build_let(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let body = last_operand(&pair)?;
    let bindings = build_bindings(pair.into_inner())?;
    Ok(ast::Expr::Let {
        bindings,
        body: Box::new(body),
    })
}

fn build_quantified(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let satisfies = last_operand(&pair)?;
    let quantifier = match pair.clone().into_inner().next().map(|p| p.as_rule()) {
        Some(Rule::K_EVERY) => ast::Quantifier::Every,
        _ => ast::Quantifier::Some,
    };
    let bindings = build_bindings(pair.into_inner())?;
    Ok(ast::Expr::Quantified {
        quantifier,
        bindings,
        satisfies: Box::new(satisfies),
    })
}

fn build_if(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut operands = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::K_IF | Rule::K_THEN | Rule::K_ELSE));
    let cond = build_single(next_pair_filtered(&mut operands, &parent)?)?;
    let then_expr = build_single(next_pair_filtered(&mut operands, &parent)?)?;
    let else_expr = build_single(next_pair_filtered(&mut operands, &parent)?)?;
    Ok(ast::Expr::IfThenElse {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
    })
}

/// Operands of a chain rule, skipping operator tokens.
fn operands<'i>(pair: Pair<'i, Rule>, operators: &[Rule]) -> Vec<Pair<'i, Rule>> {
    pair.into_inner()
        .filter(|p| !operators.contains(&p.as_rule()))
        .collect()
}

fn build_logical(pair: Pair<'_, Rule>, is_or: bool) -> BuildResult<ast::Expr> {
    let mut parts = operands(pair, &[Rule::K_OR, Rule::K_AND])
        .into_iter()
        .map(build_single)
        .collect::<BuildResult<Vec<_>>>()?;
    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    Ok(if is_or {
        ast::Expr::Or(parts)
    } else {
        ast::Expr::And(parts)
    })
}

fn build_comparison(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let left = build_single(next_pair(&mut inner, &parent)?)?;
    let Some(op) = inner.next() else {
        return Ok(left);
    };
    let right = Box::new(build_single(next_pair(&mut inner, &parent)?)?);
    let left = Box::new(left);
    let token = op
        .clone()
        .into_inner()
        .next()
        .map_or(op.as_rule(), |t| t.as_rule());
    use ast::ComparisonOp as C;
    Ok(match token {
        Rule::K_EQ => ast::Expr::ValueComparison { left, op: C::Eq, right },
        Rule::K_NE => ast::Expr::ValueComparison { left, op: C::Ne, right },
        Rule::K_LT => ast::Expr::ValueComparison { left, op: C::Lt, right },
        Rule::K_LE => ast::Expr::ValueComparison { left, op: C::Le, right },
        Rule::K_GT => ast::Expr::ValueComparison { left, op: C::Gt, right },
        Rule::K_GE => ast::Expr::ValueComparison { left, op: C::Ge, right },
        Rule::OP_EQ => ast::Expr::GeneralComparison { left, op: C::Eq, right },
        Rule::OP_NE => ast::Expr::GeneralComparison { left, op: C::Ne, right },
        Rule::OP_LT => ast::Expr::GeneralComparison { left, op: C::Lt, right },
        Rule::OP_LTE => ast::Expr::GeneralComparison { left, op: C::Le, right },
        Rule::OP_GT => ast::Expr::GeneralComparison { left, op: C::Gt, right },
        Rule::OP_GTE => ast::Expr::GeneralComparison { left, op: C::Ge, right },
        Rule::K_IS => ast::Expr::NodeComparison { left, op: ast::NodeComp::Is, right },
        Rule::OP_PRECEDES => ast::Expr::NodeComparison {
            left,
            op: ast::NodeComp::Precedes,
            right,
        },
        Rule::OP_FOLLOWS => ast::Expr::NodeComparison {
            left,
            op: ast::NodeComp::Follows,
            right,
        },
        _ => return Err(unexpected(&op)),
    })
}

fn build_string_concat(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut parts = operands(pair, &[Rule::OP_CONCAT])
        .into_iter()
        .map(build_single)
        .collect::<BuildResult<Vec<_>>>()?;
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(ast::Expr::StringConcat(parts))
    }
}

fn build_range(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut parts = operands(pair, &[Rule::K_TO]);
    if parts.len() == 1 {
        return build_single(parts.remove(0));
    }
    let end = build_single(parts.remove(1))?;
    let start = build_single(parts.remove(0))?;
    Ok(ast::Expr::Range {
        start: Box::new(start),
        end: Box::new(end),
    })
}

fn build_arithmetic(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let mut expr = build_single(next_pair(&mut inner, &parent)?)?;
    while let Some(op) = inner.next() {
        let op = match op.as_rule() {
            Rule::OP_PLUS => ast::BinaryOp::Add,
            Rule::OP_MINUS => ast::BinaryOp::Sub,
            Rule::OP_STAR => ast::BinaryOp::Mul,
            Rule::K_DIV => ast::BinaryOp::Div,
            Rule::K_IDIV => ast::BinaryOp::IDiv,
            Rule::K_MOD => ast::BinaryOp::Mod,
            _ => return Err(unexpected(&op)),
        };
        let right = build_single(next_pair(&mut inner, &parent)?)?;
        expr = ast::Expr::Binary {
            left: Box::new(expr),
            op,
            right: Box::new(right),
        };
    }
    Ok(expr)
}

fn build_set_op(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let mut expr = build_single(next_pair(&mut inner, &parent)?)?;
    while let Some(op) = inner.next() {
        let op = match op.as_rule() {
            Rule::K_UNION | Rule::OP_PIPE => ast::SetOp::Union,
            Rule::K_INTERSECT => ast::SetOp::Intersect,
            Rule::K_EXCEPT => ast::SetOp::Except,
            _ => return Err(unexpected(&op)),
        };
        let right = build_single(next_pair(&mut inner, &parent)?)?;
        expr = ast::Expr::SetOp {
            left: Box::new(expr),
            op,
            right: Box::new(right),
        };
    }
    Ok(expr)
}

fn build_sequence_type_op(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let is_instance_of = pair.as_rule() == Rule::instanceof_expr;
    let parent = pair.clone();
    let mut inner = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::K_INSTANCE | Rule::K_OF | Rule::K_TREAT | Rule::K_AS));
    let expr = build_single(next_pair_filtered(&mut inner, &parent)?)?;
    let Some(ty) = inner.next() else {
        return Ok(expr);
    };
    let ty = build_sequence_type(ty)?;
    let expr = Box::new(expr);
    Ok(if is_instance_of {
        ast::Expr::InstanceOf { expr, ty }
    } else {
        ast::Expr::TreatAs { expr, ty }
    })
}

fn build_cast(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let is_castable = pair.as_rule() == Rule::castable_expr;
    let parent = pair.clone();
    let mut inner = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::K_CAST | Rule::K_CASTABLE | Rule::K_AS));
    let expr = build_single(next_pair_filtered(&mut inner, &parent)?)?;
    let Some(ty) = inner.next() else {
        return Ok(expr);
    };
    let ty = build_single_type(ty)?;
    let expr = Box::new(expr);
    Ok(if is_castable {
        ast::Expr::CastableAs { expr, ty }
    } else {
        ast::Expr::CastAs { expr, ty }
    })
}

/// `E => f(a, b)` is `f(E, a, b)`; a variable or parenthesized specifier makes
/// it a dynamic call.
fn build_arrow(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::OP_ARROW);
    let mut expr = build_single(next_pair_filtered(&mut inner, &parent)?)?;
    while let Some(specifier) = inner.next() {
        let arguments = next_pair_filtered(&mut inner, &parent)?;
        let mut args = vec![expr];
        args.extend(build_arguments(arguments)?);
        let target = specifier
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| unexpected(&specifier))?;
        expr = match target.as_rule() {
            Rule::eqname => ast::Expr::FunctionCall {
                name: ast::QName::parse(target.as_str()),
                args,
            },
            _ => ast::Expr::DynamicCall {
                base: Box::new(build_primary(target)?),
                args,
            },
        };
    }
    Ok(expr)
}

fn build_unary(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut negations = 0usize;
    let mut signs = 0usize;
    let mut operand = None;
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::OP_MINUS => {
                negations += 1;
                signs += 1;
            }
            Rule::OP_PLUS => signs += 1,
            _ => {
                // a single minus folds into an integer literal so i64::MIN is expressible
                let digits = p.as_str().trim();
                if signs == 1 && negations == 1 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    let value = format!("-{digits}").parse::<i64>().map_err(|_| {
                        Error::from_code(
                            ErrorCode::FOAR0002,
                            format!("integer literal '-{digits}' is out of range"),
                        )
                    })?;
                    return Ok(ast::Expr::Literal(ast::Literal::Integer(value)));
                }
                operand = Some(build_single(p)?);
            }
        }
    }
    let operand = operand.ok_or_else(|| unexpected(&pair))?;
    let has_sign = pair
        .into_inner()
        .any(|p| matches!(p.as_rule(), Rule::OP_MINUS | Rule::OP_PLUS));
    if !has_sign {
        return Ok(operand);
    }
    // unary plus still atomizes, so keep a node even for an even count
    let mut expr = ast::Expr::Negate(Box::new(operand));
    if negations % 2 == 0 {
        expr = ast::Expr::Negate(Box::new(expr));
    }
    Ok(expr)
}

fn build_simple_map(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut parts = operands(pair, &[Rule::OP_BANG])
        .into_iter()
        .map(build_single)
        .collect::<BuildResult<Vec<_>>>()?;
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(ast::Expr::SimpleMap(parts))
    }
}

// ===== Paths =====

fn build_path(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let first = next_pair(&mut inner, &parent)?;
    let (start, relative) = match first.as_rule() {
        Rule::OP_DSLASH => (ast::PathStart::RootDescendant, inner.next()),
        Rule::OP_SLASH => (ast::PathStart::Root, inner.next()),
        _ => (ast::PathStart::Relative, Some(first)),
    };
    let steps = match relative {
        Some(rel) => build_relative_steps(rel)?,
        None => Vec::new(),
    };
    // a lone primary is not a path
    if start == ast::PathStart::Relative && steps.len() == 1 {
        if let Some(ast::Step::Expr(_)) = steps.first() {
            if let Some(ast::Step::Expr(expr)) = steps.into_iter().next() {
                return Ok(expr);
            }
            return Err(unexpected(&parent));
        }
    }
    Ok(ast::Expr::Path(ast::PathExpr { start, steps }))
}

fn build_relative_steps(pair: Pair<'_, Rule>) -> BuildResult<Vec<ast::Step>> {
    let mut steps = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::OP_SLASH => {}
            Rule::OP_DSLASH => steps.push(ast::Step::DescendantOrSelf),
            Rule::step_expr => steps.push(build_step(p)?),
            _ => return Err(unexpected(&p)),
        }
    }
    Ok(steps)
}

fn build_step(pair: Pair<'_, Rule>) -> BuildResult<ast::Step> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    match inner.as_rule() {
        Rule::postfix_expr => Ok(ast::Step::Expr(build_postfix(inner)?)),
        Rule::axis_step => build_axis_step(inner),
        _ => Err(unexpected(&inner)),
    }
}

fn build_axis_step(pair: Pair<'_, Rule>) -> BuildResult<ast::Step> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let step = next_pair(&mut inner, &parent)?;
    let (axis, test) = build_axis_and_test(step)?;
    let predicates = inner.map(build_predicate).collect::<BuildResult<Vec<_>>>()?;
    Ok(ast::Step::Axis {
        axis,
        test,
        predicates,
    })
}

fn build_axis_and_test(step: Pair<'_, Rule>) -> BuildResult<(ast::AxisName, ast::NodeTest)> {
    let parent = step.clone();
    let mut inner = step.into_inner();
    let first = next_pair(&mut inner, &parent)?;
    match first.as_rule() {
        Rule::forward_axis | Rule::reverse_axis => {
            let keyword = first
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| unexpected(&first))?;
            let axis = axis_from_keyword(&keyword)?;
            let test = build_node_test(next_pair(&mut inner, &parent)?)?;
            Ok((axis, test))
        }
        Rule::abbrev_forward_step => {
            let mut parts = first.clone().into_inner();
            let head = next_pair(&mut parts, &first)?;
            if head.as_rule() == Rule::OP_AT {
                let test = build_node_test(next_pair(&mut parts, &first)?)?;
                Ok((ast::AxisName::Axis(Axis::Flag), test))
            } else {
                let test = build_node_test(head)?;
                let axis = match test {
                    ast::NodeTest::Kind(ast::KindTest::Flag(..)) => Axis::Flag,
                    _ => Axis::Child,
                };
                Ok((ast::AxisName::Axis(axis), test))
            }
        }
        Rule::abbrev_reverse_step => Ok((
            ast::AxisName::Axis(Axis::Parent),
            ast::NodeTest::Kind(ast::KindTest::AnyNode),
        )),
        _ => Err(unexpected(&first)),
    }
}

fn axis_from_keyword(keyword: &Pair<'_, Rule>) -> BuildResult<ast::AxisName> {
    if keyword.as_rule() == Rule::K_NAMESPACE {
        return Ok(ast::AxisName::Namespace);
    }
    Axis::from_name(keyword.as_str())
        .map(ast::AxisName::Axis)
        .ok_or_else(|| unexpected(keyword))
}

fn build_node_test(pair: Pair<'_, Rule>) -> BuildResult<ast::NodeTest> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    match inner.as_rule() {
        Rule::kind_test => Ok(ast::NodeTest::Kind(build_kind_test(inner)?)),
        Rule::name_test => Ok(ast::NodeTest::Name(build_name_test(inner)?)),
        _ => Err(unexpected(&inner)),
    }
}

fn build_name_test(pair: Pair<'_, Rule>) -> BuildResult<ast::NameTest> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    match inner.as_rule() {
        Rule::eqname => Ok(ast::NameTest::Name(ast::QName::parse(inner.as_str()))),
        Rule::wildcard => {
            let kind = inner
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| unexpected(&inner))?;
            let text = || {
                kind.clone()
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default()
            };
            Ok(match kind.as_rule() {
                Rule::any_wildcard => ast::NameTest::Any,
                Rule::local_wildcard => ast::NameTest::Local(text()),
                Rule::prefix_wildcard => ast::NameTest::Prefix(text()),
                Rule::uri_wildcard => ast::NameTest::Uri(text()),
                _ => return Err(unexpected(&kind)),
            })
        }
        _ => Err(unexpected(&inner)),
    }
}

fn build_kind_test(pair: Pair<'_, Rule>) -> BuildResult<ast::KindTest> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    match inner.as_rule() {
        Rule::any_kind_test => Ok(ast::KindTest::AnyNode),
        Rule::document_test => {
            let element = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::assembly_test)
                .map(|p| build_named_kind_test(p).map(Box::new))
                .transpose()?;
            Ok(ast::KindTest::Document(element))
        }
        Rule::assembly_test | Rule::field_test | Rule::flag_test => build_named_kind_test(inner),
        _ => Err(unexpected(&inner)),
    }
}

fn build_named_kind_test(pair: Pair<'_, Rule>) -> BuildResult<ast::KindTest> {
    let rule = pair.as_rule();
    let mut name = None;
    let mut type_name = None;
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::name_or_wildcard => {
                let inner = p.clone().into_inner().next().ok_or_else(|| unexpected(&p))?;
                name = Some(match inner.as_rule() {
                    Rule::any_wildcard => ast::NameTest::Any,
                    _ => ast::NameTest::Name(ast::QName::parse(inner.as_str())),
                });
            }
            Rule::type_name => {
                let inner = p.clone().into_inner().next().ok_or_else(|| unexpected(&p))?;
                type_name = Some(ast::QName::parse(inner.as_str()));
            }
            _ => {}
        }
    }
    Ok(match rule {
        Rule::assembly_test => ast::KindTest::Assembly(name, type_name),
        Rule::field_test => ast::KindTest::Field(name, type_name),
        Rule::flag_test => ast::KindTest::Flag(name, type_name),
        _ => return Err(unexpected(&pair)),
    })
}

fn build_predicate(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let expr = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    build_expr(expr)
}

// ===== Postfix and primary =====

fn build_postfix(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let mut expr = build_primary(next_pair(&mut inner, &parent)?)?;
    let mut predicates = Vec::new();
    for p in inner {
        if p.as_rule() != Rule::predicate && !predicates.is_empty() {
            expr = ast::Expr::Filter {
                base: Box::new(expr),
                predicates: std::mem::take(&mut predicates),
            };
        }
        match p.as_rule() {
            Rule::predicate => predicates.push(build_predicate(p)?),
            Rule::argument_list => {
                expr = ast::Expr::DynamicCall {
                    base: Box::new(expr),
                    args: build_arguments(p)?,
                };
            }
            Rule::lookup => {
                expr = ast::Expr::Lookup {
                    base: Box::new(expr),
                    key: build_key_specifier(p)?,
                };
            }
            _ => return Err(unexpected(&p)),
        }
    }
    if !predicates.is_empty() {
        expr = ast::Expr::Filter {
            base: Box::new(expr),
            predicates,
        };
    }
    Ok(expr)
}

fn build_arguments(pair: Pair<'_, Rule>) -> BuildResult<Vec<ast::Expr>> {
    pair.into_inner().map(build_single).collect()
}

fn build_key_specifier(pair: Pair<'_, Rule>) -> BuildResult<ast::KeySpecifier> {
    let spec = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    let key = spec
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&spec))?;
    Ok(match key.as_rule() {
        Rule::lookup_wildcard => ast::KeySpecifier::Wildcard,
        Rule::integer_literal => ast::KeySpecifier::Integer(parse_integer_literal(&key)?),
        Rule::ncname => ast::KeySpecifier::Name(key.as_str().to_string()),
        Rule::parenthesized_expr => ast::KeySpecifier::Expr(Box::new(build_primary(key)?)),
        _ => return Err(unexpected(&key)),
    })
}

fn parse_integer_literal(pair: &Pair<'_, Rule>) -> BuildResult<i64> {
    pair.as_str().parse::<i64>().map_err(|_| {
        Error::from_code(
            ErrorCode::FOAR0002,
            format!("integer literal '{}' is out of range", pair.as_str()),
        )
    })
}

fn build_primary(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    match pair.as_rule() {
        Rule::postfix_expr => build_postfix(pair),
        Rule::integer_literal => Ok(ast::Expr::Literal(ast::Literal::Integer(
            parse_integer_literal(&pair)?,
        ))),
        Rule::decimal_literal => {
            let text = pair.as_str();
            let normalized = if text.starts_with('.') {
                format!("0{text}")
            } else {
                text.trim_end_matches('.').to_string()
            };
            normalized
                .parse::<Decimal>()
                .map(|d| ast::Expr::Literal(ast::Literal::Decimal(d)))
                .map_err(|_| {
                    Error::from_code(
                        ErrorCode::FOAR0002,
                        format!("decimal literal '{text}' is out of range"),
                    )
                })
        }
        Rule::double_literal => pair
            .as_str()
            .parse::<f64>()
            .map(|d| ast::Expr::Literal(ast::Literal::Double(d)))
            .map_err(|_| unexpected(&pair)),
        Rule::string_literal => {
            let content = pair.into_inner().next();
            let text = match content {
                Some(inner) if inner.as_rule() == Rule::dbl_string_inner => {
                    inner.as_str().replace("\"\"", "\"")
                }
                Some(inner) => inner.as_str().replace("''", "'"),
                None => String::new(),
            };
            Ok(ast::Expr::Literal(ast::Literal::String(text)))
        }
        Rule::var_ref => {
            let name = pair
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| unexpected(&pair))?;
            Ok(ast::Expr::VarRef(build_var_name(name)?))
        }
        Rule::parenthesized_expr => match pair.into_inner().next() {
            Some(expr) => build_expr(expr),
            None => Ok(ast::Expr::Sequence(Vec::new())),
        },
        Rule::context_item_expr => Ok(ast::Expr::ContextItem),
        Rule::function_call => {
            let parent = pair.clone();
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, &parent)?;
            let args = build_arguments(next_pair(&mut inner, &parent)?)?;
            Ok(ast::Expr::FunctionCall {
                name: ast::QName::parse(name.as_str()),
                args,
            })
        }
        Rule::named_function_ref => {
            let parent = pair.clone();
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, &parent)?;
            let arity = next_pair(&mut inner, &parent)?;
            let arity = usize::try_from(parse_integer_literal(&arity)?)
                .map_err(|_| unexpected(&arity))?;
            Ok(ast::Expr::NamedFunctionRef {
                name: ast::QName::parse(name.as_str()),
                arity,
            })
        }
        Rule::inline_function_expr => build_inline_function(pair),
        Rule::map_constructor => {
            let entries = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::map_constructor_entry)
                .map(|entry| {
                    let parent = entry.clone();
                    let mut inner = entry.into_inner();
                    let key = build_single(next_pair(&mut inner, &parent)?)?;
                    let value = build_single(next_pair(&mut inner, &parent)?)?;
                    Ok((key, value))
                })
                .collect::<BuildResult<Vec<_>>>()?;
            Ok(ast::Expr::MapConstructor(entries))
        }
        Rule::square_array => Ok(ast::Expr::SquareArray(
            pair.into_inner().map(build_single).collect::<BuildResult<_>>()?,
        )),
        Rule::curly_array => {
            let content = pair.into_inner().find(|p| p.as_rule() == Rule::expr);
            let body = match content {
                Some(expr) => build_expr(expr)?,
                None => ast::Expr::Sequence(Vec::new()),
            };
            Ok(ast::Expr::CurlyArray(Box::new(body)))
        }
        Rule::unary_lookup => Ok(ast::Expr::UnaryLookup(build_key_specifier(pair)?)),
        Rule::eqname => Ok(ast::Expr::FunctionCall {
            name: ast::QName::parse(pair.as_str()),
            args: Vec::new(),
        }),
        _ => Err(unexpected(&pair)),
    }
}

fn build_inline_function(pair: Pair<'_, Rule>) -> BuildResult<ast::Expr> {
    let mut params = Vec::new();
    let mut return_type = None;
    let mut body = ast::Expr::Sequence(Vec::new());
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::param_list => {
                for param in p.into_inner() {
                    let parent = param.clone();
                    let mut inner = param.into_inner().filter(|x| x.as_rule() != Rule::K_AS);
                    let name = next_pair_filtered(&mut inner, &parent)?;
                    let ty = inner.next().map(build_sequence_type).transpose()?;
                    params.push((ast::QName::parse(name.as_str()), ty));
                }
            }
            Rule::sequence_type => return_type = Some(build_sequence_type(p)?),
            Rule::function_body => {
                if let Some(expr) = p.into_inner().next() {
                    body = build_expr(expr)?;
                }
            }
            _ => {}
        }
    }
    Ok(ast::Expr::InlineFunction {
        params,
        return_type,
        body: Box::new(body),
    })
}

// ===== Types =====

fn build_single_type(pair: Pair<'_, Rule>) -> BuildResult<ast::SingleType> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let atomic = next_pair(&mut inner, &parent)?;
    let name = atomic
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&atomic))?;
    Ok(ast::SingleType {
        name: ast::QName::parse(name.as_str()),
        allow_empty: inner.next().is_some(),
    })
}

fn build_sequence_type(pair: Pair<'_, Rule>) -> BuildResult<ast::SequenceType> {
    let parent = pair.clone();
    let mut inner = pair.into_inner();
    let first = next_pair(&mut inner, &parent)?;
    if first.as_rule() == Rule::empty_sequence_type {
        return Ok(ast::SequenceType::Empty);
    }
    let item = build_item_type(first)?;
    let occurrence = match inner.next() {
        Some(indicator) => Occurrence::from_indicator(indicator.as_str().trim())
            .ok_or_else(|| unexpected(&indicator))?,
        None => Occurrence::One,
    };
    Ok(ast::SequenceType::Typed(item, occurrence))
}

fn build_item_type(pair: Pair<'_, Rule>) -> BuildResult<ast::ItemType> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| unexpected(&pair))?;
    match inner.as_rule() {
        Rule::kind_test => Ok(ast::ItemType::Kind(build_kind_test(inner)?)),
        Rule::any_item_test => Ok(ast::ItemType::AnyItem),
        Rule::any_function_test => Ok(ast::ItemType::AnyFunction),
        Rule::map_test => {
            let parts: Vec<_> = inner
                .into_inner()
                .filter(|p| p.as_rule() != Rule::K_MAP)
                .collect();
            match parts.as_slice() {
                [key, value] if key.as_rule() == Rule::atomic_type => {
                    let key_name = key
                        .clone()
                        .into_inner()
                        .next()
                        .ok_or_else(|| unexpected(key))?;
                    let value = build_sequence_type(value.clone())?;
                    Ok(ast::ItemType::Map(Some(Box::new((
                        ast::QName::parse(key_name.as_str()),
                        value,
                    )))))
                }
                _ => Ok(ast::ItemType::Map(None)),
            }
        }
        Rule::array_test => {
            let member = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::sequence_type)
                .map(build_sequence_type)
                .transpose()?;
            Ok(ast::ItemType::Array(member.map(Box::new)))
        }
        Rule::parenthesized_item_type => {
            let nested = inner
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| unexpected(&inner))?;
            build_item_type(nested)
        }
        Rule::atomic_type => {
            let name = inner
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| unexpected(&inner))?;
            Ok(ast::ItemType::Atomic(ast::QName::parse(name.as_str())))
        }
        _ => Err(unexpected(&inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_primary_is_not_a_path() {
        assert_eq!(
            parse_metapath("42").unwrap(),
            ast::Expr::Literal(ast::Literal::Integer(42))
        );
    }

    #[test]
    fn abbreviated_flag_step() {
        let ast = parse_metapath("a/@id").unwrap();
        let ast::Expr::Path(path) = ast else {
            panic!("expected a path");
        };
        assert_eq!(path.steps.len(), 2);
        assert!(matches!(
            path.steps[1],
            ast::Step::Axis {
                axis: ast::AxisName::Axis(Axis::Flag),
                ..
            }
        ));
    }

    #[test]
    fn arrow_becomes_call_with_first_argument() {
        let ast = parse_metapath("'abc' => upper-case()").unwrap();
        let ast::Expr::FunctionCall { name, args } = ast else {
            panic!("expected a call");
        };
        assert_eq!(name.local, "upper-case");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn minus_folds_into_integer_literal() {
        assert_eq!(
            parse_metapath("-9223372036854775808").unwrap(),
            ast::Expr::Literal(ast::Literal::Integer(i64::MIN))
        );
        assert!(matches!(parse_metapath("--5").unwrap(), ast::Expr::Negate(_)));
        assert_eq!(
            parse_metapath("-9223372036854775809").unwrap_err().code,
            ErrorCode::FOAR0002
        );
    }

    #[test]
    fn comments_nest() {
        assert!(parse_metapath("1 (: outer (: inner :) :) + 2").is_ok());
    }

    #[test]
    fn syntax_errors_are_static() {
        let err = parse_metapath("1 +").unwrap_err();
        assert_eq!(err.code, ErrorCode::MPST0003);
    }
}
