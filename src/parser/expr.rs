//! Expression parser
//!
//! Builds the [`Expr`] tree evaluated by the tree walker from the pairs of
//! the `expression_root` rule in `script.pest`. The grammar encodes
//! precedence as one rule per level; the builders here fold each level's
//! operand/operator/operand run into the tree.

use pest::iterators::Pair;
use pest::Parser;

use super::scanner::{self, RawPart};
use super::tokens::{inner_text, number_value, string_value};
use super::{syntax_failure, ParseFailure, ParseResult, Rule, ScriptParser};
use crate::executor::types::{ArrowBody, BinaryOp, Expr, LogicalOp, TemplatePart, UnaryOp, Val};

/// Nesting limit for brackets and template interpolations
pub const MAX_EXPR_DEPTH: usize = 32;

/// Parse a complete expression. Trailing `;` are tolerated.
pub fn parse_expression(src: &str) -> ParseResult<Expr> {
    parse_at_depth(src, 0)
}

fn parse_at_depth(src: &str, depth: usize) -> ParseResult<Expr> {
    if let Some(offset) = scanner::unterminated_quote(src) {
        return Err(ParseFailure::UnterminatedString { offset });
    }
    // The grammar recurses once per bracket; bound it before parsing.
    if depth + scanner::max_depth(src) > MAX_EXPR_DEPTH {
        return Err(ParseFailure::TooDeep {
            limit: MAX_EXPR_DEPTH,
        });
    }

    let root = ScriptParser::parse(Rule::expression_root, src)
        .map_err(|err| syntax_failure(src, &err))?
        .next()
        .ok_or(ParseFailure::UnexpectedEnd)?;
    let expression = root
        .into_inner()
        .next()
        .ok_or(ParseFailure::UnexpectedEnd)?;
    build_expression(expression, depth)
}

fn unexpected(pair: &Pair<Rule>) -> ParseFailure {
    ParseFailure::UnexpectedToken {
        found: pair.as_str().to_string(),
        offset: pair.as_span().start(),
    }
}

fn next_pair<'i>(pairs: &mut pest::iterators::Pairs<'i, Rule>) -> ParseResult<Pair<'i, Rule>> {
    pairs.next().ok_or(ParseFailure::UnexpectedEnd)
}

/* ===================== Operator Tables ===================== */

#[derive(Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix_op(rule: Rule) -> Option<Infix> {
    let op = match rule {
        Rule::op_nullish => Infix::Logical(LogicalOp::Nullish),
        Rule::op_or => Infix::Logical(LogicalOp::Or),
        Rule::op_and => Infix::Logical(LogicalOp::And),
        Rule::op_bit_or => Infix::Binary(BinaryOp::BitOr),
        Rule::op_bit_xor => Infix::Binary(BinaryOp::BitXor),
        Rule::op_bit_and => Infix::Binary(BinaryOp::BitAnd),
        Rule::op_eq => Infix::Binary(BinaryOp::Eq),
        Rule::op_ne => Infix::Binary(BinaryOp::Ne),
        Rule::op_strict_eq => Infix::Binary(BinaryOp::StrictEq),
        Rule::op_strict_ne => Infix::Binary(BinaryOp::StrictNe),
        Rule::op_lt => Infix::Binary(BinaryOp::Lt),
        Rule::op_le => Infix::Binary(BinaryOp::Le),
        Rule::op_gt => Infix::Binary(BinaryOp::Gt),
        Rule::op_ge => Infix::Binary(BinaryOp::Ge),
        Rule::op_shl => Infix::Binary(BinaryOp::Shl),
        Rule::op_shr => Infix::Binary(BinaryOp::Shr),
        Rule::op_add => Infix::Binary(BinaryOp::Add),
        Rule::op_sub => Infix::Binary(BinaryOp::Sub),
        Rule::op_mul => Infix::Binary(BinaryOp::Mul),
        Rule::op_div => Infix::Binary(BinaryOp::Div),
        Rule::op_mod => Infix::Binary(BinaryOp::Mod),
        Rule::op_pow => Infix::Binary(BinaryOp::Pow),
        _ => return None,
    };
    Some(op)
}

fn compound_op(rule: Rule) -> Option<Option<BinaryOp>> {
    match rule {
        Rule::op_assign => Some(None),
        Rule::op_add_assign => Some(Some(BinaryOp::Add)),
        Rule::op_sub_assign => Some(Some(BinaryOp::Sub)),
        Rule::op_mul_assign => Some(Some(BinaryOp::Mul)),
        Rule::op_div_assign => Some(Some(BinaryOp::Div)),
        Rule::op_mod_assign => Some(Some(BinaryOp::Mod)),
        _ => None,
    }
}

fn prefix_op(rule: Rule) -> Option<UnaryOp> {
    match rule {
        Rule::op_not => Some(UnaryOp::Not),
        Rule::op_neg => Some(UnaryOp::Neg),
        Rule::op_plus => Some(UnaryOp::Plus),
        Rule::op_bit_not => Some(UnaryOp::BitNot),
        Rule::op_typeof => Some(UnaryOp::Typeof),
        _ => None,
    }
}

/* ===================== Expression Builders ===================== */

fn build_expression(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::expression => build_assignment(pair, depth),
        Rule::arrow => build_arrow(pair, depth),
        Rule::conditional => build_conditional(pair, depth),
        Rule::nullish
        | Rule::logical_or
        | Rule::logical_and
        | Rule::bit_or
        | Rule::bit_xor
        | Rule::bit_and
        | Rule::equality
        | Rule::relational
        | Rule::shift
        | Rule::additive
        | Rule::multiplicative => build_binary_expr(pair, depth),
        Rule::power => build_power_expr(pair, depth),
        Rule::unary => build_unary_expr(pair, depth),
        Rule::postfix => build_postfix_expr(pair, depth),
        Rule::new_expr => build_new_expr(pair, depth),
        Rule::paren => build_expression(next_pair(&mut pair.into_inner())?, depth),
        Rule::array => Ok(Expr::Array {
            elements: build_list(pair, depth)?,
        }),
        Rule::object => build_object(pair, depth),
        Rule::template => build_template(pair, depth),
        Rule::string => Ok(Expr::Lit {
            v: Val::Str(string_value(pair)),
        }),
        Rule::number => match number_value(pair.clone()) {
            Some(v) => Ok(Expr::Lit { v }),
            None => Err(unexpected(&pair)),
        },
        Rule::keyword_literal => Ok(keyword_literal(pair.as_str())),
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
        }),
        _ => Err(unexpected(&pair)),
    }
}

/// `target op value` chains fold to the right.
fn build_assignment(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut pairs: Vec<Pair<Rule>> = pair.into_inner().collect();
    let last = pairs.pop().ok_or(ParseFailure::UnexpectedEnd)?;
    let mut value = build_expression(last, depth)?;

    while let Some(op_pair) = pairs.pop() {
        let op = compound_op(op_pair.as_rule()).ok_or_else(|| unexpected(&op_pair))?;
        let target_pair = pairs.pop().ok_or(ParseFailure::UnexpectedEnd)?;
        let text = target_pair.as_str().trim().to_string();
        let target = build_expression(target_pair, depth)?;
        if !target.is_assignable() {
            return Err(ParseFailure::InvalidTarget { target: text });
        }
        value = Expr::Assign {
            target: Box::new(target),
            op,
            value: Box::new(value),
        };
    }
    Ok(value)
}

fn build_arrow(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let params = next_pair(&mut inner)?
        .into_inner()
        .map(|param| param.as_str().to_string())
        .collect();

    let body_pair = next_pair(&mut inner)?;
    let body = match body_pair.as_rule() {
        Rule::arrow_block => ArrowBody::Block {
            source: inner_text(body_pair).to_string(),
        },
        _ => ArrowBody::Expr {
            e: Box::new(build_expression(body_pair, depth)?),
        },
    };
    Ok(Expr::Arrow { params, body })
}

fn build_conditional(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let test = build_expression(next_pair(&mut inner)?, depth)?;
    let Some(consequent) = inner.next() else {
        return Ok(test);
    };
    let alternate = next_pair(&mut inner)?;
    Ok(Expr::Conditional {
        test: Box::new(test),
        consequent: Box::new(build_expression(consequent, depth)?),
        alternate: Box::new(build_expression(alternate, depth)?),
    })
}

/// One precedence level: `operand (op operand)*`, left-associative.
fn build_binary_expr(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut left = build_expression(next_pair(&mut inner)?, depth)?;

    while let Some(op_pair) = inner.next() {
        let infix = infix_op(op_pair.as_rule()).ok_or_else(|| unexpected(&op_pair))?;
        let right = build_expression(next_pair(&mut inner)?, depth)?;
        left = match infix {
            Infix::Binary(op) => Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Infix::Logical(op) => Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
    }
    Ok(left)
}

/// `**` is right-associative.
fn build_power_expr(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut operands = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::op_pow {
            operands.push(build_expression(inner, depth)?);
        }
    }

    let mut right = operands.pop().ok_or(ParseFailure::UnexpectedEnd)?;
    while let Some(left) = operands.pop() {
        right = Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(right)
}

/// Prefix operators apply innermost first.
fn build_unary_expr(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut pairs: Vec<Pair<Rule>> = pair.into_inner().collect();
    let operand = pairs.pop().ok_or(ParseFailure::UnexpectedEnd)?;
    let mut expr = build_expression(operand, depth)?;

    while let Some(op_pair) = pairs.pop() {
        expr = match op_pair.as_rule() {
            Rule::op_inc => update(expr, true, true)?,
            Rule::op_dec => update(expr, false, true)?,
            rule => {
                let op = prefix_op(rule).ok_or_else(|| unexpected(&op_pair))?;
                Expr::Unary {
                    op,
                    operand: Box::new(expr),
                }
            }
        };
    }
    Ok(expr)
}

fn update(target: Expr, increment: bool, prefix: bool) -> ParseResult<Expr> {
    if !target.is_assignable() {
        let symbol = if increment { "++" } else { "--" };
        return Err(ParseFailure::InvalidTarget {
            target: format!("operand of '{}'", symbol),
        });
    }
    Ok(Expr::Update {
        target: Box::new(target),
        delta: if increment { 1 } else { -1 },
        prefix,
    })
}

fn build_postfix_expr(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_expression(next_pair(&mut inner)?, depth)?;

    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::member | Rule::optional_member => Expr::Member {
                optional: suffix.as_rule() == Rule::optional_member,
                property: next_pair(&mut suffix.into_inner())?.as_str().to_string(),
                object: Box::new(expr),
            },
            Rule::index | Rule::optional_index => Expr::Index {
                index: Box::new(build_expression(next_pair(&mut suffix.into_inner())?, depth)?),
                object: Box::new(expr),
            },
            Rule::call => Expr::Call {
                args: build_list(next_pair(&mut suffix.into_inner())?, depth)?,
                callee: Box::new(expr),
            },
            Rule::update_suffix => {
                let op = next_pair(&mut suffix.into_inner())?;
                update(expr, op.as_rule() == Rule::op_inc, false)?
            }
            _ => return Err(unexpected(&suffix)),
        };
    }
    Ok(expr)
}

fn build_new_expr(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut class = None;
    let mut args = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::identifier => class = Some(inner.as_str().to_string()),
            Rule::arguments => args = build_list(inner, depth)?,
            _ => {}
        }
    }
    let class = class.ok_or(ParseFailure::UnexpectedEnd)?;
    Ok(Expr::New { class, args })
}

/// The expressions of an `arguments` or `array` pair.
fn build_list(pair: Pair<Rule>, depth: usize) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|item| build_expression(item, depth))
        .collect()
}

/* ===================== Literals ===================== */

fn keyword_literal(word: &str) -> Expr {
    let v = match word {
        "true" => Val::Bool(true),
        "false" => Val::Bool(false),
        "null" => Val::Null,
        "NaN" => Val::Num(f64::NAN),
        "Infinity" => Val::Num(f64::INFINITY),
        _ => Val::Undefined,
    };
    Expr::Lit { v }
}

fn build_object(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let mut props = Vec::new();
    for property in pair.into_inner() {
        let mut inner = property.into_inner();
        let key_pair = next_pair(&mut inner)?;
        let key = match key_pair.as_rule() {
            Rule::string => string_value(key_pair.clone()),
            Rule::number => match number_value(key_pair.clone()) {
                Some(Val::Int(n)) => n.to_string(),
                Some(Val::Num(n)) => n.to_string(),
                _ => return Err(unexpected(&key_pair)),
            },
            _ => key_pair.as_str().to_string(),
        };

        let value = match inner.next() {
            Some(value) => build_expression(value, depth)?,
            // shorthand `{ name }`
            None => Expr::Ident { name: key.clone() },
        };
        props.push((key, value));
    }
    Ok(Expr::Object { props })
}

fn build_template(pair: Pair<Rule>, depth: usize) -> ParseResult<Expr> {
    let offset = pair.as_span().start();
    let raw = inner_text(pair);
    let parts =
        scanner::template_parts(raw).ok_or(ParseFailure::UnterminatedString { offset })?;

    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            RawPart::Text(text) => out.push(TemplatePart::Text {
                v: scanner::unescape(text),
            }),
            RawPart::Code(code) => out.push(TemplatePart::Expr {
                e: parse_at_depth(code, depth + 1)?,
            }),
        }
    }
    Ok(Expr::Template { parts: out })
}
