//! Operator semantics shared by the tree walker and the bytecode VM
//!
//! Both evaluators call into this module for every arithmetic, comparison
//! and bitwise operator so they can never disagree on a result:
//!
//! - integer arithmetic stays integral until it overflows, then becomes float
//! - division yields an integer only when evenly divisible, else a float
//! - division by zero yields positive infinity, never a fault
//! - modulo and bitwise operators work on truncated integers; modulo by zero is NaN

use std::cmp::Ordering;

use super::ast::{BinaryOp, UnaryOp};
use super::values::Val;

/* ===================== Binary Operators ===================== */

/// Apply a binary operator to two values.
pub fn binary(op: BinaryOp, a: &Val, b: &Val) -> Val {
    if let (Val::Int(x), Val::Int(y)) = (a, b) {
        return int_binary(op, *x, *y);
    }
    match op {
        BinaryOp::Add => add(a, b),
        BinaryOp::Sub => Val::Num(a.to_number() - b.to_number()),
        BinaryOp::Mul => Val::Num(a.to_number() * b.to_number()),
        BinaryOp::Div => div_float(a.to_number(), b.to_number()),
        BinaryOp::Mod => rem_truncated(a, b),
        BinaryOp::Pow => Val::Num(a.to_number().powf(b.to_number())),
        BinaryOp::Eq => Val::Bool(loose_eq(a, b)),
        BinaryOp::Ne => Val::Bool(!loose_eq(a, b)),
        BinaryOp::StrictEq => Val::Bool(strict_eq(a, b)),
        BinaryOp::StrictNe => Val::Bool(!strict_eq(a, b)),
        BinaryOp::Lt => Val::Bool(compare(a, b) == Some(Ordering::Less)),
        BinaryOp::Le => Val::Bool(matches!(
            compare(a, b),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )),
        BinaryOp::Gt => Val::Bool(compare(a, b) == Some(Ordering::Greater)),
        BinaryOp::Ge => Val::Bool(matches!(
            compare(a, b),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )),
        BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::Shl
        | BinaryOp::Shr => int_binary(op, truncate(a), truncate(b)),
    }
}

/// Apply a binary operator to two integers.
///
/// This is what the integer-specialized opcodes execute.
pub fn int_binary(op: BinaryOp, x: i64, y: i64) -> Val {
    match op {
        BinaryOp::Add => x
            .checked_add(y)
            .map(Val::Int)
            .unwrap_or(Val::Num(x as f64 + y as f64)),
        BinaryOp::Sub => x
            .checked_sub(y)
            .map(Val::Int)
            .unwrap_or(Val::Num(x as f64 - y as f64)),
        BinaryOp::Mul => x
            .checked_mul(y)
            .map(Val::Int)
            .unwrap_or(Val::Num(x as f64 * y as f64)),
        BinaryOp::Div => div_int(x, y),
        BinaryOp::Mod => {
            if y == 0 {
                Val::Num(f64::NAN)
            } else {
                Val::Int(x.wrapping_rem(y))
            }
        }
        BinaryOp::Pow => {
            if (0..=u32::MAX as i64).contains(&y) {
                if let Some(v) = x.checked_pow(y as u32) {
                    return Val::Int(v);
                }
            }
            Val::Num((x as f64).powf(y as f64))
        }
        BinaryOp::Eq | BinaryOp::StrictEq => Val::Bool(x == y),
        BinaryOp::Ne | BinaryOp::StrictNe => Val::Bool(x != y),
        BinaryOp::Lt => Val::Bool(x < y),
        BinaryOp::Le => Val::Bool(x <= y),
        BinaryOp::Gt => Val::Bool(x > y),
        BinaryOp::Ge => Val::Bool(x >= y),
        BinaryOp::BitAnd => Val::Int(x & y),
        BinaryOp::BitOr => Val::Int(x | y),
        BinaryOp::BitXor => Val::Int(x ^ y),
        BinaryOp::Shl => Val::Int(x.wrapping_shl((y & 63) as u32)),
        BinaryOp::Shr => Val::Int(x.wrapping_shr((y & 63) as u32)),
    }
}

/// Integer division: exact results stay integral, division by zero is +∞.
pub fn div_int(x: i64, y: i64) -> Val {
    if y == 0 {
        return Val::Num(f64::INFINITY);
    }
    match (x.checked_rem(y), x.checked_div(y)) {
        (Some(0), Some(q)) => Val::Int(q),
        _ => Val::Num(x as f64 / y as f64),
    }
}

fn div_float(x: f64, y: f64) -> Val {
    if y == 0.0 {
        Val::Num(f64::INFINITY)
    } else {
        Val::Num(x / y)
    }
}

fn add(a: &Val, b: &Val) -> Val {
    let stringy = |v: &Val| matches!(v, Val::Str(_) | Val::List(_) | Val::Obj(_) | Val::Module(_));
    if stringy(a) || stringy(b) {
        let mut s = a.to_display_string();
        s.push_str(&b.to_display_string());
        return Val::Str(s);
    }
    Val::Num(a.to_number() + b.to_number())
}

fn rem_truncated(a: &Val, b: &Val) -> Val {
    let x = a.to_number();
    let y = b.to_number();
    if x.is_nan() || y.is_nan() || y.trunc() == 0.0 {
        return Val::Num(f64::NAN);
    }
    int_binary(BinaryOp::Mod, truncate(a), truncate(b))
}

/// Truncate a value to an integer for modulo and bitwise operators (NaN → 0).
pub fn truncate(v: &Val) -> i64 {
    match v {
        Val::Int(n) => *n,
        other => {
            let n = other.to_number();
            if n.is_finite() {
                n.trunc() as i64
            } else {
                0
            }
        }
    }
}

/* ===================== Comparison ===================== */

/// Relational ordering; `None` when either side is NaN after coercion.
pub fn compare(a: &Val, b: &Val) -> Option<Ordering> {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => Some(x.cmp(y)),
        (Val::Str(x), Val::Str(y)) => Some(x.cmp(y)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// `===`
pub fn strict_eq(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => x == y,
        (Val::Int(_), Val::Num(_)) | (Val::Num(_), Val::Int(_)) | (Val::Num(_), Val::Num(_)) => {
            a.to_number() == b.to_number()
        }
        _ => a == b,
    }
}

/// `==`
pub fn loose_eq(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Undefined | Val::Null, Val::Undefined | Val::Null) => true,
        (Val::Undefined | Val::Null, _) | (_, Val::Undefined | Val::Null) => false,
        (Val::Str(_), Val::Str(_)) => a == b,
        (Val::Bool(_), _)
        | (_, Val::Bool(_))
        | (Val::Int(_) | Val::Num(_), Val::Str(_))
        | (Val::Str(_), Val::Int(_) | Val::Num(_)) => a.to_number() == b.to_number(),
        _ => strict_eq(a, b),
    }
}

/* ===================== Unary Operators ===================== */

pub fn unary(op: UnaryOp, v: &Val) -> Val {
    match op {
        UnaryOp::Neg => match v {
            Val::Int(n) => n
                .checked_neg()
                .map(Val::Int)
                .unwrap_or(Val::Num(-(*n as f64))),
            other => Val::Num(-other.to_number()),
        },
        UnaryOp::Plus => v.to_numeric(),
        UnaryOp::Not => Val::Bool(!v.is_truthy()),
        UnaryOp::BitNot => Val::Int(!truncate(v)),
        UnaryOp::Typeof => Val::Str(v.type_name().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_exact_and_inexact() {
        assert_eq!(div_int(6, 3), Val::Int(2));
        assert_eq!(div_int(7, 2), Val::Num(3.5));
        assert_eq!(div_int(-9, 3), Val::Int(-3));
    }

    #[test]
    fn test_division_by_zero_is_positive_infinity() {
        assert_eq!(div_int(5, 0), Val::Num(f64::INFINITY));
        assert_eq!(div_int(0, 0), Val::Num(f64::INFINITY));
        assert_eq!(
            binary(BinaryOp::Div, &Val::Num(1.5), &Val::Int(0)),
            Val::Num(f64::INFINITY)
        );
    }

    #[test]
    fn test_modulo_truncates_and_zero_is_nan() {
        assert_eq!(binary(BinaryOp::Mod, &Val::Num(7.9), &Val::Int(3)), Val::Int(1));
        assert_eq!(binary(BinaryOp::Mod, &Val::Int(-7), &Val::Int(3)), Val::Int(-1));
        match binary(BinaryOp::Mod, &Val::Int(5), &Val::Int(0)) {
            Val::Num(n) => assert!(n.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn test_add_overflow_falls_back_to_float() {
        assert_eq!(
            int_binary(BinaryOp::Add, i64::MAX, 1),
            Val::Num(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_add_concatenates_strings() {
        assert_eq!(
            binary(BinaryOp::Add, &Val::from("a"), &Val::Int(1)),
            Val::from("a1")
        );
        assert_eq!(
            binary(BinaryOp::Add, &Val::Int(1), &Val::from("b")),
            Val::from("1b")
        );
    }

    #[test]
    fn test_equality() {
        assert!(loose_eq(&Val::Int(1), &Val::from("1")));
        assert!(!strict_eq(&Val::Int(1), &Val::from("1")));
        assert!(strict_eq(&Val::Int(3), &Val::Num(3.0)));
        assert!(loose_eq(&Val::Null, &Val::Undefined));
        assert!(!strict_eq(&Val::Num(f64::NAN), &Val::Num(f64::NAN)));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(binary(BinaryOp::BitAnd, &Val::Num(6.7), &Val::Int(3)), Val::Int(2));
        assert_eq!(int_binary(BinaryOp::Shl, 1, 4), Val::Int(16));
        assert_eq!(int_binary(BinaryOp::Shr, -16, 2), Val::Int(-4));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOp::Lt, &Val::Int(1), &Val::Num(1.5)), Val::Bool(true));
        assert_eq!(binary(BinaryOp::Lt, &Val::from("a"), &Val::from("b")), Val::Bool(true));
        assert_eq!(
            binary(BinaryOp::Ge, &Val::Undefined, &Val::Int(0)),
            Val::Bool(false)
        );
    }
}
