//! Typing and evaluation rules for the built-in operators.
//!
//! There is no implicit conversion: both operands of a binary operator must have the same type.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::ast::{BinaryOp, UnaryOp};
use crate::value::{Type, Value};

pub(crate) fn unary_type(op: UnaryOp, operand: &Type) -> Option<Type> {
    match (op, operand) {
        (UnaryOp::Negate, ty) if ty.is_numeric() => Some(ty.clone()),
        (UnaryOp::Not, Type::Bool | Type::Int) => Some(operand.clone()),
        _ => None,
    }
}

pub(crate) fn binary_type(op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    use BinaryOp::*;
    if left != right {
        return None;
    }
    match op {
        Add | Subtract | Multiply | Divide => left.is_numeric().then(|| left.clone()),
        LogicalOr | LogicalAnd | BitOr | BitXor | BitAnd => {
            matches!(left, Type::Int | Type::Bool).then(|| left.clone())
        }
        ShiftLeft | ShiftRight => (*left == Type::Int).then_some(Type::Int),
        Equal | NotEqual => (*left != Type::Void).then_some(Type::Bool),
        Less | LessEqual | Greater | GreaterEqual => left.is_numeric().then_some(Type::Bool),
    }
}

pub(crate) fn eval_unary(op: UnaryOp, operand: Value) -> Result<Value, String> {
    Ok(match (op, operand) {
        (UnaryOp::Negate, Value::Int(v)) => Value::Int(v.wrapping_neg()),
        (UnaryOp::Negate, Value::Float(v)) => Value::Float(-v),
        (UnaryOp::Negate, Value::Double(v)) => Value::Double(-v),
        (UnaryOp::Negate, Value::Decimal(v)) => Value::Decimal(-v),
        (UnaryOp::Not, Value::Bool(v)) => Value::Bool(!v),
        (UnaryOp::Not, Value::Int(v)) => Value::Int(!v),
        (op, other) => {
            return Err(format!(
                "operator `{}` cannot be applied to {}",
                op.symbol(),
                other.ty()
            ))
        }
    })
}

fn decimal_result(value: Option<Decimal>, op: BinaryOp) -> Result<Value, String> {
    value
        .map(Value::Decimal)
        .ok_or_else(|| format!("decimal overflow in `{}`", op.symbol()))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

pub(crate) fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, String> {
    use BinaryOp::*;
    use Value::{Bool, Double, Float, Int};

    match op {
        Equal => return Ok(Bool(left == right)),
        NotEqual => return Ok(Bool(left != right)),
        Less | LessEqual | Greater | GreaterEqual if left.ty() == right.ty() => {
            let ord = compare(&left, &right);
            return Ok(Bool(match op {
                Less => ord == Some(Ordering::Less),
                LessEqual => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                Greater => ord == Some(Ordering::Greater),
                _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            }));
        }
        _ => {}
    }

    match (op, &left, &right) {
        (Add, Int(a), Int(b)) => Ok(Int(a.wrapping_add(*b))),
        (Subtract, Int(a), Int(b)) => Ok(Int(a.wrapping_sub(*b))),
        (Multiply, Int(a), Int(b)) => Ok(Int(a.wrapping_mul(*b))),
        (Divide, Int(_), Int(0)) => Err("division by zero".to_string()),
        (Divide, Int(a), Int(b)) => a
            .checked_div(*b)
            .map(Int)
            .ok_or_else(|| "integer overflow in `/`".to_string()),

        (Add, Float(a), Float(b)) => Ok(Float(a + b)),
        (Subtract, Float(a), Float(b)) => Ok(Float(a - b)),
        (Multiply, Float(a), Float(b)) => Ok(Float(a * b)),
        (Divide, Float(a), Float(b)) => Ok(Float(a / b)),

        (Add, Double(a), Double(b)) => Ok(Double(a + b)),
        (Subtract, Double(a), Double(b)) => Ok(Double(a - b)),
        (Multiply, Double(a), Double(b)) => Ok(Double(a * b)),
        (Divide, Double(a), Double(b)) => Ok(Double(a / b)),

        (Add, Value::Decimal(a), Value::Decimal(b)) => decimal_result(a.checked_add(*b), op),
        (Subtract, Value::Decimal(a), Value::Decimal(b)) => decimal_result(a.checked_sub(*b), op),
        (Multiply, Value::Decimal(a), Value::Decimal(b)) => decimal_result(a.checked_mul(*b), op),
        (Divide, Value::Decimal(_), Value::Decimal(b)) if b.is_zero() => {
            Err("division by zero".to_string())
        }
        (Divide, Value::Decimal(a), Value::Decimal(b)) => decimal_result(a.checked_div(*b), op),

        (BitOr | LogicalOr, Int(a), Int(b)) => Ok(Int(a | b)),
        (BitAnd | LogicalAnd, Int(a), Int(b)) => Ok(Int(a & b)),
        (BitXor, Int(a), Int(b)) => Ok(Int(a ^ b)),
        (BitOr | LogicalOr, Bool(a), Bool(b)) => Ok(Bool(*a || *b)),
        (BitAnd | LogicalAnd, Bool(a), Bool(b)) => Ok(Bool(*a && *b)),
        (BitXor, Bool(a), Bool(b)) => Ok(Bool(a ^ b)),

        // Shift counts are masked to the low five bits.
        (ShiftLeft, Int(a), Int(b)) => Ok(Int(a.wrapping_shl(*b as u32))),
        (ShiftRight, Int(a), Int(b)) => Ok(Int(a.wrapping_shr(*b as u32))),

        _ => Err(format!(
            "operator `{}` is not defined for {} and {}",
            op.symbol(),
            left.ty(),
            right.ty()
        )),
    }
}
