use std::collections::HashMap;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::ops::kinds::{BinaryOp, ReductionOp, UnaryOp};
use crate::types::DataType;

/// Element kernel evaluated in `f64`; `dtype` is the type the operation runs in.
pub type UnaryKernel = fn(f64, DataType) -> f64;
pub type BinaryKernel = fn(f64, f64, DataType) -> f64;
pub type ReduceKernel = fn(f64, f64) -> f64;
/// Integer element kernels, exact in `i128`; results saturate to the output type.
pub type IntUnaryKernel = fn(i128) -> i128;
pub type IntBinaryKernel = fn(i128, i128) -> i128;

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn truthy(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

fn int_bits(value: f64) -> i128 {
    value as i128
}

fn bit_not(a: f64, dtype: DataType) -> f64 {
    if dtype.is_bool() {
        return flag(!truthy(a));
    }
    let bits = !int_bits(a);
    match dtype {
        DataType::U8 => (bits as u8) as f64,
        DataType::U16 => (bits as u16) as f64,
        DataType::U32 => (bits as u32) as f64,
        DataType::U64 => (bits as u64) as f64,
        _ => bits as f64,
    }
}

fn divide(a: f64, b: f64, dtype: DataType) -> f64 {
    if dtype.is_float() {
        return a / b;
    }
    if b == 0.0 {
        return 0.0;
    }
    (a / b).trunc()
}

fn remainder(a: f64, b: f64, dtype: DataType) -> f64 {
    if !dtype.is_float() && b == 0.0 {
        return 0.0;
    }
    a % b
}

fn shift_left(a: f64, b: f64, _: DataType) -> f64 {
    let shift = int_bits(b).clamp(0, 127) as u32;
    int_bits(a).checked_shl(shift).unwrap_or(0) as f64
}

fn shift_right(a: f64, b: f64, _: DataType) -> f64 {
    let shift = int_bits(b).clamp(0, 127) as u32;
    (int_bits(a) >> shift) as f64
}

pub static UNARY_KERNELS: Lazy<HashMap<UnaryOp, UnaryKernel>> = Lazy::new(|| {
    let entries: [(UnaryOp, UnaryKernel); 29] = [
        (UnaryOp::Pos, |a, _| a),
        (UnaryOp::Neg, |a, _| -a),
        (UnaryOp::Not, |a, _| flag(!truthy(a))),
        (UnaryOp::BNot, bit_not),
        (UnaryOp::Sin, |a, _| a.sin()),
        (UnaryOp::Cos, |a, _| a.cos()),
        (UnaryOp::Tan, |a, _| a.tan()),
        (UnaryOp::Asin, |a, _| a.asin()),
        (UnaryOp::Acos, |a, _| a.acos()),
        (UnaryOp::Atan, |a, _| a.atan()),
        (UnaryOp::Sinh, |a, _| a.sinh()),
        (UnaryOp::Cosh, |a, _| a.cosh()),
        (UnaryOp::Tanh, |a, _| a.tanh()),
        (UnaryOp::Asinh, |a, _| a.asinh()),
        (UnaryOp::Acosh, |a, _| a.acosh()),
        (UnaryOp::Atanh, |a, _| a.atanh()),
        (UnaryOp::Exp, |a, _| a.exp()),
        (UnaryOp::Exp2, |a, _| a.exp2()),
        (UnaryOp::Exp10, |a, _| 10f64.powf(a)),
        (UnaryOp::Log, |a, _| a.ln()),
        (UnaryOp::Log2, |a, _| a.log2()),
        (UnaryOp::Log10, |a, _| a.log10()),
        (UnaryOp::Sqrt, |a, _| a.sqrt()),
        (UnaryOp::Cbrt, |a, _| a.cbrt()),
        (UnaryOp::Abs, |a, _| a.abs()),
        (UnaryOp::Ceil, |a, _| a.ceil()),
        (UnaryOp::Floor, |a, _| a.floor()),
        (UnaryOp::Trunc, |a, _| a.trunc()),
        (UnaryOp::Round, |a, _| a.round()),
    ];
    entries.into_iter().collect()
});

pub static BINARY_KERNELS: Lazy<HashMap<BinaryOp, BinaryKernel>> = Lazy::new(|| {
    let entries: [(BinaryOp, BinaryKernel); 24] = [
        (BinaryOp::Add, |a, b, _| a + b),
        (BinaryOp::Sub, |a, b, _| a - b),
        (BinaryOp::Mul, |a, b, _| a * b),
        (BinaryOp::Div, divide),
        (BinaryOp::Mod, remainder),
        (BinaryOp::Eq, |a, b, _| flag(a == b)),
        (BinaryOp::Ne, |a, b, _| flag(a != b)),
        (BinaryOp::Lt, |a, b, _| flag(a < b)),
        (BinaryOp::Gt, |a, b, _| flag(a > b)),
        (BinaryOp::Le, |a, b, _| flag(a <= b)),
        (BinaryOp::Ge, |a, b, _| flag(a >= b)),
        (BinaryOp::And, |a, b, _| flag(truthy(a) && truthy(b))),
        (BinaryOp::Or, |a, b, _| flag(truthy(a) || truthy(b))),
        (BinaryOp::BAnd, |a, b, _| (int_bits(a) & int_bits(b)) as f64),
        (BinaryOp::BOr, |a, b, _| (int_bits(a) | int_bits(b)) as f64),
        (BinaryOp::BXor, |a, b, _| (int_bits(a) ^ int_bits(b)) as f64),
        (BinaryOp::Shl, shift_left),
        (BinaryOp::Shr, shift_right),
        (BinaryOp::Max, |a, b, _| a.max(b)),
        (BinaryOp::Min, |a, b, _| a.min(b)),
        (BinaryOp::Atan2, |a, b, _| a.atan2(b)),
        (BinaryOp::Pow, |a, b, _| a.powf(b)),
        (BinaryOp::Hypot, |a, b, _| a.hypot(b)),
        (BinaryOp::Fmod, |a, b, _| a % b),
    ];
    entries.into_iter().collect()
});

fn int_flag(value: bool) -> i128 {
    value as i128
}

fn int_shift(b: i128) -> u32 {
    b.clamp(0, 127) as u32
}

pub static INT_UNARY_KERNELS: Lazy<HashMap<UnaryOp, IntUnaryKernel>> = Lazy::new(|| {
    let entries: [(UnaryOp, IntUnaryKernel); 9] = [
        (UnaryOp::Pos, |a| a),
        (UnaryOp::Neg, i128::wrapping_neg),
        (UnaryOp::Not, |a| int_flag(a == 0)),
        (UnaryOp::BNot, |a| !a),
        (UnaryOp::Abs, i128::wrapping_abs),
        (UnaryOp::Ceil, |a| a),
        (UnaryOp::Floor, |a| a),
        (UnaryOp::Trunc, |a| a),
        (UnaryOp::Round, |a| a),
    ];
    entries.into_iter().collect()
});

pub static INT_BINARY_KERNELS: Lazy<HashMap<BinaryOp, IntBinaryKernel>> = Lazy::new(|| {
    let entries: [(BinaryOp, IntBinaryKernel); 20] = [
        (BinaryOp::Add, i128::wrapping_add),
        (BinaryOp::Sub, i128::wrapping_sub),
        (BinaryOp::Mul, i128::saturating_mul),
        (BinaryOp::Div, |a, b| if b == 0 { 0 } else { a.wrapping_div(b) }),
        (BinaryOp::Mod, |a, b| if b == 0 { 0 } else { a.wrapping_rem(b) }),
        (BinaryOp::Eq, |a, b| int_flag(a == b)),
        (BinaryOp::Ne, |a, b| int_flag(a != b)),
        (BinaryOp::Lt, |a, b| int_flag(a < b)),
        (BinaryOp::Gt, |a, b| int_flag(a > b)),
        (BinaryOp::Le, |a, b| int_flag(a <= b)),
        (BinaryOp::Ge, |a, b| int_flag(a >= b)),
        (BinaryOp::And, |a, b| int_flag(a != 0 && b != 0)),
        (BinaryOp::Or, |a, b| int_flag(a != 0 || b != 0)),
        (BinaryOp::BAnd, |a, b| a & b),
        (BinaryOp::BOr, |a, b| a | b),
        (BinaryOp::BXor, |a, b| a ^ b),
        (BinaryOp::Shl, |a, b| a.checked_shl(int_shift(b)).unwrap_or(0)),
        (BinaryOp::Shr, |a, b| a >> int_shift(b)),
        (BinaryOp::Max, |a, b| a.max(b)),
        (BinaryOp::Min, |a, b| a.min(b)),
    ];
    entries.into_iter().collect()
});

pub static REDUCE_KERNELS: Lazy<HashMap<ReductionOp, ReduceKernel>> = Lazy::new(|| {
    let entries: [(ReductionOp, ReduceKernel); 6] = [
        (ReductionOp::Sum, |acc, v| acc + v),
        (ReductionOp::Prod, |acc, v| acc * v),
        (ReductionOp::And, |acc, v| flag(truthy(acc) && truthy(v))),
        (ReductionOp::Or, |acc, v| flag(truthy(acc) || truthy(v))),
        (ReductionOp::Max, |acc, v| acc.max(v)),
        (ReductionOp::Min, |acc, v| acc.min(v)),
    ];
    entries.into_iter().collect()
});

pub fn unary_kernel(op: UnaryOp) -> Result<UnaryKernel> {
    UNARY_KERNELS
        .get(&op)
        .copied()
        .ok_or_else(|| anyhow!("no host kernel for unary op {op}"))
}

pub fn binary_kernel(op: BinaryOp) -> Result<BinaryKernel> {
    BINARY_KERNELS
        .get(&op)
        .copied()
        .ok_or_else(|| anyhow!("no host kernel for binary op {op}"))
}

pub fn reduce_kernel(op: ReductionOp) -> Result<ReduceKernel> {
    REDUCE_KERNELS
        .get(&op)
        .copied()
        .ok_or_else(|| anyhow!("no host kernel for reduction {op}"))
}

/// Applies `op` to one element and normalizes the result to its output type.
pub fn apply_unary(op: UnaryOp, value: f64, dtype: DataType) -> Result<f64> {
    let kernel = unary_kernel(op)?;
    Ok(op.result_dtype(dtype).normalize(kernel(value, dtype)))
}

/// Applies `op` to one element pair running in the promoted type of both sides.
pub fn apply_binary(op: BinaryOp, lhs: f64, rhs: f64, lt: DataType, rt: DataType) -> Result<f64> {
    let kernel = binary_kernel(op)?;
    let work = lt.promote(rt);
    Ok(op.result_dtype(lt, rt).normalize(kernel(lhs, rhs, work)))
}

/// Truncates to the width of `dtype`, the way `!` acts on a fixed-width word.
fn wrap_to(dtype: DataType, value: i128) -> i128 {
    match dtype {
        DataType::U8 => value as u8 as i128,
        DataType::U16 => value as u16 as i128,
        DataType::U32 => value as u32 as i128,
        DataType::U64 => value as u64 as i128,
        _ => value,
    }
}

fn is_exact(dtype: DataType) -> bool {
    dtype.is_integer() || dtype.is_bool()
}

/// Integer counterpart of [`apply_unary`]; `None` when `op` leaves the
/// integers or `dtype` is floating.
pub fn apply_unary_int(op: UnaryOp, value: i128, dtype: DataType) -> Option<i128> {
    let out = op.result_dtype(dtype);
    if !is_exact(dtype) || !is_exact(out) {
        return None;
    }
    if op == UnaryOp::BNot && dtype.is_bool() {
        return Some(int_flag(value == 0));
    }
    let kernel = INT_UNARY_KERNELS.get(&op)?;
    let result = kernel(value);
    Some(if op == UnaryOp::BNot { wrap_to(out, result) } else { result })
}

/// Integer counterpart of [`apply_binary`]; `None` when the promoted or
/// result type is floating. The caller saturates the result to its type.
pub fn apply_binary_int(
    op: BinaryOp,
    lhs: i128,
    rhs: i128,
    lt: DataType,
    rt: DataType,
) -> Option<i128> {
    if !is_exact(lt.promote(rt)) || !is_exact(op.result_dtype(lt, rt)) {
        return None;
    }
    let kernel = INT_BINARY_KERNELS.get(&op)?;
    Some(kernel(lhs, rhs))
}
