//! `#[repr(C)]` mirrors of the values exchanged with the native engine.

use std::os::raw::c_int;

use anyhow::Result;

use crate::error::MapError;
use crate::scalar::{Coord, ScalarValue, ShapeVector, MAX_RANK};
use crate::types::DataType;

#[repr(C)]
#[derive(Clone, Copy)]
pub union RawVariantUnion {
    pub b8: bool,
    pub s8: i8,
    pub s16: i16,
    pub s32: i32,
    pub s64: i64,
    pub u8: u8,
    pub u16: u16,
    pub u32: u32,
    pub u64: u64,
    pub f32: f32,
    pub f64: f64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawVariant {
    pub value: RawVariantUnion,
    pub dtype: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawArray {
    pub arr: [c_int; MAX_RANK],
    pub n: c_int,
}

impl From<ScalarValue> for RawVariant {
    fn from(value: ScalarValue) -> Self {
        let raw = match value {
            ScalarValue::Bool(v) => RawVariantUnion { b8: v },
            ScalarValue::I8(v) => RawVariantUnion { s8: v },
            ScalarValue::I16(v) => RawVariantUnion { s16: v },
            ScalarValue::I32(v) => RawVariantUnion { s32: v },
            ScalarValue::I64(v) => RawVariantUnion { s64: v },
            ScalarValue::U8(v) => RawVariantUnion { u8: v },
            ScalarValue::U16(v) => RawVariantUnion { u16: v },
            ScalarValue::U32(v) => RawVariantUnion { u32: v },
            ScalarValue::U64(v) => RawVariantUnion { u64: v },
            ScalarValue::F32(v) => RawVariantUnion { f32: v },
            ScalarValue::F64(v) => RawVariantUnion { f64: v },
        };
        RawVariant {
            value: raw,
            dtype: value.dtype().code(),
        }
    }
}

impl TryFrom<RawVariant> for ScalarValue {
    type Error = anyhow::Error;

    fn try_from(raw: RawVariant) -> Result<Self> {
        let dtype = DataType::from_code(raw.dtype)?;
        // SAFETY: the engine writes the union field matching `dtype`.
        let value = unsafe {
            match dtype {
                DataType::B8 => ScalarValue::Bool(raw.value.u8 != 0),
                DataType::S8 => ScalarValue::I8(raw.value.s8),
                DataType::S16 => ScalarValue::I16(raw.value.s16),
                DataType::S32 => ScalarValue::I32(raw.value.s32),
                DataType::S64 => ScalarValue::I64(raw.value.s64),
                DataType::U8 => ScalarValue::U8(raw.value.u8),
                DataType::U16 => ScalarValue::U16(raw.value.u16),
                DataType::U32 => ScalarValue::U32(raw.value.u32),
                DataType::U64 => ScalarValue::U64(raw.value.u64),
                DataType::F32 => ScalarValue::F32(raw.value.f32),
                DataType::F64 => ScalarValue::F64(raw.value.f64),
                DataType::None => {
                    return Err(MapError::type_mismatch("engine returned an untyped scalar"))
                }
            }
        };
        Ok(value)
    }
}

impl From<ShapeVector> for RawArray {
    fn from(shape: ShapeVector) -> Self {
        let (arr, n) = shape.raw();
        RawArray { arr, n }
    }
}

impl From<Coord> for RawArray {
    fn from(coord: Coord) -> Self {
        RawArray {
            arr: coord.values(),
            n: MAX_RANK as c_int,
        }
    }
}

impl TryFrom<RawArray> for ShapeVector {
    type Error = anyhow::Error;

    fn try_from(raw: RawArray) -> Result<Self> {
        ShapeVector::from_raw(raw.arr, raw.n)
    }
}

/// Flattens a kernel into the contiguous variant buffer the engine expects.
pub fn raw_kernel(kernel: &[ScalarValue]) -> Vec<RawVariant> {
    kernel.iter().copied().map(RawVariant::from).collect()
}
