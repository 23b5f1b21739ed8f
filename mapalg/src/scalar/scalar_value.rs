use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::types::DataType;

/// One typed scalar as it crosses the engine boundary.
///
/// Conversions between tags are numeric casts: integers saturate, floats
/// truncate toward zero (NaN becomes zero) and any nonzero value converts to
/// `true`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// An untyped host literal before a tag has been chosen for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Float(f64),
    Int(i128),
    Bool(bool),
}

/// Host types with a matching [`ScalarValue`] tag.
pub trait ScalarElement: Copy + Sized {
    const DTYPE: DataType;

    fn into_scalar(self) -> ScalarValue;
    fn from_scalar(value: &ScalarValue) -> Option<Self>;
}

macro_rules! impl_scalar_element {
    ($ty:ty, $variant:ident, $dtype:ident) => {
        impl ScalarElement for $ty {
            const DTYPE: DataType = DataType::$dtype;

            fn into_scalar(self) -> ScalarValue {
                ScalarValue::$variant(self)
            }

            fn from_scalar(value: &ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$variant(value)
            }
        }
    };
}

impl_scalar_element!(bool, Bool, B8);
impl_scalar_element!(i8, I8, S8);
impl_scalar_element!(i16, I16, S16);
impl_scalar_element!(i32, I32, S32);
impl_scalar_element!(i64, I64, S64);
impl_scalar_element!(u8, U8, U8);
impl_scalar_element!(u16, U16, U16);
impl_scalar_element!(u32, U32, U32);
impl_scalar_element!(u64, U64, U64);
impl_scalar_element!(f32, F32, F32);
impl_scalar_element!(f64, F64, F64);

enum Payload {
    Int(i128),
    Float(f64),
}

fn saturate(value: i128, lo: i128, hi: i128) -> i128 {
    value.clamp(lo, hi)
}

impl ScalarValue {
    pub fn dtype(&self) -> DataType {
        match self {
            ScalarValue::Bool(_) => DataType::B8,
            ScalarValue::I8(_) => DataType::S8,
            ScalarValue::I16(_) => DataType::S16,
            ScalarValue::I32(_) => DataType::S32,
            ScalarValue::I64(_) => DataType::S64,
            ScalarValue::U8(_) => DataType::U8,
            ScalarValue::U16(_) => DataType::U16,
            ScalarValue::U32(_) => DataType::U32,
            ScalarValue::U64(_) => DataType::U64,
            ScalarValue::F32(_) => DataType::F32,
            ScalarValue::F64(_) => DataType::F64,
        }
    }

    /// Literal precedence: float to F32, bool to B8, integral to S32.
    pub fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::Float(v) => ScalarValue::F32(v as f32),
            Literal::Bool(v) => ScalarValue::Bool(v),
            Literal::Int(v) => {
                ScalarValue::I32(saturate(v, i32::MIN as i128, i32::MAX as i128) as i32)
            }
        }
    }

    pub fn zero(dtype: DataType) -> Result<Self> {
        ScalarValue::F64(0.0).convert(dtype)
    }

    pub fn one(dtype: DataType) -> Result<Self> {
        ScalarValue::F64(1.0).convert(dtype)
    }

    /// Builds a value of `dtype` from an `f64` intermediate.
    pub fn from_f64(value: f64, dtype: DataType) -> Result<Self> {
        ScalarValue::F64(value).convert(dtype)
    }

    fn payload(&self) -> Payload {
        match *self {
            ScalarValue::Bool(v) => Payload::Int(v as i128),
            ScalarValue::I8(v) => Payload::Int(v as i128),
            ScalarValue::I16(v) => Payload::Int(v as i128),
            ScalarValue::I32(v) => Payload::Int(v as i128),
            ScalarValue::I64(v) => Payload::Int(v as i128),
            ScalarValue::U8(v) => Payload::Int(v as i128),
            ScalarValue::U16(v) => Payload::Int(v as i128),
            ScalarValue::U32(v) => Payload::Int(v as i128),
            ScalarValue::U64(v) => Payload::Int(v as i128),
            ScalarValue::F32(v) => Payload::Float(v as f64),
            ScalarValue::F64(v) => Payload::Float(v),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self.payload() {
            Payload::Int(v) => v as f64,
            Payload::Float(v) => v,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.payload() {
            Payload::Int(v) => v != 0,
            Payload::Float(v) => v != 0.0,
        }
    }

    /// Integer payload widened to `i128`; `None` for floating tags.
    pub fn to_i128(&self) -> Option<i128> {
        match self.payload() {
            Payload::Int(v) => Some(v),
            Payload::Float(_) => None,
        }
    }

    /// Builds a value of `dtype` from an exact integer intermediate.
    pub fn from_i128(value: i128, dtype: DataType) -> Result<Self> {
        Self::from_payload(Payload::Int(value), dtype)
    }

    /// Casts the payload to `dtype`; the tag of the result is always `dtype`.
    pub fn convert(&self, dtype: DataType) -> Result<ScalarValue> {
        Self::from_payload(self.payload(), dtype)
    }

    fn from_payload(payload: Payload, dtype: DataType) -> Result<ScalarValue> {
        macro_rules! to_int {
            ($ty:ty, $variant:ident) => {
                match payload {
                    Payload::Int(v) => {
                        ScalarValue::$variant(saturate(v, <$ty>::MIN as i128, <$ty>::MAX as i128) as $ty)
                    }
                    Payload::Float(v) => ScalarValue::$variant(v as $ty),
                }
            };
        }
        let (truthy, wide) = match payload {
            Payload::Int(v) => (v != 0, v as f64),
            Payload::Float(v) => (v != 0.0, v),
        };
        let converted = match dtype {
            DataType::None => {
                return Err(MapError::type_mismatch(
                    "cannot convert a scalar to an unset datatype",
                ))
            }
            DataType::B8 => ScalarValue::Bool(truthy),
            DataType::F32 => ScalarValue::F32(wide as f32),
            DataType::F64 => ScalarValue::F64(wide),
            DataType::S8 => to_int!(i8, I8),
            DataType::S16 => to_int!(i16, I16),
            DataType::S32 => to_int!(i32, I32),
            DataType::S64 => to_int!(i64, I64),
            DataType::U8 => to_int!(u8, U8),
            DataType::U16 => to_int!(u16, U16),
            DataType::U32 => to_int!(u32, U32),
            DataType::U64 => to_int!(u64, U64),
        };
        Ok(converted)
    }

    /// Reads the payload as `T`; the active tag must be `T`'s tag.
    pub fn read<T: ScalarElement>(&self) -> Result<T> {
        T::from_scalar(self).ok_or_else(|| {
            MapError::type_mismatch(format!(
                "cannot read {} payload as {}",
                self.dtype(),
                T::DTYPE
            ))
        })
    }
}

impl From<Literal> for ScalarValue {
    fn from(literal: Literal) -> Self {
        ScalarValue::from_literal(literal)
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::I8(v) => write!(f, "{v}"),
            ScalarValue::I16(v) => write!(f, "{v}"),
            ScalarValue::I32(v) => write!(f, "{v}"),
            ScalarValue::I64(v) => write!(f, "{v}"),
            ScalarValue::U8(v) => write!(f, "{v}"),
            ScalarValue::U16(v) => write!(f, "{v}"),
            ScalarValue::U32(v) => write!(f, "{v}"),
            ScalarValue::U64(v) => write!(f, "{v}"),
            ScalarValue::F32(v) => write!(f, "{v}"),
            ScalarValue::F64(v) => write!(f, "{v}"),
        }
    }
}
