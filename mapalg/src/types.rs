use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

code_enum! {
    /// Element type of a node's data.
    DataType {
        None = 0 => "none",
        F32 = 1 => "f32",
        F64 = 2 => "f64",
        B8 = 3 => "b8",
        U8 = 4 => "u8",
        U16 = 5 => "u16",
        U32 = 6 => "u32",
        U64 = 7 => "u64",
        S8 = 8 => "s8",
        S16 = 9 => "s16",
        S32 = 10 => "s32",
        S64 = 11 => "s64",
    }
}

code_enum! {
    /// Dimensionality of a node.
    NumDim {
        None = 0x00 => "none",
        Time = 0x01 => "time",
        D0 = 0x02 => "d0",
        D1 = 0x04 => "d1",
        D2 = 0x06 => "d2",
        D3 = 0x08 => "d3",
    }
}

code_enum! {
    StreamDir {
        None = 0 => "none",
        In = 1 => "in",
        Out = 2 => "out",
        InOut = 3 => "io",
    }
}

impl DataType {
    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, DataType::B8)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::S8 | DataType::S16 | DataType::S32 | DataType::S64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn size_bytes(self) -> usize {
        match self {
            DataType::None => 0,
            DataType::B8 | DataType::U8 | DataType::S8 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::F32 | DataType::U32 | DataType::S32 => 4,
            DataType::F64 | DataType::U64 | DataType::S64 => 8,
        }
    }

    fn integer_of(signed: bool, bytes: usize) -> DataType {
        match (signed, bytes) {
            (true, 1) => DataType::S8,
            (true, 2) => DataType::S16,
            (true, 4) => DataType::S32,
            (true, _) => DataType::S64,
            (false, 1) => DataType::U8,
            (false, 2) => DataType::U16,
            (false, 4) => DataType::U32,
            (false, _) => DataType::U64,
        }
    }

    /// Result type of an arithmetic combination of `self` and `other`.
    pub fn promote(self, other: DataType) -> DataType {
        if self == other {
            return self;
        }
        if self.is_float() || other.is_float() {
            if self == DataType::F64 || other == DataType::F64 {
                return DataType::F64;
            }
            return DataType::F32;
        }
        match (self, other) {
            (DataType::None, ty) | (ty, DataType::None) => ty,
            (DataType::B8, ty) | (ty, DataType::B8) => ty,
            (lhs, rhs) => {
                let (lw, rw) = (lhs.size_bytes(), rhs.size_bytes());
                if lw != rw {
                    if lw > rw {
                        lhs
                    } else {
                        rhs
                    }
                } else {
                    DataType::integer_of(lhs.is_signed() || rhs.is_signed(), lw)
                }
            }
        }
    }

    /// Type produced by a floating-point function applied to this type.
    pub fn floating(self) -> DataType {
        if self.is_float() {
            self
        } else {
            DataType::F32
        }
    }

    /// Representable range as `f64` bounds.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            DataType::None => (f64::NEG_INFINITY, f64::INFINITY),
            DataType::F32 => (f32::MIN as f64, f32::MAX as f64),
            DataType::F64 => (f64::MIN, f64::MAX),
            DataType::B8 => (0.0, 1.0),
            DataType::U8 => (0.0, u8::MAX as f64),
            DataType::U16 => (0.0, u16::MAX as f64),
            DataType::U32 => (0.0, u32::MAX as f64),
            DataType::U64 => (0.0, u64::MAX as f64),
            DataType::S8 => (i8::MIN as f64, i8::MAX as f64),
            DataType::S16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::S32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::S64 => (i64::MIN as f64, i64::MAX as f64),
        }
    }

    /// Brings a value computed in `f64` into this type's value set.
    pub fn normalize(self, value: f64) -> f64 {
        match self {
            DataType::None | DataType::F64 => value,
            DataType::F32 => value as f32 as f64,
            DataType::B8 => {
                if value != 0.0 && !value.is_nan() {
                    1.0
                } else {
                    0.0
                }
            }
            int => {
                if value.is_nan() {
                    return 0.0;
                }
                let (lo, hi) = int.bounds();
                value.trunc().clamp(lo, hi)
            }
        }
    }
}

/// Physical layout flags; combine with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemOrder(u32);

impl MemOrder {
    pub const NONE: MemOrder = MemOrder(0x00);
    pub const BLK: MemOrder = MemOrder(0x01);
    pub const ROW: MemOrder = MemOrder(0x02);
    pub const COL: MemOrder = MemOrder(0x04);
    pub const SFC: MemOrder = MemOrder(0x06);

    pub fn code(self) -> i32 {
        self.0 as i32
    }

    pub fn from_code(code: i32) -> anyhow::Result<Self> {
        if !(0..=0x07).contains(&code) {
            return Err(crate::error::MapError::type_mismatch(format!(
                "unknown MemOrder code {code}"
            )));
        }
        Ok(MemOrder(code as u32))
    }

    pub fn contains(self, other: MemOrder) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_blocked(self) -> bool {
        self.contains(MemOrder::BLK)
    }
}

impl Default for MemOrder {
    fn default() -> Self {
        MemOrder::ROW | MemOrder::BLK
    }
}

impl BitOr for MemOrder {
    type Output = MemOrder;

    fn bitor(self, rhs: MemOrder) -> MemOrder {
        MemOrder(self.0 | rhs.0)
    }
}

impl BitAnd for MemOrder {
    type Output = MemOrder;

    fn bitand(self, rhs: MemOrder) -> MemOrder {
        MemOrder(self.0 & rhs.0)
    }
}

impl fmt::Debug for MemOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemOrder({self})")
    }
}

impl fmt::Display for MemOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.0 & !MemOrder::BLK.0 {
            0x00 => "none",
            0x02 => "row",
            0x04 => "col",
            0x06 => "sfc",
            _ => "mixed",
        };
        if self.is_blocked() {
            write!(f, "{layout}+blk")
        } else {
            f.write_str(layout)
        }
    }
}

/// Device selection bitmask passed to device setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceType(u32);

impl DeviceType {
    pub const DEFAULT: DeviceType = DeviceType(0x01);
    pub const CPU: DeviceType = DeviceType(0x02);
    pub const GPU: DeviceType = DeviceType(0x04);
    pub const ACC: DeviceType = DeviceType(0x08);
    /// The engine's `CL_DEVICE_TYPE_CUSTOM` bit (`1 << 4`).
    pub const CUSTOM: DeviceType = DeviceType(0x10);
    pub const ALL: DeviceType = DeviceType(0xFFFF_FFFF);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn code(self) -> i32 {
        self.0 as i32
    }

    pub fn contains(self, other: DeviceType) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeviceType {
    type Output = DeviceType;

    fn bitor(self, rhs: DeviceType) -> DeviceType {
        DeviceType(self.0 | rhs.0)
    }
}

impl std::str::FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(DeviceType::DEFAULT),
            "cpu" => Ok(DeviceType::CPU),
            "gpu" => Ok(DeviceType::GPU),
            "acc" | "accelerator" => Ok(DeviceType::ACC),
            "custom" => Ok(DeviceType::CUSTOM),
            "all" => Ok(DeviceType::ALL),
            other => Err(anyhow::anyhow!("unknown device type '{other}'")),
        }
    }
}
