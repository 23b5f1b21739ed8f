use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

use anyhow::Result;

use crate::ops::functions::{binary_nodes, pow, unary_node};
use crate::ops::kinds::{BinaryOp, UnaryOp};
use crate::ops::operand::{scalar_node, Operand};
use crate::raster::Raster;
use crate::scalar::ScalarValue;

fn with_host(raster: &Raster, host: Operand, op: BinaryOp, host_first: bool) -> Result<Raster> {
    let host = host.promote(raster.engine())?;
    if host_first {
        binary_nodes(&host, raster, op)
    } else {
        binary_nodes(raster, &host, op)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Raster> for &Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: &Raster) -> Result<Raster> {
                binary_nodes(self, rhs, $op)
            }
        }

        impl $trait<Raster> for &Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: Raster) -> Result<Raster> {
                binary_nodes(self, &rhs, $op)
            }
        }

        impl $trait<&Raster> for Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: &Raster) -> Result<Raster> {
                binary_nodes(&self, rhs, $op)
            }
        }

        impl $trait<Raster> for Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: Raster) -> Result<Raster> {
                binary_nodes(&self, &rhs, $op)
            }
        }

        impl_binary_operator!(@host $trait, $method, $op, i32);
        impl_binary_operator!(@host $trait, $method, $op, f64);
    };
    (@host $trait:ident, $method:ident, $op:expr, $host:ty) => {
        impl $trait<$host> for &Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: $host) -> Result<Raster> {
                with_host(self, rhs.into(), $op, false)
            }
        }

        impl $trait<$host> for Raster {
            type Output = Result<Raster>;

            fn $method(self, rhs: $host) -> Result<Raster> {
                with_host(&self, rhs.into(), $op, false)
            }
        }

        impl $trait<&Raster> for $host {
            type Output = Result<Raster>;

            fn $method(self, rhs: &Raster) -> Result<Raster> {
                with_host(rhs, self.into(), $op, true)
            }
        }

        impl $trait<Raster> for $host {
            type Output = Result<Raster>;

            fn $method(self, rhs: Raster) -> Result<Raster> {
                with_host(&rhs, self.into(), $op, true)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::Div);
impl_binary_operator!(Rem, rem, BinaryOp::Mod);
impl_binary_operator!(BitAnd, bitand, BinaryOp::BAnd);
impl_binary_operator!(BitOr, bitor, BinaryOp::BOr);
impl_binary_operator!(BitXor, bitxor, BinaryOp::BXor);
impl_binary_operator!(Shl, shl, BinaryOp::Shl);
impl_binary_operator!(Shr, shr, BinaryOp::Shr);

impl Neg for &Raster {
    type Output = Result<Raster>;

    fn neg(self) -> Result<Raster> {
        unary_node(self, UnaryOp::Neg)
    }
}

impl Neg for Raster {
    type Output = Result<Raster>;

    fn neg(self) -> Result<Raster> {
        unary_node(&self, UnaryOp::Neg)
    }
}

/// Logical negation on boolean rasters, bitwise complement otherwise.
impl Not for &Raster {
    type Output = Result<Raster>;

    fn not(self) -> Result<Raster> {
        let op = if self.dtype()?.is_bool() {
            UnaryOp::Not
        } else {
            UnaryOp::BNot
        };
        unary_node(self, op)
    }
}

impl Not for Raster {
    type Output = Result<Raster>;

    fn not(self) -> Result<Raster> {
        !&self
    }
}

impl Raster {
    fn compare(&self, rhs: impl Into<Operand>, op: BinaryOp) -> Result<Raster> {
        let rhs = rhs.into().promote(self.engine())?;
        binary_nodes(self, &rhs, op)
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Lt)
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Le)
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Gt)
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Ge)
    }

    pub fn equal(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Eq)
    }

    pub fn not_equal(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Ne)
    }

    pub fn and(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::And)
    }

    pub fn or(&self, rhs: impl Into<Operand>) -> Result<Raster> {
        self.compare(rhs, BinaryOp::Or)
    }

    /// `self` raised to `exponent`, see [`pow`](crate::pow).
    pub fn pow(&self, exponent: impl Into<Operand>) -> Result<Raster> {
        pow(self, exponent)?.into_raster()
    }

    /// `base` raised to `self`.
    pub fn rpow(&self, base: impl Into<Operand>) -> Result<Raster> {
        pow(base, self)?.into_raster()
    }
}

impl Raster {
    /// Zero-rank constant on this raster's engine.
    pub fn scalar(&self, value: impl Into<ScalarValue>) -> Result<Raster> {
        scalar_node(self.engine(), value.into())
    }
}
