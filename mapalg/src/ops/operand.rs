use std::rc::Rc;

use anyhow::Result;

use crate::engine::{Engine, Layout};
use crate::error::MapError;
use crate::raster::Raster;
use crate::scalar::{Literal, ScalarValue, ShapeVector};
use crate::types::{DataType, MemOrder};

/// A value taking part in graph construction: either a node or a plain host scalar.
///
/// When every operand of an operation is `Host` the operation runs as ordinary
/// arithmetic and no node is created.
#[derive(Debug, Clone)]
pub enum Operand {
    Node(Raster),
    Host(ScalarValue),
}

impl Operand {
    pub fn is_node(&self) -> bool {
        matches!(self, Operand::Node(_))
    }

    pub fn as_raster(&self) -> Option<&Raster> {
        match self {
            Operand::Node(raster) => Some(raster),
            Operand::Host(_) => None,
        }
    }

    pub fn host(&self) -> Option<ScalarValue> {
        match self {
            Operand::Node(_) => None,
            Operand::Host(value) => Some(*value),
        }
    }

    pub fn dtype(&self) -> Result<DataType> {
        match self {
            Operand::Node(raster) => raster.dtype(),
            Operand::Host(value) => Ok(value.dtype()),
        }
    }

    /// The node, or a TypeMismatch when this is a host scalar.
    pub fn into_raster(self) -> Result<Raster> {
        match self {
            Operand::Node(raster) => Ok(raster),
            Operand::Host(value) => Err(MapError::type_mismatch(format!(
                "expected a graph node, found host value {value}"
            ))),
        }
    }

    /// The host scalar, or a TypeMismatch when this is a node.
    pub fn into_host(self) -> Result<ScalarValue> {
        match self {
            Operand::Host(value) => Ok(value),
            Operand::Node(raster) => Err(MapError::type_mismatch(format!(
                "expected a host value, found node {}",
                raster.ptr()
            ))),
        }
    }

    /// Promotes a host scalar to a zero-rank constant node on `engine`.
    pub fn promote(self, engine: &Rc<dyn Engine>) -> Result<Raster> {
        match self {
            Operand::Node(raster) => Ok(raster),
            Operand::Host(value) => scalar_node(engine, value),
        }
    }
}

/// Zero-rank constant node holding `value` with its own datatype.
pub(crate) fn scalar_node(engine: &Rc<dyn Engine>, value: ScalarValue) -> Result<Raster> {
    let layout = Layout {
        size: ShapeVector::unset(),
        dtype: value.dtype(),
        order: MemOrder::default(),
        block: ShapeVector::unset(),
        group: ShapeVector::unset(),
    };
    let ptr = engine.constant(value, &layout)?;
    Raster::wrap(engine, ptr)
}

/// The engine shared by the node operands, if any operand is a node.
pub(crate) fn engine_of<'a>(operands: &[&'a Operand]) -> Option<&'a Rc<dyn Engine>> {
    operands
        .iter()
        .find_map(|operand| operand.as_raster().map(Raster::engine))
}

impl From<Raster> for Operand {
    fn from(raster: Raster) -> Self {
        Operand::Node(raster)
    }
}

impl From<&Raster> for Operand {
    fn from(raster: &Raster) -> Self {
        Operand::Node(raster.clone())
    }
}

impl From<ScalarValue> for Operand {
    fn from(value: ScalarValue) -> Self {
        Operand::Host(value)
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Host(ScalarValue::from_literal(literal))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Literal::Int(value as i128).into()
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Literal::Float(value).into()
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Literal::Bool(value).into()
    }
}

impl TryFrom<Operand> for Raster {
    type Error = anyhow::Error;

    fn try_from(operand: Operand) -> Result<Self> {
        operand.into_raster()
    }
}
