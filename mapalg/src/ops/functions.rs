use anyhow::Result;

use crate::engine::NodePtr;
use crate::error::MapError;
use crate::ops::kernels::{apply_binary, apply_binary_int, apply_unary, apply_unary_int};
use crate::ops::kinds::{BinaryOp, ReductionOp, UnaryOp};
use crate::ops::operand::{engine_of, scalar_node, Operand};
use crate::raster::Raster;
use crate::scalar::{Coord, Literal, ScalarValue, ShapeVector};
use crate::types::DataType;

/// Applies `op` to a node, or directly to a host scalar.
pub fn unary(value: impl Into<Operand>, op: UnaryOp) -> Result<Operand> {
    match value.into() {
        Operand::Host(value) => host_unary(value, op).map(Operand::Host),
        Operand::Node(raster) => unary_node(&raster, op).map(Operand::Node),
    }
}

fn host_unary(value: ScalarValue, op: UnaryOp) -> Result<ScalarValue> {
    let dtype = value.dtype();
    let out = op.result_dtype(dtype);
    if let Some(exact) = value.to_i128().and_then(|v| apply_unary_int(op, v, dtype)) {
        return ScalarValue::from_i128(exact, out);
    }
    ScalarValue::from_f64(apply_unary(op, value.to_f64(), dtype)?, out)
}

pub(crate) fn unary_node(raster: &Raster, op: UnaryOp) -> Result<Raster> {
    raster.derive(raster.engine().unary(raster.node()?, op)?)
}

/// Combines two operands with `op`. Host literals next to a node are promoted
/// to zero-rank constants; two host scalars are combined with host arithmetic.
pub fn binary(lhs: impl Into<Operand>, rhs: impl Into<Operand>, op: BinaryOp) -> Result<Operand> {
    let (lhs, rhs) = (lhs.into(), rhs.into());
    match (lhs, rhs) {
        (Operand::Host(l), Operand::Host(r)) => host_binary(l, r, op).map(Operand::Host),
        (lhs, rhs) => {
            let (lhs, rhs) = promote_pair(lhs, rhs)?;
            binary_nodes(&lhs, &rhs, op).map(Operand::Node)
        }
    }
}

fn host_binary(lhs: ScalarValue, rhs: ScalarValue, op: BinaryOp) -> Result<ScalarValue> {
    let (lt, rt) = (lhs.dtype(), rhs.dtype());
    let out = op.result_dtype(lt, rt);
    if let (Some(l), Some(r)) = (lhs.to_i128(), rhs.to_i128()) {
        if let Some(exact) = apply_binary_int(op, l, r, lt, rt) {
            return ScalarValue::from_i128(exact, out);
        }
    }
    ScalarValue::from_f64(apply_binary(op, lhs.to_f64(), rhs.to_f64(), lt, rt)?, out)
}

fn promote_pair(lhs: Operand, rhs: Operand) -> Result<(Raster, Raster)> {
    let engine = engine_of(&[&lhs, &rhs])
        .cloned()
        .ok_or_else(|| MapError::type_mismatch("no graph node among the operands"))?;
    Ok((lhs.promote(&engine)?, rhs.promote(&engine)?))
}

pub(crate) fn binary_nodes(lhs: &Raster, rhs: &Raster, op: BinaryOp) -> Result<Raster> {
    lhs.derive(lhs.engine().binary(lhs.node()?, rhs.node()?, op)?)
}

macro_rules! unary_functions {
    ($($name:ident => $op:ident),+ $(,)?) => {
        $(
            pub fn $name(value: impl Into<Operand>) -> Result<Operand> {
                unary(value, UnaryOp::$op)
            }
        )+
    };
}

unary_functions! {
    sin => Sin, cos => Cos, tan => Tan,
    asin => Asin, acos => Acos, atan => Atan,
    sinh => Sinh, cosh => Cosh, tanh => Tanh,
    asinh => Asinh, acosh => Acosh, atanh => Atanh,
    exp => Exp, exp2 => Exp2, exp10 => Exp10,
    log => Log, log2 => Log2, log10 => Log10,
    sqrt => Sqrt, cbrt => Cbrt, abs => Abs,
    ceil => Ceil, floor => Floor, trunc => Trunc, round => Round,
}

macro_rules! binary_functions {
    ($($name:ident => $op:ident),+ $(,)?) => {
        $(
            pub fn $name(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Operand> {
                binary(lhs, rhs, BinaryOp::$op)
            }
        )+
    };
}

binary_functions! {
    max => Max, min => Min, atan2 => Atan2, hypot => Hypot, fmod => Fmod,
}

/// `base` raised to `exponent`.
///
/// Unlike the table-driven functions, the exponent is always made a floating
/// node by adding a literal `0.0`, while a literal base is promoted as is.
pub fn pow(base: impl Into<Operand>, exponent: impl Into<Operand>) -> Result<Operand> {
    let (base, exponent) = (base.into(), exponent.into());
    if let (Operand::Host(b), Operand::Host(e)) = (&base, &exponent) {
        return host_binary(*b, *e, BinaryOp::Pow).map(Operand::Host);
    }
    let (base, exponent) = promote_pair(base, exponent)?;
    let zero = scalar_node(exponent.engine(), ScalarValue::from_literal(Literal::Float(0.0)))?;
    let exponent = binary_nodes(&exponent, &zero, BinaryOp::Add)?;
    binary_nodes(&base, &exponent, BinaryOp::Pow).map(Operand::Node)
}

/// Elementwise `cond ? then : otherwise`.
pub fn select(
    cond: impl Into<Operand>,
    then: impl Into<Operand>,
    otherwise: impl Into<Operand>,
) -> Result<Operand> {
    let (cond, then, otherwise) = (cond.into(), then.into(), otherwise.into());
    if let (Operand::Host(c), Operand::Host(t), Operand::Host(o)) = (&cond, &then, &otherwise) {
        return Ok(Operand::Host(if c.is_truthy() { *t } else { *o }));
    }
    let engine = engine_of(&[&cond, &then, &otherwise])
        .cloned()
        .ok_or_else(|| MapError::type_mismatch("no graph node among the operands"))?;
    let cond = cond.promote(&engine)?;
    let then = then.promote(&engine)?;
    let otherwise = otherwise.promote(&engine)?;
    let ptr = engine.conditional(cond.node()?, then.node()?, otherwise.node()?)?;
    Raster::wrap(&engine, ptr).map(Operand::Node)
}

/// Casts a node, or converts a host scalar.
pub fn astype(value: impl Into<Operand>, dtype: DataType) -> Result<Operand> {
    match value.into() {
        Operand::Host(value) => value.convert(dtype).map(Operand::Host),
        Operand::Node(raster) => raster.astype(dtype).map(Operand::Node),
    }
}

/// Dense square or rectangular kernel for convolution and focal operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    values: Vec<ScalarValue>,
    shape: ShapeVector,
}

impl Kernel {
    pub fn new(values: Vec<ScalarValue>, shape: ShapeVector) -> Result<Self> {
        if shape.rank() != 2 || shape.num_elements() != values.len() {
            return Err(MapError::invalid_shape(format!(
                "kernel of {} values does not fill shape {:?}",
                values.len(),
                shape.dims()
            )));
        }
        Ok(Self { values, shape })
    }

    /// Builds an `N x N` kernel from rows; entries keep their own tags.
    pub fn from_rows<T, const N: usize>(rows: [[T; N]; N]) -> Result<Self>
    where
        T: Into<ScalarValue> + Copy,
    {
        let values = rows.iter().flatten().map(|&v| v.into()).collect();
        let side = i32::try_from(N).map_err(|_| MapError::invalid_shape("kernel too large"))?;
        Kernel::new(values, ShapeVector::new(&[side, side])?)
    }

    /// An `N x N` kernel of ones.
    pub fn ones(side: usize) -> Result<Self> {
        let extent = i32::try_from(side).map_err(|_| MapError::invalid_shape("kernel too large"))?;
        Kernel::new(
            vec![ScalarValue::I32(1); side * side],
            ShapeVector::new(&[extent, extent])?,
        )
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn shape(&self) -> ShapeVector {
        self.shape
    }
}

pub fn convolve(raster: &Raster, kernel: &Kernel) -> Result<Raster> {
    let ptr = raster
        .engine()
        .convolution(raster.node()?, kernel.values(), kernel.shape())?;
    raster.derive(ptr)
}

/// Reduces with `op` over the cells where `kernel` is nonzero.
pub fn focal(raster: &Raster, kernel: &Kernel, op: ReductionOp) -> Result<Raster> {
    let ptr = raster
        .engine()
        .focal_func(raster.node()?, kernel.values(), kernel.shape(), op)?;
    raster.derive(ptr)
}

/// Sum over the 3x3 neighborhood.
pub fn fsum(raster: &Raster) -> Result<Raster> {
    convolve(raster, &Kernel::ones(3)?)
}

pub fn fmax(raster: &Raster, kernel: &Kernel) -> Result<Raster> {
    focal(raster, kernel, ReductionOp::Max)
}

pub fn fmin(raster: &Raster, kernel: &Kernel) -> Result<Raster> {
    focal(raster, kernel, ReductionOp::Min)
}

/// Whole-domain reduction producing a zero-rank node.
pub fn zonal(raster: &Raster, op: ReductionOp) -> Result<Raster> {
    raster.derive(raster.engine().zonal_reduc(raster.node()?, op)?)
}

fn zonal_masked(raster: &Raster, cond: Option<&Raster>, op: ReductionOp) -> Result<Raster> {
    match cond {
        None => zonal(raster, op),
        Some(cond) => {
            let neutral = ScalarValue::from_f64(op.identity(), raster.dtype()?)?;
            let masked = select(cond, raster, neutral)?.into_raster()?;
            zonal(&masked, op)
        }
    }
}

pub fn zsum(raster: &Raster, cond: Option<&Raster>) -> Result<Raster> {
    zonal_masked(raster, cond, ReductionOp::Sum)
}

pub fn zprod(raster: &Raster, cond: Option<&Raster>) -> Result<Raster> {
    zonal_masked(raster, cond, ReductionOp::Prod)
}

pub fn zor(raster: &Raster, cond: Option<&Raster>) -> Result<Raster> {
    zonal_masked(raster, cond, ReductionOp::Or)
}

pub fn zand(raster: &Raster, cond: Option<&Raster>) -> Result<Raster> {
    zonal_masked(raster, cond, ReductionOp::And)
}

pub fn zmax(raster: &Raster) -> Result<Raster> {
    zonal(raster, ReductionOp::Max)
}

pub fn zmin(raster: &Raster) -> Result<Raster> {
    zonal(raster, ReductionOp::Min)
}

/// Reduction along the straight line from `coord` to every cell.
pub fn radial(raster: &Raster, op: ReductionOp, coord: impl Into<Coord>) -> Result<Raster> {
    let ptr = raster
        .engine()
        .radial_scan(raster.node()?, op, coord.into())?;
    raster.derive(ptr)
}

pub fn rsum(raster: &Raster, coord: impl Into<Coord>) -> Result<Raster> {
    radial(raster, ReductionOp::Sum, coord)
}

pub fn rprod(raster: &Raster, coord: impl Into<Coord>) -> Result<Raster> {
    radial(raster, ReductionOp::Prod, coord)
}

pub fn rmax(raster: &Raster, coord: impl Into<Coord>) -> Result<Raster> {
    radial(raster, ReductionOp::Max, coord)
}

pub fn rmin(raster: &Raster, coord: impl Into<Coord>) -> Result<Raster> {
    radial(raster, ReductionOp::Min, coord)
}

/// Per-block reduction; one value per block of the raster's partitioning.
pub fn block_stats(raster: &Raster, op: ReductionOp) -> Result<Raster> {
    raster.derive(raster.engine().block_stats(raster.node()?, op)?)
}

/// Optional summary inputs for [`stats`].
#[derive(Debug, Clone, Default)]
pub struct StatsInputs {
    pub min: Option<Raster>,
    pub max: Option<Raster>,
    pub mean: Option<Raster>,
    pub std: Option<Raster>,
}

/// Attaches statistics to `raster`. With no inputs, min and max come from
/// block statistics and mean/std stay empty.
pub fn stats(raster: &Raster, inputs: StatsInputs) -> Result<Raster> {
    let engine = raster.engine();
    let inputs = if inputs.min.is_none()
        && inputs.max.is_none()
        && inputs.mean.is_none()
        && inputs.std.is_none()
    {
        StatsInputs {
            min: Some(block_stats(raster, ReductionOp::Min)?),
            max: Some(block_stats(raster, ReductionOp::Max)?),
            mean: None,
            std: None,
        }
    } else {
        inputs
    };
    let ptr_of = |slot: &Option<Raster>| slot.as_ref().map(Raster::ptr).unwrap_or(NodePtr::null());
    let ptr = engine.stats(
        raster.node()?,
        ptr_of(&inputs.min),
        ptr_of(&inputs.max),
        ptr_of(&inputs.mean),
        ptr_of(&inputs.std),
    )?;
    raster.derive(ptr)
}

pub fn barrier(raster: &Raster) -> Result<Raster> {
    raster.barrier()
}

pub fn identity(raster: &Raster) -> Result<Raster> {
    raster.identity()
}
