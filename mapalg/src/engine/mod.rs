use anyhow::Result;

use crate::ops::{BinaryOp, ReductionOp, UnaryOp};
use crate::scalar::{Coord, ScalarValue, ShapeVector};
use crate::types::{DataType, DeviceType, MemOrder, NumDim, StreamDir};

#[cfg(feature = "libmap")]
pub(crate) mod ffi;
#[cfg(feature = "libmap")]
mod libmap;

#[cfg(feature = "libmap")]
pub use libmap::LibMap;

/// Opaque engine node address. Zero is the null node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePtr(usize);

impl NodePtr {
    pub const fn null() -> Self {
        NodePtr(0)
    }

    pub const fn from_addr(addr: usize) -> Self {
        NodePtr(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NodePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Size, type and partitioning of a node's data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub size: ShapeVector,
    pub dtype: DataType,
    pub order: MemOrder,
    pub block: ShapeVector,
    pub group: ShapeVector,
}

/// Pre/post node pairs reported for an assembled loop, aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopVarPairs {
    pub pre: Vec<NodePtr>,
    pub post: Vec<NodePtr>,
}

impl LoopVarPairs {
    pub fn len(&self) -> usize {
        self.pre.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty()
    }

    /// The post-loop node paired with `pre`, if `pre` is loop-carried.
    pub fn post_for(&self, pre: NodePtr) -> Option<NodePtr> {
        self.pre
            .iter()
            .position(|&ptr| ptr == pre)
            .map(|idx| self.post[idx])
    }
}

/// The external execution engine.
///
/// Every constructor returns a fresh node whose handle count is zero; callers
/// take ownership by wrapping it in a [`Raster`](crate::Raster). The engine
/// keeps process-wide state, so implementations are used from one thread.
pub trait Engine {
    fn name(&self) -> &str;

    fn setup_devices(&self, platform: &str, devices: DeviceType, device_name: &str) -> Result<()>;
    fn set_num_ranks(&self, ranks: i32) -> Result<()>;

    fn increase_ref(&self, node: NodePtr);
    fn decrease_ref(&self, node: NodePtr);

    fn constant(&self, value: ScalarValue, layout: &Layout) -> Result<NodePtr>;
    fn index(&self, layout: &Layout, dim: NumDim) -> Result<NodePtr>;
    fn rand(&self, seed: NodePtr, dtype: DataType, order: MemOrder) -> Result<NodePtr>;
    fn cast(&self, node: NodePtr, dtype: DataType) -> Result<NodePtr>;

    fn unary(&self, node: NodePtr, op: UnaryOp) -> Result<NodePtr>;
    fn binary(&self, lhs: NodePtr, rhs: NodePtr, op: BinaryOp) -> Result<NodePtr>;
    /// Null branches stand for the empty placeholder.
    fn conditional(&self, cond: NodePtr, then: NodePtr, otherwise: NodePtr) -> Result<NodePtr>;
    fn access(&self, node: NodePtr, coord: Coord) -> Result<NodePtr>;
    fn lhs_access(&self, node: NodePtr, value: NodePtr, coord: Coord) -> Result<NodePtr>;
    fn neighbor(&self, node: NodePtr, offset: Coord) -> Result<NodePtr>;
    fn bounded_neighbor(&self, node: NodePtr, rows: NodePtr, cols: NodePtr) -> Result<NodePtr>;
    fn convolution(&self, node: NodePtr, kernel: &[ScalarValue], shape: ShapeVector)
        -> Result<NodePtr>;
    fn focal_func(
        &self,
        node: NodePtr,
        kernel: &[ScalarValue],
        shape: ShapeVector,
        op: ReductionOp,
    ) -> Result<NodePtr>;

    fn zonal_reduc(&self, node: NodePtr, op: ReductionOp) -> Result<NodePtr>;
    fn radial_scan(&self, node: NodePtr, op: ReductionOp, coord: Coord) -> Result<NodePtr>;
    fn block_stats(&self, node: NodePtr, op: ReductionOp) -> Result<NodePtr>;
    fn stats(
        &self,
        node: NodePtr,
        min: NodePtr,
        max: NodePtr,
        mean: NodePtr,
        std: NodePtr,
    ) -> Result<NodePtr>;
    fn barrier(&self, node: NodePtr) -> Result<NodePtr>;
    fn identity(&self, node: NodePtr) -> Result<NodePtr>;

    fn loop_start(&self) -> Result<()>;
    fn loop_cond(&self, cond: NodePtr) -> Result<()>;
    fn loop_body(&self) -> Result<()>;
    fn loop_again(&self) -> Result<()>;
    fn loop_assemble(&self) -> Result<NodePtr>;
    fn loop_end(&self) -> Result<()>;
    fn loop_update_vars(&self, loop_node: NodePtr) -> Result<LoopVarPairs>;

    fn read(&self, resource: &str) -> Result<NodePtr>;
    /// Returns the engine status; zero means success.
    fn write(&self, node: NodePtr, resource: &str) -> Result<i32>;
    fn eval(&self, nodes: &[NodePtr]) -> Result<()>;
    fn value(&self, node: NodePtr) -> Result<ScalarValue>;

    fn node_id(&self, node: NodePtr) -> Result<i32>;
    fn node_name(&self, node: NodePtr) -> Result<String>;
    fn stream_dir(&self, node: NodePtr) -> Result<StreamDir>;
    fn data_type(&self, node: NodePtr) -> Result<DataType>;
    fn num_dim(&self, node: NodePtr) -> Result<NumDim>;
    fn mem_order(&self, node: NodePtr) -> Result<MemOrder>;
    fn data_size(&self, node: NodePtr) -> Result<ShapeVector>;
    fn block_size(&self, node: NodePtr) -> Result<ShapeVector>;
    fn group_size(&self, node: NodePtr) -> Result<ShapeVector>;
}
