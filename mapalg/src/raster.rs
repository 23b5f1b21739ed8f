use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::engine::{Engine, NodePtr};
use crate::error::MapError;
use crate::ops::{Operand, UnaryOp};
use crate::scalar::{Coord, ShapeVector};
use crate::types::{DataType, MemOrder, NumDim, StreamDir};

/// Owning handle to an engine node.
///
/// Each live handle accounts for exactly one engine reference: wrapping and
/// cloning increment the node's count, dropping decrements it. An empty
/// placeholder holds no node and never calls the engine.
pub struct Raster {
    node: Option<NodePtr>,
    engine: Rc<dyn Engine>,
}

impl Raster {
    /// Takes a reference on `ptr`.
    pub fn wrap(engine: &Rc<dyn Engine>, ptr: NodePtr) -> Result<Self> {
        if ptr.is_null() {
            return Err(MapError::NullNode(format!(
                "{} returned a null node",
                engine.name()
            ))
            .into());
        }
        engine.increase_ref(ptr);
        Ok(Self {
            node: Some(ptr),
            engine: Rc::clone(engine),
        })
    }

    pub fn empty(engine: &Rc<dyn Engine>) -> Self {
        Self {
            node: None,
            engine: Rc::clone(engine),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// The wrapped address; null for the empty placeholder.
    pub fn ptr(&self) -> NodePtr {
        self.node.unwrap_or(NodePtr::null())
    }

    pub(crate) fn node(&self) -> Result<NodePtr> {
        self.node
            .ok_or_else(|| MapError::NullNode("empty placeholder used as an operand".into()).into())
    }

    pub fn engine(&self) -> &Rc<dyn Engine> {
        &self.engine
    }

    pub fn same_node(&self, other: &Raster) -> bool {
        self.node.is_some() && self.node == other.node
    }

    /// Wraps another node produced by this raster's engine.
    pub(crate) fn derive(&self, ptr: NodePtr) -> Result<Raster> {
        Raster::wrap(&self.engine, ptr)
    }

    /// Points this handle at `ptr`: one reference taken on `ptr`, one released on
    /// the previous node.
    pub fn rebind(&mut self, ptr: NodePtr) -> Result<()> {
        if ptr.is_null() {
            return Err(MapError::NullNode("cannot rebind to a null node".into()).into());
        }
        if self.node == Some(ptr) {
            return Ok(());
        }
        self.engine.increase_ref(ptr);
        if let Some(old) = self.node.replace(ptr) {
            self.engine.decrease_ref(old);
        }
        Ok(())
    }

    pub fn id(&self) -> Result<i32> {
        self.engine.node_id(self.node()?)
    }

    pub fn name(&self) -> Result<String> {
        self.engine.node_name(self.node()?)
    }

    pub fn stream_dir(&self) -> Result<StreamDir> {
        self.engine.stream_dir(self.node()?)
    }

    pub fn dtype(&self) -> Result<DataType> {
        self.engine.data_type(self.node()?)
    }

    pub fn num_dim(&self) -> Result<NumDim> {
        self.engine.num_dim(self.node()?)
    }

    pub fn mem_order(&self) -> Result<MemOrder> {
        self.engine.mem_order(self.node()?)
    }

    pub fn data_size(&self) -> Result<ShapeVector> {
        self.engine.data_size(self.node()?)
    }

    pub fn block_size(&self) -> Result<ShapeVector> {
        self.engine.block_size(self.node()?)
    }

    pub fn group_size(&self) -> Result<ShapeVector> {
        self.engine.group_size(self.node()?)
    }

    pub fn astype(&self, dtype: DataType) -> Result<Raster> {
        self.derive(self.engine.cast(self.node()?, dtype)?)
    }

    fn matching(&self, value: impl Into<Operand>) -> Result<Raster> {
        let value = value.into().promote(&self.engine)?;
        let dtype = self.dtype()?;
        if value.dtype()? == dtype {
            Ok(value)
        } else {
            value.astype(dtype)
        }
    }

    /// Value of this raster at a fixed coordinate.
    pub fn get(&self, coord: impl Into<Coord>) -> Result<Raster> {
        self.derive(self.engine.access(self.node()?, coord.into())?)
    }

    /// This raster where `mask` holds, the empty placeholder elsewhere.
    pub fn mask(&self, mask: &Raster) -> Result<Raster> {
        let ptr = self
            .engine
            .conditional(mask.node()?, self.node()?, NodePtr::null())?;
        self.derive(ptr)
    }

    /// Replaces the element at `coord` with `value` and rebinds this handle.
    pub fn set(&mut self, coord: impl Into<Coord>, value: impl Into<Operand>) -> Result<()> {
        let value = self.matching(value)?;
        let ptr = self
            .engine
            .lhs_access(self.node()?, value.node()?, coord.into())?;
        self.rebind(ptr)
    }

    /// Takes `value` where `mask` holds and keeps the current value elsewhere.
    pub fn set_where(&mut self, mask: &Raster, value: impl Into<Operand>) -> Result<()> {
        let value = self.matching(value)?;
        let ptr = self
            .engine
            .conditional(mask.node()?, value.node()?, self.node()?)?;
        self.rebind(ptr)
    }

    /// Element at a fixed relative offset from every cell.
    pub fn neighbor(&self, offset: impl Into<Coord>) -> Result<Raster> {
        self.derive(self.engine.neighbor(self.node()?, offset.into())?)
    }

    /// Element at the per-cell coordinates given by `rows` and `cols`.
    pub fn bounded_neighbor(&self, rows: &Raster, cols: &Raster) -> Result<Raster> {
        let ptr = self
            .engine
            .bounded_neighbor(self.node()?, rows.node()?, cols.node()?)?;
        self.derive(ptr)
    }

    pub fn logical_not(&self) -> Result<Raster> {
        self.derive(self.engine.unary(self.node()?, UnaryOp::Not)?)
    }

    pub fn barrier(&self) -> Result<Raster> {
        self.derive(self.engine.barrier(self.node()?)?)
    }

    pub fn identity(&self) -> Result<Raster> {
        self.derive(self.engine.identity(self.node()?)?)
    }
}

impl Clone for Raster {
    fn clone(&self) -> Self {
        if let Some(ptr) = self.node {
            self.engine.increase_ref(ptr);
        }
        Self {
            node: self.node,
            engine: Rc::clone(&self.engine),
        }
    }
}

impl Drop for Raster {
    fn drop(&mut self) {
        if let Some(ptr) = self.node.take() {
            self.engine.decrease_ref(ptr);
        }
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(ptr) => write!(f, "Raster({} on {})", ptr, self.engine.name()),
            None => write!(f, "Raster(empty)"),
        }
    }
}
