use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;

use crate::config::MapConfig;
use crate::engine::{Engine, Layout, LoopVarPairs, NodePtr};
use crate::error::MapError;
use crate::ops::{BinaryOp, ReductionOp, UnaryOp};
use crate::scalar::{Coord, ScalarValue, ShapeVector};
use crate::types::{DataType, DeviceType, MemOrder, NumDim, StreamDir};

mod eval;
mod grid;
mod loops;
mod node;
mod resources;

pub use grid::Grid;

use eval::Evaluator;
use loops::LoopAssembler;
use node::{FocalKernel, Meta, NodeKind, SimNode};
use resources::ResourceStore;

/// Graph state shared by every call into the simulator.
pub(crate) struct SimState {
    nodes: HashMap<usize, SimNode>,
    next_id: usize,
    assembler: LoopAssembler,
    resources: ResourceStore,
    computed: HashMap<usize, Grid>,
    ranks: i32,
    devices: Option<(String, DeviceType, String)>,
}

impl SimState {
    fn node(&self, id: usize) -> Result<&SimNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| MapError::engine(format!("unknown node {id:#x}")))
    }

    fn meta(&self, ptr: NodePtr) -> Result<Meta> {
        Ok(self.node(id_of(ptr)?)?.meta.clone())
    }

    fn create(&mut self, kind: NodeKind, inputs: Vec<usize>, meta: Meta) -> NodePtr {
        let id = self.next_id;
        self.next_id += 1;
        for input in &inputs {
            if let Some(node) = self.nodes.get_mut(input) {
                node.users += 1;
            }
        }
        let held = self.assembler.record(id);
        crate::trace!(Graph, "create {}{id} {:?}", kind.label(), meta.shape);
        self.nodes.insert(
            id,
            SimNode {
                kind,
                inputs,
                meta,
                refs: 0,
                users: usize::from(held),
            },
        );
        NodePtr::from_addr(id)
    }

    /// Drops one user edge from `id` and frees whatever became unreachable.
    fn drop_user(&mut self, id: usize) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.users = node.users.saturating_sub(1);
        }
        self.collect(id);
    }

    fn collect(&mut self, id: usize) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if !self.nodes.get(&id).is_some_and(SimNode::is_dead) {
                continue;
            }
            if let Some(node) = self.nodes.remove(&id) {
                self.computed.remove(&id);
                for input in node.inputs {
                    if let Some(parent) = self.nodes.get_mut(&input) {
                        parent.users = parent.users.saturating_sub(1);
                        pending.push(input);
                    }
                }
            }
        }
    }

    /// Zero-rank zero standing in for an empty conditional branch.
    fn placeholder(&mut self, meta: Meta) -> NodePtr {
        let zero = ScalarValue::zero(meta.dtype).unwrap_or(ScalarValue::F32(0.0));
        self.create(NodeKind::Constant(zero), Vec::new(), meta)
    }

    fn evaluate(&self, ids: &[usize], max_iterations: usize) -> Result<Vec<Grid>> {
        let mut evaluator = Evaluator::new(self, max_iterations);
        ids.iter().map(|&id| evaluator.eval(id)).collect()
    }
}

fn id_of(ptr: NodePtr) -> Result<usize> {
    if ptr.is_null() {
        return Err(MapError::NullNode("the engine received the null node".into()).into());
    }
    Ok(ptr.addr())
}

/// Shape of an elementwise result; zero-rank operands broadcast.
fn broadcast(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    match (lhs, rhs) {
        (l, r) if l == r => Ok(l.to_vec()),
        ([], r) => Ok(r.to_vec()),
        (l, []) => Ok(l.to_vec()),
        (l, r) => Err(MapError::invalid_shape(format!(
            "shapes {l:?} and {r:?} do not broadcast"
        ))),
    }
}

fn check_coord(meta: &Meta, coord: Coord) -> Result<()> {
    let values = coord.values();
    if meta.shape.is_empty() {
        return Err(MapError::invalid_shape("cannot index a zero-rank node"));
    }
    for (axis, &extent) in meta.shape.iter().enumerate() {
        let c = values[axis];
        if c < 0 || c as usize >= extent {
            return Err(MapError::invalid_shape(format!(
                "coordinate {values:?} outside shape {:?}",
                meta.shape
            )));
        }
    }
    Ok(())
}

fn require_2d(meta: &Meta, what: &str) -> Result<()> {
    if meta.shape.len() != 2 {
        return Err(MapError::invalid_shape(format!(
            "{what} needs a 2D raster, found shape {:?}",
            meta.shape
        )));
    }
    Ok(())
}

fn focal_kernel(kernel: &[ScalarValue], shape: ShapeVector) -> Result<FocalKernel> {
    let dims = shape.extents();
    let (rows, cols) = match dims.as_slice() {
        [rows, cols] if rows * cols == kernel.len() && !kernel.is_empty() => (*rows, *cols),
        _ => {
            return Err(MapError::invalid_shape(format!(
                "{} kernel values do not fill shape {:?}",
                kernel.len(),
                shape.dims()
            )))
        }
    };
    let dtype = kernel
        .iter()
        .fold(DataType::None, |acc, v| acc.promote(v.dtype()));
    Ok(FocalKernel {
        values: kernel.iter().map(ScalarValue::to_f64).collect(),
        dtype,
        rows,
        cols,
    })
}

/// In-process reference engine.
///
/// Builds the same node graph a native engine would and evaluates it on
/// demand, which makes it suitable for tests and for running scripts without
/// the native library.
pub struct Simulator {
    state: RefCell<SimState>,
    config: MapConfig,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(&MapConfig::default())
    }
}

impl Simulator {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            state: RefCell::new(SimState {
                nodes: HashMap::new(),
                next_id: 1,
                assembler: LoopAssembler::default(),
                resources: ResourceStore::new(config.resource_dir.clone()),
                computed: HashMap::new(),
                ranks: 1,
                devices: None,
            }),
            config: config.clone(),
        }
    }

    /// Host handle count of `node`, or `None` once the node has been freed.
    pub fn ref_count(&self, node: NodePtr) -> Option<usize> {
        self.state.borrow().nodes.get(&node.addr()).map(|n| n.refs)
    }

    pub fn live_nodes(&self) -> usize {
        self.state.borrow().nodes.len()
    }

    pub fn ranks(&self) -> i32 {
        self.state.borrow().ranks
    }

    pub fn devices(&self) -> Option<(String, DeviceType, String)> {
        self.state.borrow().devices.clone()
    }

    /// Evaluates `node` and returns all of its values.
    pub fn grid(&self, node: NodePtr) -> Result<Grid> {
        let id = id_of(node)?;
        let mut grids = self
            .state
            .borrow()
            .evaluate(&[id], self.config.max_loop_iterations)?;
        Ok(grids.remove(0))
    }

    pub fn insert_resource(&self, name: &str, grid: Grid) {
        self.state.borrow_mut().resources.insert(name, grid);
    }

    pub fn resource(&self, name: &str) -> Option<Grid> {
        self.state.borrow().resources.get(name).cloned()
    }

    /// Makes later writes to `name` fail with a nonzero status.
    pub fn protect(&self, name: &str) {
        self.state.borrow_mut().resources.protect(name);
    }

    fn build(&self, kind: NodeKind, inputs: &[NodePtr], meta: Meta) -> Result<NodePtr> {
        let ids = inputs.iter().map(|&p| id_of(p)).collect::<Result<Vec<_>>>()?;
        Ok(self.state.borrow_mut().create(kind, ids, meta))
    }

    fn unary_like(&self, node: NodePtr, kind: NodeKind) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        let meta = meta.derived(meta.dtype, meta.shape.clone());
        self.build(kind, &[node], meta)
    }

    fn focal_like(&self, node: NodePtr, kind: NodeKind, dtype: DataType) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        require_2d(&meta, kind.label())?;
        let meta = meta.derived(dtype, meta.shape.clone());
        self.build(kind, &[node], meta)
    }
}

impl Engine for Simulator {
    fn name(&self) -> &str {
        "simulator"
    }

    fn setup_devices(&self, platform: &str, devices: DeviceType, device_name: &str) -> Result<()> {
        crate::trace!(Engine, "setup devices {platform} {devices:?} {device_name}");
        self.state.borrow_mut().devices =
            Some((platform.to_string(), devices, device_name.to_string()));
        Ok(())
    }

    fn set_num_ranks(&self, ranks: i32) -> Result<()> {
        if ranks < 1 {
            return Err(MapError::engine(format!("invalid rank count {ranks}")));
        }
        self.state.borrow_mut().ranks = ranks;
        Ok(())
    }

    fn increase_ref(&self, node: NodePtr) {
        match self.state.borrow_mut().nodes.get_mut(&node.addr()) {
            Some(sim) => sim.refs += 1,
            None => crate::warning!(Graph, "increase_ref on unknown node {node}"),
        }
    }

    fn decrease_ref(&self, node: NodePtr) {
        let mut state = self.state.borrow_mut();
        match state.nodes.get_mut(&node.addr()) {
            Some(sim) if sim.refs > 0 => sim.refs -= 1,
            Some(_) => {
                crate::warning!(Graph, "decrease_ref on node {node} with no handles");
                return;
            }
            None => {
                crate::warning!(Graph, "decrease_ref on unknown node {node}");
                return;
            }
        }
        state.collect(node.addr());
    }

    fn constant(&self, value: ScalarValue, layout: &Layout) -> Result<NodePtr> {
        let value = value.convert(layout.dtype)?;
        let meta = Meta {
            dtype: layout.dtype,
            shape: layout.size.extents(),
            order: layout.order,
            block: layout.block,
            group: layout.group,
            stream: StreamDir::None,
        };
        self.build(NodeKind::Constant(value), &[], meta)
    }

    fn index(&self, layout: &Layout, dim: NumDim) -> Result<NodePtr> {
        let axis = match dim {
            NumDim::D1 => 0,
            NumDim::D2 => 1,
            other => {
                return Err(MapError::invalid_shape(format!("no index along {other}")));
            }
        };
        if layout.size.rank() <= axis {
            return Err(MapError::invalid_shape(format!(
                "index along {dim} of a rank {} layout",
                layout.size.rank()
            )));
        }
        let meta = Meta {
            dtype: layout.dtype,
            shape: layout.size.extents(),
            order: layout.order,
            block: layout.block,
            group: layout.group,
            stream: StreamDir::None,
        };
        self.build(NodeKind::Index(axis), &[], meta)
    }

    fn rand(&self, seed: NodePtr, dtype: DataType, order: MemOrder) -> Result<NodePtr> {
        let seed_meta = self.state.borrow().meta(seed)?;
        let mut meta = seed_meta.derived(dtype, seed_meta.shape.clone());
        meta.order = order;
        self.build(NodeKind::Rand, &[seed], meta)
    }

    fn cast(&self, node: NodePtr, dtype: DataType) -> Result<NodePtr> {
        if dtype == DataType::None {
            return Err(MapError::type_mismatch("cannot cast to the untyped data type"));
        }
        let meta = self.state.borrow().meta(node)?;
        let meta = meta.derived(dtype, meta.shape.clone());
        self.build(NodeKind::Cast, &[node], meta)
    }

    fn unary(&self, node: NodePtr, op: UnaryOp) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        let meta = meta.derived(op.result_dtype(meta.dtype), meta.shape.clone());
        self.build(NodeKind::Unary(op), &[node], meta)
    }

    fn binary(&self, lhs: NodePtr, rhs: NodePtr, op: BinaryOp) -> Result<NodePtr> {
        let (l, r) = {
            let state = self.state.borrow();
            (state.meta(lhs)?, state.meta(rhs)?)
        };
        let shape = broadcast(&l.shape, &r.shape)?;
        let template = if l.shape.is_empty() { &r } else { &l };
        let meta = template.derived(op.result_dtype(l.dtype, r.dtype), shape);
        self.build(NodeKind::Binary(op), &[lhs, rhs], meta)
    }

    fn conditional(&self, cond: NodePtr, then: NodePtr, otherwise: NodePtr) -> Result<NodePtr> {
        let (c, t, o) = {
            let state = self.state.borrow();
            let branch = |ptr: NodePtr| -> Result<Option<Meta>> {
                if ptr.is_null() {
                    Ok(None)
                } else {
                    state.meta(ptr).map(Some)
                }
            };
            (state.meta(cond)?, branch(then)?, branch(otherwise)?)
        };
        // An empty branch is a zero-rank zero typed like the other one.
        let (t, o) = match (t, o) {
            (Some(t), Some(o)) => (t, o),
            (None, Some(o)) => (o.derived(o.dtype, Vec::new()), o),
            (Some(t), None) => {
                let o = t.derived(t.dtype, Vec::new());
                (t, o)
            }
            (None, None) => return Err(MapError::NullNode("both branches are empty".into()).into()),
        };
        let shape = broadcast(&broadcast(&c.shape, &t.shape)?, &o.shape)?;
        let template = [&t, &o, &c]
            .into_iter()
            .find(|m| !m.shape.is_empty())
            .unwrap_or(&t);
        let meta = template.derived(t.dtype.promote(o.dtype), shape);
        let (then, otherwise) = {
            let mut state = self.state.borrow_mut();
            let then = if then.is_null() { state.placeholder(t) } else { then };
            let otherwise = if otherwise.is_null() {
                state.placeholder(o)
            } else {
                otherwise
            };
            (then, otherwise)
        };
        self.build(NodeKind::Conditional, &[cond, then, otherwise], meta)
    }

    fn access(&self, node: NodePtr, coord: Coord) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        check_coord(&meta, coord)?;
        let meta = meta.derived(meta.dtype, Vec::new());
        self.build(NodeKind::Access(coord), &[node], meta)
    }

    fn lhs_access(&self, node: NodePtr, value: NodePtr, coord: Coord) -> Result<NodePtr> {
        let (meta, value_meta) = {
            let state = self.state.borrow();
            (state.meta(node)?, state.meta(value)?)
        };
        check_coord(&meta, coord)?;
        if !value_meta.shape.is_empty() {
            return Err(MapError::invalid_shape(format!(
                "cell assignment needs a zero-rank value, found shape {:?}",
                value_meta.shape
            )));
        }
        let meta = meta.derived(meta.dtype, meta.shape.clone());
        self.build(NodeKind::LhsAccess(coord), &[node, value], meta)
    }

    fn neighbor(&self, node: NodePtr, offset: Coord) -> Result<NodePtr> {
        self.unary_like(node, NodeKind::Neighbor(offset))
    }

    fn bounded_neighbor(&self, node: NodePtr, rows: NodePtr, cols: NodePtr) -> Result<NodePtr> {
        let (meta, r, c) = {
            let state = self.state.borrow();
            (state.meta(node)?, state.meta(rows)?, state.meta(cols)?)
        };
        if meta.shape.is_empty() {
            return Err(MapError::invalid_shape("bounded neighbor of a zero-rank node"));
        }
        if !r.dtype.is_integer() || !c.dtype.is_integer() {
            return Err(MapError::type_mismatch(format!(
                "neighbor coordinates must be integers, found {} and {}",
                r.dtype, c.dtype
            )));
        }
        broadcast(&meta.shape, &r.shape)?;
        broadcast(&meta.shape, &c.shape)?;
        let meta = meta.derived(meta.dtype, meta.shape.clone());
        self.build(NodeKind::BoundedNeighbor, &[node, rows, cols], meta)
    }

    fn convolution(
        &self,
        node: NodePtr,
        kernel: &[ScalarValue],
        shape: ShapeVector,
    ) -> Result<NodePtr> {
        let kernel = focal_kernel(kernel, shape)?;
        let dtype = self.state.borrow().meta(node)?.dtype.promote(kernel.dtype);
        self.focal_like(node, NodeKind::Convolution(kernel), dtype)
    }

    fn focal_func(
        &self,
        node: NodePtr,
        kernel: &[ScalarValue],
        shape: ShapeVector,
        op: ReductionOp,
    ) -> Result<NodePtr> {
        let kernel = focal_kernel(kernel, shape)?;
        let dtype = op.result_dtype(self.state.borrow().meta(node)?.dtype);
        self.focal_like(node, NodeKind::FocalFunc(kernel, op), dtype)
    }

    fn zonal_reduc(&self, node: NodePtr, op: ReductionOp) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        let meta = meta.derived(op.result_dtype(meta.dtype), Vec::new());
        self.build(NodeKind::ZonalReduc(op), &[node], meta)
    }

    fn radial_scan(&self, node: NodePtr, op: ReductionOp, coord: Coord) -> Result<NodePtr> {
        let dtype = op.result_dtype(self.state.borrow().meta(node)?.dtype);
        self.focal_like(node, NodeKind::RadialScan(op, coord), dtype)
    }

    fn block_stats(&self, node: NodePtr, op: ReductionOp) -> Result<NodePtr> {
        let meta = self.state.borrow().meta(node)?;
        let block = meta.block.extents();
        let shape = meta
            .shape
            .iter()
            .enumerate()
            .map(|(axis, &extent)| match block.get(axis) {
                Some(&b) if b > 0 => extent.div_ceil(b),
                _ => 1,
            })
            .collect();
        let meta = meta.derived(op.result_dtype(meta.dtype), shape);
        self.build(NodeKind::BlockStats(op), &[node], meta)
    }

    fn stats(
        &self,
        node: NodePtr,
        min: NodePtr,
        max: NodePtr,
        mean: NodePtr,
        std: NodePtr,
    ) -> Result<NodePtr> {
        let mut inputs = vec![node];
        inputs.extend([min, max, mean, std].into_iter().filter(|p| !p.is_null()));
        let meta = self.state.borrow().meta(node)?;
        let meta = meta.derived(meta.dtype, meta.shape.clone());
        self.build(NodeKind::Stats, &inputs, meta)
    }

    fn barrier(&self, node: NodePtr) -> Result<NodePtr> {
        self.unary_like(node, NodeKind::Barrier)
    }

    fn identity(&self, node: NodePtr) -> Result<NodePtr> {
        self.unary_like(node, NodeKind::Identity)
    }

    fn loop_start(&self) -> Result<()> {
        crate::trace!(Loop, "loop start");
        self.state.borrow_mut().assembler.start()
    }

    fn loop_cond(&self, cond: NodePtr) -> Result<()> {
        let id = id_of(cond)?;
        let mut state = self.state.borrow_mut();
        state.node(id)?;
        state.assembler.cond(id)?;
        if let Some(node) = state.nodes.get_mut(&id) {
            node.users += 1;
        }
        Ok(())
    }

    fn loop_body(&self) -> Result<()> {
        self.state.borrow_mut().assembler.body()
    }

    fn loop_again(&self) -> Result<()> {
        self.state.borrow_mut().assembler.again()
    }

    fn loop_assemble(&self) -> Result<NodePtr> {
        let mut state = self.state.borrow_mut();
        let spec = state.assembler.plan(&state.nodes)?;
        state.assembler.seal();

        let guard = state.node(spec.states[0].init)?.meta.clone();
        let meta = guard.derived(DataType::B8, guard.shape.clone());
        let mut inputs = spec.body.clone();
        inputs.extend(spec.externals());
        let tails = spec.tails();
        let body = spec.body.clone();
        let loop_ptr = state.create(NodeKind::Loop(Box::new(spec)), inputs, meta);

        let mut pairs = Vec::with_capacity(tails.len());
        for (k, feed) in tails {
            let meta = state.node(body[feed])?.meta.clone();
            let tail = state.create(NodeKind::LoopTail(k), vec![loop_ptr.addr()], meta);
            pairs.push((state.assembler.second_replay()[feed], tail.addr()));
        }
        crate::trace!(
            Loop,
            "loop {loop_ptr} assembled: {} steps, {} carried",
            body.len(),
            pairs.len()
        );
        state.assembler.set_pairs(loop_ptr.addr(), pairs);
        Ok(loop_ptr)
    }

    fn loop_end(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for id in state.assembler.finish() {
            state.drop_user(id);
        }
        crate::trace!(Loop, "loop end, {} live nodes", state.nodes.len());
        Ok(())
    }

    fn loop_update_vars(&self, loop_node: NodePtr) -> Result<LoopVarPairs> {
        let state = self.state.borrow();
        let pairs = state
            .assembler
            .pairs(id_of(loop_node)?)
            .ok_or_else(|| MapError::malformed_loop(format!("{loop_node} is not an open loop")))?;
        Ok(LoopVarPairs {
            pre: pairs.iter().map(|&(pre, _)| NodePtr::from_addr(pre)).collect(),
            post: pairs.iter().map(|&(_, post)| NodePtr::from_addr(post)).collect(),
        })
    }

    fn read(&self, resource: &str) -> Result<NodePtr> {
        let grid = self.state.borrow().resources.load(resource)?;
        let meta = Meta {
            dtype: grid.dtype(),
            shape: grid.shape().to_vec(),
            order: MemOrder::default(),
            block: ShapeVector::unset(),
            group: ShapeVector::unset(),
            stream: StreamDir::In,
        };
        self.build(NodeKind::Read(resource.to_string(), grid), &[], meta)
    }

    fn write(&self, node: NodePtr, resource: &str) -> Result<i32> {
        let grid = self.grid(node)?;
        let status = self.state.borrow_mut().resources.store(resource, grid);
        if status == resources::WRITE_OK {
            if let Some(sim) = self.state.borrow_mut().nodes.get_mut(&node.addr()) {
                sim.meta.stream = StreamDir::Out;
            }
        }
        Ok(status)
    }

    fn eval(&self, nodes: &[NodePtr]) -> Result<()> {
        let ids = nodes.iter().map(|&p| id_of(p)).collect::<Result<Vec<_>>>()?;
        let grids = self
            .state
            .borrow()
            .evaluate(&ids, self.config.max_loop_iterations)?;
        let mut state = self.state.borrow_mut();
        state.computed.extend(ids.into_iter().zip(grids));
        Ok(())
    }

    fn value(&self, node: NodePtr) -> Result<ScalarValue> {
        self.grid(node)?.to_scalar()
    }

    fn node_id(&self, node: NodePtr) -> Result<i32> {
        let id = id_of(node)?;
        self.state.borrow().node(id)?;
        i32::try_from(id).map_err(|_| MapError::engine(format!("node id {id} overflows")))
    }

    fn node_name(&self, node: NodePtr) -> Result<String> {
        let id = id_of(node)?;
        Ok(format!("{}{id}", self.state.borrow().node(id)?.kind.label()))
    }

    fn stream_dir(&self, node: NodePtr) -> Result<StreamDir> {
        Ok(self.state.borrow().meta(node)?.stream)
    }

    fn data_type(&self, node: NodePtr) -> Result<DataType> {
        Ok(self.state.borrow().meta(node)?.dtype)
    }

    fn num_dim(&self, node: NodePtr) -> Result<NumDim> {
        Ok(self.state.borrow().meta(node)?.num_dim())
    }

    fn mem_order(&self, node: NodePtr) -> Result<MemOrder> {
        Ok(self.state.borrow().meta(node)?.order)
    }

    fn data_size(&self, node: NodePtr) -> Result<ShapeVector> {
        Ok(self.state.borrow().meta(node)?.size())
    }

    fn block_size(&self, node: NodePtr) -> Result<ShapeVector> {
        Ok(self.state.borrow().meta(node)?.block)
    }

    fn group_size(&self, node: NodePtr) -> Result<ShapeVector> {
        Ok(self.state.borrow().meta(node)?.group)
    }
}
