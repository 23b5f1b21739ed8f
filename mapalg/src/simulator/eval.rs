use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MapError;
use crate::ops::kernels::{apply_binary, apply_unary, reduce_kernel};
use crate::ops::ReductionOp;
use crate::simulator::grid::Grid;
use crate::simulator::loops::{LoopSpec, Slot};
use crate::simulator::node::{FocalKernel, Meta, NodeKind};
use crate::simulator::SimState;
use crate::types::DataType;

/// Computes node values on demand, memoizing every node it visits.
pub(crate) struct Evaluator<'a> {
    state: &'a SimState,
    cache: HashMap<usize, Grid>,
    loops: HashMap<usize, Rc<Vec<Grid>>>,
    max_iterations: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(state: &'a SimState, max_iterations: usize) -> Self {
        Self {
            state,
            cache: HashMap::new(),
            loops: HashMap::new(),
            max_iterations,
        }
    }

    pub fn eval(&mut self, id: usize) -> Result<Grid> {
        if let Some(grid) = self.cache.get(&id).or_else(|| self.state.computed.get(&id)) {
            return Ok(grid.clone());
        }
        let state = self.state;
        let node = state.node(id)?;
        let grid = match &node.kind {
            NodeKind::Loop(spec) => self.run_loop(id, spec)?[0].clone(),
            NodeKind::LoopTail(k) => {
                let loop_id = node.inputs[0];
                let spec = match &state.node(loop_id)?.kind {
                    NodeKind::Loop(spec) => spec,
                    other => {
                        return Err(MapError::engine(format!(
                            "loop tail attached to {}",
                            other.label()
                        )))
                    }
                };
                self.run_loop(loop_id, spec)?[*k].clone()
            }
            kind => {
                let inputs = node
                    .inputs
                    .iter()
                    .map(|&input| self.eval(input))
                    .collect::<Result<Vec<_>>>()?;
                apply(kind, &node.meta, &inputs)?
            }
        };
        self.cache.insert(id, grid.clone());
        Ok(grid)
    }

    /// Runs a loop to completion and returns its final carried states.
    fn run_loop(&mut self, loop_id: usize, spec: &LoopSpec) -> Result<Rc<Vec<Grid>>> {
        if let Some(states) = self.loops.get(&loop_id) {
            return Ok(states.clone());
        }
        let state = self.state;
        let mut states = spec
            .states
            .iter()
            .map(|carried| self.eval(carried.init))
            .collect::<Result<Vec<_>>>()?;
        let mut externals = HashMap::new();
        for id in spec.externals() {
            externals.insert(id, self.eval(id)?);
        }

        let mut iterations = 0usize;
        while states[0].any_true() {
            if iterations == self.max_iterations {
                return Err(MapError::engine(format!(
                    "loop {loop_id} exceeded {} iterations",
                    self.max_iterations
                )));
            }
            iterations += 1;
            let mut values: Vec<Grid> = Vec::with_capacity(spec.body.len());
            for (step, &id) in spec.body.iter().enumerate() {
                let node = state.node(id)?;
                let inputs = spec.slots[step]
                    .iter()
                    .map(|slot| match *slot {
                        Slot::Local(j) => values[j].clone(),
                        Slot::State(k) => states[k].clone(),
                        Slot::External(id) => externals[&id].clone(),
                    })
                    .collect::<Vec<_>>();
                values.push(apply(&node.kind, &node.meta, &inputs)?);
            }
            states = spec
                .states
                .iter()
                .map(|carried| values[carried.feed].clone())
                .collect();
        }
        crate::trace!(Loop, "loop {loop_id} finished after {iterations} iterations");

        let states = Rc::new(states);
        self.loops.insert(loop_id, states.clone());
        Ok(states)
    }
}

fn len_of(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn apply(kind: &NodeKind, meta: &Meta, inputs: &[Grid]) -> Result<Grid> {
    let shape = meta.shape.clone();
    let len = len_of(&shape);
    let dtype = meta.dtype;
    let grid = match kind {
        NodeKind::Constant(value) => Grid::filled(dtype, shape, value.to_f64()),
        NodeKind::Index(axis) => {
            let template = Grid::filled(dtype, shape.clone(), 0.0);
            let data = (0..len).map(|i| template.coord(i)[*axis] as f64).collect();
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Rand => {
            let seed = &inputs[0];
            let data = (0..len)
                .map(|i| {
                    let bits = seed.at(i).to_bits() ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
                    let mut rng = StdRng::seed_from_u64(bits);
                    random_value(&mut rng, dtype)
                })
                .collect();
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Cast => inputs[0].cast(dtype),
        NodeKind::Unary(op) => {
            let input = &inputs[0];
            let data = (0..len)
                .map(|i| apply_unary(*op, input.at(i), input.dtype()))
                .collect::<Result<Vec<_>>>()?;
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Binary(op) => {
            let (lhs, rhs) = (&inputs[0], &inputs[1]);
            let data = (0..len)
                .map(|i| apply_binary(*op, lhs.at(i), rhs.at(i), lhs.dtype(), rhs.dtype()))
                .collect::<Result<Vec<_>>>()?;
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Conditional => {
            let (cond, then, otherwise) = (&inputs[0], &inputs[1], &inputs[2]);
            let data = (0..len)
                .map(|i| {
                    if cond.at(i) != 0.0 {
                        then.at(i)
                    } else {
                        otherwise.at(i)
                    }
                })
                .collect();
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Access(coord) => {
            let input = &inputs[0];
            let at = cell_of(input, coord.values());
            let value = input.get(&at).ok_or_else(|| out_of_bounds(&at, input))?;
            Grid::filled(dtype, shape, value)
        }
        NodeKind::LhsAccess(coord) => {
            let mut grid = inputs[0].cast(dtype);
            let at = cell_of(&grid, coord.values());
            let idx = grid.offset(&at).ok_or_else(|| out_of_bounds(&at, &inputs[0]))?;
            grid.set(idx, inputs[1].at(0));
            grid
        }
        NodeKind::Neighbor(offset) => {
            let input = &inputs[0];
            let offset = offset.values();
            let data = (0..len)
                .map(|i| {
                    let mut at = input.coord(i);
                    for (axis, c) in at.iter_mut().enumerate() {
                        *c += offset[axis] as i64;
                    }
                    input.get(&at).unwrap_or(0.0)
                })
                .collect();
            Grid::new(dtype, shape, data)?
        }
        NodeKind::BoundedNeighbor => {
            let (input, rows, cols) = (&inputs[0], &inputs[1], &inputs[2]);
            let data = (0..len)
                .map(|i| {
                    let targets = [rows.at(i), cols.at(i)];
                    let at: Vec<i64> = input
                        .shape()
                        .iter()
                        .enumerate()
                        .map(|(axis, &extent)| {
                            let max = extent.saturating_sub(1) as i64;
                            (targets[axis] as i64).clamp(0, max)
                        })
                        .collect();
                    input.get(&at).unwrap_or(0.0)
                })
                .collect();
            Grid::new(dtype, shape, data)?
        }
        NodeKind::Convolution(kernel) => focal_grid(&inputs[0], kernel, None, dtype)?,
        NodeKind::FocalFunc(kernel, op) => focal_grid(&inputs[0], kernel, Some(*op), dtype)?,
        NodeKind::ZonalReduc(op) => {
            let fold = reduce_kernel(*op)?;
            let total = inputs[0].values().iter().fold(op.identity(), |acc, &v| fold(acc, v));
            Grid::filled(dtype, shape, total)
        }
        NodeKind::RadialScan(op, origin) => radial_grid(&inputs[0], *op, origin.values(), dtype)?,
        NodeKind::BlockStats(op) => block_grid(&inputs[0], *op, meta, dtype)?,
        NodeKind::Stats | NodeKind::Barrier | NodeKind::Identity => inputs[0].clone(),
        NodeKind::Read(_, grid) => grid.clone(),
        NodeKind::Loop(_) | NodeKind::LoopTail(_) => {
            return Err(MapError::engine("nested loops are not supported"));
        }
    };
    Ok(grid)
}

fn random_value(rng: &mut StdRng, dtype: DataType) -> f64 {
    match dtype {
        DataType::F32 | DataType::F64 | DataType::None => rng.gen::<f64>(),
        DataType::B8 => f64::from(u8::from(rng.gen::<bool>())),
        _ => {
            let (lo, hi) = dtype.bounds();
            rng.gen_range(lo..=hi).floor()
        }
    }
}

/// The leading coordinate entries that address a cell of `grid`.
fn cell_of(grid: &Grid, coord: [i32; 2]) -> Vec<i64> {
    coord[..grid.shape().len()]
        .iter()
        .map(|&c| c as i64)
        .collect()
}

fn out_of_bounds(at: &[i64], grid: &Grid) -> anyhow::Error {
    MapError::invalid_shape(format!(
        "coordinate {at:?} outside shape {:?}",
        grid.shape()
    ))
}

/// Centered kernel sweep with zero padding. Without `op` this is a weighted
/// sum; with `op` the cells under nonzero kernel weights are reduced.
fn focal_grid(
    input: &Grid,
    kernel: &FocalKernel,
    op: Option<ReductionOp>,
    dtype: DataType,
) -> Result<Grid> {
    let (rows, cols) = match input.shape() {
        [rows, cols] => (*rows as i64, *cols as i64),
        other => {
            return Err(MapError::invalid_shape(format!(
                "focal operations need a 2D raster, found {other:?}"
            )))
        }
    };
    let fold = match op {
        Some(op) => Some((op, reduce_kernel(op)?)),
        None => None,
    };
    let (kr, kc) = (kernel.rows as i64, kernel.cols as i64);
    let mut data = Vec::with_capacity(input.len());
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = fold.map(|(op, _)| op.identity()).unwrap_or(0.0);
            for i in 0..kr {
                for j in 0..kc {
                    let weight = kernel.values[(i * kc + j) as usize];
                    let at = [r + i - kr / 2, c + j - kc / 2];
                    let value = input.get(&at);
                    acc = match (fold, value) {
                        (None, value) => acc + weight * value.unwrap_or(0.0),
                        (Some((_, f)), Some(value)) if weight != 0.0 => f(acc, value),
                        (Some(_), _) => acc,
                    };
                }
            }
            data.push(acc);
        }
    }
    Grid::new(dtype, input.shape().to_vec(), data)
}

/// Reduces, for every cell, the values on the discrete line from `origin`.
fn radial_grid(input: &Grid, op: ReductionOp, origin: [i32; 2], dtype: DataType) -> Result<Grid> {
    if input.shape().len() != 2 {
        return Err(MapError::invalid_shape(format!(
            "radial scans need a 2D raster, found {:?}",
            input.shape()
        )));
    }
    let fold = reduce_kernel(op)?;
    let (r0, c0) = (origin[0] as i64, origin[1] as i64);
    let data = (0..input.len())
        .map(|i| {
            let cell = input.coord(i);
            let (dr, dc) = (cell[0] - r0, cell[1] - c0);
            let steps = dr.abs().max(dc.abs());
            (0..=steps).fold(op.identity(), |acc, s| {
                let (r, c) = if steps == 0 {
                    (r0, c0)
                } else {
                    (
                        r0 + (dr as f64 * s as f64 / steps as f64).round() as i64,
                        c0 + (dc as f64 * s as f64 / steps as f64).round() as i64,
                    )
                };
                match input.get(&[r, c]) {
                    Some(value) => fold(acc, value),
                    None => acc,
                }
            })
        })
        .collect();
    Grid::new(dtype, input.shape().to_vec(), data)
}

fn block_grid(input: &Grid, op: ReductionOp, meta: &Meta, dtype: DataType) -> Result<Grid> {
    let fold = reduce_kernel(op)?;
    let mut data = vec![op.identity(); len_of(&meta.shape)];
    let block: Vec<usize> = input
        .shape()
        .iter()
        .enumerate()
        .map(|(axis, &extent)| match meta.block.dims().get(axis) {
            Some(&b) if b > 0 => b as usize,
            _ => extent.max(1),
        })
        .collect();
    let out = Grid::filled(dtype, meta.shape.clone(), 0.0);
    for (i, &value) in input.values().iter().enumerate() {
        let at: Vec<i64> = input
            .coord(i)
            .iter()
            .zip(&block)
            .map(|(&c, &b)| c / b as i64)
            .collect();
        if let Some(idx) = out.offset(&at) {
            data[idx] = fold(data[idx], value);
        }
    }
    Grid::new(dtype, meta.shape.clone(), data)
}
