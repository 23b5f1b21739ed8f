use crate::ops::{BinaryOp, ReductionOp, UnaryOp};
use crate::scalar::{Coord, ScalarValue, ShapeVector};
use crate::simulator::grid::Grid;
use crate::simulator::loops::LoopSpec;
use crate::types::{DataType, MemOrder, NumDim, StreamDir};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Meta {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub order: MemOrder,
    pub block: ShapeVector,
    pub group: ShapeVector,
    pub stream: StreamDir,
}

impl Meta {
    pub fn derived(&self, dtype: DataType, shape: Vec<usize>) -> Meta {
        Meta {
            dtype,
            shape,
            order: self.order,
            block: self.block,
            group: self.group,
            stream: StreamDir::None,
        }
    }

    pub fn num_dim(&self) -> NumDim {
        match self.shape.len() {
            0 => NumDim::D0,
            1 => NumDim::D1,
            2 => NumDim::D2,
            _ => NumDim::D3,
        }
    }

    pub fn size(&self) -> ShapeVector {
        let dims: Vec<i32> = self.shape.iter().map(|&v| v as i32).collect();
        ShapeVector::with_rank(&dims).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FocalKernel {
    pub values: Vec<f64>,
    pub dtype: DataType,
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    Constant(ScalarValue),
    Index(usize),
    Rand,
    Cast,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Conditional,
    Access(Coord),
    LhsAccess(Coord),
    Neighbor(Coord),
    BoundedNeighbor,
    Convolution(FocalKernel),
    FocalFunc(FocalKernel, ReductionOp),
    ZonalReduc(ReductionOp),
    RadialScan(ReductionOp, Coord),
    BlockStats(ReductionOp),
    Stats,
    Barrier,
    Identity,
    Read(String, Grid),
    Loop(Box<LoopSpec>),
    LoopTail(usize),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Constant(_) => "Constant",
            NodeKind::Index(_) => "Index",
            NodeKind::Rand => "Rand",
            NodeKind::Cast => "Cast",
            NodeKind::Unary(_) => "Unary",
            NodeKind::Binary(_) => "Binary",
            NodeKind::Conditional => "Conditional",
            NodeKind::Access(_) => "Access",
            NodeKind::LhsAccess(_) => "LhsAccess",
            NodeKind::Neighbor(_) => "Neighbor",
            NodeKind::BoundedNeighbor => "BoundedNbh",
            NodeKind::Convolution(_) => "Convolution",
            NodeKind::FocalFunc(..) => "FocalFunc",
            NodeKind::ZonalReduc(_) => "ZonalReduc",
            NodeKind::RadialScan(..) => "RadialScan",
            NodeKind::BlockStats(_) => "BlockStats",
            NodeKind::Stats => "Stats",
            NodeKind::Barrier => "Barrier",
            NodeKind::Identity => "Identity",
            NodeKind::Read(..) => "Read",
            NodeKind::Loop(_) => "Loop",
            NodeKind::LoopTail(_) => "LoopTail",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SimNode {
    pub kind: NodeKind,
    pub inputs: Vec<usize>,
    pub meta: Meta,
    /// Handles held by the host.
    pub refs: usize,
    /// Edges from other nodes and holds taken by the loop assembler.
    pub users: usize,
}

impl SimNode {
    pub fn is_dead(&self) -> bool {
        self.refs == 0 && self.users == 0
    }
}
