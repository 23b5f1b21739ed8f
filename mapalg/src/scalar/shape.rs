use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Highest rank the engine accepts in a shape or coordinate.
pub const MAX_RANK: usize = 2;

/// Marks every slot of an unset shape.
pub const UNSET: i32 = -1;

/// Fixed-capacity extents with an all-sentinel "unset" form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShape")]
pub struct ShapeVector {
    dims: [i32; MAX_RANK],
    len: usize,
}

#[derive(Deserialize)]
struct RawShape {
    dims: [i32; MAX_RANK],
    len: usize,
}

impl TryFrom<RawShape> for ShapeVector {
    type Error = anyhow::Error;

    fn try_from(raw: RawShape) -> Result<Self> {
        let len = i32::try_from(raw.len)
            .map_err(|_| MapError::invalid_shape(format!("invalid extent count {}", raw.len)))?;
        Self::from_raw(raw.dims, len)
    }
}

impl ShapeVector {
    pub fn unset() -> Self {
        Self {
            dims: [UNSET; MAX_RANK],
            len: 0,
        }
    }

    /// Accepts either no extents or exactly [`MAX_RANK`] of them.
    pub fn new(extents: &[i32]) -> Result<Self> {
        if !extents.is_empty() && extents.len() != MAX_RANK {
            return Err(MapError::invalid_shape(format!(
                "expected 0 or {} extents, got {:?}",
                MAX_RANK, extents
            )));
        }
        Self::with_rank(extents)
    }

    /// Accepts any rank up to [`MAX_RANK`]; trailing slots keep the sentinel.
    pub fn with_rank(extents: &[i32]) -> Result<Self> {
        if extents.len() > MAX_RANK {
            return Err(MapError::invalid_shape(format!(
                "rank {} exceeds the supported maximum {}",
                extents.len(),
                MAX_RANK
            )));
        }
        if let Some(bad) = extents.iter().find(|&&v| v < 0) {
            return Err(MapError::invalid_shape(format!(
                "negative extent {bad} in {extents:?}"
            )));
        }
        let mut dims = [UNSET; MAX_RANK];
        dims[..extents.len()].copy_from_slice(extents);
        Ok(Self {
            dims,
            len: extents.len(),
        })
    }

    /// Validates a raw `(dims, count)` pair received from the engine.
    pub fn from_raw(dims: [i32; MAX_RANK], len: i32) -> Result<Self> {
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= MAX_RANK)
            .ok_or_else(|| MapError::invalid_shape(format!("invalid extent count {len}")))?;
        let (valid, rest) = dims.split_at(len);
        if valid.iter().any(|&v| v < 0) || rest.iter().any(|&v| v != UNSET) {
            return Err(MapError::invalid_shape(format!(
                "partially unset shape {dims:?} with count {len}"
            )));
        }
        Ok(Self { dims, len })
    }

    pub fn is_unset(&self) -> bool {
        self.len == 0 && self.dims.iter().all(|&v| v == UNSET)
    }

    pub fn rank(&self) -> usize {
        self.len
    }

    pub fn dims(&self) -> &[i32] {
        &self.dims[..self.len]
    }

    pub fn raw(&self) -> ([i32; MAX_RANK], i32) {
        (self.dims, self.len as i32)
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.dims().to_vec()
    }

    pub fn extents(&self) -> Vec<usize> {
        self.dims().iter().map(|&v| v as usize).collect()
    }

    pub fn num_elements(&self) -> usize {
        self.extents().iter().product()
    }
}

impl Default for ShapeVector {
    fn default() -> Self {
        Self::unset()
    }
}

impl TryFrom<&[i32]> for ShapeVector {
    type Error = anyhow::Error;

    fn try_from(extents: &[i32]) -> Result<Self> {
        ShapeVector::new(extents)
    }
}

impl TryFrom<Vec<i32>> for ShapeVector {
    type Error = anyhow::Error;

    fn try_from(extents: Vec<i32>) -> Result<Self> {
        ShapeVector::new(&extents)
    }
}

/// A signed position or offset, one entry per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord([i32; MAX_RANK]);

impl Coord {
    pub fn new(values: &[i32]) -> Result<Self> {
        let values: [i32; MAX_RANK] = values.try_into().map_err(|_| {
            MapError::invalid_shape(format!(
                "coordinate needs {} entries, got {:?}",
                MAX_RANK, values
            ))
        })?;
        Ok(Coord(values))
    }

    pub fn values(&self) -> [i32; MAX_RANK] {
        self.0
    }
}

impl From<[i32; MAX_RANK]> for Coord {
    fn from(values: [i32; MAX_RANK]) -> Self {
        Coord(values)
    }
}
