use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::scalar::ScalarValue;
use crate::types::DataType;

/// Dense row-major values of one node, held as `f64` and kept normalized to
/// `dtype`. An empty `shape` is a zero-rank value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    dtype: DataType,
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Grid {
    pub fn new(dtype: DataType, shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(MapError::invalid_shape(format!(
                "{} values do not fill shape {:?}",
                data.len(),
                shape
            )));
        }
        let data = data.into_iter().map(|v| dtype.normalize(v)).collect();
        Ok(Self { dtype, shape, data })
    }

    pub fn filled(dtype: DataType, shape: Vec<usize>, value: f64) -> Self {
        let len = shape.iter().product();
        Self {
            dtype,
            shape,
            data: vec![dtype.normalize(value); len],
        }
    }

    pub fn scalar(value: ScalarValue) -> Self {
        Self::filled(value.dtype(), Vec::new(), value.to_f64())
    }

    pub fn from_rows(dtype: DataType, rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(MapError::invalid_shape("ragged rows"));
        }
        Grid::new(dtype, vec![rows.len(), cols], rows.concat())
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Element `idx`, with zero-rank grids broadcast to every index.
    pub fn at(&self, idx: usize) -> f64 {
        if self.is_scalar() {
            self.data[0]
        } else {
            self.data[idx]
        }
    }

    /// Flat index of `coord`, or `None` when it falls outside the grid.
    pub fn offset(&self, coord: &[i64]) -> Option<usize> {
        if coord.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&c, &extent) in coord.iter().zip(&self.shape) {
            if c < 0 || c as usize >= extent {
                return None;
            }
            flat = flat * extent + c as usize;
        }
        Some(flat)
    }

    /// Inverse of [`Grid::offset`].
    pub fn coord(&self, mut flat: usize) -> Vec<i64> {
        let mut coord = vec![0i64; self.shape.len()];
        for axis in (0..self.shape.len()).rev() {
            let extent = self.shape[axis];
            coord[axis] = (flat % extent) as i64;
            flat /= extent;
        }
        coord
    }

    pub fn get(&self, coord: &[i64]) -> Option<f64> {
        self.offset(coord).map(|idx| self.data[idx])
    }

    pub(crate) fn set(&mut self, idx: usize, value: f64) {
        self.data[idx] = self.dtype.normalize(value);
    }

    pub fn any_true(&self) -> bool {
        self.data.iter().any(|&v| v != 0.0 && !v.is_nan())
    }

    pub fn cast(&self, dtype: DataType) -> Grid {
        Grid {
            dtype,
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| dtype.normalize(v)).collect(),
        }
    }

    pub fn to_scalar(&self) -> Result<ScalarValue> {
        if !self.is_scalar() {
            return Err(MapError::invalid_shape(format!(
                "expected a zero-rank value, found shape {:?}",
                self.shape
            )));
        }
        ScalarValue::from_f64(self.data[0], self.dtype)
    }
}
