use std::rc::Rc;

use anyhow::Result;

use crate::config::MapConfig;
use crate::engine::{Engine, Layout, NodePtr};
use crate::error::MapError;
use crate::ops::{self, Operand, StatsInputs};
use crate::raster::Raster;
use crate::scalar::{ScalarValue, ShapeVector};
use crate::types::{DataType, DeviceType, MemOrder, NumDim};

/// Size, datatype and partitioning of a new constant raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub size: ShapeVector,
    pub dtype: DataType,
    pub order: MemOrder,
    pub block: ShapeVector,
    pub group: ShapeVector,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            size: ShapeVector::unset(),
            dtype: DataType::F32,
            order: MemOrder::default(),
            block: ShapeVector::unset(),
            group: ShapeVector::unset(),
        }
    }
}

impl RasterOptions {
    pub fn sized(extents: &[i32]) -> Result<Self> {
        Ok(Self {
            size: ShapeVector::with_rank(extents)?,
            ..Self::default()
        })
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_order(mut self, order: MemOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_block(mut self, extents: &[i32]) -> Result<Self> {
        self.block = ShapeVector::with_rank(extents)?;
        Ok(self)
    }

    pub fn with_group(mut self, extents: &[i32]) -> Result<Self> {
        self.group = ShapeVector::with_rank(extents)?;
        Ok(self)
    }

    /// Options describing an existing raster.
    pub fn like(raster: &Raster) -> Result<Self> {
        Ok(Self {
            size: raster.data_size()?,
            dtype: raster.dtype()?,
            order: raster.mem_order()?,
            block: raster.block_size()?,
            group: raster.group_size()?,
        })
    }

    fn layout(&self) -> Layout {
        Layout {
            size: self.size,
            dtype: self.dtype,
            order: self.order,
            block: self.block,
            group: self.group,
        }
    }
}

/// Entry point for building map-algebra graphs on one engine.
#[derive(Clone)]
pub struct MapContext {
    engine: Rc<dyn Engine>,
    config: MapConfig,
}

impl MapContext {
    pub fn new(engine: Rc<dyn Engine>, config: MapConfig) -> Self {
        Self { engine, config }
    }

    pub fn with_engine(engine: Rc<dyn Engine>) -> Self {
        Self::new(engine, MapConfig::default())
    }

    /// Binds the native engine library found on `config.library_paths`.
    #[cfg(feature = "libmap")]
    pub fn load(config: MapConfig) -> Result<Self> {
        let engine = crate::engine::LibMap::load(&config.library_paths)?;
        Ok(Self::new(Rc::new(engine), config))
    }

    pub fn engine(&self) -> &Rc<dyn Engine> {
        &self.engine
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn setup_devices(&self, platform: &str, devices: DeviceType, device_name: &str) -> Result<()> {
        self.engine.setup_devices(platform, devices, device_name)
    }

    pub fn set_num_ranks(&self, ranks: i32) -> Result<()> {
        self.engine.set_num_ranks(ranks)
    }

    pub fn wrap(&self, ptr: NodePtr) -> Result<Raster> {
        Raster::wrap(&self.engine, ptr)
    }

    pub fn empty(&self) -> Raster {
        Raster::empty(&self.engine)
    }

    /// Turns a host value into a zero-rank constant; nodes pass through.
    pub fn promote(&self, value: impl Into<Operand>) -> Result<Raster> {
        value.into().promote(&self.engine)
    }

    pub fn constant(&self, value: impl Into<ScalarValue>, opts: &RasterOptions) -> Result<Raster> {
        let value = value.into().convert(opts.dtype)?;
        self.wrap(self.engine.constant(value, &opts.layout())?)
    }

    pub fn zeros(&self, opts: &RasterOptions) -> Result<Raster> {
        self.constant(ScalarValue::zero(opts.dtype)?, opts)
    }

    pub fn ones(&self, opts: &RasterOptions) -> Result<Raster> {
        self.constant(ScalarValue::one(opts.dtype)?, opts)
    }

    pub fn full(&self, value: impl Into<ScalarValue>, opts: &RasterOptions) -> Result<Raster> {
        self.constant(value, opts)
    }

    pub fn trues(&self, opts: &RasterOptions) -> Result<Raster> {
        self.constant(true, &opts.with_dtype(DataType::B8))
    }

    pub fn falses(&self, opts: &RasterOptions) -> Result<Raster> {
        self.constant(false, &opts.with_dtype(DataType::B8))
    }

    fn like_options(raster: &Raster, dtype: Option<DataType>) -> Result<RasterOptions> {
        let opts = RasterOptions::like(raster)?;
        Ok(match dtype {
            Some(dtype) => opts.with_dtype(dtype),
            None => opts,
        })
    }

    pub fn zeros_like(&self, raster: &Raster, dtype: Option<DataType>) -> Result<Raster> {
        self.zeros(&Self::like_options(raster, dtype)?)
    }

    pub fn ones_like(&self, raster: &Raster, dtype: Option<DataType>) -> Result<Raster> {
        self.ones(&Self::like_options(raster, dtype)?)
    }

    pub fn full_like(
        &self,
        value: impl Into<ScalarValue>,
        raster: &Raster,
        dtype: Option<DataType>,
    ) -> Result<Raster> {
        self.full(value, &Self::like_options(raster, dtype)?)
    }

    /// Per-cell coordinate along `dim` (`D1` rows, `D2` columns).
    pub fn index(&self, raster: &Raster, dim: NumDim) -> Result<Raster> {
        if raster.num_dim()? == NumDim::D0 {
            return Err(MapError::invalid_shape("cannot index a zero-rank raster"));
        }
        let opts = RasterOptions::like(raster)?.with_dtype(DataType::S32);
        self.wrap(self.engine.index(&opts.layout(), dim)?)
    }

    /// Random values seeded per cell by `seed`. A host seed becomes a
    /// constant of the target datatype and size. Without options the result
    /// takes the seed's datatype and layout.
    pub fn rand(&self, seed: impl Into<Operand>, opts: Option<&RasterOptions>) -> Result<Raster> {
        let (seed, opts) = match (seed.into(), opts) {
            (Operand::Node(raster), Some(opts)) => (raster, *opts),
            (Operand::Node(raster), None) => {
                let opts = RasterOptions::like(&raster)?;
                (raster, opts)
            }
            (Operand::Host(value), Some(opts)) => (self.constant(value, opts)?, *opts),
            (Operand::Host(value), None) => {
                let opts = RasterOptions::default().with_dtype(value.dtype());
                (self.constant(value, &opts)?, opts)
            }
        };
        self.wrap(self.engine.rand(seed.node()?, opts.dtype, opts.order)?)
    }

    pub fn read(&self, resource: &str) -> Result<Raster> {
        self.wrap(self.engine.read(resource)?)
    }

    pub fn write(&self, raster: &Raster, resource: &str) -> Result<()> {
        let status = self.engine.write(raster.node()?, resource)?;
        if status != 0 {
            crate::error!(Engine, "write of {} to '{resource}' failed with status {status}", raster.ptr());
            return Err(MapError::EngineWriteFailure {
                resource: resource.to_string(),
                status,
            }
            .into());
        }
        Ok(())
    }

    pub fn eval(&self, rasters: &[&Raster]) -> Result<()> {
        let nodes = rasters
            .iter()
            .map(|raster| raster.node())
            .collect::<Result<Vec<_>>>()?;
        self.engine.eval(&nodes)
    }

    /// Evaluates a zero-rank raster and returns its value.
    pub fn value(&self, raster: &Raster) -> Result<ScalarValue> {
        self.engine.value(raster.node()?)
    }

    pub fn stats(
        &self,
        raster: &Raster,
        min: Option<Raster>,
        max: Option<Raster>,
        mean: Option<Raster>,
        std: Option<Raster>,
    ) -> Result<Raster> {
        ops::stats(raster, StatsInputs { min, max, mean, std })
    }
}
