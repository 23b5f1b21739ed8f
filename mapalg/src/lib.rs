pub use mapalg_dsl::map_while;

#[macro_use]
mod macros;

#[doc(hidden)]
pub mod logging;

mod config;
mod context;
mod engine;
mod error;
mod loops;
mod ops;
mod raster;
mod scalar;
mod simulator;
mod types;

pub use config::{MapConfig, CONFIG_ENV, LIBRARY_ENV};
pub use context::{MapContext, RasterOptions};
#[cfg(feature = "libmap")]
pub use engine::LibMap;
pub use engine::{Engine, Layout, LoopVarPairs, NodePtr};
pub use error::{error_kind, MapError};
pub use loops::{CarriedVars, LoopCarried, LoopCondition, LoopGuard, LoopLowering, LoopVars};
pub use ops::*;
pub use raster::Raster;
pub use scalar::{Coord, Literal, ScalarElement, ScalarValue, ShapeVector, MAX_RANK, UNSET};
pub use simulator::{Grid, Simulator};
pub use types::{DataType, DeviceType, MemOrder, NumDim, StreamDir};
