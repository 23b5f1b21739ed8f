mod scalar_value;
mod shape;

pub use scalar_value::{Literal, ScalarElement, ScalarValue};
pub use shape::{Coord, ShapeVector, MAX_RANK, UNSET};
