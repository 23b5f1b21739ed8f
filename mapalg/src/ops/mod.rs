mod arith;
mod functions;
pub(crate) mod kernels;
mod kinds;
mod operand;

pub use functions::*;
pub use kinds::{BinaryOp, ReductionOp, UnaryOp};
pub use operand::Operand;
