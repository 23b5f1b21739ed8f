mod builder;
mod lowering;
mod vars;

pub use lowering::LoopLowering;
pub use vars::{CarriedVars, LoopCarried, LoopCondition, LoopGuard, LoopVars};
