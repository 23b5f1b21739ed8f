use anyhow::Result;

use crate::context::MapContext;
use crate::loops::lowering::LoopLowering;
use crate::loops::vars::{LoopCondition, LoopGuard, LoopVars};
use crate::raster::Raster;

impl MapContext {
    /// Builds a `while cond { body }` loop over the variables in `vars`.
    ///
    /// When the initial condition is a graph node, `body` and `cond` are each
    /// replayed twice to record the recurrence, the engine assembles one loop
    /// node, and every assigned loop-carried variable is rebound to its
    /// post-loop node. The loop node is returned.
    ///
    /// When the initial condition is a host value the loop runs natively and
    /// `None` is returned. Host side effects inside `body` run twice when the
    /// loop is lowered.
    pub fn while_loop<C, G, B>(
        &self,
        vars: &mut LoopVars,
        mut cond: C,
        mut body: B,
    ) -> Result<Option<Raster>>
    where
        C: FnMut(&LoopVars) -> Result<G>,
        G: LoopCondition,
        B: FnMut(&mut LoopVars) -> Result<()>,
    {
        let guard = match cond(vars)?.into_guard()? {
            LoopGuard::Host(mut holds) => {
                while holds {
                    body(vars)?;
                    holds = cond(vars)?.into_guard()?.into_host()?;
                }
                return Ok(None);
            }
            LoopGuard::Node(guard) => guard,
        };

        vars.clear_assigned();
        let mut lowering = LoopLowering::start(&guard)?;
        body(vars)?;
        let next = cond(vars)?.into_guard()?.into_node()?;
        lowering.again(&next)?;
        body(vars)?;
        cond(vars)?.into_guard()?.into_node()?;

        let loop_node = lowering.assemble()?;
        let carried = lowering.carried(&loop_node)?;
        let rebound = vars.rebind_assigned(&carried)?;
        crate::trace!(
            Loop,
            "loop {} rebound {rebound} of {} assigned variables",
            loop_node.ptr(),
            vars.assigned().len()
        );
        lowering.finish()?;
        Ok(Some(loop_node))
    }
}
