use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;

use crate::engine::Engine;
use crate::error::MapError;
use crate::loops::vars::CarriedVars;
use crate::raster::Raster;

thread_local! {
    static LOWERING_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Brackets one loop assembly on the engine.
///
/// The protocol is `start` (first replay follows), `again` (second replay
/// follows), `assemble`, `carried`, `finish`. Dropping the guard before
/// `finish` still closes the engine's assembly context, so early returns
/// through `?` leave the engine idle.
pub struct LoopLowering {
    engine: Rc<dyn Engine>,
    started: bool,
    finished: bool,
}

impl LoopLowering {
    /// Whether a loop is being lowered on this thread.
    pub fn is_active() -> bool {
        LOWERING_ACTIVE.with(Cell::get)
    }

    /// Opens a loop guarded by `guard`; the first replay of the body follows.
    pub fn start(guard: &Raster) -> Result<Self> {
        if Self::is_active() {
            return Err(MapError::UnsupportedLoopContext(
                "a loop is already being lowered on this thread".into(),
            )
            .into());
        }
        let guard_ptr = guard.node()?;
        LOWERING_ACTIVE.with(|active| active.set(true));
        let mut lowering = Self {
            engine: Rc::clone(guard.engine()),
            started: false,
            finished: false,
        };
        crate::trace!(Loop, "start: guard {guard_ptr}, first replay follows");
        lowering.engine.loop_start()?;
        lowering.started = true;
        lowering.engine.loop_cond(guard_ptr)?;
        lowering.engine.loop_body()?;
        Ok(lowering)
    }

    /// Registers the first-replay condition; the second replay follows.
    pub fn again(&mut self, cond: &Raster) -> Result<()> {
        let cond_ptr = cond.node()?;
        crate::trace!(Loop, "again: first-replay condition {cond_ptr}, second replay follows");
        self.engine.loop_again()?;
        self.engine.loop_cond(cond_ptr)
    }

    pub fn assemble(&mut self) -> Result<Raster> {
        let ptr = self.engine.loop_assemble()?;
        crate::trace!(Loop, "assemble: loop node {ptr}");
        Raster::wrap(&self.engine, ptr)
    }

    /// Loop-carried pairs of `loop_node`, with every post-loop node wrapped.
    pub fn carried(&self, loop_node: &Raster) -> Result<CarriedVars> {
        let pairs = self.engine.loop_update_vars(loop_node.node()?)?;
        let wrapped = pairs
            .pre
            .iter()
            .zip(&pairs.post)
            .map(|(&pre, &post)| Raster::wrap(&self.engine, post).map(|post| (pre, post)))
            .collect::<Result<Vec<_>>>()?;
        crate::trace!(Loop, "carried: {} pairs from {}", wrapped.len(), loop_node.ptr());
        Ok(CarriedVars::new(wrapped))
    }

    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        crate::trace!(Loop, "finish");
        self.engine.loop_end()
    }
}

impl Drop for LoopLowering {
    fn drop(&mut self) {
        if self.started && !self.finished {
            if let Err(err) = self.engine.loop_end() {
                crate::critical!(Loop, "failed to close an abandoned loop: {err}");
            }
        }
        LOWERING_ACTIVE.with(|active| active.set(false));
    }
}
