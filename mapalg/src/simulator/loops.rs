use std::collections::HashMap;

use anyhow::Result;

use crate::error::MapError;
use crate::simulator::node::SimNode;

/// Where a loop-body step reads one of its inputs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// An earlier step of the same iteration.
    Local(usize),
    /// A loop-carried state.
    State(usize),
    /// A node defined before the loop.
    External(usize),
}

/// A value carried across iterations: seeded from `init`, then replaced by
/// body step `feed` at the end of each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CarriedState {
    pub init: usize,
    pub feed: usize,
}

/// An assembled loop. State zero is the loop guard.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoopSpec {
    pub body: Vec<usize>,
    pub slots: Vec<Vec<Slot>>,
    pub states: Vec<CarriedState>,
}

impl LoopSpec {
    pub fn externals(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        let seeds = self.states.iter().map(|state| state.init);
        let reads = self.slots.iter().flatten().filter_map(|slot| match slot {
            Slot::External(id) => Some(*id),
            _ => None,
        });
        for id in seeds.chain(reads) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// One entry per distinct feed: `(state index, feed step)`.
    pub fn tails(&self) -> Vec<(usize, usize)> {
        let mut tails: Vec<(usize, usize)> = Vec::new();
        for (k, state) in self.states.iter().enumerate() {
            if !tails.iter().any(|&(_, feed)| feed == state.feed) {
                tails.push((k, state.feed));
            }
        }
        tails
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Start,
    Body,
    Again,
    Assembled,
}

/// Records the two replays of a loop body and matches them up.
#[derive(Debug, Default)]
pub(crate) struct LoopAssembler {
    phase: Phase,
    conds: Vec<usize>,
    body: Vec<usize>,
    again: Vec<usize>,
    pairs: HashMap<usize, Vec<(usize, usize)>>,
}

impl LoopAssembler {
    pub fn start(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(MapError::malformed_loop(
                "loop started while another loop is being assembled",
            ));
        }
        self.phase = Phase::Start;
        Ok(())
    }

    /// Registers a loop condition. The caller holds `id` until `finish`.
    pub fn cond(&mut self, id: usize) -> Result<()> {
        match self.phase {
            Phase::Start | Phase::Body | Phase::Again if self.conds.len() < 2 => {
                self.conds.push(id);
                Ok(())
            }
            _ => Err(MapError::malformed_loop("unexpected loop condition")),
        }
    }

    pub fn body(&mut self) -> Result<()> {
        self.advance(Phase::Start, Phase::Body, "loop body")
    }

    pub fn again(&mut self) -> Result<()> {
        self.advance(Phase::Body, Phase::Again, "second loop replay")
    }

    fn advance(&mut self, from: Phase, to: Phase, what: &str) -> Result<()> {
        if self.phase != from {
            return Err(MapError::malformed_loop(format!(
                "{what} out of order ({:?})",
                self.phase
            )));
        }
        self.phase = to;
        Ok(())
    }

    /// Records a freshly created node. Returns whether the assembler holds it.
    pub fn record(&mut self, id: usize) -> bool {
        match self.phase {
            Phase::Body => self.body.push(id),
            Phase::Again => self.again.push(id),
            _ => return false,
        }
        true
    }

    /// Matches the two replays step by step and derives the loop structure.
    pub fn plan(&self, nodes: &HashMap<usize, SimNode>) -> Result<LoopSpec> {
        if self.phase != Phase::Again {
            return Err(MapError::malformed_loop(
                "loop assembled before both replays were recorded",
            ));
        }
        if self.conds.len() != 2 {
            return Err(MapError::malformed_loop(format!(
                "expected 2 loop conditions, got {}",
                self.conds.len()
            )));
        }
        if self.body.len() != self.again.len() {
            return Err(MapError::malformed_loop(format!(
                "replays differ in length ({} vs {})",
                self.body.len(),
                self.again.len()
            )));
        }
        let body_pos: HashMap<usize, usize> =
            self.body.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let again_pos: HashMap<usize, usize> =
            self.again.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let guard_feed = *body_pos.get(&self.conds[1]).ok_or_else(|| {
            MapError::malformed_loop("loop condition does not depend on the loop body")
        })?;
        let mut states = vec![CarriedState {
            init: self.conds[0],
            feed: guard_feed,
        }];
        let mut slots = Vec::with_capacity(self.body.len());

        for (step, (&b, &a)) in self.body.iter().zip(&self.again).enumerate() {
            let (first, second) = match (nodes.get(&b), nodes.get(&a)) {
                (Some(first), Some(second)) => (first, second),
                _ => {
                    return Err(MapError::malformed_loop(format!(
                        "loop step {step} was released before assembly"
                    )))
                }
            };
            if first.kind != second.kind || first.inputs.len() != second.inputs.len() {
                return Err(MapError::malformed_loop(format!(
                    "replays diverge at step {step}: {} vs {}",
                    first.kind.label(),
                    second.kind.label()
                )));
            }
            let mut step_slots = Vec::with_capacity(first.inputs.len());
            for (&bi, &ai) in first.inputs.iter().zip(&second.inputs) {
                let slot = if let Some(&j) = again_pos.get(&ai) {
                    if self.body[j] != bi {
                        return Err(MapError::malformed_loop(format!(
                            "step {step} reads different steps in each replay"
                        )));
                    }
                    Slot::Local(j)
                } else if let Some(&j) = body_pos.get(&ai) {
                    if body_pos.contains_key(&bi) {
                        return Err(MapError::malformed_loop(format!(
                            "step {step} reads the loop body before it is defined"
                        )));
                    }
                    let state = CarriedState { init: bi, feed: j };
                    let k = match states.iter().position(|&s| s == state) {
                        Some(k) => k,
                        None => {
                            states.push(state);
                            states.len() - 1
                        }
                    };
                    Slot::State(k)
                } else {
                    if ai != bi {
                        return Err(MapError::malformed_loop(format!(
                            "step {step} reads different outer values in each replay"
                        )));
                    }
                    Slot::External(ai)
                };
                step_slots.push(slot);
            }
            slots.push(step_slots);
        }

        Ok(LoopSpec {
            body: self.body.clone(),
            slots,
            states,
        })
    }

    pub fn second_replay(&self) -> &[usize] {
        &self.again
    }

    /// Stops recording; nodes created from here on belong to the outer graph.
    pub fn seal(&mut self) {
        self.phase = Phase::Assembled;
    }

    pub fn set_pairs(&mut self, loop_id: usize, pairs: Vec<(usize, usize)>) {
        self.pairs.insert(loop_id, pairs);
    }

    pub fn pairs(&self, loop_id: usize) -> Option<&[(usize, usize)]> {
        self.pairs.get(&loop_id).map(Vec::as_slice)
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Resets to idle and returns every held node.
    pub fn finish(&mut self) -> Vec<usize> {
        let mut held = std::mem::take(&mut self.conds);
        held.append(&mut self.body);
        held.append(&mut self.again);
        self.pairs.clear();
        self.phase = Phase::Idle;
        held
    }
}
