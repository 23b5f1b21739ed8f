use anyhow::Result;

use crate::engine::NodePtr;
use crate::error::MapError;
use crate::ops::Operand;
use crate::raster::Raster;
use crate::scalar::ScalarValue;

/// Named variables visible to a loop built with
/// [`MapContext::while_loop`](crate::MapContext::while_loop).
///
/// Writes through [`LoopVars::set`] or [`LoopVars::raster_mut`] mark a name as
/// assigned; only assigned names are rebound after the loop is assembled.
#[derive(Debug, Clone, Default)]
pub struct LoopVars {
    slots: Vec<(String, Operand)>,
    assigned: Vec<String>,
}

impl LoopVars {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|(slot, _)| slot == name)
    }

    fn unknown(name: &str) -> anyhow::Error {
        MapError::malformed_loop(format!("unknown loop variable '{name}'"))
    }

    fn mark(&mut self, name: &str) {
        if !self.assigned.iter().any(|a| a == name) {
            self.assigned.push(name.to_string());
        }
    }

    /// Adds `name`, or replaces its value without marking it assigned.
    pub fn declare(&mut self, name: &str, value: impl Into<Operand>) {
        let value = value.into();
        match self.position(name) {
            Some(idx) => self.slots[idx].1 = value,
            None => self.slots.push((name.to_string(), value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Result<&Operand> {
        self.position(name)
            .map(|idx| &self.slots[idx].1)
            .ok_or_else(|| Self::unknown(name))
    }

    pub fn raster(&self, name: &str) -> Result<&Raster> {
        self.get(name)?.as_raster().ok_or_else(|| {
            MapError::type_mismatch(format!("loop variable '{name}' holds a host value"))
        })
    }

    pub fn host(&self, name: &str) -> Result<ScalarValue> {
        self.get(name)?.host().ok_or_else(|| {
            MapError::type_mismatch(format!("loop variable '{name}' holds a graph node"))
        })
    }

    pub fn set(&mut self, name: &str, value: impl Into<Operand>) -> Result<()> {
        let idx = self.position(name).ok_or_else(|| Self::unknown(name))?;
        self.slots[idx].1 = value.into();
        self.mark(name);
        Ok(())
    }

    /// Mutable access for in-place writes such as [`Raster::set`].
    pub fn raster_mut(&mut self, name: &str) -> Result<&mut Raster> {
        let idx = self.position(name).ok_or_else(|| Self::unknown(name))?;
        self.mark(name);
        match &mut self.slots[idx].1 {
            Operand::Node(raster) => Ok(raster),
            Operand::Host(_) => Err(MapError::type_mismatch(format!(
                "loop variable '{name}' holds a host value"
            ))),
        }
    }

    pub fn take(&mut self, name: &str) -> Result<Operand> {
        let idx = self.position(name).ok_or_else(|| Self::unknown(name))?;
        self.assigned.retain(|a| a != name);
        Ok(self.slots.remove(idx).1)
    }

    pub fn take_raster(&mut self, name: &str) -> Result<Raster> {
        self.take(name)?.into_raster()
    }

    pub fn assigned(&self) -> &[String] {
        &self.assigned
    }

    pub fn clear_assigned(&mut self) {
        self.assigned.clear();
    }

    /// Rebinds every assigned variable whose node is loop-carried. Returns how
    /// many were rebound.
    pub fn rebind_assigned(&mut self, carried: &CarriedVars) -> Result<usize> {
        let mut rebound = 0;
        for (name, value) in self.slots.iter_mut() {
            if !self.assigned.iter().any(|a| a == name) {
                continue;
            }
            if value.rebind_carried(carried)? {
                crate::trace!(Loop, "loop variable '{name}' rebound to {}", value_ptr(value));
                rebound += 1;
            }
        }
        Ok(rebound)
    }
}

fn value_ptr(value: &Operand) -> NodePtr {
    value.as_raster().map(Raster::ptr).unwrap_or(NodePtr::null())
}

/// Post-loop nodes of an assembled loop, keyed by the node each loop-carried
/// variable held after the second replay.
#[derive(Debug, Default)]
pub struct CarriedVars {
    pairs: Vec<(NodePtr, Raster)>,
}

impl CarriedVars {
    pub(crate) fn new(pairs: Vec<(NodePtr, Raster)>) -> Self {
        Self { pairs }
    }

    pub fn post_for(&self, pre: NodePtr) -> Option<&Raster> {
        self.pairs
            .iter()
            .find(|(candidate, _)| *candidate == pre)
            .map(|(_, post)| post)
    }

    pub fn pre_nodes(&self) -> impl Iterator<Item = NodePtr> + '_ {
        self.pairs.iter().map(|(pre, _)| *pre)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Values that may hold a loop-carried node and can be moved onto its
/// post-loop counterpart.
pub trait LoopCarried {
    /// Returns whether anything was rebound.
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool>;
}

impl LoopCarried for Raster {
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        match carried.post_for(self.ptr()) {
            Some(post) => {
                self.rebind(post.ptr())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl LoopCarried for Operand {
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool> {
        match self {
            Operand::Node(raster) => raster.rebind_carried(carried),
            Operand::Host(_) => Ok(false),
        }
    }
}

impl<T: LoopCarried + ?Sized> LoopCarried for &mut T {
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool> {
        (**self).rebind_carried(carried)
    }
}

impl<T: LoopCarried> LoopCarried for Option<T> {
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool> {
        match self {
            Some(value) => value.rebind_carried(carried),
            None => Ok(false),
        }
    }
}

impl<T: LoopCarried> LoopCarried for Vec<T> {
    fn rebind_carried(&mut self, carried: &CarriedVars) -> Result<bool> {
        let mut any = false;
        for value in self.iter_mut() {
            any |= value.rebind_carried(carried)?;
        }
        Ok(any)
    }
}

macro_rules! impl_host_carried {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LoopCarried for $ty {
                fn rebind_carried(&mut self, _carried: &CarriedVars) -> Result<bool> {
                    Ok(false)
                }
            }
        )*
    };
}

impl_host_carried!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, ScalarValue);

/// A loop condition, either still symbolic or already decided on the host.
#[derive(Debug)]
pub enum LoopGuard {
    Node(Raster),
    Host(bool),
}

impl LoopGuard {
    pub fn into_node(self) -> Result<Raster> {
        match self {
            LoopGuard::Node(raster) => Ok(raster),
            LoopGuard::Host(_) => Err(MapError::malformed_loop(
                "loop condition stopped producing a graph node",
            )),
        }
    }

    pub fn into_host(self) -> Result<bool> {
        match self {
            LoopGuard::Host(holds) => Ok(holds),
            LoopGuard::Node(_) => Err(MapError::malformed_loop(
                "host loop condition started producing a graph node",
            )),
        }
    }
}

/// Anything usable as a loop condition.
pub trait LoopCondition {
    fn into_guard(self) -> Result<LoopGuard>;
}

impl LoopCondition for LoopGuard {
    fn into_guard(self) -> Result<LoopGuard> {
        Ok(self)
    }
}

impl LoopCondition for Raster {
    fn into_guard(self) -> Result<LoopGuard> {
        Ok(LoopGuard::Node(self))
    }
}

impl LoopCondition for &Raster {
    fn into_guard(self) -> Result<LoopGuard> {
        Ok(LoopGuard::Node(self.clone()))
    }
}

impl LoopCondition for Operand {
    fn into_guard(self) -> Result<LoopGuard> {
        Ok(match self {
            Operand::Node(raster) => LoopGuard::Node(raster),
            Operand::Host(value) => LoopGuard::Host(value.is_truthy()),
        })
    }
}

impl LoopCondition for bool {
    fn into_guard(self) -> Result<LoopGuard> {
        Ok(LoopGuard::Host(self))
    }
}

impl<T: LoopCondition> LoopCondition for Result<T> {
    fn into_guard(self) -> Result<LoopGuard> {
        self?.into_guard()
    }
}
