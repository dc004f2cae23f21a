//! Slices: views of a program point restricted to one, two or three variables.
//!
//! A slice owns the live invariants over its variable tuple. Feeding a sample
//! projects it onto the tuple; tuples with a missing component are counted
//! but never reach the invariants. Falsified invariants are dropped at once.

use log::debug;
use smallvec::SmallVec;

use crate::{
    inv::Invariant,
    ppt::ProgramPoint,
    sample::{ModState, Sample, Value},
    var::{VarCatalog, VarIndex},
};

/// Sorted, duplicate-free variable tuple identifying a slice.
pub type SliceKey = SmallVec<VarIndex, 3>;

/// Identity of an invariant within its program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvId(pub u64);

#[derive(Debug)]
pub struct SliceInvariant {
    id: InvId,
    inv: Box<dyn Invariant>,
}

impl SliceInvariant {
    pub fn id(&self) -> InvId {
        self.id
    }

    pub fn invariant(&self) -> &dyn Invariant {
        self.inv.as_ref()
    }
}

#[derive(Debug)]
pub struct Slice {
    key: SliceKey,
    invs: Vec<SliceInvariant>,
    num_samples: u64,
    num_missing: u64,
}

impl Slice {
    pub(crate) fn new(key: SliceKey) -> Self {
        Self {
            key,
            invs: Vec::new(),
            num_samples: 0,
            num_missing: 0,
        }
    }

    pub(crate) fn push(&mut self, id: InvId, inv: Box<dyn Invariant>) {
        self.invs.push(SliceInvariant { id, inv });
    }

    pub fn key(&self) -> &SliceKey {
        &self.key
    }

    pub fn vars(&self) -> &[VarIndex] {
        &self.key
    }

    pub fn arity(&self) -> usize {
        self.key.len()
    }

    pub fn invariants(&self) -> std::slice::Iter<'_, SliceInvariant> {
        self.invs.iter()
    }

    pub fn get(&self, id: InvId) -> Option<&dyn Invariant> {
        self.invs
            .iter()
            .find(|i| i.id == id)
            .map(SliceInvariant::invariant)
    }

    pub fn len(&self) -> usize {
        self.invs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invs.is_empty()
    }

    /// Samples fed with every component present.
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    pub fn num_missing(&self) -> u64 {
        self.num_missing
    }

    pub fn names<'c>(&self, catalog: &'c VarCatalog) -> SmallVec<&'c str, 3> {
        catalog.names(&self.key)
    }

    /// Feed `sample` to every invariant, `count` times.
    pub(crate) fn add(&mut self, catalog: &VarCatalog, sample: &Sample, count: u32) {
        let mut values: SmallVec<&Value, 3> = SmallVec::new();
        let mut state = ModState::Unmodified;
        for &var in &self.key {
            match catalog.value_in(sample, var) {
                Some((value, mod_state)) => {
                    values.push(value);
                    state = state.combine(mod_state);
                }
                None => {
                    self.num_missing += count as u64;
                    return;
                }
            }
        }

        self.num_samples += count as u64;
        let key = &self.key;
        self.invs.retain_mut(|entry| {
            let alive = entry.inv.add_sample(&values, state, count).is_alive();
            if !alive {
                debug!("Invariant {} over {:?} falsified", entry.inv.kind(), key);
            }
            alive
        });
    }
}

/// Decides which slices need not be instantiated because a controlling
/// program point already accounts for them.
pub trait SliceOracle {
    fn is_controlled(&self, ppt: &ProgramPoint, vars: &[VarIndex]) -> bool;
}

/// Oracle under which every slice is instantiated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverControlled;

impl SliceOracle for NeverControlled {
    fn is_controlled(&self, _ppt: &ProgramPoint, _vars: &[VarIndex]) -> bool {
        false
    }
}

impl<F> SliceOracle for F
where
    F: Fn(&ProgramPoint, &[VarIndex]) -> bool,
{
    fn is_controlled(&self, ppt: &ProgramPoint, vars: &[VarIndex]) -> bool {
        self(ppt, vars)
    }
}
