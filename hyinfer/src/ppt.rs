//! Program points.
//!
//! A [`ProgramPoint`] owns its variable catalog, the derivations that compute
//! its derived variables, and the set of open slices. Points are stored in the
//! arena of an [`InferenceContext`](crate::context::InferenceContext) and
//! refer to each other through [`PptId`]s only.
//!
//! ## Core concepts
//! * [`PptKind`] – Top-level point, or conditional child of another point
//!   tied to a splitter and a polarity.
//! * [`FlowEdge`] – Per-variable index mapping towards another point.
//! * [`Redundant`] – Invariants found implied by the others; they are only
//!   flagged, never deleted.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
    sync::Arc,
};

use log::debug;
use slotmap::new_key_type;
use smallvec::SmallVec;
use strum::EnumIs;

use crate::{
    derive::{Derivation, DerivationCatalog, DeriveSettings, derive_pass},
    implication::{Implication, ImplicationTerm, InvRef},
    inv::{Invariant, InvariantCatalog},
    sample::{ModState, Sample, Value},
    slice::{InvId, Slice, SliceInvariant, SliceKey, SliceOracle},
    split::Splitter,
    utils::error::{InferError, InferResult},
    var::{VarCatalog, VarIndex, VarInfo},
};

new_key_type! {
    /// Handle of a program point inside an inference context.
    pub struct PptId;
}

/// Mapping from the variables of a source point to the variables of `target`.
///
/// `transform[i]` is the index, in `target`'s catalog, receiving source
/// variable `i`; `None` drops the variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub target: PptId,
    pub transform: Vec<Option<usize>>,
}

#[derive(Debug, Clone)]
pub struct Conditional {
    pub parent: PptId,
    pub splitter: Arc<dyn Splitter>,
    pub polarity: bool,
}

#[derive(Debug, Clone, EnumIs)]
pub enum PptKind {
    TopLevel,
    Conditional(Conditional),
}

/// An invariant flagged as implied by the other invariants of its point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Redundant {
    Invariant(InvRef),
    /// Equality class, identified by its leader variable.
    Leader(VarIndex),
    Implication { predicate: InvRef, consequent: InvRef },
}

/// Borrowed view of any invariant held by a point.
#[derive(Debug, Clone, Copy)]
pub enum InvariantRef<'a> {
    Sliced {
        slice: &'a Slice,
        entry: &'a SliceInvariant,
    },
    Implication(&'a Implication),
    /// Invariant holding identically on both sides of a split.
    Unconditional(&'a ImplicationTerm),
}

impl InvariantRef<'_> {
    /// Whether the invariant has gathered enough evidence to be reported.
    pub fn worth_reporting(&self) -> bool {
        match self {
            InvariantRef::Sliced { entry, .. } => entry.invariant().is_justified(),
            InvariantRef::Implication(_) | InvariantRef::Unconditional(_) => true,
        }
    }
}

#[derive(Debug)]
pub struct ProgramPoint {
    name: String,
    pub(crate) kind: PptKind,
    pub(crate) catalog: VarCatalog,
    /// Derivation of every derived variable, in catalog order.
    pub(crate) derivations: Vec<(VarIndex, Derivation)>,
    /// Catalog prefix already used as derivation input.
    pub(crate) derived_through: usize,
    slices: BTreeMap<SliceKey, Slice>,
    num_samples: u64,
    views_instantiated: bool,
    next_inv_id: u64,
    pub(crate) dataflow: Vec<FlowEdge>,
    pub(crate) invflow: Vec<FlowEdge>,
    pub(crate) conditionals: Vec<PptId>,
    pub(crate) implications: Vec<Implication>,
    pub(crate) unconditional: Vec<ImplicationTerm>,
    pub(crate) redundant: BTreeSet<Redundant>,
    object_invariant: bool,
}

impl ProgramPoint {
    pub fn new(name: impl Into<String>, vars: impl IntoIterator<Item = VarInfo>) -> Self {
        Self::with_catalog(name.into(), PptKind::TopLevel, VarCatalog::new(vars))
    }

    fn with_catalog(name: String, kind: PptKind, catalog: VarCatalog) -> Self {
        Self {
            name,
            kind,
            catalog,
            derivations: Vec::new(),
            derived_through: 0,
            slices: BTreeMap::new(),
            num_samples: 0,
            views_instantiated: false,
            next_inv_id: 0,
            dataflow: Vec::new(),
            invflow: Vec::new(),
            conditionals: Vec::new(),
            implications: Vec::new(),
            unconditional: Vec::new(),
            redundant: BTreeSet::new(),
            object_invariant: false,
        }
    }

    /// Child of `parent` accepting the samples on which `splitter` evaluates
    /// to `polarity`. The child shares the parent's variables.
    pub(crate) fn conditional(
        parent: &ProgramPoint,
        parent_id: PptId,
        splitter: Arc<dyn Splitter>,
        polarity: bool,
    ) -> Self {
        let name = format!(
            "{};condition=\"{}{}\"",
            parent.name,
            if polarity { "" } else { "not " },
            splitter.condition()
        );
        let mut child = Self::with_catalog(
            name,
            PptKind::Conditional(Conditional {
                parent: parent_id,
                splitter,
                polarity,
            }),
            parent.catalog.clone(),
        );
        child.derivations = parent.derivations.clone();
        child.derived_through = parent.derived_through;
        child
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PptKind {
        &self.kind
    }

    pub fn as_conditional(&self) -> Option<&Conditional> {
        match &self.kind {
            PptKind::Conditional(c) => Some(c),
            PptKind::TopLevel => None,
        }
    }

    pub fn catalog(&self) -> &VarCatalog {
        &self.catalog
    }

    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    pub fn views_instantiated(&self) -> bool {
        self.views_instantiated
    }

    pub fn dataflow(&self) -> &[FlowEdge] {
        &self.dataflow
    }

    pub fn invflow(&self) -> &[FlowEdge] {
        &self.invflow
    }

    pub fn conditionals(&self) -> &[PptId] {
        &self.conditionals
    }

    pub fn implications(&self) -> &[Implication] {
        &self.implications
    }

    /// Invariants recorded as holding on both sides of a split.
    pub fn unconditional(&self) -> &[ImplicationTerm] {
        &self.unconditional
    }

    pub fn redundant(&self) -> &BTreeSet<Redundant> {
        &self.redundant
    }

    pub fn is_redundant(&self, what: &Redundant) -> bool {
        self.redundant.contains(what)
    }

    /// Object-invariant points restate their invariants over pre-state
    /// variables when used as prover background.
    pub fn is_object_invariant(&self) -> bool {
        self.object_invariant
    }

    pub fn set_object_invariant(&mut self, value: bool) {
        self.object_invariant = value;
    }

    pub fn index_of(&self, name: &str) -> Option<VarIndex> {
        self.catalog.index_of(name)
    }

    pub fn param_vars(&self) -> BTreeSet<&str> {
        self.catalog.param_vars()
    }

    pub fn num_array_vars(&self) -> usize {
        self.catalog.num_array_vars()
    }

    /// Number of values a raw sample (derived variables excluded) carries.
    pub fn observed_count(&self) -> usize {
        self.catalog.value_count() - self.derivations.len()
    }

    pub(crate) fn check_arity(&self, sample: &Sample) -> InferResult<()> {
        let expected = self.catalog.value_count();
        if sample.len() != expected {
            return Err(InferError::ArityMismatch {
                ppt: self.name.clone(),
                expected,
                found: sample.len(),
            });
        }
        Ok(())
    }

    fn check_mutable_catalog(&self) -> InferResult<()> {
        if self.views_instantiated || self.kind.is_conditional() {
            return Err(InferError::CatalogFrozen {
                ppt: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Flow edge mappings cover the source catalog as it was when the edge
    /// was added.
    fn check_no_flow_edges(&self) -> InferResult<()> {
        if !self.dataflow.is_empty() || !self.invflow.is_empty() {
            return Err(InferError::FlowSourceFrozen {
                ppt: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether a conditional child may take over a grown parent catalog.
    pub(crate) fn check_mirror(&self) -> InferResult<()> {
        if self.views_instantiated {
            return Err(InferError::CatalogFrozen {
                ppt: self.name.clone(),
            });
        }
        self.check_no_flow_edges()
    }

    /// Append observed, non-constant variables. Returns their index range.
    pub fn add_var_infos(&mut self, vars: impl IntoIterator<Item = VarInfo>) -> InferResult<Range<usize>> {
        self.check_mutable_catalog()?;
        let vars: Vec<VarInfo> = vars.into_iter().collect();
        if !vars.is_empty() {
            self.check_no_flow_edges()?;
        }
        if let Some(v) = vars.iter().find(|v| v.is_static_constant()) {
            return Err(InferError::StaticConstantAppend {
                ppt: self.name.clone(),
                name: v.name.clone(),
            });
        }

        let start = self.catalog.append(vars);
        Ok(start..self.catalog.len())
    }

    /// One derivation pass over `range`, without modifying the point.
    pub fn derive_pass(
        &self,
        range: Range<usize>,
        rules: &DerivationCatalog,
        settings: DeriveSettings<'_>,
    ) -> InferResult<Vec<Derivation>> {
        if range.start > range.end || range.end > self.catalog.len() {
            return Err(InferError::InvalidRange {
                ppt: self.name.clone(),
                min: range.start,
                limit: range.end,
                catalog_len: self.catalog.len(),
            });
        }
        Ok(derive_pass(&self.catalog, range, rules, settings))
    }

    /// Run derivation passes until a pass yields nothing new. Each pass
    /// derives from the variables introduced by the previous one. Returns the
    /// number of variables added.
    pub fn create_derived_variables(
        &mut self,
        rules: &DerivationCatalog,
        settings: DeriveSettings<'_>,
    ) -> InferResult<usize> {
        self.check_mutable_catalog()?;

        let first_new = self.catalog.len();
        let mut lower = self.derived_through;
        let mut upper = self.catalog.len();
        while lower < upper {
            let derivations = self.derive_pass(lower..upper, rules, settings)?;
            if !derivations.is_empty() {
                self.check_no_flow_edges()?;
            }
            lower = upper;
            upper += derivations.len();

            let infos: Vec<VarInfo> = derivations
                .iter()
                .map(|d| d.to_var_info(&self.catalog))
                .collect();
            let start = self.catalog.append(infos);
            self.derivations.extend(
                derivations
                    .into_iter()
                    .enumerate()
                    .map(|(i, d)| (VarIndex(start + i), d)),
            );
        }
        self.derived_through = upper;

        debug!(
            "Derived {} variables for `{}` ({} total)",
            self.catalog.len() - first_new,
            self.name,
            self.catalog.len()
        );
        Ok(self.catalog.len() - first_new)
    }

    /// Complete a sample of observed variables with the values of every
    /// derived variable. Derived values whose bases are missing are missing.
    pub fn extend_sample(&self, raw: &Sample) -> InferResult<Sample> {
        let observed = self.observed_count();
        if raw.len() != observed {
            return Err(InferError::ArityMismatch {
                ppt: self.name.clone(),
                expected: observed,
                found: raw.len(),
            });
        }

        let mut slots: Vec<Option<(Value, ModState)>> = Vec::with_capacity(self.catalog.value_count());
        let mut raw_slots = raw.slots();
        let mut derivations = self.derivations.iter().peekable();

        for var in &self.catalog {
            if var.is_static_constant() {
                continue;
            }
            let Some((_, derivation)) = derivations.next_if(|(index, _)| *index == var.index()) else {
                slots.push(raw_slots.next().flatten().map(|(v, m)| (v.clone(), m)));
                continue;
            };

            let slot = {
                let mut inputs: SmallVec<&Value, 2> = SmallVec::new();
                let mut state = ModState::Unmodified;
                for &base in &derivation.bases {
                    let info = &self.catalog[base];
                    let slot = match (info.static_value(), info.value_index()) {
                        (Some(value), _) => Some((value, ModState::Unmodified)),
                        (None, Some(i)) => slots.get(i).and_then(|s| s.as_ref()).map(|(v, m)| (v, *m)),
                        (None, None) => None,
                    };
                    match slot {
                        Some((value, mod_state)) => {
                            inputs.push(value);
                            state = state.combine(mod_state);
                        }
                        None => {
                            state = ModState::Missing;
                            break;
                        }
                    }
                }

                match state {
                    ModState::Missing => None,
                    _ => derivation.compute(&inputs).map(|v| (v, state)),
                }
            };
            slots.push(slot);
        }

        if derivations.next().is_some() {
            return Err(InferError::MissingDerivation(self.name.clone()));
        }
        Ok(Sample::from_slots(slots))
    }

    /// Create the slices over `range` and their candidate invariants.
    ///
    /// `range.end` must be the catalog length: unary slices cover the range,
    /// binary and ternary slices every tuple with at least one member in it.
    /// Ternary slices exclude sequences and incompatible types. Controlled
    /// slices and slices without any candidate are not added. Returns the
    /// number of slices added.
    pub fn instantiate_views(
        &mut self,
        range: Range<usize>,
        invariants: &InvariantCatalog,
        oracle: &dyn SliceOracle,
        ternary: bool,
    ) -> InferResult<usize> {
        let Range { start: min, end: limit } = range;
        if limit != self.catalog.len() || min > limit {
            return Err(InferError::PartialInstantiation {
                ppt: self.name.clone(),
                min,
                limit,
                catalog_len: self.catalog.len(),
            });
        }
        if min == limit {
            self.views_instantiated = true;
            return Ok(0);
        }

        let in_range = |i: usize| (min..limit).contains(&i);
        let mut keys: Vec<SliceKey> = Vec::new();

        keys.extend((min..limit).map(|i| SliceKey::from_iter([VarIndex(i)])));

        for i1 in 0..limit {
            let i2_min = if in_range(i1) { i1 + 1 } else { (i1 + 1).max(min) };
            keys.extend((i2_min..limit).map(|i2| SliceKey::from_iter([VarIndex(i1), VarIndex(i2)])));
        }

        if ternary {
            let scalar = |i: usize| !self.catalog[VarIndex(i)].rep_type.is_array();
            for i1 in (0..limit).filter(|&i| scalar(i)) {
                for i2 in (i1 + 1..limit).filter(|&i| scalar(i)) {
                    let i3_min = if in_range(i1) || in_range(i2) {
                        i2 + 1
                    } else {
                        (i2 + 1).max(min)
                    };
                    for i3 in (i3_min..limit).filter(|&i| scalar(i)) {
                        let (v1, v2, v3) = (
                            &self.catalog[VarIndex(i1)],
                            &self.catalog[VarIndex(i2)],
                            &self.catalog[VarIndex(i3)],
                        );
                        if !v1.compatible(v2) || !v1.compatible(v3) {
                            continue;
                        }
                        keys.push(SliceKey::from_iter([VarIndex(i1), VarIndex(i2), VarIndex(i3)]));
                    }
                }
            }
        }

        let mut pending = Vec::new();
        for key in keys {
            if !invariants.has_arity(key.len()) {
                continue;
            }
            if oracle.is_controlled(self, &key) {
                debug!("Skipping {:?} of `{}`; is controlled", key, self.name);
                continue;
            }

            let candidates = {
                let vars: SmallVec<&VarInfo, 3> = key.iter().map(|&v| &self.catalog[v]).collect();
                invariants.instantiate(&vars)
            };
            if candidates.is_empty() {
                continue;
            }
            if self.slices.contains_key(&key) {
                return Err(InferError::DuplicateSlice {
                    ppt: self.name.clone(),
                    vars: key.to_vec(),
                });
            }
            pending.push((key, candidates));
        }

        // Nothing is modified until every slice is known to be new.
        let added = pending.len();
        for (key, candidates) in pending {
            let mut slice = Slice::new(key);
            for inv in candidates {
                let id = self.fresh_id();
                slice.push(id, inv);
            }
            self.insert_slice(slice)?;
        }
        self.views_instantiated = true;

        debug!("{} new views for `{}`", added, self.name);
        Ok(added)
    }

    fn fresh_id(&mut self) -> InvId {
        let id = InvId(self.next_inv_id);
        self.next_inv_id += 1;
        id
    }

    fn insert_slice(&mut self, slice: Slice) -> InferResult<()> {
        if self.slices.contains_key(slice.key()) {
            return Err(InferError::DuplicateSlice {
                ppt: self.name.clone(),
                vars: slice.vars().to_vec(),
            });
        }
        self.slices.insert(slice.key().clone(), slice);
        Ok(())
    }

    fn canonical_key(&self, vars: &[VarIndex]) -> InferResult<SliceKey> {
        let mut key: SliceKey = vars.iter().copied().collect();
        key.sort();
        let distinct = key.windows(2).all(|w| w[0] != w[1]);
        if key.is_empty() || key.len() > 3 || !distinct || key.iter().any(|v| v.0 >= self.catalog.len()) {
            return Err(InferError::InvalidSliceVars {
                ppt: self.name.clone(),
                vars: vars.to_vec(),
            });
        }
        Ok(key)
    }

    pub fn slices(&self) -> impl Iterator<Item = &Slice> {
        self.slices.values()
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    /// Slice over exactly `vars`, given in ascending index order.
    pub fn find_slice(&self, vars: &[VarIndex]) -> Option<&Slice> {
        self.slices.get(vars)
    }

    /// Slice over `vars`, given in any order.
    pub fn find_slice_unordered(&self, vars: &[VarIndex]) -> Option<&Slice> {
        let mut key: SliceKey = vars.iter().copied().collect();
        key.sort();
        self.slices.get(key.as_slice())
    }

    /// Slice over `vars`, created empty when absent.
    ///
    /// The caller must either fill a fresh slice through
    /// [`ProgramPoint::add_invariant`] or remove it again; empty slices are
    /// discarded by the next sample.
    pub fn get_or_instantiate_slice(&mut self, vars: &[VarIndex]) -> InferResult<&mut Slice> {
        let key = self.canonical_key(vars)?;
        Ok(self
            .slices
            .entry(key.clone())
            .or_insert_with(|| Slice::new(key)))
    }

    /// Attach `inv` to the slice over `vars`, creating the slice if needed.
    /// `inv` receives values in ascending variable-index order.
    pub fn add_invariant(&mut self, vars: &[VarIndex], inv: Box<dyn Invariant>) -> InferResult<InvId> {
        let id = self.fresh_id();
        self.get_or_instantiate_slice(vars)?.push(id, inv);
        Ok(id)
    }

    pub fn remove_slice(&mut self, vars: &[VarIndex]) -> InferResult<Slice> {
        let key = self.canonical_key(vars)?;
        self.slices
            .remove(key.as_slice())
            .ok_or_else(|| InferError::SliceNotFound {
                ppt: self.name.clone(),
                vars: vars.to_vec(),
            })
    }

    /// Feed `sample` to a snapshot of the open slices, then sweep away the
    /// slices left without invariants.
    pub(crate) fn feed_slices(&mut self, sample: &Sample, count: u32) {
        let snapshot: Vec<SliceKey> = self.slices.keys().cloned().collect();
        for key in &snapshot {
            let Some(slice) = self.slices.get_mut(key) else {
                continue;
            };
            if slice.is_empty() {
                debug!("No invariants for {:?} of `{}`", key, self.name);
                continue;
            }
            slice.add(&self.catalog, sample, count);
        }

        let name = &self.name;
        self.slices.retain(|key, slice| {
            if slice.is_empty() {
                debug!("Slice {:?} of `{}` died", key, name);
            }
            !slice.is_empty()
        });
        self.num_samples += count as u64;
    }

    /// Every invariant of the point: slice invariants in slice order, then
    /// implications, then unconditional invariants.
    pub fn invariants(&self) -> impl Iterator<Item = InvariantRef<'_>> {
        self.slices
            .values()
            .flat_map(|slice| {
                slice
                    .invariants()
                    .map(move |entry| InvariantRef::Sliced { slice, entry })
            })
            .chain(self.implications.iter().map(InvariantRef::Implication))
            .chain(self.unconditional.iter().map(InvariantRef::Unconditional))
    }

    /// Includes redundant invariants.
    pub fn num_invariants(&self) -> usize {
        self.invariants().count()
    }

    pub fn find_invariant(&self, id: InvId) -> Option<(&Slice, &dyn Invariant)> {
        self.slices
            .values()
            .find_map(|s| s.get(id).map(|inv| (s, inv)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inv::{CmpOp, binary::IntComparison, unary::OneOf},
        slice::NeverControlled,
        var::RepType,
    };

    fn point() -> ProgramPoint {
        ProgramPoint::new(
            "P",
            [
                VarInfo::new("x", RepType::Int),
                VarInfo::new("y", RepType::Int),
                VarInfo::new("a", RepType::IntSeq),
            ],
        )
    }

    #[test]
    fn views_cover_every_tuple_once() {
        let mut ppt = point();
        let added = ppt
            .instantiate_views(0..3, &InvariantCatalog::standard(), &NeverControlled, true)
            .unwrap();
        // no binary kind relates a scalar and a sequence
        let keys: Vec<_> = ppt.slices().map(|s| s.vars().to_vec()).collect();
        assert_eq!(added, keys.len());
        assert!(keys.contains(&vec![VarIndex(0)]));
        assert!(keys.contains(&vec![VarIndex(2)]));
        assert!(keys.contains(&vec![VarIndex(0), VarIndex(1)]));
        assert!(!keys.contains(&vec![VarIndex(0), VarIndex(2)]));
        assert!(ppt.views_instantiated());
    }

    #[test]
    fn partial_instantiation_is_rejected() {
        let mut ppt = point();
        let err = ppt
            .instantiate_views(0..2, &InvariantCatalog::standard(), &NeverControlled, false)
            .unwrap_err();
        assert!(matches!(err, InferError::PartialInstantiation { limit: 2, catalog_len: 3, .. }));
    }

    #[test]
    fn controlled_slices_are_skipped() {
        let mut ppt = point();
        let oracle = |_: &ProgramPoint, vars: &[VarIndex]| vars.len() == 1;
        ppt.instantiate_views(0..3, &InvariantCatalog::standard(), &oracle, false)
            .unwrap();
        assert!(ppt.slices().all(|s| s.arity() == 2));
    }

    #[test]
    fn catalog_is_frozen_once_views_exist() {
        let mut ppt = point();
        ppt.instantiate_views(0..3, &InvariantCatalog::standard(), &NeverControlled, false)
            .unwrap();
        assert!(matches!(
            ppt.add_var_infos([VarInfo::new("z", RepType::Int)]),
            Err(InferError::CatalogFrozen { .. })
        ));
    }

    #[test]
    fn slice_lookup_and_removal() {
        let mut ppt = point();
        let id = ppt
            .add_invariant(&[VarIndex(1), VarIndex(0)], Box::new(IntComparison::new(CmpOp::Lt)))
            .unwrap();
        assert!(ppt.find_slice(&[VarIndex(0), VarIndex(1)]).is_some());
        assert!(ppt.find_slice(&[VarIndex(1), VarIndex(0)]).is_none());
        assert!(ppt.find_slice_unordered(&[VarIndex(1), VarIndex(0)]).is_some());
        assert_eq!(ppt.find_invariant(id).unwrap().1.kind(), "IntLessThan");

        assert!(matches!(
            ppt.get_or_instantiate_slice(&[VarIndex(0), VarIndex(0)]),
            Err(InferError::InvalidSliceVars { .. })
        ));

        ppt.remove_slice(&[VarIndex(0), VarIndex(1)]).unwrap();
        assert!(matches!(
            ppt.remove_slice(&[VarIndex(0), VarIndex(1)]),
            Err(InferError::SliceNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_slices_are_rejected() {
        let mut ppt = point();
        ppt.add_invariant(&[VarIndex(0)], Box::new(OneOf::new(RepType::Int)))
            .unwrap();
        let err = ppt
            .instantiate_views(0..3, &InvariantCatalog::standard(), &NeverControlled, false)
            .unwrap_err();
        assert!(matches!(err, InferError::DuplicateSlice { .. }));

        // The failed attempt leaves the point untouched and retryable.
        assert!(!ppt.views_instantiated());
        assert_eq!(ppt.num_slices(), 1);
        ppt.remove_slice(&[VarIndex(0)]).unwrap();
        let added = ppt
            .instantiate_views(0..3, &InvariantCatalog::standard(), &NeverControlled, false)
            .unwrap();
        assert_eq!(added, ppt.num_slices());
        assert!(ppt.views_instantiated());
    }

    #[test]
    fn derived_values_are_computed_in_catalog_order() {
        let mut ppt = ProgramPoint::new(
            "P",
            [
                VarInfo::new("a", RepType::IntSeq),
                VarInfo::static_constant("K", RepType::Int, Value::Int(1)),
                VarInfo::new("i", RepType::Int),
            ],
        );
        let rules = DerivationCatalog::standard().retain(|r| r == "size" || r == "subscript");
        let added = ppt.create_derived_variables(&rules, DeriveSettings::default()).unwrap();
        assert!(added > 0);
        assert_eq!(ppt.observed_count(), 2);
        assert_eq!(ppt.create_derived_variables(&rules, DeriveSettings::default()).unwrap(), 0);

        let raw = Sample::modified([Value::IntSeq(vec![7, 8, 9]), Value::Int(1)]);
        let full = ppt.extend_sample(&raw).unwrap();
        assert_eq!(full.len(), ppt.catalog().value_count());

        let value_of = |name: &str| {
            let var = ppt.index_of(name).unwrap();
            ppt.catalog().value_in(&full, var).map(|(v, _)| v.clone())
        };
        assert_eq!(value_of("size(a)"), Some(Value::Int(3)));
        assert_eq!(value_of("a[i]"), Some(Value::Int(8)));
        assert_eq!(value_of("a[K]"), Some(Value::Int(8)));
        assert_eq!(value_of("a[size(a)-1]"), Some(Value::Int(9)));

        let out_of_range = Sample::modified([Value::IntSeq(vec![]), Value::Int(4)]);
        let full = ppt.extend_sample(&out_of_range).unwrap();
        let var = ppt.index_of("a[i]").unwrap();
        assert!(ppt.catalog().value_in(&full, var).is_none());
    }
}
