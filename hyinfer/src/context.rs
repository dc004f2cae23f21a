//! The inference engine.
//!
//! [`InferenceContext`] owns every program point, the catalogs of invariant
//! kinds and derivation rules, the controlled-slice oracle and the prover
//! bridge. Points refer to each other through [`PptId`]s; the context is the
//! only place where more than one point is borrowed at a time.
//!
//! ## Core concepts
//! * Sample intake – [`InferenceContext::add`] feeds one point and its
//!   conditional children, [`InferenceContext::add_and_flow`] additionally
//!   feeds the dataflow targets of the point.
//! * Control graph – Which points control which; used to build the prover
//!   background of a redundancy pass.

use std::{collections::BTreeMap, fmt, ops::Range};

use log::debug;
use petgraph::{prelude::DiGraphMap, visit::Dfs};
use regex::Regex;
use slotmap::SlotMap;

use crate::{
    derive::{DerivationCatalog, DeriveSettings},
    inv::InvariantCatalog,
    ppt::{FlowEdge, PptId, ProgramPoint},
    prover::bridge::ProverBridge,
    sample::Sample,
    slice::{NeverControlled, SliceOracle},
    utils::{
        conf::InferenceConfig,
        error::{InferError, InferResult},
    },
    var::{VarIndex, VarInfo},
};

pub struct InferenceContext {
    config: InferenceConfig,
    omit_pattern: Option<Regex>,
    pub(crate) invariants: InvariantCatalog,
    derivations: DerivationCatalog,
    oracle: Box<dyn SliceOracle>,
    pub(crate) ppts: SlotMap<PptId, ProgramPoint>,
    pub(crate) names: BTreeMap<String, PptId>,
    /// Edge `a -> b` when `b` controls `a`.
    controls: DiGraphMap<PptId, ()>,
    pub(crate) prover: ProverBridge,
}

impl fmt::Debug for InferenceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceContext")
            .field("config", &self.config)
            .field("ppts", &self.names.keys().collect::<Vec<_>>())
            .field("invariants", &self.invariants)
            .field("derivations", &self.derivations)
            .field("prover", &self.prover)
            .finish()
    }
}

impl InferenceContext {
    pub fn new(config: InferenceConfig) -> InferResult<Self> {
        Ok(Self {
            omit_pattern: config.compile_omit_pattern()?,
            invariants: InvariantCatalog::from_config(&config),
            derivations: DerivationCatalog::from_config(&config),
            oracle: Box::new(NeverControlled),
            ppts: SlotMap::with_key(),
            names: BTreeMap::new(),
            controls: DiGraphMap::new(),
            prover: ProverBridge::from_config(&config.prover),
            config,
        })
    }

    /// Context configured from the default configuration file, if any.
    pub fn load() -> InferResult<Self> {
        Self::new(InferenceConfig::load_or_default()?)
    }

    pub fn with_invariant_catalog(mut self, invariants: InvariantCatalog) -> Self {
        self.invariants = invariants;
        self
    }

    pub fn with_derivation_catalog(mut self, derivations: DerivationCatalog) -> Self {
        self.derivations = derivations;
        self
    }

    pub fn with_oracle(mut self, oracle: impl SliceOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub fn with_prover(mut self, prover: ProverBridge) -> Self {
        self.prover = prover;
        self
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn invariant_catalog(&self) -> &InvariantCatalog {
        &self.invariants
    }

    pub fn derivation_catalog(&self) -> &DerivationCatalog {
        &self.derivations
    }

    pub fn prover(&self) -> &ProverBridge {
        &self.prover
    }

    pub fn add_ppt(&mut self, ppt: ProgramPoint) -> InferResult<PptId> {
        self.insert_ppt(ppt)
    }

    pub(crate) fn insert_ppt(&mut self, ppt: ProgramPoint) -> InferResult<PptId> {
        if self.names.contains_key(ppt.name()) {
            return Err(InferError::DuplicatePpt(ppt.name().to_string()));
        }
        let name = ppt.name().to_string();
        let id = self.ppts.insert(ppt);
        self.controls.add_node(id);
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn ppt(&self, id: PptId) -> InferResult<&ProgramPoint> {
        self.ppts
            .get(id)
            .ok_or_else(|| InferError::UnknownPpt(format!("{:?}", id)))
    }

    pub fn ppt_mut(&mut self, id: PptId) -> InferResult<&mut ProgramPoint> {
        self.ppts
            .get_mut(id)
            .ok_or_else(|| InferError::UnknownPpt(format!("{:?}", id)))
    }

    pub fn lookup(&self, name: &str) -> Option<PptId> {
        self.names.get(name).copied()
    }

    pub fn ppts(&self) -> impl Iterator<Item = (PptId, &ProgramPoint)> {
        self.ppts.iter()
    }

    /// Append observed variables to a top-level point and to its conditional
    /// children.
    pub fn add_var_infos(
        &mut self,
        id: PptId,
        vars: impl IntoIterator<Item = VarInfo>,
    ) -> InferResult<Range<usize>> {
        let vars: Vec<VarInfo> = vars.into_iter().collect();
        if !vars.is_empty() {
            self.check_conditionals(id)?;
        }
        let range = self.ppt_mut(id)?.add_var_infos(vars)?;
        if !range.is_empty() {
            self.sync_conditionals(id)?;
        }
        Ok(range)
    }

    /// Derive variables of a point to a fixed point. Returns the number of
    /// variables added.
    pub fn create_derived_variables(&mut self, id: PptId) -> InferResult<usize> {
        let settings = DeriveSettings {
            max_depth: self.config.max_derivation_depth,
            omit: self.omit_pattern.as_ref(),
        };
        let ppt = self.ppt(id)?;
        let pending = ppt.derive_pass(ppt.derived_through..ppt.catalog().len(), &self.derivations, settings)?;
        if !pending.is_empty() {
            self.check_conditionals(id)?;
        }

        let ppt = self
            .ppts
            .get_mut(id)
            .ok_or_else(|| InferError::UnknownPpt(format!("{:?}", id)))?;
        let added = ppt.create_derived_variables(&self.derivations, settings)?;
        if added > 0 {
            self.sync_conditionals(id)?;
        }
        Ok(added)
    }

    /// Fails when some conditional descendant of `id` could not follow a
    /// growth of its catalog.
    fn check_conditionals(&self, id: PptId) -> InferResult<()> {
        for &child in &self.ppt(id)?.conditionals {
            self.ppt(child)?.check_mirror()?;
            self.check_conditionals(child)?;
        }
        Ok(())
    }

    /// Conditional children mirror the variables of their parent.
    fn sync_conditionals(&mut self, id: PptId) -> InferResult<()> {
        let parent = self.ppt(id)?;
        let (catalog, derivations, derived_through) = (
            parent.catalog.clone(),
            parent.derivations.clone(),
            parent.derived_through,
        );
        for child_id in parent.conditionals.clone() {
            let child = self.ppt_mut(child_id)?;
            child.check_mirror()?;
            child.catalog = catalog.clone();
            child.derivations = derivations.clone();
            child.derived_through = derived_through;
            self.sync_conditionals(child_id)?;
        }
        Ok(())
    }

    /// Create the slices of `id` over `range`. Happens implicitly on the
    /// first sample of a point otherwise.
    pub fn instantiate_views(&mut self, id: PptId, range: Range<usize>) -> InferResult<usize> {
        let ternary = !self.config.disable_ternary_invariants;
        let ppt = self
            .ppts
            .get_mut(id)
            .ok_or_else(|| InferError::UnknownPpt(format!("{:?}", id)))?;
        ppt.instantiate_views(range, &self.invariants, self.oracle.as_ref(), ternary)
    }

    fn flow_edge(&self, from: PptId, to: PptId, transform: Vec<Option<usize>>) -> InferResult<FlowEdge> {
        if from == to {
            return Err(InferError::SelfFlow(self.ppt(from)?.name().to_string()));
        }
        let (source, target) = (self.ppt(from)?, self.ppt(to)?);
        if transform.len() != source.catalog().len() {
            return Err(InferError::InvalidTransform {
                from: source.name().to_string(),
                to: target.name().to_string(),
                expected: source.catalog().len(),
                found: transform.len(),
            });
        }
        if let Some(&index) = transform
            .iter()
            .flatten()
            .find(|&&i| i >= target.catalog().len())
        {
            return Err(InferError::TransformOutOfRange {
                from: source.name().to_string(),
                to: target.name().to_string(),
                index,
                target_len: target.catalog().len(),
            });
        }
        Ok(FlowEdge { target: to, transform })
    }

    /// Every sample added to `from` is also added to `to`, with source
    /// variable `i` moved to `transform[i]`.
    pub fn add_dataflow_edge(&mut self, from: PptId, to: PptId, transform: Vec<Option<usize>>) -> InferResult<()> {
        let edge = self.flow_edge(from, to, transform)?;
        self.ppt_mut(from)?.dataflow.push(edge);
        Ok(())
    }

    /// Route along which invariant removals of `from` propagate to `to`.
    pub fn add_invflow_edge(&mut self, from: PptId, to: PptId, transform: Vec<Option<usize>>) -> InferResult<()> {
        let edge = self.flow_edge(from, to, transform)?;
        self.ppt_mut(from)?.invflow.push(edge);
        Ok(())
    }

    /// Record that the invariants of `controller` also hold at `controlled`.
    pub fn add_controller(&mut self, controlled: PptId, controller: PptId) -> InferResult<()> {
        self.ppt(controlled)?;
        self.ppt(controller)?;
        if controlled != controller {
            self.controls.add_edge(controlled, controller, ());
        }
        Ok(())
    }

    pub fn controllers(&self, id: PptId) -> impl Iterator<Item = PptId> + '_ {
        self.controls.neighbors(id)
    }

    /// Every point controlling `id`, directly or transitively.
    pub fn controlling_closure(&self, id: PptId) -> Vec<PptId> {
        if !self.controls.contains_node(id) {
            return vec![];
        }
        let mut dfs = Dfs::new(&self.controls, id);
        let mut result = Vec::new();
        while let Some(node) = dfs.next(&self.controls) {
            if node != id {
                result.push(node);
            }
        }
        result
    }

    /// Feed `sample` to `id` and to its conditional children.
    ///
    /// The slices of a point are instantiated on its first sample. A
    /// conditional child ignores the samples its splitter does not select.
    pub fn add(&mut self, id: PptId, sample: &Sample, count: u32) -> InferResult<()> {
        let ternary = !self.config.disable_ternary_invariants;
        let ppt = self
            .ppts
            .get_mut(id)
            .ok_or_else(|| InferError::UnknownPpt(format!("{:?}", id)))?;
        ppt.check_arity(sample)?;

        if let Some(cond) = ppt.as_conditional() {
            let selected = cond.splitter.evaluate(ppt.catalog(), sample);
            if selected != Some(cond.polarity) {
                return Ok(());
            }
        }

        if ppt.num_samples() == 0 && !ppt.views_instantiated() {
            let limit = ppt.catalog().len();
            ppt.instantiate_views(0..limit, &self.invariants, self.oracle.as_ref(), ternary)?;
        }
        ppt.feed_slices(sample, count);

        for child in ppt.conditionals.clone() {
            self.add(child, sample, count)?;
        }
        Ok(())
    }

    /// Feed `sample` to `id`, then a remapped copy to every dataflow target
    /// of `id`. Target variables without a source stay missing.
    pub fn add_and_flow(&mut self, id: PptId, sample: &Sample, count: u32) -> InferResult<()> {
        self.add(id, sample, count)?;

        let source = self.ppt(id)?;
        let mut flows = Vec::with_capacity(source.dataflow.len());
        for edge in &source.dataflow {
            let target = self.ppt(edge.target)?;
            let mut slots = vec![None; target.catalog().value_count()];
            for (i, to) in edge.transform.iter().enumerate() {
                let (Some(to), Some(from)) = (to, source.catalog()[VarIndex(i)].value_index()) else {
                    continue;
                };
                let Some(to) = target.catalog()[VarIndex(*to)].value_index() else {
                    continue;
                };
                slots[to] = sample.slot(from).map(|(v, m)| (v.clone(), m));
            }
            flows.push((edge.target, Sample::from_slots(slots)));
        }

        for (target, mapped) in flows {
            debug!("Flowing sample of `{}` to `{}`", self.ppt(id)?.name(), self.ppt(target)?.name());
            self.add(target, &mapped, count)?;
        }
        Ok(())
    }

    /// Complete a sample of observed variables with derived values, then
    /// [`add_and_flow`](Self::add_and_flow) it.
    pub fn observe(&mut self, id: PptId, raw: &Sample, count: u32) -> InferResult<()> {
        let sample = self.ppt(id)?.extend_sample(raw)?;
        self.add_and_flow(id, &sample, count)
    }
}
