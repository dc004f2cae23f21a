//! Redundancy marking.
//!
//! The invariants of a point that the prover can express are ordered, then
//! checked from last to first: an invariant implied by the remaining ones
//! (and by the invariants of the controlling points) is flagged redundant and
//! leaves the background of the following checks. Flagged invariants stay in
//! the point.

use std::collections::BTreeMap;

use log::{debug, warn};
use strum::{Display, EnumIs};

use crate::{
    context::InferenceContext,
    implication::InvRef,
    inv::Notation,
    ppt::{InvariantRef, PptId, ProgramPoint, Redundant},
    prover::{ProverCommand, ProverError, ProverResponse},
    utils::error::InferResult,
    var::VarIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs, Display)]
pub enum RedundancyOutcome {
    /// Every candidate was checked.
    Completed,
    /// No invariant could be expressed for the prover.
    NothingToCheck,
    /// The prover could not be started.
    ProverUnavailable,
    /// The invariants of the point contradict each other; nothing was flagged.
    Contradictory,
    /// The prover failed mid-pass; flags set before the failure are kept.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedundancyReport {
    pub examined: usize,
    pub redundant: usize,
    pub outcome: RedundancyOutcome,
}

#[derive(Debug)]
struct Candidate {
    what: Redundant,
    order: (&'static str, Vec<String>, String),
    formula: String,
}

fn quoted(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| Notation::Simplify.name(n)).collect()
}

fn as_refs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

/// Union-find over variables; the smallest index of a class is its leader.
fn equality_classes(pairs: &[(VarIndex, VarIndex)]) -> BTreeMap<VarIndex, Vec<VarIndex>> {
    let mut leader: BTreeMap<VarIndex, VarIndex> = BTreeMap::new();
    fn find(leader: &mut BTreeMap<VarIndex, VarIndex>, v: VarIndex) -> VarIndex {
        let l = *leader.entry(v).or_insert(v);
        if l == v {
            return v;
        }
        let root = find(leader, l);
        leader.insert(v, root);
        root
    }

    for &(a, b) in pairs {
        let (ra, rb) = (find(&mut leader, a), find(&mut leader, b));
        match ra.cmp(&rb) {
            std::cmp::Ordering::Less => leader.insert(rb, ra),
            std::cmp::Ordering::Greater => leader.insert(ra, rb),
            std::cmp::Ordering::Equal => None,
        };
    }

    let mut classes: BTreeMap<VarIndex, Vec<VarIndex>> = BTreeMap::new();
    let vars: Vec<VarIndex> = leader.keys().copied().collect();
    for v in vars {
        let root = find(&mut leader, v);
        if root != v {
            classes.entry(root).or_default().push(v);
        }
    }
    classes
}

/// Expressible invariants of `ppt`, pairwise equalities folded into
/// equality classes.
fn candidates(id: PptId, ppt: &ProgramPoint, include: &dyn Fn(&InvariantRef) -> bool) -> Vec<Candidate> {
    let mut result = Vec::new();
    let mut equalities = Vec::new();

    for r in ppt.invariants().filter(|r| include(r)) {
        match r {
            InvariantRef::Sliced { slice, entry } => {
                let inv = entry.invariant();
                if inv.is_equality() && slice.arity() == 2 {
                    equalities.push((slice.vars()[0], slice.vars()[1]));
                    continue;
                }
                let names = slice.names(ppt.catalog());
                let Some(formula) = inv.render(&as_refs(&quoted(&names)), Notation::Simplify) else {
                    continue;
                };
                result.push(Candidate {
                    what: Redundant::Invariant(InvRef::Slice { ppt: id, id: entry.id() }),
                    order: (
                        inv.kind(),
                        names.iter().map(|n| n.to_string()).collect(),
                        inv.formula_identity().detail,
                    ),
                    formula,
                });
            }
            InvariantRef::Implication(imp) => {
                let Some(formula) = imp.render(Notation::Simplify) else {
                    continue;
                };
                result.push(Candidate {
                    what: Redundant::Implication {
                        predicate: imp.predicate.source,
                        consequent: imp.consequent.source,
                    },
                    order: ("Implication", vec![], imp.predicate.text.clone() + &imp.consequent.text),
                    formula,
                });
            }
            InvariantRef::Unconditional(term) => {
                let Some(formula) = term.prover.clone() else {
                    continue;
                };
                result.push(Candidate {
                    what: Redundant::Invariant(term.source),
                    order: ("Unconditional", term.formula.0.clone(), term.text.clone()),
                    formula,
                });
            }
        }
    }

    for (leader, members) in equality_classes(&equalities) {
        let name = |v: VarIndex| Notation::Simplify.name(&ppt.catalog()[v].name);
        let eqs: Vec<String> = members
            .iter()
            .map(|&m| format!("(EQ {} {})", name(leader), name(m)))
            .collect();
        result.push(Candidate {
            what: Redundant::Leader(leader),
            order: (
                "Equality",
                std::iter::once(leader)
                    .chain(members.iter().copied())
                    .map(|v| ppt.catalog()[v].name.clone())
                    .collect(),
                String::new(),
            ),
            formula: format!("(AND {})", eqs.join(" ")),
        });
    }

    result.sort_by(|a, b| a.order.cmp(&b.order));
    result
}

/// Conjunction of the invariants holding at `ppt`, restated over pre-state
/// variables for object-invariant points.
fn controller_background(ppt: &ProgramPoint, include: &dyn Fn(&InvariantRef) -> bool) -> String {
    let mut formulas = Vec::new();
    for r in ppt.invariants().filter(|r| include(r)) {
        let InvariantRef::Sliced { slice, entry } = r else {
            continue;
        };
        let names = slice.names(ppt.catalog());
        let Some(formula) = entry
            .invariant()
            .render(&as_refs(&quoted(&names)), Notation::Simplify)
        else {
            continue;
        };
        formulas.push(formula);

        if ppt.is_object_invariant() {
            let orig: Vec<String> = names.iter().map(|n| format!("orig({})", n)).collect();
            if let Some(formula) = entry
                .invariant()
                .render(&as_refs(&quoted(&as_refs(&orig))), Notation::Simplify)
            {
                formulas.push(formula);
            }
        }
    }
    format!("(AND {})", formulas.join(" "))
}

fn conjunction<'a>(formulas: impl Iterator<Item = &'a str>) -> String {
    let parts: Vec<&str> = formulas.collect();
    format!("(AND {})", parts.join(" "))
}

impl InferenceContext {
    /// Flag the invariants of `id` that are implied by the others.
    ///
    /// Only invariants accepted by `include` take part, both at `id` and at
    /// its controlling points. Prover failures never surface as errors: they
    /// end the pass and are reported through [`RedundancyOutcome`]. The first
    /// timeout of a pass restarts the prover and asserts the background again;
    /// any later failure aborts the pass.
    pub fn mark_implied(
        &mut self,
        id: PptId,
        include: impl Fn(&InvariantRef) -> bool,
    ) -> InferResult<RedundancyReport> {
        let ppt = self.ppt(id)?;
        let name = ppt.name().to_string();
        let candidates = candidates(id, ppt, &include);
        let report = |redundant, outcome| RedundancyReport {
            examined: candidates.len(),
            redundant,
            outcome,
        };
        if candidates.is_empty() {
            return Ok(report(0, RedundancyOutcome::NothingToCheck));
        }

        let mut controllers = Vec::new();
        for controller in self.controlling_closure(id) {
            controllers.push(controller_background(self.ppt(controller)?, &include));
        }
        let background = ProverCommand::Assume(conjunction(controllers.iter().map(String::as_str)));

        if !self.prover.ensure_started() || self.prover.request(&background).is_err() {
            debug!("No prover for `{}`", name);
            return Ok(report(0, RedundancyOutcome::ProverUnavailable));
        }

        let mut present = vec![true; candidates.len()];
        let mut outcome = RedundancyOutcome::Completed;
        let mut restarted = false;
        for checking in (0..candidates.len()).rev() {
            let bg = conjunction(
                candidates
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| present[i] && i != checking)
                    .map(|(_, c)| c.formula.as_str()),
            );

            let verdict = self
                .prover
                .request(&ProverCommand::Check(format!("(NOT {})", bg)))
                .and_then(|contradiction| {
                    if contradiction == ProverResponse::Valid {
                        return Ok(None);
                    }
                    let ask = format!("(IMPLIES {} {})", bg, candidates[checking].formula);
                    self.prover.request(&ProverCommand::Check(ask)).map(Some)
                });

            match verdict {
                Ok(None) => {
                    warn!("Invariants of `{}` are contradictory; skipping", name);
                    outcome = RedundancyOutcome::Contradictory;
                    break;
                }
                Ok(Some(ProverResponse::Valid)) => present[checking] = false,
                Ok(Some(_)) => {}
                Err(ProverError::Timeout(t)) if !restarted => {
                    debug!("Prover timed out after {:?}; restarting", t);
                    restarted = true;
                    if !self.prover.restart() || self.prover.request(&background).is_err() {
                        outcome = RedundancyOutcome::Aborted;
                        break;
                    }
                }
                Err(e) => {
                    debug!("Redundancy pass of `{}` aborted: {}", name, e);
                    outcome = RedundancyOutcome::Aborted;
                    break;
                }
            }
        }

        if !outcome.is_aborted() {
            let _ = self.prover.request(&ProverCommand::UndoAssume);
        }
        if outcome.is_contradictory() {
            return Ok(report(0, outcome));
        }

        let marks: Vec<Redundant> = candidates
            .iter()
            .zip(&present)
            .filter(|&(_, present)| !present)
            .map(|(c, _)| c.what)
            .collect();
        let redundant = marks.len();
        debug!("{} of {} invariants of `{}` are redundant", redundant, candidates.len(), name);
        self.ppt_mut(id)?.redundant.extend(marks);
        Ok(report(redundant, outcome))
    }

    /// [`mark_implied`](Self::mark_implied) over the invariants worth
    /// reporting.
    pub fn mark_implied_worth_reporting(&mut self, id: PptId) -> InferResult<RedundancyReport> {
        self.mark_implied(id, |r| r.worth_reporting())
    }
}
