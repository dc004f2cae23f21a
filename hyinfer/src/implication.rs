//! Implications built from pairs of conditional program points.
//!
//! Given the two children of a split, invariants of their matched slices
//! fall in three groups: those holding on both sides ("same"), pairs whose
//! conjunction is impossible ("exclusive"), and everything else
//! ("different"). Every exclusive invariant of one side then implies every
//! different invariant of that side.
//!
//! The construction is only sound when both children partition the samples
//! of their parent. Three-way splits such as `{A,B} {!A,!B} {A,!B}` would
//! wrongly produce `A <==> B` from the first two points.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    inv::{FormulaKey, Notation},
    ppt::{PptId, ProgramPoint},
    slice::{InvId, Slice},
};

/// Reference to an invariant that can appear inside an implication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvRef {
    Slice { ppt: PptId, id: InvId },
    /// Splitter condition of a conditional program point.
    Condition { ppt: PptId },
}

/// Snapshot of an invariant taken when an implication is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicationTerm {
    pub source: InvRef,
    /// Variable names followed by the formula identity.
    pub formula: (Vec<String>, Option<FormulaKey>),
    pub text: String,
    pub prover: Option<String>,
    pub justified: bool,
}

impl ImplicationTerm {
    pub fn render(&self, notation: Notation) -> Option<&str> {
        match notation {
            Notation::Daikon => Some(&self.text),
            Notation::Simplify => self.prover.as_deref(),
        }
    }

    fn from_slice(ppt_id: PptId, ppt: &ProgramPoint, slice: &Slice) -> Vec<ImplicationTerm> {
        let names = slice.names(ppt.catalog());
        let quoted: Vec<String> = names.iter().map(|n| Notation::Simplify.name(n)).collect();
        let quoted: Vec<&str> = quoted.iter().map(String::as_str).collect();

        slice
            .invariants()
            .map(|entry| {
                let inv = entry.invariant();
                let formula = inv.formula_identity();
                ImplicationTerm {
                    source: InvRef::Slice {
                        ppt: ppt_id,
                        id: entry.id(),
                    },
                    text: inv
                        .render(&names, Notation::Daikon)
                        .unwrap_or_else(|| format!("{} over {}", formula, names.join(", "))),
                    prover: inv.render(&quoted, Notation::Simplify),
                    formula: (names.iter().map(|n| n.to_string()).collect(), Some(formula)),
                    justified: inv.is_justified(),
                }
            })
            .collect()
    }

    fn condition(ppt_id: PptId, ppt: &ProgramPoint) -> Option<ImplicationTerm> {
        let cond = ppt.as_conditional()?;
        Some(ImplicationTerm {
            source: InvRef::Condition { ppt: ppt_id },
            formula: (Vec::new(), None),
            text: cond.splitter.render(cond.polarity, Notation::Daikon)?,
            prover: cond.splitter.render(cond.polarity, Notation::Simplify),
            justified: true,
        })
    }
}

/// `predicate ==> consequent`, or `predicate <==> consequent` when `iff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implication {
    pub predicate: ImplicationTerm,
    pub consequent: ImplicationTerm,
    pub iff: bool,
}

impl Implication {
    pub fn render(&self, notation: Notation) -> Option<String> {
        let (p, c) = (
            self.predicate.render(notation)?,
            self.consequent.render(notation)?,
        );
        Some(match (notation, self.iff) {
            (Notation::Daikon, false) => format!("({}) ==> ({})", p, c),
            (Notation::Daikon, true) => format!("({}) <==> ({})", p, c),
            (Notation::Simplify, false) => format!("(IMPLIES {} {})", p, c),
            (Notation::Simplify, true) => format!("(IFF {} {})", p, c),
        })
    }

    fn same_as(&self, other: &Implication) -> bool {
        self.predicate.source == other.predicate.source
            && self.consequent.source == other.consequent.source
            && self.iff == other.iff
    }
}

/// Outcome of pairing two conditional points.
#[derive(Debug, Default)]
pub(crate) struct ImplicationSet {
    pub implications: Vec<Implication>,
    /// Justified invariants holding identically on both sides.
    pub same: Vec<ImplicationTerm>,
}

type Pair = (ImplicationTerm, ImplicationTerm);

/// Slices of both points paired by arity and variable names.
fn match_slices<'a>(
    left: &'a ProgramPoint,
    right: &'a ProgramPoint,
) -> Vec<(Option<&'a Slice>, Option<&'a Slice>)> {
    let mut matched: BTreeMap<(usize, Vec<&str>), (Option<&Slice>, Option<&Slice>)> = BTreeMap::new();
    for slice in left.slices() {
        let key = (slice.arity(), slice.names(left.catalog()).to_vec());
        matched.entry(key).or_default().0 = Some(slice);
    }
    for slice in right.slices() {
        let key = (slice.arity(), slice.names(right.catalog()).to_vec());
        matched.entry(key).or_default().1 = Some(slice);
    }
    matched.into_values().collect()
}

fn exclusive_pairs(left: &[ImplicationTerm], l: &Slice, right: &[ImplicationTerm], r: &Slice) -> Vec<Pair> {
    let mut result = Vec::new();
    for (t1, e1) in left.iter().zip(l.invariants()) {
        for (t2, e2) in right.iter().zip(r.invariants()) {
            if e1.invariant().is_exclusive_with(e2.invariant()) {
                result.push((t1.clone(), t2.clone()));
            }
        }
    }
    result
}

/// Merge both term lists by formula. Returns the one-sided terms and the
/// justified terms present on both sides.
fn split_by_formula(
    left: Vec<ImplicationTerm>,
    right: Vec<ImplicationTerm>,
) -> (Vec<(Option<ImplicationTerm>, Option<ImplicationTerm>)>, Vec<ImplicationTerm>) {
    let mut merged: BTreeMap<_, (Option<ImplicationTerm>, Option<ImplicationTerm>)> = BTreeMap::new();
    for t in left {
        let key = t.formula.clone();
        merged.entry(key).or_default().0 = Some(t);
    }
    for t in right {
        let key = t.formula.clone();
        merged.entry(key).or_default().1 = Some(t);
    }

    let mut different = Vec::new();
    let mut same = Vec::new();
    for (_, pair) in merged {
        match pair {
            (Some(a), Some(b)) => {
                if a.justified && b.justified {
                    same.push(a);
                }
            }
            pair => different.push(pair),
        }
    }
    (different, same)
}

/// Implications of `left` and `right`, children of the same split with
/// opposite polarities.
pub(crate) fn build_implications(
    (left_id, left): (PptId, &ProgramPoint),
    (right_id, right): (PptId, &ProgramPoint),
) -> ImplicationSet {
    let mut exclusive: Vec<Pair> = Vec::new();
    let mut different = Vec::new();
    let mut same = Vec::new();

    for pair in match_slices(left, right) {
        let (l_terms, r_terms) = (
            pair.0
                .map(|s| ImplicationTerm::from_slice(left_id, left, s))
                .unwrap_or_default(),
            pair.1
                .map(|s| ImplicationTerm::from_slice(right_id, right, s))
                .unwrap_or_default(),
        );
        if let (Some(l), Some(r)) = pair {
            exclusive.extend(exclusive_pairs(&l_terms, l, &r_terms, r));
        }

        let (diff, both) = split_by_formula(l_terms, r_terms);
        different.extend(diff);
        if pair.0.is_some() && pair.1.is_some() {
            same.extend(both);
        }
    }

    let mut set = ImplicationSet {
        implications: Vec::new(),
        same,
    };
    if exclusive.is_empty() {
        debug!("No exclusive conditions between `{}` and `{}`", left.name(), right.name());
        return set;
    }

    if let (Some(c1), Some(c2)) = (
        ImplicationTerm::condition(left_id, left),
        ImplicationTerm::condition(right_id, right),
    ) {
        exclusive.insert(0, (c1, c2));
    }

    let excl_left: Vec<InvRef> = exclusive.iter().map(|(a, _)| a.source).collect();
    let excl_right: Vec<InvRef> = exclusive.iter().map(|(_, b)| b.source).collect();

    let mut push = |predicate: &ImplicationTerm, consequent: &ImplicationTerm, iff: bool| {
        if !predicate.justified || !consequent.justified || predicate.source == consequent.source {
            return;
        }
        let imp = Implication {
            predicate: predicate.clone(),
            consequent: consequent.clone(),
            iff,
        };
        if !set.implications.iter().any(|i| i.same_as(&imp)) {
            set.implications.push(imp);
        }
    };

    for (i, (excl1, excl2)) in exclusive.iter().enumerate() {
        for (diff1, diff2) in &different {
            if let Some(diff1) = diff1 {
                let index = excl_left.iter().position(|r| *r == diff1.source);
                if index.is_none_or(|k| k > i) {
                    push(excl1, diff1, index.is_some());
                }
            }
            if let Some(diff2) = diff2 {
                let index = excl_right.iter().position(|r| *r == diff2.source);
                if index.is_none_or(|k| k > i) {
                    push(excl2, diff2, index.is_some());
                }
            }
        }

    }

    debug!(
        "{} implications from `{}` and `{}` ({} exclusive conditions)",
        set.implications.len(),
        left.name(),
        right.name(),
        exclusive.len()
    );
    set
}

/// Group the terms of bi-implications into equivalence classes, pick one
/// canonical member per class and drop the one-way implications mentioning
/// any other member.
///
/// The canonical member is the shortest rendering, avoiding renderings that
/// mention `null` or `return`.
pub(crate) fn canonicalize(implications: &mut Vec<Implication>) {
    let mut parent: BTreeMap<InvRef, InvRef> = BTreeMap::new();
    let mut text: BTreeMap<InvRef, &str> = BTreeMap::new();

    fn find(parent: &mut BTreeMap<InvRef, InvRef>, x: InvRef) -> InvRef {
        let p = *parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }

    for imp in implications.iter().filter(|i| i.iff) {
        let (p, c) = (imp.predicate.source, imp.consequent.source);
        text.insert(p, &imp.predicate.text);
        text.insert(c, &imp.consequent.text);
        let (rp, rc) = (find(&mut parent, p), find(&mut parent, c));
        if rp != rc {
            parent.insert(rc, rp);
        }
    }

    let mut groups: BTreeMap<InvRef, BTreeSet<InvRef>> = BTreeMap::new();
    for &member in text.keys() {
        let root = find(&mut parent, member);
        groups.entry(root).or_default().insert(member);
    }

    let undesirable = |s: &str| s.contains("null") || s.contains("return");
    let mut canonical: BTreeMap<InvRef, InvRef> = BTreeMap::new();
    for members in groups.values() {
        let mut best: Option<(InvRef, &str)> = None;
        for &candidate in members {
            let candidate_text = text.get(&candidate).copied().unwrap_or_default();
            let replace = match best {
                None => true,
                Some((_, best_text)) => {
                    undesirable(best_text)
                        || (!undesirable(candidate_text) && candidate_text.len() < best_text.len())
                }
            };
            if replace {
                best = Some((candidate, candidate_text));
            }
        }
        if let Some((best, _)) = best {
            canonical.extend(members.iter().map(|&m| (m, best)));
        }
    }

    let non_canonical = |r: &InvRef| canonical.get(r).is_some_and(|c| c != r);
    let before = implications.len();
    implications.retain(|imp| {
        imp.iff || !(non_canonical(&imp.predicate.source) || non_canonical(&imp.consequent.source))
    });
    debug!("Pruned {} implications over non-canonical invariants", before - implications.len());
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn term(ppt: PptId, id: u64, text: &str) -> ImplicationTerm {
        ImplicationTerm {
            source: InvRef::Slice { ppt, id: InvId(id) },
            formula: (vec![], None),
            text: text.to_string(),
            prover: Some(format!("(P{})", id)),
            justified: true,
        }
    }

    #[test]
    fn rendering() {
        let mut ids: SlotMap<PptId, ()> = SlotMap::with_key();
        let p = ids.insert(());
        let imp = Implication {
            predicate: term(p, 0, "x > 0"),
            consequent: term(p, 1, "y == 1"),
            iff: false,
        };
        assert_eq!(imp.render(Notation::Daikon).unwrap(), "(x > 0) ==> (y == 1)");
        assert_eq!(imp.render(Notation::Simplify).unwrap(), "(IMPLIES (P0) (P1))");

        let mut no_prover = imp.clone();
        no_prover.consequent.prover = None;
        assert!(no_prover.render(Notation::Simplify).is_none());
    }

    #[test]
    fn terms_are_merged_by_formula() {
        let mut ids: SlotMap<PptId, ()> = SlotMap::with_key();
        let (l, r) = (ids.insert(()), ids.insert(()));
        let keyed = |ppt, id, text: &str, detail: &str| ImplicationTerm {
            formula: (vec!["y".into()], Some(FormulaKey::new("OneOf", detail))),
            ..term(ppt, id, text)
        };

        let (different, same) = split_by_formula(
            vec![keyed(l, 0, "y == 1", "1"), keyed(l, 1, "y != 0", "nz")],
            vec![keyed(r, 0, "y == 2", "2"), keyed(r, 1, "y != 0", "nz")],
        );
        assert_eq!(same.len(), 1);
        assert_eq!(same[0].text, "y != 0");
        assert_eq!(different.len(), 2);
        assert!(different.iter().all(|(a, b)| a.is_some() != b.is_some()));
    }

    #[test]
    fn canonicalization_prefers_short_plain_terms() {
        let mut ids: SlotMap<PptId, ()> = SlotMap::with_key();
        let p = ids.insert(());
        let (a, b, c, d) = (
            term(p, 0, "return == 1"),
            term(p, 1, "y == 1"),
            term(p, 2, "x > 0"),
            term(p, 3, "z == 0"),
        );
        let mut imps = vec![
            Implication { predicate: a.clone(), consequent: b.clone(), iff: true },
            Implication { predicate: b.clone(), consequent: c.clone(), iff: true },
            Implication { predicate: b.clone(), consequent: d.clone(), iff: false },
            Implication { predicate: c.clone(), consequent: d.clone(), iff: false },
            Implication { predicate: a.clone(), consequent: d.clone(), iff: false },
        ];
        canonicalize(&mut imps);

        // "x > 0" is canonical for {a, b, c}
        assert_eq!(imps.len(), 3);
        assert!(imps.iter().filter(|i| !i.iff).all(|i| i.predicate.text == "x > 0"));
    }
}
