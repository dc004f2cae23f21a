//! Splitters and conditional program points.
//!
//! A [`Splitter`] is a boolean predicate over the samples of a point. Adding
//! a splitter to a point creates two conditional children, one per polarity,
//! each receiving only the samples the predicate selects. Once both children
//! have gathered samples, [`InferenceContext::add_implications`] turns their
//! differences into implications on the parent.

pub mod builtins;

use std::{fmt, sync::Arc};

use log::debug;

use crate::{
    context::InferenceContext,
    implication::{build_implications, canonicalize},
    inv::Notation,
    ppt::{PptId, ProgramPoint},
    sample::Sample,
    utils::error::InferResult,
    var::VarCatalog,
};

pub use builtins::{BooleanSplitter, ScalarCompareSplitter};

/// Boolean predicate partitioning the samples of a program point.
///
/// ### Required methods
/// * `condition` – Text identifying the predicate. Two children with the
///   same condition and opposite polarities form a pair.
/// * `is_valid_for` – Whether the predicate can be evaluated over the
///   variables of a point.
/// * `evaluate` – Value of the predicate, or `None` when the variables it
///   reads are missing from the sample.
/// * `render` – The predicate (`polarity == true`) or its negation, in the
///   given notation.
pub trait Splitter: Send + Sync + fmt::Debug {
    fn condition(&self) -> String;

    fn is_valid_for(&self, catalog: &VarCatalog) -> bool;

    fn evaluate(&self, catalog: &VarCatalog, sample: &Sample) -> Option<bool>;

    fn render(&self, polarity: bool, notation: Notation) -> Option<String>;
}

impl InferenceContext {
    /// Create the conditional children of `id` for every splitter that is
    /// valid over its variables. Children are appended false branch first.
    /// Returns the ids of the new children.
    pub fn add_splitters(
        &mut self,
        id: PptId,
        splitters: impl IntoIterator<Item = Arc<dyn Splitter>>,
    ) -> InferResult<Vec<PptId>> {
        let mut created = Vec::new();
        for splitter in splitters {
            let parent = self.ppt(id)?;
            if !splitter.is_valid_for(parent.catalog()) {
                debug!(
                    "Splitter `{}` is not valid for `{}`",
                    splitter.condition(),
                    parent.name()
                );
                continue;
            }
            if parent.num_samples() > 0 {
                debug!(
                    "Splitting `{}` after {} samples",
                    parent.name(),
                    parent.num_samples()
                );
            }

            let children = [false, true]
                .map(|polarity| ProgramPoint::conditional(parent, id, splitter.clone(), polarity));
            for child in children {
                let child_id = self.insert_ppt(child)?;
                self.ppt_mut(id)?.conditionals.push(child_id);
                created.push(child_id);
            }
        }
        Ok(created)
    }

    /// Build implications on `id` from its pairs of conditional children.
    /// Returns the number of implications the point holds afterwards.
    ///
    /// Children without samples are ignored. Unless pairwise implications are
    /// enabled, only the first two remaining children are considered.
    /// Consecutive children form a pair when they share a condition with
    /// opposite polarities.
    pub fn add_implications(&mut self, id: PptId) -> InferResult<usize> {
        let parent = self.ppt(id)?;
        let mut children = Vec::new();
        for &child in &parent.conditionals {
            if self.ppt(child)?.num_samples() > 0 {
                children.push(child);
            }
        }
        if !self.config().pairwise_implications {
            children.truncate(2);
        }

        let mut implications = Vec::new();
        let mut same = Vec::new();
        let mut i = 0;
        while i + 1 < children.len() {
            let (a, b) = (children[i], children[i + 1]);
            let (left, right) = (self.ppt(a)?, self.ppt(b)?);
            let paired = match (left.as_conditional(), right.as_conditional()) {
                (Some(l), Some(r)) => {
                    l.polarity != r.polarity && l.splitter.condition() == r.splitter.condition()
                }
                _ => false,
            };
            if !paired {
                i += 1;
                continue;
            }

            let set = build_implications((a, left), (b, right));
            implications.extend(set.implications);
            same.extend(set.same);
            i += 2;
        }

        let add_same = self.config().add_nonimplications;
        let parent = self.ppt_mut(id)?;
        for imp in implications {
            if !parent.implications.contains(&imp) {
                parent.implications.push(imp);
            }
        }
        canonicalize(&mut parent.implications);
        if add_same {
            for term in same {
                if !parent.unconditional.iter().any(|t| t.source == term.source) {
                    parent.unconditional.push(term);
                }
            }
        }

        debug!("`{}` holds {} implications", parent.name(), parent.implications.len());
        Ok(parent.implications.len())
    }

    /// Conditional child of `id` for `condition` and `polarity`.
    pub fn conditional_child(&self, id: PptId, condition: &str, polarity: bool) -> InferResult<Option<PptId>> {
        for &child in &self.ppt(id)?.conditionals {
            let found = self
                .ppt(child)?
                .as_conditional()
                .is_some_and(|c| c.polarity == polarity && c.splitter.condition() == condition);
            if found {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Parent of a conditional point.
pub fn parent_of(ppt: &ProgramPoint) -> Option<PptId> {
    ppt.as_conditional().map(|c| c.parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inv::CmpOp,
        sample::Value,
        utils::{conf::InferenceConfig, error::InferError},
        var::{RepType, VarInfo},
    };

    fn context() -> (InferenceContext, PptId) {
        let mut ctx = InferenceContext::new(InferenceConfig::default()).unwrap();
        let id = ctx
            .add_ppt(ProgramPoint::new(
                "f:::EXIT",
                [VarInfo::new("x", RepType::Int), VarInfo::new("y", RepType::Int)],
            ))
            .unwrap();
        (ctx, id)
    }

    fn x_positive() -> Arc<dyn Splitter> {
        Arc::new(ScalarCompareSplitter::new("x", CmpOp::Gt, 0))
    }

    #[test]
    fn children_partition_the_samples() {
        let (mut ctx, id) = context();
        let children = ctx.add_splitters(id, [x_positive()]).unwrap();
        assert_eq!(children.len(), 2);

        for x in [-2, -1, 1, 2, 3] {
            ctx.add(id, &Sample::modified([Value::Int(x), Value::Int(0)]), 1)
                .unwrap();
        }

        let neg = ctx.conditional_child(id, "x > 0", false).unwrap().unwrap();
        let pos = ctx.conditional_child(id, "x > 0", true).unwrap().unwrap();
        assert_eq!(ctx.ppt(neg).unwrap().num_samples(), 2);
        assert_eq!(ctx.ppt(pos).unwrap().num_samples(), 3);
        assert_eq!(ctx.ppt(id).unwrap().num_samples(), 5);
        assert_eq!(parent_of(ctx.ppt(pos).unwrap()), Some(id));
        assert_eq!(ctx.ppt(pos).unwrap().name(), "f:::EXIT;condition=\"x > 0\"");
    }

    #[test]
    fn invalid_splitters_create_no_children() {
        let (mut ctx, id) = context();
        let missing: Arc<dyn Splitter> = Arc::new(ScalarCompareSplitter::new("z", CmpOp::Gt, 0));
        assert!(ctx.add_splitters(id, [missing]).unwrap().is_empty());
        assert!(ctx.ppt(id).unwrap().conditionals().is_empty());
    }

    #[test]
    fn children_follow_parent_variables() {
        let (mut ctx, id) = context();
        ctx.add_splitters(id, [x_positive()]).unwrap();
        ctx.add_var_infos(id, [VarInfo::new("z", RepType::Int)]).unwrap();
        for &child in ctx.ppt(id).unwrap().conditionals() {
            assert_eq!(ctx.ppt(child).unwrap().catalog().len(), 3);
        }
    }

    #[test]
    fn frozen_children_block_parent_growth() {
        let (mut ctx, id) = context();
        ctx.add_splitters(id, [x_positive()]).unwrap();
        let child = ctx.conditional_child(id, "x > 0", true).unwrap().unwrap();
        ctx.instantiate_views(child, 0..2).unwrap();

        assert!(matches!(
            ctx.add_var_infos(id, [VarInfo::new("z", RepType::Int)]),
            Err(InferError::CatalogFrozen { .. })
        ));
        // Parent and children still agree.
        assert_eq!(ctx.ppt(id).unwrap().catalog().len(), 2);
        for &c in ctx.ppt(id).unwrap().conditionals() {
            assert_eq!(ctx.ppt(c).unwrap().catalog().len(), 2);
        }
    }

    #[test]
    fn no_implications_without_samples() {
        let (mut ctx, id) = context();
        ctx.add_splitters(id, [x_positive()]).unwrap();
        assert_eq!(ctx.add_implications(id).unwrap(), 0);
    }
}
