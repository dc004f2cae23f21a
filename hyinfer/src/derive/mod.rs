//! Variable derivation.
//!
//! Derived variables are computed from one or two existing variables of a
//! program point (`size(a)`, `a[i]`, `intersect(a, b)`, ...). They are
//! appended to the catalog and behave exactly like observed variables once
//! their values are computed for a sample.
//!
//! ## Core concepts
//! * [`UnaryDerivationFactory`] / [`BinaryDerivationFactory`] – Rules that,
//!   given base variable descriptors, propose [`Derivation`]s.
//! * [`DerivationCatalog`] – The set of rules consulted by [`derive_pass`].
//! * [`derive_pass`] – One pass over an index range. The program point drives
//!   passes to a fixed point (see `ProgramPoint::create_derived_variables`).
//!
//! ## Termination
//! A variable is used as a base only when its derivation depth is below the
//! configured maximum, and every pass only pairs variables with at least one
//! member in the newly added range. Each pass therefore produces variables of
//! strictly increasing depth and the process stops after at most
//! `max_depth + 1` passes.

pub mod rules;

use std::{fmt, ops::Range, sync::Arc};

use log::debug;
use regex::Regex;
use smallvec::SmallVec;

use crate::{
    sample::Value,
    utils::{
        conf::InferenceConfig,
        error::{InferError, InferResult},
    },
    var::{DerivedFrom, RepType, VarAux, VarCatalog, VarIndex, VarInfo},
};

type ComputeFn = Arc<dyn Fn(&[&Value]) -> Option<Value> + Send + Sync>;

/// Recipe for one derived variable.
#[derive(Clone)]
pub struct Derivation {
    pub rule: &'static str,
    pub name: String,
    pub rep_type: RepType,
    pub aux: VarAux,
    pub bases: SmallVec<VarIndex, 2>,
    compute: ComputeFn,
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("rule", &self.rule)
            .field("name", &self.name)
            .field("rep_type", &self.rep_type)
            .field("bases", &self.bases)
            .finish()
    }
}

impl Derivation {
    pub fn new(
        rule: &'static str,
        name: impl Into<String>,
        rep_type: RepType,
        bases: impl IntoIterator<Item = VarIndex>,
        compute: impl Fn(&[&Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            rule,
            name: name.into(),
            rep_type,
            aux: VarAux::empty(),
            bases: bases.into_iter().collect(),
            compute: Arc::new(compute),
        }
    }

    pub fn with_aux(mut self, aux: VarAux) -> Self {
        self.aux |= aux;
        self
    }

    /// Value of the derived variable given the values of its bases (in
    /// [`Derivation::bases`] order). `None` means the value is missing.
    pub fn compute(&self, inputs: &[&Value]) -> Option<Value> {
        (self.compute)(inputs)
    }

    /// Descriptor of the variable this derivation introduces in `catalog`.
    pub(crate) fn to_var_info(&self, catalog: &VarCatalog) -> VarInfo {
        let depth = 1 + self
            .bases
            .iter()
            .map(|&b| catalog[b].derived_depth())
            .max()
            .unwrap_or(0);

        VarInfo::derived(
            self.name.clone(),
            self.rep_type,
            self.aux,
            DerivedFrom {
                rule: self.rule,
                bases: self.bases.clone(),
                depth,
            },
        )
    }
}

/// Derivation rule over a single base variable.
pub trait UnaryDerivationFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn instantiate(&self, var: &VarInfo) -> Vec<Derivation>;
}

/// Derivation rule over an (ordered) pair of base variables.
pub trait BinaryDerivationFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn instantiate(&self, var1: &VarInfo, var2: &VarInfo) -> Vec<Derivation>;
}

/// Registry of the derivation rules used by a context.
#[derive(Default)]
pub struct DerivationCatalog {
    unary: Vec<Box<dyn UnaryDerivationFactory>>,
    binary: Vec<Box<dyn BinaryDerivationFactory>>,
}

impl fmt::Debug for DerivationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivationCatalog")
            .field("unary", &self.unary.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("binary", &self.binary.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl DerivationCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in rule.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.unary.push(Box::new(rules::SequenceLength));
        catalog.unary.push(Box::new(rules::SequenceExtremity));
        catalog.unary.push(Box::new(rules::SequenceMinMaxSum));
        catalog.binary.push(Box::new(rules::SequenceScalarSubscript));
        catalog.binary.push(Box::new(rules::SequenceSetOps));
        catalog.binary.push(Box::new(rules::SequenceConcat));
        catalog.binary.push(Box::new(rules::SequencesJoin));
        catalog
    }

    /// Built-in rules minus the ones disabled by `config`.
    pub fn from_config(config: &InferenceConfig) -> Self {
        let disabled = &config.disabled_derivations;
        Self::standard().retain(|name| !disabled.iter().any(|d| d == name))
    }

    /// Keep only the rules whose name satisfies `keep`.
    pub fn retain(mut self, keep: impl Fn(&str) -> bool) -> Self {
        self.unary.retain(|r| keep(r.name()));
        self.binary.retain(|r| keep(r.name()));
        self
    }

    fn contains(&self, name: &str) -> bool {
        self.unary.iter().any(|r| r.name() == name) || self.binary.iter().any(|r| r.name() == name)
    }

    pub fn register_unary(&mut self, rule: Box<dyn UnaryDerivationFactory>) -> InferResult<()> {
        if self.contains(rule.name()) {
            return Err(InferError::DuplicateDerivationRule(rule.name().to_string()));
        }
        self.unary.push(rule);
        Ok(())
    }

    pub fn register_binary(&mut self, rule: Box<dyn BinaryDerivationFactory>) -> InferResult<()> {
        if self.contains(rule.name()) {
            return Err(InferError::DuplicateDerivationRule(rule.name().to_string()));
        }
        self.binary.push(rule);
        Ok(())
    }

    pub fn unary(&self) -> impl Iterator<Item = &dyn UnaryDerivationFactory> {
        self.unary.iter().map(|r| r.as_ref())
    }

    pub fn binary(&self) -> impl Iterator<Item = &dyn BinaryDerivationFactory> {
        self.binary.iter().map(|r| r.as_ref())
    }
}

/// Knobs of a derivation pass.
#[derive(Debug, Clone, Copy)]
pub struct DeriveSettings<'a> {
    pub max_depth: usize,
    /// Derived variables whose name matches are dropped.
    pub omit: Option<&'a Regex>,
}

impl Default for DeriveSettings<'_> {
    fn default() -> Self {
        Self {
            max_depth: crate::magic::DEFAULT_MAX_DERIVATION_DEPTH,
            omit: None,
        }
    }
}

/// Whether `var` may serve as the base of a further derivation.
pub fn worth_deriving_from(var: &VarInfo, max_depth: usize) -> bool {
    var.derived_depth() < max_depth
}

/// One derivation pass over `range` of `catalog`.
///
/// Unary rules apply to every variable of the range; binary rules apply to
/// every ordered pair `(i1, i2)`, `i1 < i2`, with at least one member in the
/// range. Variables that are not worth deriving from are skipped, as are
/// results whose name matches the omission pattern.
pub fn derive_pass(
    catalog: &VarCatalog,
    range: Range<usize>,
    rules: &DerivationCatalog,
    settings: DeriveSettings<'_>,
) -> Vec<Derivation> {
    let Range { start: min, end: limit } = range;
    debug_assert!(min <= limit && limit <= catalog.len());

    let worth = |i: usize| worth_deriving_from(&catalog[VarIndex(i)], settings.max_depth);
    let mut result = Vec::new();
    let keep = |d: Derivation, result: &mut Vec<Derivation>| match settings.omit {
        Some(re) if re.is_match(&d.name) => debug!("Omitting derived variable `{}`", d.name),
        _ => result.push(d),
    };

    for i in (min..limit).filter(|&i| worth(i)) {
        let var = &catalog[VarIndex(i)];
        for rule in rules.unary() {
            for d in rule.instantiate(var) {
                keep(d, &mut result);
            }
        }
    }

    for i1 in (0..catalog.len()).filter(|&i| worth(i)) {
        let target = if (min..limit).contains(&i1) {
            (i1 + 1)..catalog.len()
        } else {
            (i1 + 1).max(min)..limit
        };

        for i2 in target.filter(|&i| worth(i)) {
            let (v1, v2) = (&catalog[VarIndex(i1)], &catalog[VarIndex(i2)]);
            for rule in rules.binary() {
                for d in rule.instantiate(v1, v2) {
                    keep(d, &mut result);
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VarCatalog {
        VarCatalog::new([
            VarInfo::new("a", RepType::IntSeq).with_aux(VarAux::HAS_ORDER),
            VarInfo::new("i", RepType::Int),
        ])
    }

    #[test]
    fn first_pass_derives_from_observed_variables() {
        let cat = catalog();
        let derived = derive_pass(&cat, 0..cat.len(), &DerivationCatalog::standard(), DeriveSettings::default());
        let names: Vec<_> = derived.iter().map(|d| d.name.as_str()).collect();

        for expected in ["size(a)", "a[0]", "a[-1]", "min(a)", "max(a)", "sum(a)", "a[i]", "a[i-1]"] {
            assert!(names.contains(&expected), "missing {expected} in {names:?}");
        }
    }

    #[test]
    fn pairs_outside_the_range_are_skipped() {
        let cat = catalog();
        let derived = derive_pass(&cat, 2..2, &DerivationCatalog::standard(), DeriveSettings::default());
        assert!(derived.is_empty());
    }

    #[test]
    fn omission_pattern_filters_names() {
        let cat = catalog();
        let re = Regex::new(r"^a\[").unwrap();
        let settings = DeriveSettings {
            omit: Some(&re),
            ..Default::default()
        };
        let derived = derive_pass(&cat, 0..cat.len(), &DerivationCatalog::standard(), settings);
        assert!(!derived.is_empty());
        assert!(derived.iter().all(|d| !d.name.starts_with("a[")));
    }

    #[test]
    fn disabled_rules_are_not_consulted() {
        let conf = InferenceConfig {
            disabled_derivations: vec!["size".into(), "subscript".into()],
            ..Default::default()
        };
        let cat = catalog();
        let derived = derive_pass(&cat, 0..cat.len(), &DerivationCatalog::from_config(&conf), DeriveSettings::default());
        assert!(derived.iter().all(|d| d.rule != "size" && d.rule != "subscript"));
    }

    #[test]
    fn duplicate_rules_are_rejected() {
        let mut catalog = DerivationCatalog::standard();
        assert!(matches!(
            catalog.register_unary(Box::new(rules::SequenceLength)),
            Err(InferError::DuplicateDerivationRule(_))
        ));
    }

    #[test]
    fn depth_grows_with_bases() {
        let mut cat = catalog();
        let derived = derive_pass(&cat, 0..cat.len(), &DerivationCatalog::standard(), DeriveSettings::default());
        let infos: Vec<_> = derived.iter().map(|d| d.to_var_info(&cat)).collect();
        assert!(infos.iter().all(|v| v.derived_depth() == 1));
        cat.append(infos);
        assert!(!worth_deriving_from(&cat[VarIndex(2)], 1));
        assert!(worth_deriving_from(&cat[VarIndex(2)], 2));
    }
}
