//! The invariant contract and the catalog of invariant kinds.
//!
//! An invariant is a candidate property of a tuple of variables. It is fed
//! projected sample tuples and is either still alive or falsified; once
//! falsified it is discarded by its slice. Invariants never learn about the
//! program point they live in: names are supplied at rendering time.
//!
//! ## Core concepts
//! * [`Invariant`] – Object-safe contract implemented by every kind.
//! * [`FormulaKey`] – Formula identity: two invariants with equal keys state
//!   the same property (up to variable names).
//! * [`InvariantCatalog`] – Constructors consulted when a slice is created.
//! * [`Notation`] – Output language of [`Invariant::render`].

pub mod binary;
pub mod ternary;
pub mod unary;

use std::fmt;

use downcast_rs::{Downcast, impl_downcast};
use strum::{Display, EnumIs};

use crate::{
    sample::{ModState, Value},
    utils::{
        conf::InferenceConfig,
        error::{InferError, InferResult},
    },
    var::VarInfo,
};

pub use binary::CmpOp;

/// Result of feeding one sample tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum InvariantStatus {
    Alive,
    Falsified,
}

/// Output language of rendered invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum Notation {
    /// Human readable form, e.g. `x == y`.
    Daikon,
    /// Prefix form accepted by the redundancy prover, e.g. `(EQ x y)`.
    Simplify,
}

impl Notation {
    /// Spelling of a variable name in this notation.
    pub fn name(self, name: &str) -> String {
        match self {
            Notation::Daikon => name.to_string(),
            Notation::Simplify
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                name.to_string()
            }
            Notation::Simplify => format!("|{}|", name.replace('|', "\\|")),
        }
    }
}

/// Formula identity of an invariant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormulaKey {
    pub kind: &'static str,
    /// Kind-specific parameters (constants, coefficients, ...).
    pub detail: String,
}

impl FormulaKey {
    pub fn new(kind: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FormulaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}({})", self.kind, self.detail)
        }
    }
}

/// Candidate property over the variables of one slice.
///
/// ### Required methods
/// * `add_sample` – Feed one projected tuple `count` times. Values come in
///   slice order; a missing tuple is never fed.
/// * `is_justified` – Whether enough evidence was gathered to report it.
/// * `formula_identity` – Parameters that distinguish it from other
///   invariants of the same kind.
/// * `is_exclusive_with` – Whether both invariants can never hold at the same
///   time on the same variables. Must be symmetric.
/// * `render` – Text of the invariant in the given notation, or `None` when
///   the notation cannot express it.
pub trait Invariant: Downcast + fmt::Debug {
    fn kind(&self) -> &'static str;

    fn add_sample(&mut self, values: &[&Value], mod_state: ModState, count: u32) -> InvariantStatus;

    fn num_samples(&self) -> u64;

    fn is_justified(&self) -> bool;

    fn formula_identity(&self) -> FormulaKey;

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool;

    fn render(&self, names: &[&str], notation: Notation) -> Option<String>;

    /// Equality invariants are expanded into equivalence classes before
    /// redundancy checking.
    fn is_equality(&self) -> bool {
        false
    }
}
impl_downcast!(Invariant);

/// Constructor of the invariants of one kind for a tuple of variables.
///
/// Returns no invariant when the kind does not apply to the given types.
pub type InstantiateFn = fn(&[&VarInfo]) -> Vec<Box<dyn Invariant>>;

#[derive(Clone, Copy)]
pub struct InvariantFactory {
    pub name: &'static str,
    pub arity: usize,
    pub instantiate: InstantiateFn,
}

impl fmt::Debug for InvariantFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvariantFactory({}/{})", self.name, self.arity)
    }
}

/// Registry of invariant kinds.
#[derive(Debug, Clone, Default)]
pub struct InvariantCatalog {
    factories: Vec<InvariantFactory>,
}

impl InvariantCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in kind.
    pub fn standard() -> Self {
        let factories = unary::FACTORIES
            .iter()
            .chain(binary::FACTORIES)
            .chain(ternary::FACTORIES)
            .copied()
            .collect();
        Self { factories }
    }

    /// Built-in kinds minus the ones disabled by `config`. Ternary kinds are
    /// dropped when `disable_ternary_invariants` is set.
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::standard().retain(|f| {
            !config.disabled_invariants.iter().any(|d| d == f.name)
                && !(config.disable_ternary_invariants && f.arity == 3)
        })
    }

    pub fn retain(mut self, keep: impl Fn(&InvariantFactory) -> bool) -> Self {
        self.factories.retain(|f| keep(f));
        self
    }

    pub fn register(&mut self, factory: InvariantFactory) -> InferResult<()> {
        if self.factories.iter().any(|f| f.name == factory.name) {
            return Err(InferError::DuplicateInvariantKind(factory.name.to_string()));
        }
        self.factories.push(factory);
        Ok(())
    }

    pub fn factories(&self) -> &[InvariantFactory] {
        &self.factories
    }

    pub fn has_arity(&self, arity: usize) -> bool {
        self.factories.iter().any(|f| f.arity == arity)
    }

    /// Fresh invariants of every applicable kind for `vars`.
    pub fn instantiate(&self, vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        self.factories
            .iter()
            .filter(|f| f.arity == vars.len())
            .flat_map(|f| (f.instantiate)(vars))
            .collect()
    }
}

/// Rendering of a constant in either notation.
pub(crate) fn render_constant(value: &Value, hashcode: bool) -> String {
    match value {
        Value::Int(0) if hashcode => "null".to_string(),
        v => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::{RepType, VarCatalog, VarIndex};

    #[test]
    fn simplify_names_are_quoted_when_needed() {
        assert_eq!(Notation::Simplify.name("x_1"), "x_1");
        assert_eq!(Notation::Simplify.name("size(a)"), "|size(a)|");
        assert_eq!(Notation::Daikon.name("size(a)"), "size(a)");
    }

    #[test]
    fn catalog_instantiates_by_arity() {
        let cat = VarCatalog::new([VarInfo::new("x", RepType::Int), VarInfo::new("y", RepType::Int)]);
        let invs = InvariantCatalog::standard();
        let x = &cat[VarIndex(0)];
        let y = &cat[VarIndex(1)];

        let unary: Vec<_> = invs.instantiate(&[x]).iter().map(|i| i.kind()).collect();
        assert!(unary.contains(&"OneOf"));
        assert!(unary.contains(&"LowerBound"));

        let binary: Vec<_> = invs.instantiate(&[x, y]).iter().map(|i| i.kind()).collect();
        assert!(binary.contains(&"IntEqual"));
        assert!(!binary.contains(&"OneOf"));
    }

    #[test]
    fn config_filters_kinds() {
        let conf = InferenceConfig {
            disabled_invariants: vec!["IntEqual".into()],
            disable_ternary_invariants: true,
            ..Default::default()
        };
        let invs = InvariantCatalog::from_config(&conf);
        assert!(!invs.has_arity(3));
        assert!(invs.factories().iter().all(|f| f.name != "IntEqual"));
    }

    #[test]
    fn duplicate_kinds_are_rejected() {
        let mut invs = InvariantCatalog::standard();
        let factory = invs.factories()[0];
        assert!(matches!(
            invs.register(factory),
            Err(InferError::DuplicateInvariantKind(_))
        ));
    }
}
