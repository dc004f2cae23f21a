//! Variable descriptors and the per-point variable catalog.
//!
//! ## Core concepts
//! * [`VarInfo`] – Name, representation type and provenance of one variable.
//! * [`VarCatalog`] – Append-only, ordered list of the variables of a program
//!   point. The position of a variable in its catalog is its [`VarIndex`];
//!   non-constant variables additionally own a *value index*, the slot that
//!   carries their value in a [`Sample`].
//!
//! Static constants never occupy a sample slot: their value is stored on the
//! descriptor itself. Variables appended after construction (derived
//! variables) are never static constants, so their value index is simply
//! `index - num_static_constants`.

use std::{collections::BTreeSet, fmt, ops::Index};

use bitflags::bitflags;
use smallvec::SmallVec;
use strum::{Display, EnumIs};

use crate::sample::{ModState, Sample, Value};

/// Position of a variable inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(pub usize);

impl fmt::Display for VarIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Representation type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum RepType {
    Int,
    /// Object identity; `0` stands for `null`.
    Hashcode,
    Float,
    Str,
    IntSeq,
    FloatSeq,
    StrSeq,
}

impl RepType {
    pub fn is_array(self) -> bool {
        matches!(self, RepType::IntSeq | RepType::FloatSeq | RepType::StrSeq)
    }

    /// Integral scalar (plain integers and object identities).
    pub fn is_integral(self) -> bool {
        matches!(self, RepType::Int | RepType::Hashcode)
    }

    /// Element type of a sequence type.
    pub fn element(self) -> Option<RepType> {
        match self {
            RepType::IntSeq => Some(RepType::Int),
            RepType::FloatSeq => Some(RepType::Float),
            RepType::StrSeq => Some(RepType::Str),
            _ => None,
        }
    }

    /// Whether a value may legally be observed for a variable of this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (RepType::Int | RepType::Hashcode, Value::Int(_))
                | (RepType::Float, Value::Float(_))
                | (RepType::Str, Value::Str(_))
                | (RepType::IntSeq, Value::IntSeq(_))
                | (RepType::FloatSeq, Value::FloatSeq(_))
                | (RepType::StrSeq, Value::StrSeq(_))
        )
    }

    /// Whether variables of the two types may be related by one invariant.
    pub fn comparable(self, other: RepType) -> bool {
        self == other
            || matches!(
                (self, other),
                (RepType::Int, RepType::Float) | (RepType::Float, RepType::Int)
            )
    }
}

bitflags! {
    /// Auxiliary facts about a variable supplied by the front end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarAux: u32 {
        /// The variable is a formal parameter of the procedure.
        const IS_PARAM = 1 << 0;
        /// The sequence has a meaningful element order.
        const HAS_ORDER = 1 << 1;
        /// The sequence may contain duplicate elements.
        const HAS_DUPLICATES = 1 << 2;
        /// The variable may be `null`.
        const HAS_NULL = 1 << 3;
    }
}

/// Provenance of a derived variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFrom {
    /// Name of the derivation rule that produced the variable.
    pub rule: &'static str,
    pub bases: SmallVec<VarIndex, 2>,
    /// One more than the deepest base.
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct VarInfo {
    pub name: String,
    pub rep_type: RepType,
    pub aux: VarAux,
    index: VarIndex,
    value_index: Option<usize>,
    static_value: Option<Value>,
    derived: Option<DerivedFrom>,
}

impl VarInfo {
    pub fn new(name: impl Into<String>, rep_type: RepType) -> Self {
        Self {
            name: name.into(),
            rep_type,
            aux: VarAux::empty(),
            index: VarIndex(0),
            value_index: None,
            static_value: None,
            derived: None,
        }
    }

    /// A variable with the same value at every sample of its program point.
    pub fn static_constant(name: impl Into<String>, rep_type: RepType, value: Value) -> Self {
        Self {
            static_value: Some(value),
            ..Self::new(name, rep_type)
        }
    }

    pub(crate) fn derived(
        name: impl Into<String>,
        rep_type: RepType,
        aux: VarAux,
        from: DerivedFrom,
    ) -> Self {
        Self {
            aux,
            derived: Some(from),
            ..Self::new(name, rep_type)
        }
    }

    pub fn with_aux(mut self, aux: VarAux) -> Self {
        self.aux |= aux;
        self
    }

    pub fn index(&self) -> VarIndex {
        self.index
    }

    /// Sample slot carrying this variable's value; `None` for static constants.
    pub fn value_index(&self) -> Option<usize> {
        self.value_index
    }

    pub fn is_static_constant(&self) -> bool {
        self.static_value.is_some()
    }

    pub fn static_value(&self) -> Option<&Value> {
        self.static_value.as_ref()
    }

    pub fn derived_from(&self) -> Option<&DerivedFrom> {
        self.derived.as_ref()
    }

    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    /// Zero for observed variables.
    pub fn derived_depth(&self) -> usize {
        self.derived.as_ref().map_or(0, |d| d.depth)
    }

    pub fn is_param(&self) -> bool {
        self.aux.contains(VarAux::IS_PARAM)
    }

    pub fn compatible(&self, other: &VarInfo) -> bool {
        self.rep_type.comparable(other.rep_type)
    }
}

/// Ordered, append-only list of the variables of one program point.
#[derive(Debug, Clone, Default)]
pub struct VarCatalog {
    vars: Vec<VarInfo>,
    num_static_constants: usize,
}

impl VarCatalog {
    pub fn new(vars: impl IntoIterator<Item = VarInfo>) -> Self {
        let mut catalog = Self::default();
        for mut var in vars {
            var.index = VarIndex(catalog.vars.len());
            if var.is_static_constant() {
                var.value_index = None;
                catalog.num_static_constants += 1;
            } else {
                var.value_index = Some(catalog.vars.len() - catalog.num_static_constants);
            }
            catalog.vars.push(var);
        }
        catalog
    }

    /// Append non-constant variables, returning the index of the first one.
    ///
    /// Callers guarantee no static constant is part of `vars`.
    pub(crate) fn append(&mut self, vars: impl IntoIterator<Item = VarInfo>) -> usize {
        let start = self.vars.len();
        for mut var in vars {
            debug_assert!(!var.is_static_constant());
            let index = self.vars.len();
            var.index = VarIndex(index);
            var.value_index = Some(index - self.num_static_constants);
            self.vars.push(var);
        }
        start
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn num_static_constants(&self) -> usize {
        self.num_static_constants
    }

    /// Number of sample slots a sample of this catalog carries.
    pub fn value_count(&self) -> usize {
        self.vars.len() - self.num_static_constants
    }

    pub fn get(&self, index: VarIndex) -> Option<&VarInfo> {
        self.vars.get(index.0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VarInfo> {
        self.vars.iter()
    }

    pub fn index_of(&self, name: &str) -> Option<VarIndex> {
        self.vars.iter().position(|v| v.name == name).map(VarIndex)
    }

    /// Names of the formal parameters.
    pub fn param_vars(&self) -> BTreeSet<&str> {
        self.vars
            .iter()
            .filter(|v| v.is_param())
            .map(|v| v.name.as_str())
            .collect()
    }

    pub fn num_array_vars(&self) -> usize {
        self.vars.iter().filter(|v| v.rep_type.is_array()).count()
    }

    pub fn names(&self, vars: &[VarIndex]) -> SmallVec<&str, 3> {
        vars.iter()
            .map(|&v| self[v].name.as_str())
            .collect()
    }

    /// Value of `var` in `sample`, resolving static constants.
    pub fn value_in<'s>(&'s self, sample: &'s Sample, var: VarIndex) -> Option<(&'s Value, ModState)> {
        let info = self.get(var)?;
        match (&info.static_value, info.value_index) {
            (Some(value), _) => Some((value, ModState::Unmodified)),
            (None, Some(slot)) => sample.slot(slot),
            (None, None) => None,
        }
    }
}

impl Index<VarIndex> for VarCatalog {
    type Output = VarInfo;

    fn index(&self, index: VarIndex) -> &Self::Output {
        &self.vars[index.0]
    }
}

impl<'a> IntoIterator for &'a VarCatalog {
    type Item = &'a VarInfo;
    type IntoIter = std::slice::Iter<'a, VarInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}
