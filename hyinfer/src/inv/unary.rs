//! Invariants over a single variable.

use crate::{
    inv::{FormulaKey, Invariant, InvariantFactory, InvariantStatus, Notation, render_constant},
    magic::{MAX_ONE_OF_ELEMENTS, MIN_JUSTIFY_SAMPLES, REQUIRED_SAMPLES_AT_BOUND},
    sample::{ModState, Value},
    var::{RepType, VarInfo},
};

pub const FACTORIES: &[InvariantFactory] = &[
    InvariantFactory {
        name: "OneOf",
        arity: 1,
        instantiate: OneOf::instantiate,
    },
    InvariantFactory {
        name: "LowerBound",
        arity: 1,
        instantiate: |vars| Bound::instantiate(vars, BoundSide::Lower),
    },
    InvariantFactory {
        name: "UpperBound",
        arity: 1,
        instantiate: |vars| Bound::instantiate(vars, BoundSide::Upper),
    },
    InvariantFactory {
        name: "NonZero",
        arity: 1,
        instantiate: NonZero::instantiate,
    },
    InvariantFactory {
        name: "EltOneOf",
        arity: 1,
        instantiate: EltOneOf::instantiate,
    },
    InvariantFactory {
        name: "NonEmpty",
        arity: 1,
        instantiate: NonEmpty::instantiate,
    },
];

fn join_values(values: &[Value], hashcode: bool) -> String {
    values
        .iter()
        .map(|v| render_constant(v, hashcode))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The variable only takes a handful of distinct values.
#[derive(Debug, Clone)]
pub struct OneOf {
    rep_type: RepType,
    elts: Vec<Value>,
    samples: u64,
}

impl OneOf {
    pub fn new(rep_type: RepType) -> Self {
        Self {
            rep_type,
            elts: Vec::new(),
            samples: 0,
        }
    }

    fn instantiate(vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        vec![Box::new(Self::new(vars[0].rep_type))]
    }

    /// Observed values, sorted.
    pub fn elements(&self) -> &[Value] {
        &self.elts
    }

    fn is_single(&self, value: &Value) -> bool {
        self.elts.len() == 1 && &self.elts[0] == value
    }

    fn is_only_empty_sequence(&self) -> bool {
        self.elts.len() == 1 && self.elts[0].seq_len() == Some(0)
    }
}

impl Invariant for OneOf {
    fn kind(&self) -> &'static str {
        "OneOf"
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        let value = values[0];
        if !self.elts.contains(value) {
            if self.elts.len() == MAX_ONE_OF_ELEMENTS {
                return InvariantStatus::Falsified;
            }
            self.elts.push(value.clone());
            self.elts
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        }
        self.samples += count as u64;
        InvariantStatus::Alive
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.samples >= MIN_JUSTIFY_SAMPLES && (self.elts.len() as u64) < self.samples
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(self.kind(), join_values(&self.elts, self.rep_type.is_hashcode()))
    }

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool {
        if let Some(other) = other.downcast_ref::<OneOf>() {
            return !self.elts.is_empty()
                && !other.elts.is_empty()
                && self.elts.iter().all(|v| !other.elts.contains(v));
        }
        if other.is::<NonZero>() {
            return self.is_single(&Value::Int(0));
        }
        if other.is::<NonEmpty>() {
            return self.is_only_empty_sequence();
        }
        false
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        let hashcode = self.rep_type.is_hashcode();
        let x = names[0];
        match (notation, self.elts.as_slice()) {
            (_, []) => None,
            (Notation::Daikon, [v]) => Some(format!("{} == {}", x, render_constant(v, hashcode))),
            (Notation::Daikon, elts) => Some(format!("{} one of {{ {} }}", x, join_values(elts, hashcode))),
            (Notation::Simplify, _) if !self.rep_type.is_integral() => None,
            (Notation::Simplify, [v]) => Some(format!("(EQ {} {})", x, render_constant(v, hashcode))),
            (Notation::Simplify, elts) => Some(format!(
                "(OR {})",
                elts.iter()
                    .map(|v| format!("(EQ {} {})", x, render_constant(v, hashcode)))
                    .collect::<Vec<_>>()
                    .join(" ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// `x >= c` or `x <= c`, where `c` is the observed extremum.
///
/// A bound never falsifies: it widens to the new extremum instead. It is only
/// justified once enough samples sit exactly on it.
#[derive(Debug, Clone)]
pub struct Bound {
    side: BoundSide,
    extremum: Option<i64>,
    at_extremum: u64,
    samples: u64,
}

impl Bound {
    pub fn new(side: BoundSide) -> Self {
        Self {
            side,
            extremum: None,
            at_extremum: 0,
            samples: 0,
        }
    }

    fn instantiate(vars: &[&VarInfo], side: BoundSide) -> Vec<Box<dyn Invariant>> {
        if vars[0].rep_type != RepType::Int {
            return vec![];
        }
        vec![Box::new(Self::new(side))]
    }

    pub fn side(&self) -> BoundSide {
        self.side
    }

    pub fn extremum(&self) -> Option<i64> {
        self.extremum
    }
}

impl Invariant for Bound {
    fn kind(&self) -> &'static str {
        match self.side {
            BoundSide::Lower => "LowerBound",
            BoundSide::Upper => "UpperBound",
        }
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        let Some(v) = values[0].as_int() else {
            return InvariantStatus::Falsified;
        };

        let side = self.side;
        let beyond = |current: i64| match side {
            BoundSide::Lower => v < current,
            BoundSide::Upper => v > current,
        };
        let extremum = self.extremum;
        match extremum {
            Some(current) if v == current => self.at_extremum += count as u64,
            Some(current) if !beyond(current) => {}
            _ => {
                self.extremum = Some(v);
                self.at_extremum = count as u64;
            }
        }
        self.samples += count as u64;
        InvariantStatus::Alive
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.at_extremum >= REQUIRED_SAMPLES_AT_BOUND
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(
            self.kind(),
            self.extremum.map(|c| c.to_string()).unwrap_or_default(),
        )
    }

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool {
        let Some(other) = other.downcast_ref::<Bound>() else {
            return false;
        };
        match (self.side, other.side, self.extremum, other.extremum) {
            (BoundSide::Lower, BoundSide::Upper, Some(lo), Some(hi))
            | (BoundSide::Upper, BoundSide::Lower, Some(hi), Some(lo)) => lo > hi,
            _ => false,
        }
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        let c = self.extremum?;
        let op = match self.side {
            BoundSide::Lower => ">=",
            BoundSide::Upper => "<=",
        };
        Some(match notation {
            Notation::Daikon => format!("{} {} {}", names[0], op, c),
            Notation::Simplify => format!("({} {} {})", op, names[0], c),
        })
    }
}

/// `x != 0` (`x != null` for object identities).
#[derive(Debug, Clone)]
pub struct NonZero {
    hashcode: bool,
    samples: u64,
}

impl NonZero {
    fn instantiate(vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        if !vars[0].rep_type.is_integral() {
            return vec![];
        }
        vec![Box::new(NonZero {
            hashcode: vars[0].rep_type.is_hashcode(),
            samples: 0,
        })]
    }
}

impl Invariant for NonZero {
    fn kind(&self) -> &'static str {
        "NonZero"
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        match values[0].as_int() {
            Some(0) | None => InvariantStatus::Falsified,
            Some(_) => {
                self.samples += count as u64;
                InvariantStatus::Alive
            }
        }
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.samples >= MIN_JUSTIFY_SAMPLES
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(self.kind(), "")
    }

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool {
        other
            .downcast_ref::<OneOf>()
            .is_some_and(|o| o.is_single(&Value::Int(0)))
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        let zero = render_constant(&Value::Int(0), self.hashcode);
        Some(match notation {
            Notation::Daikon => format!("{} != {}", names[0], zero),
            Notation::Simplify => format!("(NEQ {} {})", names[0], zero),
        })
    }
}

/// Every element of the sequence is one of a handful of values.
#[derive(Debug, Clone)]
pub struct EltOneOf {
    elts: Vec<Value>,
    samples: u64,
}

impl EltOneOf {
    fn instantiate(vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        if !vars[0].rep_type.is_array() {
            return vec![];
        }
        vec![Box::new(EltOneOf {
            elts: Vec::new(),
            samples: 0,
        })]
    }
}

impl Invariant for EltOneOf {
    fn kind(&self) -> &'static str {
        "EltOneOf"
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        let Some(items) = values[0].seq_elements() else {
            return InvariantStatus::Falsified;
        };
        for item in items {
            if !self.elts.contains(&item) {
                if self.elts.len() == MAX_ONE_OF_ELEMENTS {
                    return InvariantStatus::Falsified;
                }
                self.elts.push(item);
            }
        }
        self.elts
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.samples += count as u64;
        InvariantStatus::Alive
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.samples >= MIN_JUSTIFY_SAMPLES && !self.elts.is_empty()
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(self.kind(), join_values(&self.elts, false))
    }

    fn is_exclusive_with(&self, _other: &dyn Invariant) -> bool {
        false
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        match (notation, self.elts.as_slice()) {
            (Notation::Simplify, _) | (_, []) => None,
            (Notation::Daikon, [v]) => Some(format!("{}[] elements == {}", names[0], v)),
            (Notation::Daikon, elts) => Some(format!(
                "{}[] elements one of {{ {} }}",
                names[0],
                join_values(elts, false)
            )),
        }
    }
}

/// The sequence always holds at least one element.
#[derive(Debug, Clone)]
pub struct NonEmpty {
    samples: u64,
}

impl NonEmpty {
    fn instantiate(vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        if !vars[0].rep_type.is_array() {
            return vec![];
        }
        vec![Box::new(NonEmpty { samples: 0 })]
    }
}

impl Invariant for NonEmpty {
    fn kind(&self) -> &'static str {
        "NonEmpty"
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        match values[0].seq_len() {
            Some(n) if n > 0 => {
                self.samples += count as u64;
                InvariantStatus::Alive
            }
            _ => InvariantStatus::Falsified,
        }
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.samples >= MIN_JUSTIFY_SAMPLES
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(self.kind(), "")
    }

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool {
        other
            .downcast_ref::<OneOf>()
            .is_some_and(OneOf::is_only_empty_sequence)
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        match notation {
            Notation::Daikon => Some(format!("size({}) >= 1", names[0])),
            Notation::Simplify => None,
        }
    }
}
