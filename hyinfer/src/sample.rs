//! Observed values and the samples that carry them.
//!
//! A [`Sample`] is one observation of a program point: one slot per
//! non-constant variable of the point's catalog, each slot holding a value
//! (absent when missing) and a [`ModState`]. Samples are immutable once built.

use std::{cmp::Ordering, fmt};

use strum::{Display, EnumIs};

/// Modification flag attached to every sample slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum ModState {
    Unmodified,
    Modified,
    /// The value could not be observed; the slot carries no value.
    Missing,
}

impl ModState {
    /// Combined state of a tuple of slots: missing wins over modified, which
    /// wins over unmodified.
    pub fn combine(self, other: ModState) -> ModState {
        match (self, other) {
            (ModState::Missing, _) | (_, ModState::Missing) => ModState::Missing,
            (ModState::Modified, _) | (_, ModState::Modified) => ModState::Modified,
            _ => ModState::Unmodified,
        }
    }
}

/// A single observed value.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    IntSeq(Vec<i64>),
    FloatSeq(Vec<f64>),
    StrSeq(Vec<String>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_seq(&self) -> Option<&[i64]> {
        match self {
            Value::IntSeq(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::IntSeq(_) | Value::FloatSeq(_) | Value::StrSeq(_))
    }

    /// Number of elements of a sequence value.
    pub fn seq_len(&self) -> Option<usize> {
        match self {
            Value::IntSeq(v) => Some(v.len()),
            Value::FloatSeq(v) => Some(v.len()),
            Value::StrSeq(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Element at `index` of a sequence value, as a scalar value.
    pub fn seq_element(&self, index: usize) -> Option<Value> {
        match self {
            Value::IntSeq(v) => v.get(index).copied().map(Value::Int),
            Value::FloatSeq(v) => v.get(index).copied().map(Value::Float),
            Value::StrSeq(v) => v.get(index).cloned().map(Value::Str),
            _ => None,
        }
    }

    /// Elements of a sequence value, as scalar values.
    pub fn seq_elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::IntSeq(v) => Some(v.iter().copied().map(Value::Int).collect()),
            Value::FloatSeq(v) => Some(v.iter().copied().map(Value::Float).collect()),
            Value::StrSeq(v) => Some(v.iter().cloned().map(Value::Str).collect()),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::IntSeq(a), Value::IntSeq(b)) => a.partial_cmp(b),
            (Value::FloatSeq(a), Value::FloatSeq(b)) => a.partial_cmp(b),
            (Value::StrSeq(a), Value::StrSeq(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn write_seq<T>(f: &mut fmt::Formatter<'_>, items: &[T], item: fn(&T) -> String) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item(v))?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::IntSeq(v) => write_seq(f, v, |x| x.to_string()),
            Value::FloatSeq(v) => write_seq(f, v, |x| x.to_string()),
            Value::StrSeq(v) => write_seq(f, v, |x| format!("{:?}", x)),
        }
    }
}

/// One observation of a program point.
///
/// Slot `i` corresponds to the variable whose value index is `i`; static
/// constants have no slot. A missing slot never carries a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    values: Box<[Option<Value>]>,
    mods: Box<[ModState]>,
}

impl Sample {
    /// Build a sample from `(value, state)` pairs. A pair whose state is
    /// [`ModState::Missing`] is stored without its value.
    pub fn new(slots: impl IntoIterator<Item = (Value, ModState)>) -> Self {
        let (values, mods): (Vec<_>, Vec<_>) = slots
            .into_iter()
            .map(|(value, state)| match state {
                ModState::Missing => (None, ModState::Missing),
                _ => (Some(value), state),
            })
            .unzip();

        Self {
            values: values.into_boxed_slice(),
            mods: mods.into_boxed_slice(),
        }
    }

    /// Sample whose every slot is modified.
    pub fn modified(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(values.into_iter().map(|v| (v, ModState::Modified)))
    }

    /// Sample of `len` missing slots.
    pub fn missing(len: usize) -> Self {
        Self {
            values: vec![None; len].into_boxed_slice(),
            mods: vec![ModState::Missing; len].into_boxed_slice(),
        }
    }

    pub(crate) fn from_slots(slots: Vec<Option<(Value, ModState)>>) -> Self {
        let (values, mods): (Vec<_>, Vec<_>) = slots
            .into_iter()
            .map(|slot| match slot {
                Some((value, state)) if !state.is_missing() => (Some(value), state),
                _ => (None, ModState::Missing),
            })
            .unzip();

        Self {
            values: values.into_boxed_slice(),
            mods: mods.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot).and_then(Option::as_ref)
    }

    pub fn mod_state(&self, slot: usize) -> ModState {
        self.mods.get(slot).copied().unwrap_or(ModState::Missing)
    }

    pub fn slot(&self, slot: usize) -> Option<(&Value, ModState)> {
        self.value(slot).map(|v| (v, self.mod_state(slot)))
    }

    pub fn slots(&self) -> impl Iterator<Item = Option<(&Value, ModState)>> + '_ {
        (0..self.len()).map(|i| self.slot(i))
    }
}
