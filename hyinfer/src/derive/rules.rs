//! Built-in derivation rules.

use crate::{
    derive::{BinaryDerivationFactory, Derivation, UnaryDerivationFactory},
    sample::Value,
    var::{RepType, VarAux, VarInfo},
};

/// `size(a)` for every sequence `a`.
pub struct SequenceLength;

impl UnaryDerivationFactory for SequenceLength {
    fn name(&self) -> &'static str {
        "size"
    }

    fn instantiate(&self, var: &VarInfo) -> Vec<Derivation> {
        if !var.rep_type.is_array() {
            return vec![];
        }

        vec![Derivation::new(
            self.name(),
            format!("size({})", var.name),
            RepType::Int,
            [var.index()],
            |v| v[0].seq_len().map(|n| Value::Int(n as i64)),
        )]
    }
}

/// `a[0]` and `a[-1]` for every sequence `a`; missing when `a` is empty.
pub struct SequenceExtremity;

impl UnaryDerivationFactory for SequenceExtremity {
    fn name(&self) -> &'static str {
        "extremity"
    }

    fn instantiate(&self, var: &VarInfo) -> Vec<Derivation> {
        let Some(elt) = var.rep_type.element() else {
            return vec![];
        };

        vec![
            Derivation::new(self.name(), format!("{}[0]", var.name), elt, [var.index()], |v| {
                v[0].seq_element(0)
            }),
            Derivation::new(self.name(), format!("{}[-1]", var.name), elt, [var.index()], |v| {
                let len = v[0].seq_len()?;
                v[0].seq_element(len.checked_sub(1)?)
            }),
        ]
    }
}

/// `min(a)`, `max(a)` and `sum(a)` for integer sequences.
pub struct SequenceMinMaxSum;

impl UnaryDerivationFactory for SequenceMinMaxSum {
    fn name(&self) -> &'static str {
        "min_max_sum"
    }

    fn instantiate(&self, var: &VarInfo) -> Vec<Derivation> {
        if var.rep_type != RepType::IntSeq {
            return vec![];
        }

        let base = [var.index()];
        vec![
            Derivation::new(self.name(), format!("min({})", var.name), RepType::Int, base, |v| {
                v[0].as_int_seq()?.iter().min().copied().map(Value::Int)
            }),
            Derivation::new(self.name(), format!("max({})", var.name), RepType::Int, base, |v| {
                v[0].as_int_seq()?.iter().max().copied().map(Value::Int)
            }),
            Derivation::new(self.name(), format!("sum({})", var.name), RepType::Int, base, |v| {
                v[0]
                    .as_int_seq()?
                    .iter()
                    .try_fold(0i64, |acc, x| acc.checked_add(*x))
                    .map(Value::Int)
            }),
        ]
    }
}

/// `a[i]` and `a[i-1]` for a sequence `a` and an integer `i`, in either
/// catalog order. Out-of-range subscripts yield a missing value.
pub struct SequenceScalarSubscript;

impl SequenceScalarSubscript {
    fn subscripts(&self, seq: &VarInfo, idx: &VarInfo) -> Vec<Derivation> {
        let Some(elt) = seq.rep_type.element() else {
            return vec![];
        };
        if idx.rep_type != RepType::Int {
            return vec![];
        }

        let bases = [seq.index(), idx.index()];
        let mut result = Vec::with_capacity(2);

        // a[size(a)] is always out of bounds
        let is_own_size = idx
            .derived_from()
            .is_some_and(|d| d.rule == "size" && d.bases.first() == Some(&seq.index()));
        if !is_own_size {
            result.push(Derivation::new(
                self.name(),
                format!("{}[{}]", seq.name, idx.name),
                elt,
                bases,
                |v| subscript(v[0], v[1], 0),
            ));
        }

        result.push(Derivation::new(
            self.name(),
            format!("{}[{}-1]", seq.name, idx.name),
            elt,
            bases,
            |v| subscript(v[0], v[1], -1),
        ));
        result
    }
}

fn subscript(seq: &Value, index: &Value, shift: i64) -> Option<Value> {
    let i = index.as_int()?.checked_add(shift)?;
    seq.seq_element(usize::try_from(i).ok()?)
}

impl BinaryDerivationFactory for SequenceScalarSubscript {
    fn name(&self) -> &'static str {
        "subscript"
    }

    fn instantiate(&self, var1: &VarInfo, var2: &VarInfo) -> Vec<Derivation> {
        if var1.rep_type.is_array() {
            self.subscripts(var1, var2)
        } else {
            self.subscripts(var2, var1)
        }
    }
}

/// `intersect(a, b)` and `union(a, b)` for two sequences of the same integer
/// or string type. Results are sorted and free of duplicates.
pub struct SequenceSetOps;

impl BinaryDerivationFactory for SequenceSetOps {
    fn name(&self) -> &'static str {
        "set_ops"
    }

    fn instantiate(&self, var1: &VarInfo, var2: &VarInfo) -> Vec<Derivation> {
        if var1.rep_type != var2.rep_type
            || !matches!(var1.rep_type, RepType::IntSeq | RepType::StrSeq)
        {
            return vec![];
        }

        let bases = [var1.index(), var2.index()];
        vec![
            Derivation::new(
                self.name(),
                format!("intersect({}, {})", var1.name, var2.name),
                var1.rep_type,
                bases,
                |v| set_op(v[0], v[1], true),
            ),
            Derivation::new(
                self.name(),
                format!("union({}, {})", var1.name, var2.name),
                var1.rep_type,
                bases,
                |v| set_op(v[0], v[1], false),
            ),
        ]
    }
}

fn sorted_set<T: Ord + Clone>(a: &[T], b: &[T], intersect: bool) -> Vec<T> {
    let mut out: Vec<T> = if intersect {
        a.iter().filter(|x| b.contains(*x)).cloned().collect()
    } else {
        a.iter().chain(b).cloned().collect()
    };
    out.sort();
    out.dedup();
    out
}

fn set_op(a: &Value, b: &Value, intersect: bool) -> Option<Value> {
    match (a, b) {
        (Value::IntSeq(a), Value::IntSeq(b)) => Some(Value::IntSeq(sorted_set(a, b, intersect))),
        (Value::StrSeq(a), Value::StrSeq(b)) => Some(Value::StrSeq(sorted_set(a, b, intersect))),
        _ => None,
    }
}

/// `concat(a, b)` for two sequences of the same type.
pub struct SequenceConcat;

impl BinaryDerivationFactory for SequenceConcat {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn instantiate(&self, var1: &VarInfo, var2: &VarInfo) -> Vec<Derivation> {
        if var1.rep_type != var2.rep_type || !var1.rep_type.is_array() {
            return vec![];
        }

        let aux = (var1.aux & var2.aux) & VarAux::HAS_ORDER;
        vec![
            Derivation::new(
                self.name(),
                format!("concat({}, {})", var1.name, var2.name),
                var1.rep_type,
                [var1.index(), var2.index()],
                |v| match (v[0], v[1]) {
                    (Value::IntSeq(a), Value::IntSeq(b)) => Some(Value::IntSeq([a.as_slice(), b.as_slice()].concat())),
                    (Value::FloatSeq(a), Value::FloatSeq(b)) => {
                        Some(Value::FloatSeq([a.as_slice(), b.as_slice()].concat()))
                    }
                    (Value::StrSeq(a), Value::StrSeq(b)) => Some(Value::StrSeq([a.as_slice(), b.as_slice()].concat())),
                    _ => None,
                },
            )
            .with_aux(aux),
        ]
    }
}

/// `join(a, b)`: element-wise pairing of two ordered sequences of equal
/// length, rendered as `x:y` strings. Missing when the lengths differ.
pub struct SequencesJoin;

impl BinaryDerivationFactory for SequencesJoin {
    fn name(&self) -> &'static str {
        "join"
    }

    fn instantiate(&self, var1: &VarInfo, var2: &VarInfo) -> Vec<Derivation> {
        let ordered = |v: &VarInfo| v.rep_type.is_array() && v.aux.contains(VarAux::HAS_ORDER);
        if !ordered(var1) || !ordered(var2) {
            return vec![];
        }

        vec![
            Derivation::new(
                self.name(),
                format!("join({}, {})", var1.name, var2.name),
                RepType::StrSeq,
                [var1.index(), var2.index()],
                |v| {
                    let (a, b) = (v[0].seq_elements()?, v[1].seq_elements()?);
                    (a.len() == b.len()).then(|| {
                        Value::StrSeq(
                            a.iter()
                                .zip(&b)
                                .map(|(x, y)| format!("{}:{}", x, y))
                                .collect(),
                        )
                    })
                },
            )
            .with_aux(VarAux::HAS_ORDER),
        ]
    }
}
