//! Invariants over three variables.

use strum::{Display, EnumIs};

use crate::{
    inv::{FormulaKey, Invariant, InvariantFactory, InvariantStatus, Notation},
    magic::MIN_JUSTIFY_SAMPLES,
    sample::{ModState, Value},
    var::{RepType, VarInfo},
};

pub const FACTORIES: &[InvariantFactory] = &[
    InvariantFactory {
        name: "FunctionBinarySum",
        arity: 3,
        instantiate: |vars| FunctionBinary::instantiate(vars, BinaryFn::Sum),
    },
    InvariantFactory {
        name: "FunctionBinaryProduct",
        arity: 3,
        instantiate: |vars| FunctionBinary::instantiate(vars, BinaryFn::Product),
    },
    InvariantFactory {
        name: "FunctionBinaryMin",
        arity: 3,
        instantiate: |vars| FunctionBinary::instantiate(vars, BinaryFn::Min),
    },
    InvariantFactory {
        name: "FunctionBinaryMax",
        arity: 3,
        instantiate: |vars| FunctionBinary::instantiate(vars, BinaryFn::Max),
    },
];

/// Commutative integer function of two arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum BinaryFn {
    Sum,
    Product,
    Min,
    Max,
}

impl BinaryFn {
    fn apply(self, a: i64, b: i64) -> Option<i64> {
        match self {
            BinaryFn::Sum => a.checked_add(b),
            BinaryFn::Product => a.checked_mul(b),
            BinaryFn::Min => Some(a.min(b)),
            BinaryFn::Max => Some(a.max(b)),
        }
    }
}

/// `r == f(x, y)` where `r` sits at position `result` of the slice and `x`,
/// `y` are the two remaining variables in slice order.
#[derive(Debug, Clone)]
pub struct FunctionBinary {
    func: BinaryFn,
    result: usize,
    samples: u64,
}

impl FunctionBinary {
    pub fn new(func: BinaryFn, result: usize) -> Self {
        debug_assert!(result < 3);
        Self {
            func,
            result,
            samples: 0,
        }
    }

    fn instantiate(vars: &[&VarInfo], func: BinaryFn) -> Vec<Box<dyn Invariant>> {
        if vars.iter().any(|v| v.rep_type != RepType::Int) {
            return vec![];
        }
        (0..3)
            .map(|result| Box::new(Self::new(func, result)) as Box<dyn Invariant>)
            .collect()
    }

    fn arguments(&self) -> (usize, usize) {
        match self.result {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        }
    }
}

impl Invariant for FunctionBinary {
    fn kind(&self) -> &'static str {
        match self.func {
            BinaryFn::Sum => "FunctionBinarySum",
            BinaryFn::Product => "FunctionBinaryProduct",
            BinaryFn::Min => "FunctionBinaryMin",
            BinaryFn::Max => "FunctionBinaryMax",
        }
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        let (i, j) = self.arguments();
        let result = values[i]
            .as_int()
            .zip(values[j].as_int())
            .and_then(|(a, b)| self.func.apply(a, b));

        if result.is_some() && result == values[self.result].as_int() {
            self.samples += count as u64;
            InvariantStatus::Alive
        } else {
            InvariantStatus::Falsified
        }
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.samples >= MIN_JUSTIFY_SAMPLES
    }

    fn formula_identity(&self) -> FormulaKey {
        FormulaKey::new(self.kind(), format!("result={}", self.result))
    }

    fn is_exclusive_with(&self, _other: &dyn Invariant) -> bool {
        false
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        let (i, j) = self.arguments();
        let (r, x, y) = (names[self.result], names[i], names[j]);
        match (notation, self.func) {
            (Notation::Daikon, BinaryFn::Sum) => Some(format!("{} == {} + {}", r, x, y)),
            (Notation::Daikon, BinaryFn::Product) => Some(format!("{} == {} * {}", r, x, y)),
            (Notation::Daikon, BinaryFn::Min) => Some(format!("{} == min({}, {})", r, x, y)),
            (Notation::Daikon, BinaryFn::Max) => Some(format!("{} == max({}, {})", r, x, y)),
            (Notation::Simplify, BinaryFn::Sum) => Some(format!("(EQ {} (+ {} {}))", r, x, y)),
            (Notation::Simplify, BinaryFn::Product) => Some(format!("(EQ {} (* {} {}))", r, x, y)),
            (Notation::Simplify, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(inv: &mut FunctionBinary, triples: &[(i64, i64, i64)]) -> InvariantStatus {
        for &(a, b, c) in triples {
            let (a, b, c) = (Value::Int(a), Value::Int(b), Value::Int(c));
            if inv.add_sample(&[&a, &b, &c], ModState::Modified, 1).is_falsified() {
                return InvariantStatus::Falsified;
            }
        }
        InvariantStatus::Alive
    }

    #[test]
    fn sum_at_each_position() {
        let samples = [(1, 2, 3), (5, -1, 4), (0, 0, 0)];
        let mut z = FunctionBinary::new(BinaryFn::Sum, 2);
        assert!(feed(&mut z, &samples).is_alive());
        assert!(z.is_justified());
        assert_eq!(z.render(&["x", "y", "z"], Notation::Daikon).unwrap(), "z == x + y");
        assert_eq!(
            z.render(&["x", "y", "z"], Notation::Simplify).unwrap(),
            "(EQ z (+ x y))"
        );

        let mut x = FunctionBinary::new(BinaryFn::Sum, 0);
        assert!(feed(&mut x, &samples).is_falsified());
    }

    #[test]
    fn min_is_not_expressible_for_the_prover() {
        let mut m = FunctionBinary::new(BinaryFn::Min, 0);
        assert!(feed(&mut m, &[(1, 1, 2), (-3, 4, -3)]).is_alive());
        assert_eq!(m.render(&["m", "a", "b"], Notation::Daikon).unwrap(), "m == min(a, b)");
        assert!(m.render(&["m", "a", "b"], Notation::Simplify).is_none());
    }

    #[test]
    fn overflow_falsifies() {
        let mut p = FunctionBinary::new(BinaryFn::Product, 2);
        assert!(feed(&mut p, &[(i64::MAX, 2, 0)]).is_falsified());
    }
}
