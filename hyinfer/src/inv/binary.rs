//! Invariants over a pair of variables.

use smallvec::SmallVec;
use strum::{Display, EnumIs};

use crate::{
    inv::{FormulaKey, Invariant, InvariantFactory, InvariantStatus, Notation},
    magic::MIN_JUSTIFY_SAMPLES,
    sample::{ModState, Value},
    var::{RepType, VarInfo},
};

pub const FACTORIES: &[InvariantFactory] = &[
    InvariantFactory {
        name: "IntEqual",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Eq),
    },
    InvariantFactory {
        name: "IntNotEqual",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Ne),
    },
    InvariantFactory {
        name: "IntLessThan",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Lt),
    },
    InvariantFactory {
        name: "IntLessEqual",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Le),
    },
    InvariantFactory {
        name: "IntGreaterThan",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Gt),
    },
    InvariantFactory {
        name: "IntGreaterEqual",
        arity: 2,
        instantiate: |vars| IntComparison::instantiate(vars, CmpOp::Ge),
    },
    InvariantFactory {
        name: "Linear",
        arity: 2,
        instantiate: Linear::instantiate,
    },
];

/// Integer comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

const LESS: u8 = 0b001;
const EQUAL: u8 = 0b010;
const GREATER: u8 = 0b100;

impl CmpOp {
    pub fn eval(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn prover_symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "EQ",
            CmpOp::Ne => "NEQ",
            op => op.symbol(),
        }
    }

    /// Orderings of `(a, b)` under which `a op b` holds.
    fn outcomes(self) -> u8 {
        match self {
            CmpOp::Eq => EQUAL,
            CmpOp::Ne => LESS | GREATER,
            CmpOp::Lt => LESS,
            CmpOp::Le => LESS | EQUAL,
            CmpOp::Gt => GREATER,
            CmpOp::Ge => GREATER | EQUAL,
        }
    }
}

/// `x op y` over two integers. Object identities only support `==` and `!=`.
#[derive(Debug, Clone)]
pub struct IntComparison {
    op: CmpOp,
    samples: u64,
}

impl IntComparison {
    pub fn new(op: CmpOp) -> Self {
        Self { op, samples: 0 }
    }

    fn instantiate(vars: &[&VarInfo], op: CmpOp) -> Vec<Box<dyn Invariant>> {
        let applies = match (vars[0].rep_type, vars[1].rep_type) {
            (RepType::Int, RepType::Int) => true,
            (RepType::Hashcode, RepType::Hashcode) => op.is_eq() || op.is_ne(),
            _ => false,
        };
        if !applies {
            return vec![];
        }
        vec![Box::new(Self::new(op))]
    }

    pub fn op(&self) -> CmpOp {
        self.op
    }
}

impl Invariant for IntComparison {
    fn kind(&self) -> &'static str {
        match self.op {
            CmpOp::Eq => "IntEqual",
            CmpOp::Ne => "IntNotEqual",
            CmpOp::Lt => "IntLessThan",
            CmpOp::Le => "IntLessEqual",
            CmpOp::Gt => "IntGreaterThan",
            CmpOp::Ge => "IntGreaterEqual",
        }
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        match (values[0].as_int(), values[1].as_int()) {
            (Some(a), Some(b)) if self.op.eval(a, b) => {
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
            .downcast_ref::<IntComparison>()
            .is_some_and(|o| self.op.outcomes() & o.op.outcomes() == 0)
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        Some(match notation {
            Notation::Daikon => format!("{} {} {}", names[0], self.op.symbol(), names[1]),
            Notation::Simplify => format!("({} {} {})", self.op.prover_symbol(), names[0], names[1]),
        })
    }

    fn is_equality(&self) -> bool {
        self.op.is_eq()
    }
}

/// `y == a * x + b` with integer coefficients, `a != 0`, where `x` and `y`
/// are the first and second variable of the slice.
///
/// The coefficients are fixed by the first two samples with distinct `x`.
#[derive(Debug, Clone, Default)]
pub struct Linear {
    points: SmallVec<(i64, i64), 2>,
    coefficients: Option<(i64, i64)>,
    samples: u64,
}

impl Linear {
    fn instantiate(vars: &[&VarInfo]) -> Vec<Box<dyn Invariant>> {
        if vars[0].rep_type != RepType::Int || vars[1].rep_type != RepType::Int {
            return vec![];
        }
        vec![Box::new(Self::default())]
    }

    pub fn coefficients(&self) -> Option<(i64, i64)> {
        self.coefficients
    }

    fn fits(a: i64, b: i64, x: i64, y: i64) -> bool {
        a.checked_mul(x)
            .and_then(|ax| ax.checked_add(b))
            .is_some_and(|v| v == y)
    }

    fn solve(&mut self, x: i64, y: i64) -> InvariantStatus {
        if let Some(&(_, py)) = self.points.iter().find(|(px, _)| *px == x) {
            return if py == y {
                InvariantStatus::Alive
            } else {
                InvariantStatus::Falsified
            };
        }

        let Some(&(x1, y1)) = self.points.first() else {
            self.points.push((x, y));
            return InvariantStatus::Alive;
        };

        let (Some(dx), Some(dy)) = (x.checked_sub(x1), y.checked_sub(y1)) else {
            return InvariantStatus::Falsified;
        };
        if dy == 0 || dy.checked_rem(dx) != Some(0) {
            return InvariantStatus::Falsified;
        }

        let a = dy / dx;
        let Some(b) = a.checked_mul(x1).and_then(|ax| y1.checked_sub(ax)) else {
            return InvariantStatus::Falsified;
        };
        self.coefficients = Some((a, b));
        self.points.push((x, y));
        InvariantStatus::Alive
    }
}

impl Invariant for Linear {
    fn kind(&self) -> &'static str {
        "Linear"
    }

    fn add_sample(&mut self, values: &[&Value], _mod_state: ModState, count: u32) -> InvariantStatus {
        let (Some(x), Some(y)) = (values[0].as_int(), values[1].as_int()) else {
            return InvariantStatus::Falsified;
        };

        let status = match self.coefficients {
            Some((a, b)) if Self::fits(a, b, x, y) => InvariantStatus::Alive,
            Some(_) => InvariantStatus::Falsified,
            None => self.solve(x, y),
        };
        if status.is_alive() {
            self.samples += count as u64;
        }
        status
    }

    fn num_samples(&self) -> u64 {
        self.samples
    }

    fn is_justified(&self) -> bool {
        self.coefficients.is_some() && self.samples >= MIN_JUSTIFY_SAMPLES
    }

    fn formula_identity(&self) -> FormulaKey {
        let detail = match self.coefficients {
            Some((a, b)) => format!("{a},{b}"),
            None => String::new(),
        };
        FormulaKey::new(self.kind(), detail)
    }

    fn is_exclusive_with(&self, other: &dyn Invariant) -> bool {
        let Some(other) = other.downcast_ref::<Linear>() else {
            return false;
        };
        matches!(
            (self.coefficients, other.coefficients),
            (Some((a1, b1)), Some((a2, b2))) if a1 == a2 && b1 != b2
        )
    }

    fn render(&self, names: &[&str], notation: Notation) -> Option<String> {
        let (a, b) = self.coefficients?;
        let (x, y) = (names[0], names[1]);
        Some(match notation {
            Notation::Daikon => {
                let mut rhs = match a {
                    1 => x.to_string(),
                    -1 => format!("-{}", x),
                    a => format!("{} * {}", a, x),
                };
                if b > 0 {
                    rhs.push_str(&format!(" + {}", b));
                } else if b < 0 {
                    rhs.push_str(&format!(" - {}", b.unsigned_abs()));
                }
                format!("{} == {}", y, rhs)
            }
            Notation::Simplify => format!("(EQ {} (+ (* {} {}) {}))", y, a, x, b),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(inv: &mut dyn Invariant, pairs: &[(i64, i64)]) -> InvariantStatus {
        for &(x, y) in pairs {
            if inv
                .add_sample(&[&Value::Int(x), &Value::Int(y)], ModState::Modified, 1)
                .is_falsified()
            {
                return InvariantStatus::Falsified;
            }
        }
        InvariantStatus::Alive
    }

    #[test]
    fn equality_is_falsified_by_a_mismatch() {
        let mut eq = IntComparison::new(CmpOp::Eq);
        assert!(feed(&mut eq, &[(1, 1), (2, 2), (3, 3)]).is_alive());
        assert!(eq.is_justified());
        assert!(eq.is_equality());
        assert_eq!(eq.render(&["x", "y"], Notation::Daikon).unwrap(), "x == y");
        assert_eq!(eq.render(&["x", "y"], Notation::Simplify).unwrap(), "(EQ x y)");
        assert!(feed(&mut eq, &[(4, 5)]).is_falsified());
    }

    #[test]
    fn comparison_exclusivity_follows_orderings() {
        let lt = IntComparison::new(CmpOp::Lt);
        let ge = IntComparison::new(CmpOp::Ge);
        let le = IntComparison::new(CmpOp::Le);
        let eq = IntComparison::new(CmpOp::Eq);
        let ne = IntComparison::new(CmpOp::Ne);
        assert!(lt.is_exclusive_with(&ge) && ge.is_exclusive_with(&lt));
        assert!(eq.is_exclusive_with(&ne));
        assert!(!le.is_exclusive_with(&eq));
        for op in [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge] {
            assert!(IntComparison::new(op).is_exclusive_with(&IntComparison::new(op.negate())));
        }
    }

    #[test]
    fn hashcodes_only_compare_for_identity() {
        let p = VarInfo::new("p", RepType::Hashcode);
        let q = VarInfo::new("q", RepType::Hashcode);
        assert_eq!(IntComparison::instantiate(&[&p, &q], CmpOp::Eq).len(), 1);
        assert!(IntComparison::instantiate(&[&p, &q], CmpOp::Lt).is_empty());
    }

    #[test]
    fn linear_fits_integer_lines() {
        let mut lin = Linear::default();
        assert!(feed(&mut lin, &[(1, 3), (1, 3), (2, 5), (0, 1)]).is_alive());
        assert_eq!(lin.coefficients(), Some((2, 1)));
        assert!(lin.is_justified());
        assert_eq!(lin.render(&["x", "y"], Notation::Daikon).unwrap(), "y == 2 * x + 1");
        assert_eq!(
            lin.render(&["x", "y"], Notation::Simplify).unwrap(),
            "(EQ y (+ (* 2 x) 1))"
        );
        assert!(feed(&mut lin, &[(3, 8)]).is_falsified());
    }

    #[test]
    fn linear_rejects_fractional_and_flat_slopes() {
        assert!(feed(&mut Linear::default(), &[(0, 0), (2, 1)]).is_falsified());
        assert!(feed(&mut Linear::default(), &[(0, 4), (1, 4)]).is_falsified());
        assert!(feed(&mut Linear::default(), &[(0, 4), (0, 5)]).is_falsified());
    }

    #[test]
    fn parallel_lines_are_exclusive() {
        let mut l1 = Linear::default();
        let mut l2 = Linear::default();
        feed(&mut l1, &[(0, 1), (1, 2)]);
        feed(&mut l2, &[(0, 2), (1, 3)]);
        assert!(l1.is_exclusive_with(&l2));
        assert_eq!(l2.render(&["x", "y"], Notation::Daikon).unwrap(), "y == x + 2");
    }
}
