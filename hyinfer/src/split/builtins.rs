//! Built-in splitters.

use crate::{
    inv::{CmpOp, Notation},
    sample::Sample,
    split::Splitter,
    var::{RepType, VarCatalog},
};

fn int_value(catalog: &VarCatalog, sample: &Sample, var: &str) -> Option<i64> {
    let index = catalog.index_of(var)?;
    catalog.value_in(sample, index)?.0.as_int()
}

/// `var op constant` over an integer variable, e.g. `x > 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarCompareSplitter {
    var: String,
    op: CmpOp,
    constant: i64,
}

impl ScalarCompareSplitter {
    pub fn new(var: impl Into<String>, op: CmpOp, constant: i64) -> Self {
        Self {
            var: var.into(),
            op,
            constant,
        }
    }
}

impl Splitter for ScalarCompareSplitter {
    fn condition(&self) -> String {
        format!("{} {} {}", self.var, self.op.symbol(), self.constant)
    }

    fn is_valid_for(&self, catalog: &VarCatalog) -> bool {
        catalog
            .index_of(&self.var)
            .is_some_and(|v| catalog[v].rep_type == RepType::Int)
    }

    fn evaluate(&self, catalog: &VarCatalog, sample: &Sample) -> Option<bool> {
        int_value(catalog, sample, &self.var).map(|x| self.op.eval(x, self.constant))
    }

    fn render(&self, polarity: bool, notation: Notation) -> Option<String> {
        let op = if polarity { self.op } else { self.op.negate() };
        Some(match notation {
            Notation::Daikon => format!("{} {} {}", self.var, op.symbol(), self.constant),
            Notation::Simplify => format!(
                "({} {} {})",
                op.prover_symbol(),
                notation.name(&self.var),
                self.constant
            ),
        })
    }
}

/// Truth of an integer-encoded boolean variable, e.g. `return == true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanSplitter {
    var: String,
}

impl BooleanSplitter {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Splitter for BooleanSplitter {
    fn condition(&self) -> String {
        format!("{} == true", self.var)
    }

    fn is_valid_for(&self, catalog: &VarCatalog) -> bool {
        catalog
            .index_of(&self.var)
            .is_some_and(|v| catalog[v].rep_type == RepType::Int)
    }

    fn evaluate(&self, catalog: &VarCatalog, sample: &Sample) -> Option<bool> {
        int_value(catalog, sample, &self.var).map(|x| x != 0)
    }

    fn render(&self, polarity: bool, notation: Notation) -> Option<String> {
        Some(match (notation, polarity) {
            (Notation::Daikon, true) => format!("{} == true", self.var),
            (Notation::Daikon, false) => format!("{} == false", self.var),
            (Notation::Simplify, true) => format!("(NEQ {} 0)", notation.name(&self.var)),
            (Notation::Simplify, false) => format!("(EQ {} 0)", notation.name(&self.var)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sample::{ModState, Value},
        var::VarInfo,
    };

    fn catalog() -> VarCatalog {
        VarCatalog::new([
            VarInfo::new("x", RepType::Int),
            VarInfo::new("return", RepType::Int),
            VarInfo::new("s", RepType::Str),
        ])
    }

    #[test]
    fn scalar_comparison() {
        let cat = catalog();
        let split = ScalarCompareSplitter::new("x", CmpOp::Gt, 0);
        assert!(split.is_valid_for(&cat));
        assert!(!ScalarCompareSplitter::new("s", CmpOp::Gt, 0).is_valid_for(&cat));

        let sample = |x| Sample::modified([Value::Int(x), Value::Int(0), Value::Str("a".into())]);
        assert_eq!(split.evaluate(&cat, &sample(3)), Some(true));
        assert_eq!(split.evaluate(&cat, &sample(0)), Some(false));

        let missing = Sample::new([
            (Value::Int(1), ModState::Missing),
            (Value::Int(0), ModState::Modified),
            (Value::Str("a".into()), ModState::Modified),
        ]);
        assert_eq!(split.evaluate(&cat, &missing), None);

        assert_eq!(split.render(true, Notation::Daikon).unwrap(), "x > 0");
        assert_eq!(split.render(false, Notation::Daikon).unwrap(), "x <= 0");
        assert_eq!(split.render(false, Notation::Simplify).unwrap(), "(<= x 0)");
    }

    #[test]
    fn boolean_return() {
        let cat = catalog();
        let split = BooleanSplitter::new("return");
        let sample = Sample::modified([Value::Int(0), Value::Int(1), Value::Str("a".into())]);
        assert_eq!(split.evaluate(&cat, &sample), Some(true));
        assert_eq!(split.condition(), "return == true");
        assert_eq!(split.render(false, Notation::Simplify).unwrap(), "(EQ return 0)");
    }
}
