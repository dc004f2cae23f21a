use std::collections::BTreeSet;
use std::sync::Arc;

use hyinfer::inv::{CmpOp, Notation};
use hyinfer::ppt::InvariantRef;
use hyinfer::split::{ScalarCompareSplitter, Splitter};
use hyinfer::{InferenceConfig, InferenceContext, PptId, ProgramPoint, RepType, Sample, Value, VarInfo};

fn split_context(config: InferenceConfig) -> (InferenceContext, PptId) {
    let mut ctx = InferenceContext::new(config).unwrap();
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::EXIT",
            [VarInfo::new("x", RepType::Int), VarInfo::new("y", RepType::Int)],
        ))
        .unwrap();
    let splitter: Arc<dyn Splitter> = Arc::new(ScalarCompareSplitter::new("x", CmpOp::Gt, 0));
    ctx.add_splitters(id, [splitter]).unwrap();

    // y == 1 exactly when x > 0.
    for x in 1..=5 {
        ctx.add(id, &Sample::modified([Value::Int(x + 1), Value::Int(1)]), 1)
            .unwrap();
        ctx.add(id, &Sample::modified([Value::Int(-x), Value::Int(2)]), 1)
            .unwrap();
    }
    (ctx, id)
}

fn term_pairs(ctx: &InferenceContext, id: PptId) -> Vec<BTreeSet<String>> {
    ctx.ppt(id)
        .unwrap()
        .implications()
        .iter()
        .map(|imp| BTreeSet::from([imp.predicate.text.clone(), imp.consequent.text.clone()]))
        .collect()
}

#[test]
fn split_yields_implications_both_ways() {
    let (mut ctx, id) = split_context(InferenceConfig::default());
    let count = ctx.add_implications(id).unwrap();
    assert!(count > 0);

    let pairs = term_pairs(&ctx, id);
    let expected = |a: &str, b: &str| BTreeSet::from([a.to_string(), b.to_string()]);
    assert!(pairs.contains(&expected("x > 0", "y == 1")), "{pairs:?}");
    assert!(pairs.contains(&expected("x <= 0", "y == 2")), "{pairs:?}");

    let ppt = ctx.ppt(id).unwrap();
    for imp in ppt.implications() {
        let text = imp.render(Notation::Daikon).unwrap();
        assert!(text.contains("==>"), "{text}");
    }
    // Implications are reported along with the slice invariants.
    assert!(
        ppt.invariants()
            .any(|r| matches!(r, InvariantRef::Implication(_)))
    );
}

#[test]
fn building_twice_adds_nothing() {
    let (mut ctx, id) = split_context(InferenceConfig::default());
    let first = ctx.add_implications(id).unwrap();
    assert_eq!(ctx.add_implications(id).unwrap(), first);
}

#[test]
fn identical_invariants_become_unconditional() {
    let config = InferenceConfig {
        add_nonimplications: true,
        ..InferenceConfig::default()
    };
    let (mut ctx, id) = split_context(config);
    ctx.add_implications(id).unwrap();

    // `x != y` holds in both children and is justified on both sides.
    let ppt = ctx.ppt(id).unwrap();
    let texts: Vec<&str> = ppt.unconditional().iter().map(|t| t.text.as_str()).collect();
    assert!(texts.contains(&"x != y"), "{texts:?}");
}
