use std::collections::BTreeSet;

use hyinfer::inv::{InvariantCatalog, Notation};
use hyinfer::slice::Slice;
use hyinfer::split::{ScalarCompareSplitter, Splitter};
use hyinfer::{
    InferError, InferenceConfig, InferenceContext, ProgramPoint, RepType, Sample, Value, VarIndex,
    VarInfo,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

// Helpers
fn texts(ppt: &ProgramPoint, slice: &Slice) -> Vec<String> {
    let names = slice.names(ppt.catalog());
    slice
        .invariants()
        .filter_map(|e| e.invariant().render(&names, Notation::Daikon))
        .collect()
}

fn ints(values: &[i64]) -> Sample {
    Sample::modified(values.iter().map(|&v| Value::Int(v)))
}

#[test]
fn equality_survives_until_falsified() {
    let mut ctx = InferenceContext::new(InferenceConfig::default())
        .unwrap()
        .with_invariant_catalog(InvariantCatalog::standard().retain(|f| f.name == "IntEqual"));
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::EXIT",
            [VarInfo::new("x", RepType::Int), VarInfo::new("y", RepType::Int)],
        ))
        .unwrap();

    for v in 1..=3 {
        ctx.add(id, &ints(&[v, v]), 1).unwrap();
    }
    {
        let ppt = ctx.ppt(id).unwrap();
        let slice = ppt.find_slice(&[VarIndex(0), VarIndex(1)]).unwrap();
        assert_eq!(texts(ppt, slice), vec!["x == y".to_string()]);
        assert!(slice.invariants().all(|e| e.invariant().is_justified()));
        assert_eq!(slice.num_samples(), 3);
    }

    ctx.add(id, &ints(&[4, 5]), 1).unwrap();
    let ppt = ctx.ppt(id).unwrap();
    assert!(ppt.find_slice(&[VarIndex(0), VarIndex(1)]).is_none());
    assert_eq!(ppt.num_invariants(), 0);
    assert_eq!(ppt.num_samples(), 4);
}

#[test]
fn slices_are_unique_and_sorted() {
    let mut ctx = InferenceContext::new(InferenceConfig::default()).unwrap();
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::ENTER",
            ["a", "b", "c", "d"].map(|n| VarInfo::new(n, RepType::Int)),
        ))
        .unwrap();

    let added = ctx.instantiate_views(id, 0..4).unwrap();
    let ppt = ctx.ppt(id).unwrap();
    assert_eq!(added, ppt.num_slices());

    let keys: BTreeSet<Vec<VarIndex>> = ppt.slices().map(|s| s.vars().to_vec()).collect();
    assert_eq!(keys.len(), ppt.num_slices());
    for key in &keys {
        assert!(key.windows(2).all(|w| w[0] < w[1]), "{key:?} is not sorted");
    }
    // 4 unary, 6 binary, 4 ternary.
    assert_eq!(ppt.num_slices(), 14);

    assert!(matches!(
        ctx.instantiate_views(id, 0..4),
        Err(InferError::DuplicateSlice { .. })
    ));
    assert!(matches!(
        ctx.instantiate_views(id, 0..3),
        Err(InferError::PartialInstantiation { .. })
    ));
}

#[test]
fn derivation_reaches_a_fixed_point_within_depth() {
    let config = InferenceConfig {
        max_derivation_depth: 1,
        ..InferenceConfig::default()
    };
    let mut ctx = InferenceContext::new(config).unwrap();
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::EXIT",
            [VarInfo::new("a", RepType::IntSeq), VarInfo::new("i", RepType::Int)],
        ))
        .unwrap();

    let added = ctx.create_derived_variables(id).unwrap();
    assert!(added > 0);
    assert_eq!(ctx.create_derived_variables(id).unwrap(), 0);

    let ppt = ctx.ppt(id).unwrap();
    assert_eq!(ppt.catalog().len(), 2 + added);
    assert!(ppt.catalog().iter().all(|v| v.derived_depth() <= 1));
    let size = ppt.index_of("size(a)").unwrap();
    assert!(ppt.catalog()[size].is_derived());

    ctx.observe(id, &Sample::modified([Value::IntSeq(vec![3, 1, 2]), Value::Int(1)]), 1)
        .unwrap();
    ctx.observe(id, &Sample::modified([Value::IntSeq(vec![5, 1, 7]), Value::Int(2)]), 1)
        .unwrap();
    ctx.observe(id, &Sample::modified([Value::IntSeq(vec![0, 0, 0]), Value::Int(0)]), 1)
        .unwrap();

    let ppt = ctx.ppt(id).unwrap();
    let slice = ppt.find_slice(&[size]).unwrap();
    assert!(texts(ppt, slice).contains(&"size(a) == 3".to_string()));
}

#[test]
fn every_sample_is_counted_exactly_once() {
    let mut ctx = InferenceContext::new(InferenceConfig::default()).unwrap();
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::EXIT",
            [VarInfo::new("x", RepType::Int), VarInfo::new("y", RepType::Int)],
        ))
        .unwrap();
    let target = ctx
        .add_ppt(ProgramPoint::new("C:::OBJECT", [VarInfo::new("this.x", RepType::Int)]))
        .unwrap();
    ctx.add_dataflow_edge(id, target, vec![Some(0), None]).unwrap();

    let splitter: Arc<dyn Splitter> = Arc::new(ScalarCompareSplitter::new(
        "x",
        hyinfer::inv::CmpOp::Gt,
        0,
    ));
    let children = ctx.add_splitters(id, [splitter]).unwrap();
    assert_eq!(children.len(), 2);

    let mut rng = ChaCha20Rng::seed_from_u64(0x5eed);
    let mut total = 0u64;
    let mut positive = 0u64;
    for _ in 0..200 {
        let (x, y, count) = (
            rng.random_range(-50..=50),
            rng.random_range(-50..=50),
            rng.random_range(1..=3),
        );
        total += count as u64;
        if x > 0 {
            positive += count as u64;
        }
        ctx.add_and_flow(id, &ints(&[x, y]), count).unwrap();
    }

    let count = |p| ctx.ppt(p).unwrap().num_samples();
    assert_eq!(count(id), total);
    assert_eq!(count(target), total);
    assert_eq!(count(children[0]) + count(children[1]), total);
    assert_eq!(count(ctx.conditional_child(id, "x > 0", true).unwrap().unwrap()), positive);
}
