use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, AtomicUsize, Ordering},
};
use std::time::Duration;

use hyinfer::prover::bridge::ProverBridge;
use hyinfer::prover::redundancy::RedundancyOutcome;
use hyinfer::prover::{ProverCommand, ProverError, ProverResponse, ProverResult, ProverTransport};
use hyinfer::utils::conf::ProverConfig;
use hyinfer::{InferenceConfig, InferenceContext, PptId, ProgramPoint, RepType, Sample, Value, VarInfo};

/// Answers every query with a fixed script and records what it was sent.
struct Scripted {
    contradictory: bool,
    log: Arc<Mutex<Vec<ProverCommand>>>,
}

impl ProverTransport for Scripted {
    fn request(&mut self, command: &ProverCommand) -> ProverResult<ProverResponse> {
        self.log.lock().unwrap().push(command.clone());
        Ok(match command {
            ProverCommand::Check(f) if f.starts_with("(NOT ") => {
                if self.contradictory {
                    ProverResponse::Valid
                } else {
                    ProverResponse::Invalid
                }
            }
            ProverCommand::Check(_) => ProverResponse::Valid,
            _ => ProverResponse::Ack,
        })
    }
}

fn scripted(contradictory: bool) -> (ProverBridge, Arc<Mutex<Vec<ProverCommand>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let shared = log.clone();
    let launcher = move || -> ProverResult<Box<dyn ProverTransport>> {
        Ok(Box::new(Scripted {
            contradictory,
            log: shared.clone(),
        }))
    };
    (ProverBridge::new(Box::new(launcher), 5), log)
}

fn populated(ctx: &mut InferenceContext) -> PptId {
    let id = ctx
        .add_ppt(ProgramPoint::new(
            "m:::EXIT",
            [
                VarInfo::new("x", RepType::Int),
                VarInfo::new("y", RepType::Int),
                VarInfo::new("z", RepType::Int),
            ],
        ))
        .unwrap();
    for v in 1..=6 {
        let sample = Sample::modified([Value::Int(v), Value::Int(v), Value::Int(v)]);
        ctx.add(id, &sample, 1).unwrap();
    }
    id
}

#[test]
fn missing_prover_leaves_invariants_untouched() {
    let mut config = InferenceConfig::default();
    config.prover = ProverConfig {
        command: "hyinfer-no-such-prover".into(),
        timeout_ms: 200,
        ..ProverConfig::default()
    };
    let mut ctx = InferenceContext::new(config).unwrap();
    let id = populated(&mut ctx);
    let before = ctx.ppt(id).unwrap().num_invariants();

    let report = ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(report.redundant, 0);
    assert_eq!(report.outcome, RedundancyOutcome::ProverUnavailable);
    assert!(ctx.ppt(id).unwrap().redundant().is_empty());
    assert_eq!(ctx.ppt(id).unwrap().num_invariants(), before);
    assert!(ctx.prover().state().is_failed());

    // The start budget is spent; later passes do not relaunch.
    let starts = ctx.prover().starts();
    ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(ctx.prover().starts(), starts);
}

#[test]
fn implied_invariants_are_flagged_not_removed() {
    let (bridge, log) = scripted(false);
    let mut ctx = InferenceContext::new(InferenceConfig::default())
        .unwrap()
        .with_prover(bridge);
    let id = populated(&mut ctx);
    let before = ctx.ppt(id).unwrap().num_invariants();

    let report = ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(report.outcome, RedundancyOutcome::Completed);
    assert!(report.examined > 0);
    assert!(report.redundant > 0);
    assert_eq!(ctx.ppt(id).unwrap().redundant().len(), report.redundant);
    assert_eq!(ctx.ppt(id).unwrap().num_invariants(), before);

    // x == y == z is folded into a single equality class.
    let log = log.lock().unwrap();
    assert!(
        log.iter()
            .any(|c| matches!(c, ProverCommand::Check(f) if f.contains("(AND (EQ x y) (EQ x z))"))),
        "{log:?}"
    );
    assert_eq!(log.last(), Some(&ProverCommand::UndoAssume));
}

#[test]
fn contradictory_invariants_flag_nothing() {
    let (bridge, _) = scripted(true);
    let mut ctx = InferenceContext::new(InferenceConfig::default())
        .unwrap()
        .with_prover(bridge);
    let id = populated(&mut ctx);

    let report = ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(report.outcome, RedundancyOutcome::Contradictory);
    assert_eq!(report.redundant, 0);
    assert!(ctx.ppt(id).unwrap().redundant().is_empty());
}

/// Proves everything, but every query from the `timeout_from`-th on (the
/// start-up sanity check excluded) times out.
struct Stalling {
    queries: Arc<AtomicUsize>,
    timeout_from: usize,
}

impl ProverTransport for Stalling {
    fn request(&mut self, command: &ProverCommand) -> ProverResult<ProverResponse> {
        let ProverCommand::Check(f) = command else {
            return Ok(ProverResponse::Ack);
        };
        if f == "(EQ 1 1)" {
            return Ok(ProverResponse::Valid);
        }
        if self.queries.fetch_add(1, Ordering::SeqCst) >= self.timeout_from {
            return Err(ProverError::Timeout(Duration::from_millis(10)));
        }
        Ok(if f.starts_with("(NOT ") {
            ProverResponse::Invalid
        } else {
            ProverResponse::Valid
        })
    }
}

#[test]
fn timeout_restarts_once_then_aborts_keeping_marks() {
    let launches = Arc::new(AtomicU32::new(0));
    let queries = Arc::new(AtomicUsize::new(0));
    let (counter, shared) = (launches.clone(), queries.clone());
    let launcher = move || -> ProverResult<Box<dyn ProverTransport>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Stalling {
            queries: shared.clone(),
            timeout_from: 2,
        }))
    };
    let mut ctx = InferenceContext::new(InferenceConfig::default())
        .unwrap()
        .with_prover(ProverBridge::new(Box::new(launcher), 2));
    let id = populated(&mut ctx);
    let before = ctx.ppt(id).unwrap().num_invariants();

    // Query 0 and 1 flag the last candidate, query 2 times out and restarts,
    // query 3 times out again and ends the pass.
    let report = ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(report.outcome, RedundancyOutcome::Aborted);
    assert_eq!(report.redundant, 1);
    assert_eq!(launches.load(Ordering::SeqCst), 2);
    assert_eq!(queries.load(Ordering::SeqCst), 4);
    assert_eq!(ctx.ppt(id).unwrap().redundant().len(), 1);
    assert_eq!(ctx.ppt(id).unwrap().num_invariants(), before);

    // Both starts are spent.
    let report = ctx.mark_implied_worth_reporting(id).unwrap();
    assert_eq!(report.outcome, RedundancyOutcome::ProverUnavailable);
    assert_eq!(launches.load(Ordering::SeqCst), 2);
    assert!(ctx.prover().state().is_failed());
    assert_eq!(ctx.ppt(id).unwrap().redundant().len(), 1);
}
