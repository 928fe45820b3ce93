
use dark_detector::engine::ownership::ownership_takeover;
use dark_detector::engine::DetectionModule;
use dark_detector::solver::outcome::SolverOutcome;
use dark_detector::solver::query::{TransactionSolver, Z3TransactionSolver};
use dark_detector::symbolic::actors::Actors;
use dark_detector::symbolic::state::StateSnapshot;
use dark_detector::symbolic::z3_ext::SolverLimits;
use dark_detector::utils::config::DetectorConfig;
use detector_utils::StoreScenario;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use z3::ast::{Ast, Bool};
use z3::{Config, Context};

/// Stands in for a solver that timed out or ran out of resources.
struct ExhaustedSolver {
    queries: AtomicUsize,
}

impl TransactionSolver for ExhaustedSolver {
    fn transaction_sequence<'ctx>(
        &self,
        _snapshot: &StateSnapshot<'ctx>,
        _constraints: &[Bool<'ctx>],
    ) -> SolverOutcome {
        self.queries.fetch_add(1, Ordering::SeqCst);
        SolverOutcome::SolverError("timeout".to_string())
    }
}

#[test]
fn test_solver_error_reports_like_unsat() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let config = DetectorConfig::default();

    let exhausted = Arc::new(ExhaustedSolver {
        queries: AtomicUsize::new(0),
    });
    let failing = ownership_takeover(&config, exhausted.clone()).unwrap();
    failing.execute(&StoreScenario::unguarded_setter().snapshot(&ctx));
    assert_eq!(exhausted.queries.load(Ordering::SeqCst), 1);

    // Same hook point, but the path already rules out an attacker-sent transaction.
    let unsat = ownership_takeover(&config, Arc::new(Z3TransactionSolver::from_config(&config)))
        .unwrap();
    let mut guarded = StoreScenario::unguarded_setter().snapshot(&ctx);
    let sender_is_attacker = guarded
        .environment
        .sender
        .extract(159, 0)
        ._eq(&Actors::ATTACKER.identity(&ctx));
    guarded.constrain(sender_is_attacker.not());
    unsat.execute(&guarded);

    assert!(failing.findings().is_empty());
    assert!(unsat.findings().is_empty());
    assert_eq!(failing.findings(), unsat.findings());
}

#[test]
fn test_contradictory_path_is_unsatisfiable() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let solver = Z3TransactionSolver::new(SolverLimits::default(), 64);
    let snapshot = StoreScenario::unguarded_setter().snapshot(&ctx);

    let contradiction = vec![Bool::from_bool(&ctx, false)];
    assert_eq!(
        solver.transaction_sequence(&snapshot, &contradiction),
        SolverOutcome::Unsatisfiable
    );
}

#[test]
fn test_detector_recovers_after_solver_errors() {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let config = DetectorConfig::default();
    let exhausted = Arc::new(ExhaustedSolver {
        queries: AtomicUsize::new(0),
    });
    let detector = ownership_takeover(&config, exhausted.clone()).unwrap();
    let snapshot = StoreScenario::unguarded_setter().snapshot(&ctx);

    for _ in 0..3 {
        detector.execute(&snapshot);
    }
    assert_eq!(exhausted.queries.load(Ordering::SeqCst), 3);
    assert!(detector.drain_findings().is_empty());
}
