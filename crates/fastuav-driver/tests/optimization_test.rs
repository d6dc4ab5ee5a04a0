//! End-to-end tests for the FastUAV optimizer
//!
//! - Constrained quadratic with exact and quadratic penalties
//! - Worker-count independence and determinism
//! - Failure isolation, collective stop, setup rejection

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fastuav_cmaes::{
    CmaEs, CmaEsOptions, EngineResult, EngineSettings, EvolutionEngine, StopSet,
};
use fastuav_common::{
    Constraint, DesignVariable, EngineError, EvaluationFailure, NamedValues, Objective,
    SetupError, SizingError, FAILURE_SENTINEL,
};
use fastuav_driver::{
    FnModel, MemoryRecordSink, ModelEvaluator, ModelOutputs, OptimizationLoop,
    OptimizationProblem, OptimizerConfig, ParallelSettings, RecordStage,
};

// ============ FIXTURES ============

/// `min x0² + x1²` subject to `x0 + x1 ≥ 1` in `[-5, 5]²`, from `[2, 2]`
fn constrained_quadratic() -> OptimizationProblem {
    OptimizationProblem {
        design_variables: vec![DesignVariable::uniform("x", 2, -5.0, 5.0).unwrap()],
        initial: [("x".to_string(), vec![2.0, 2.0])].into_iter().collect(),
        objectives: vec![Objective::new("f")],
        constraints: vec![Constraint::lower("sum", 1.0)],
    }
}

fn quadratic_outputs(design: &NamedValues) -> ModelOutputs {
    let x = &design["x"];
    ModelOutputs::new()
        .objective("f", x[0] * x[0] + x[1] * x[1])
        .constraint("sum", x[0] + x[1])
}

fn quadratic_model() -> Arc<dyn ModelEvaluator> {
    Arc::new(FnModel(|design: &NamedValues| Ok(quadratic_outputs(design))))
}

fn config(seed: u64, workers: usize) -> OptimizerConfig {
    OptimizerConfig {
        sigma0: 1.0,
        seed: Some(seed),
        parallel: ParallelSettings {
            run_parallel: workers > 1,
            procs_per_model: 1,
            concurrency_group: workers,
        },
        ..Default::default()
    }
}

fn capped(max_iterations: u64) -> impl Fn() -> CmaEs + Send + Sync + 'static {
    move || {
        CmaEs::new(CmaEsOptions {
            max_iterations: Some(max_iterations),
            ..Default::default()
        })
    }
}

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected} ± {tol}, got {actual}"
    );
}

// ============ CONVERGENCE ============

#[tokio::test]
async fn test_exact_penalty_reaches_constrained_optimum() {
    let report = OptimizationLoop::new(
        config(2024, 1),
        constrained_quadratic(),
        quadratic_model(),
        CmaEs::default,
    )
    .run()
    .await
    .unwrap();

    assert!(report.success);
    assert!(!report.stop_criteria.is_empty());
    assert_close(report.best["x"][0], 0.5, 1e-2);
    assert_close(report.best["x"][1], 0.5, 1e-2);
    assert_close(report.fitness, 0.5, 1e-2);

    let outputs = report.final_outputs.unwrap();
    assert_close(outputs.constraints["sum"][0], 1.0, 1e-2);
}

#[tokio::test]
async fn test_upper_bound_form_keeps_unconstrained_optimum() {
    // x0 + x1 - 1 <= 0 holds at the origin, so the constraint is inactive
    let mut problem = constrained_quadratic();
    problem.constraints = vec![Constraint::upper("sum", 1.0)];

    let report = OptimizationLoop::new(config(11, 1), problem, quadratic_model(), CmaEs::default)
        .run()
        .await
        .unwrap();

    assert!(report.success);
    assert_close(report.best["x"][0], 0.0, 1e-2);
    assert_close(report.best["x"][1], 0.0, 1e-2);
    assert_close(report.fitness, 0.0, 1e-4);
    assert!(report.final_feasible);

    let outputs = report.final_outputs.unwrap();
    assert!(outputs.constraints["sum"][0] < 1.0);
}

#[tokio::test]
async fn test_quadratic_penalty_reaches_penalised_optimum() {
    let mut cfg = config(7, 1);
    cfg.penalty.exponent = 2.0;

    let report = OptimizationLoop::new(cfg, constrained_quadratic(), quadratic_model(), CmaEs::default)
        .run()
        .await
        .unwrap();

    // Stationary point of 2t² + 10 (1 - 2t)²
    let t = 10.0 / 21.0;
    assert_close(report.best["x"][0], t, 1e-2);
    assert_close(report.best["x"][1], t, 1e-2);
    assert_close(report.fitness, 2.0 * t * t + 10.0 * (1.0 - 2.0 * t).powi(2), 1e-2);
    assert!(!report.final_feasible);
}

#[tokio::test]
async fn test_zero_penalty_ignores_constraint() {
    let mut cfg = config(3, 1);
    cfg.penalty.parameter = 0.0;

    let report = OptimizationLoop::new(cfg, constrained_quadratic(), quadratic_model(), CmaEs::default)
        .run()
        .await
        .unwrap();

    assert_close(report.best["x"][0], 0.0, 1e-2);
    assert_close(report.best["x"][1], 0.0, 1e-2);
    assert!(!report.final_feasible);
}

// ============ PARALLELISM ============

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_count_does_not_change_results() {
    let sequential_records = Arc::new(MemoryRecordSink::new());
    let parallel_records = Arc::new(MemoryRecordSink::new());

    let sequential = OptimizationLoop::new(
        config(99, 1),
        constrained_quadratic(),
        quadratic_model(),
        capped(15),
    )
    .with_record_sink(sequential_records.clone())
    .run()
    .await
    .unwrap();

    let parallel = OptimizationLoop::new(
        config(99, 4),
        constrained_quadratic(),
        quadratic_model(),
        capped(15),
    )
    .with_record_sink(parallel_records.clone())
    .run()
    .await
    .unwrap();

    assert_eq!(sequential.workers, 1);
    assert_eq!(parallel.workers, 4);
    assert_eq!(sequential.best_x, parallel.best_x);
    assert_eq!(sequential.fitness, parallel.fitness);
    assert_eq!(sequential.generations, parallel.generations);

    let a = sequential_records.records();
    let b = parallel_records.records();
    assert_eq!(a.len(), b.len());
    for (ra, rb) in a.iter().zip(&b) {
        assert_eq!(ra.generation, rb.generation);
        assert_eq!(ra.x, rb.x);
        assert_eq!(ra.fitness, rb.fitness);
    }
}

#[tokio::test]
async fn test_same_seed_reproduces_trajectory() {
    let run = |seed| async move {
        let sink = Arc::new(MemoryRecordSink::new());
        let report = OptimizationLoop::new(
            config(seed, 2),
            constrained_quadratic(),
            quadratic_model(),
            capped(10),
        )
        .with_record_sink(sink.clone())
        .run()
        .await
        .unwrap();
        (report, sink.records())
    };

    let (first, first_records) = run(5).await;
    let (second, second_records) = run(5).await;
    assert_eq!(first.seed, 5);
    assert_eq!(first.best_x, second.best_x);
    assert_eq!(first.fitness, second.fitness);
    let xs = |records: &[fastuav_driver::EvaluationRecord]| {
        records.iter().map(|r| r.x.clone()).collect::<Vec<_>>()
    };
    assert_eq!(xs(&first_records), xs(&second_records));

    let (other, _) = run(6).await;
    assert_ne!(first.best_x, other.best_x);
}

// ============ FAILURES ============

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_evaluation_is_isolated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let model: Arc<dyn ModelEvaluator> = Arc::new(FnModel(move |design: &NamedValues| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EvaluationFailure::new("aerodynamic solver did not converge"));
        }
        Ok(quadratic_outputs(design))
    }));

    let sink = Arc::new(MemoryRecordSink::new());
    let report = OptimizationLoop::new(config(17, 3), constrained_quadratic(), model, capped(8))
        .with_record_sink(sink.clone())
        .run()
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.generations, 8);

    let first = sink.generation(1);
    assert_eq!(first.len(), 6);
    let failed: Vec<_> = first.iter().filter(|r| r.failed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].fitness, FAILURE_SENTINEL);
    assert!(!failed[0].feasible);
    assert!(first.iter().filter(|r| !r.failed).all(|r| r.fitness < FAILURE_SENTINEL));

    // Every generation recorded, plus the final re-run
    let records = sink.records();
    assert_eq!(records.len(), 8 * 6 + 1);
    assert_eq!(records.last().unwrap().stage, RecordStage::Final);
}

// ============ COLLECTIVE STOP ============

/// CMA-ES replica that reports an extra criterion from a given generation on
struct StopAfter {
    inner: CmaEs,
    generation: u64,
    at: u64,
}

impl EvolutionEngine for StopAfter {
    fn configure(&mut self, settings: EngineSettings) -> Result<(), EngineError> {
        self.inner.configure(settings)
    }

    fn ask(&mut self) -> Result<Vec<Vec<f64>>, EngineError> {
        self.inner.ask()
    }

    fn tell(&mut self, candidates: &[Vec<f64>], fitness: &[f64]) -> Result<(), EngineError> {
        self.inner.tell(candidates, fitness)?;
        self.generation += 1;
        Ok(())
    }

    fn stop(&self) -> StopSet {
        let mut stop = self.inner.stop();
        if self.generation >= self.at {
            stop.insert("rank_budget".to_string());
        }
        stop
    }

    fn result(&self) -> Result<EngineResult, EngineError> {
        self.inner.result()
    }
}

#[tokio::test]
async fn test_one_replica_stop_ends_run_for_all() {
    let created = Arc::new(AtomicUsize::new(0));
    let factory = {
        let created = Arc::clone(&created);
        move || {
            let rank = created.fetch_add(1, Ordering::SeqCst);
            StopAfter {
                inner: CmaEs::default(),
                generation: 0,
                at: if rank == 1 { 5 } else { u64::MAX },
            }
        }
    };

    let report = OptimizationLoop::new(config(1, 3), constrained_quadratic(), quadratic_model(), factory)
        .run()
        .await
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 3);
    assert_eq!(report.generations, 5);
    assert_eq!(report.evaluations, 5 * 6);
    assert!(report.stop_criteria.contains("rank_budget"));
}

// ============ SETUP ============

#[tokio::test]
async fn test_uneven_worker_pool_rejected_before_evaluation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let model: Arc<dyn ModelEvaluator> = Arc::new(FnModel(move |design: &NamedValues| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(quadratic_outputs(design))
    }));

    let mut cfg = config(1, 1);
    cfg.parallel = ParallelSettings {
        run_parallel: true,
        procs_per_model: 4,
        concurrency_group: 6,
    };

    let err = OptimizationLoop::new(cfg, constrained_quadratic(), model, CmaEs::default)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SizingError::Setup(SetupError::UnevenWorkerPool {
            group: 6,
            procs_per_model: 4
        })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_objective_weight_rejected() {
    let mut cfg = config(1, 1);
    cfg.objectives.weights.insert("endurance".to_string(), 1.0);

    let err = OptimizationLoop::new(cfg, constrained_quadratic(), quadratic_model(), CmaEs::default)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SizingError::Setup(SetupError::UnknownObjectiveWeight(name)) if name == "endurance"
    ));
}
