//! Optimization loop: INIT → GENERATION* → DONE
//!
//! One engine replica runs per worker rank, all configured with the same
//! seed so they sample identical candidates. Rank 0's candidates are the
//! ones evaluated; every replica is told the same fitness and every rank
//! takes part in the stop exchange.

use crate::codec::VariableVectorCodec;
use crate::config::OptimizerConfig;
use crate::convergence::{ConvergenceCoordinator, StopDecision};
use crate::fitness::FitnessEvaluator;
use crate::model::{ModelEvaluator, ModelOutputs};
use crate::record::{EvaluationRecord, RecordSink, RecordStage};
use crate::scheduler::PopulationBatchScheduler;
use fastuav_cmaes::{EngineSettings, EvolutionEngine, StopSet};
use fastuav_common::{
    Candidate, Constraint, DesignVariable, NamedValues, Objective, Population, Result,
    SetupError,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type EngineFactory = Box<dyn Fn() -> Box<dyn EvolutionEngine> + Send + Sync>;

/// What to optimize
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationProblem {
    /// Design variables in declaration order
    pub design_variables: Vec<DesignVariable>,
    /// Start point, one entry per design variable
    pub initial: NamedValues,
    pub objectives: Vec<Objective>,
    pub constraints: Vec<Constraint>,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub run_id: Uuid,
    /// Always true: reaching any stop criterion is a normal completion
    pub success: bool,
    /// Best design, by variable name
    pub best: NamedValues,
    /// Best design as a flat vector
    pub best_x: Vec<f64>,
    /// Fitness of the best design as seen by the engine
    pub fitness: f64,
    pub generations: u64,
    pub evaluations: u64,
    /// Criteria that ended the run
    pub stop_criteria: StopSet,
    pub seed: u64,
    pub workers: usize,
    /// Model outputs at the best design; `None` if the final run failed
    pub final_outputs: Option<ModelOutputs>,
    /// Whether the final run satisfied every constraint
    pub final_feasible: bool,
}

/// Drives an evolution engine against a sizing model
pub struct OptimizationLoop {
    config: OptimizerConfig,
    problem: OptimizationProblem,
    model: Arc<dyn ModelEvaluator>,
    engine_factory: EngineFactory,
    sink: Option<Arc<dyn RecordSink>>,
}

impl OptimizationLoop {
    /// `engine_factory` builds one unconfigured engine per worker rank
    pub fn new<F, E>(
        config: OptimizerConfig,
        problem: OptimizationProblem,
        model: Arc<dyn ModelEvaluator>,
        engine_factory: F,
    ) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: EvolutionEngine + 'static,
    {
        Self {
            config,
            problem,
            model,
            engine_factory: Box::new(move || Box::new(engine_factory()) as Box<dyn EvolutionEngine>),
            sink: None,
        }
    }

    /// Record every evaluated candidate into `sink`
    pub fn with_record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run to completion
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(self) -> Result<OptimizationReport> {
        let run_id = Uuid::now_v7();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        // INIT
        self.config.validate()?;
        let workers = self.config.worker_count()?;
        if self.problem.objectives.is_empty() {
            return Err(SetupError::NoObjective.into());
        }
        let codec = Arc::new(VariableVectorCodec::new(&self.problem.design_variables)?);
        let initial = codec.encode(&self.problem.initial)?;
        let evaluator = FitnessEvaluator::new(
            Arc::clone(&codec),
            Arc::clone(&self.model),
            &self.problem.objectives,
            self.problem.constraints.clone(),
            &self.config,
        )?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let settings = EngineSettings {
            initial,
            sigma0: self.config.sigma0,
            lower: codec.lower_bounds().to_vec(),
            upper: codec.upper_bounds().to_vec(),
            seed,
        };
        let mut replicas: Vec<Box<dyn EvolutionEngine>> =
            (0..workers).map(|_| (self.engine_factory)()).collect();
        for replica in &mut replicas {
            replica.configure(settings.clone())?;
        }

        let scheduler = PopulationBatchScheduler::spawn(evaluator, workers);
        let coordinator = ConvergenceCoordinator::new(workers);
        let ballots = coordinator.ballots();

        info!(
            %run_id,
            dimension = codec.dimension(),
            workers,
            seed,
            sigma0 = self.config.sigma0,
            "Optimization started"
        );

        // GENERATION*
        let mut generation = 0u64;
        let mut best_seen: Option<Candidate> = None;
        let decision: StopDecision = loop {
            generation += 1;

            let candidates = replicas[0].ask()?;
            for (rank, replica) in replicas.iter_mut().enumerate().skip(1) {
                let mirror = replica.ask()?;
                if mirror != candidates {
                    warn!(rank, generation, "Engine replica diverged from rank 0");
                }
            }

            let evaluations = scheduler.evaluate(&candidates).await?;
            let fitness: Vec<f64> = evaluations.iter().map(|e| e.fitness).collect();
            for replica in &mut replicas {
                replica.tell(&candidates, &fitness)?;
            }

            let population = Population::new(
                generation,
                candidates
                    .into_iter()
                    .zip(evaluations)
                    .map(|(x, e)| e.into_candidate(x, generation))
                    .collect(),
            );
            self.record_population(run_id, &population).await;

            if let Some(best) = population.best() {
                if best_seen.as_ref().map_or(true, |b| best.fitness < b.fitness) {
                    best_seen = Some(best.clone());
                }
            }
            debug!(
                generation,
                best = population.best().map(|c| c.fitness),
                feasible = population.feasible_count(),
                failed = population.failed_count(),
                "Generation evaluated"
            );
            if generation % self.config.display_interval == 0 {
                info!(
                    generation,
                    best_fitness = best_seen.as_ref().map(|c| c.fitness),
                    best_feasible = best_seen.as_ref().map(|c| c.feasible),
                    "Optimization progress"
                );
            }

            let stop_sets: Vec<StopSet> = replicas.iter().map(|r| r.stop()).collect();
            let decisions = join_all(
                ballots
                    .iter()
                    .zip(stop_sets)
                    .map(|(ballot, stop_set)| ballot.check_stop(stop_set)),
            )
            .await;
            let decision = decisions.into_iter().next().unwrap_or_default();
            if decision.stop {
                break decision;
            }
        };

        // DONE
        let result = replicas[0].result()?;
        let best = codec.decode(&result.best)?;
        let final_evaluation = scheduler.evaluator().evaluate(&result.best);
        let final_outputs = final_evaluation.outputs();
        let final_feasible = final_evaluation.feasible;
        let final_candidate = final_evaluation.into_candidate(result.best.clone(), generation);
        self.record(run_id, RecordStage::Final, &final_candidate).await;

        info!(
            %run_id,
            generations = generation,
            evaluations = result.evaluations,
            fitness = result.fitness,
            feasible = final_feasible,
            criteria = ?decision.criteria,
            reporters = ?decision.reporters,
            "Optimization finished"
        );

        Ok(OptimizationReport {
            run_id,
            success: true,
            best,
            best_x: result.best,
            fitness: result.fitness,
            generations: generation,
            evaluations: result.evaluations,
            stop_criteria: decision.criteria,
            seed,
            workers,
            final_outputs,
            final_feasible,
        })
    }

    async fn record_population(&self, run_id: Uuid, population: &Population) {
        for candidate in &population.candidates {
            self.record(run_id, RecordStage::Generation, candidate).await;
        }
    }

    async fn record(&self, run_id: Uuid, stage: RecordStage, candidate: &Candidate) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = EvaluationRecord::from_candidate(run_id, stage, candidate);
        if let Err(e) = sink.record(&record).await {
            warn!(error = %e, generation = candidate.generation, "Failed to record evaluation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FnModel;
    use fastuav_cmaes::{CmaEs, CmaEsOptions};
    use fastuav_common::EngineError;

    fn problem() -> OptimizationProblem {
        OptimizationProblem {
            design_variables: vec![DesignVariable::uniform("x", 2, -5.0, 5.0).unwrap()],
            initial: [("x".to_string(), vec![2.0, 2.0])].into_iter().collect(),
            objectives: vec![Objective::new("f")],
            constraints: vec![Constraint::lower("sum", 1.0)],
        }
    }

    fn model() -> Arc<dyn ModelEvaluator> {
        Arc::new(FnModel(|design: &NamedValues| {
            let x = &design["x"];
            Ok(ModelOutputs::new()
                .objective("f", x[0] * x[0] + x[1] * x[1])
                .constraint("sum", x[0] + x[1]))
        }))
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig {
            sigma0: 1.0,
            seed: Some(11),
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

    #[tokio::test]
    async fn test_runs_until_engine_stops() {
        let report = OptimizationLoop::new(config(), problem(), model(), capped(4))
            .run()
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.generations, 4);
        assert_eq!(report.evaluations, 4 * 6);
        assert!(report.stop_criteria.contains("maxiter"));
        assert_eq!(report.seed, 11);
        assert_eq!(report.workers, 1);
        assert_eq!(report.best["x"], report.best_x);
        assert!(report.final_outputs.is_some());
    }

    #[tokio::test]
    async fn test_rejects_missing_objective() {
        let mut problem = problem();
        problem.objectives.clear();
        let err = OptimizationLoop::new(config(), problem, model(), CmaEs::default)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            fastuav_common::SizingError::Setup(SetupError::NoObjective)
        ));
    }

    #[tokio::test]
    async fn test_rejects_wrong_initial_size() {
        let mut problem = problem();
        problem.initial.insert("x".to_string(), vec![2.0]);
        let err = OptimizationLoop::new(config(), problem, model(), CmaEs::default)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            fastuav_common::SizingError::Setup(SetupError::DimensionMismatch { .. })
        ));
    }

    /// Engine whose `tell` always fails
    struct BrokenEngine(CmaEs);

    impl EvolutionEngine for BrokenEngine {
        fn configure(&mut self, settings: EngineSettings) -> std::result::Result<(), EngineError> {
            self.0.configure(settings)
        }
        fn ask(&mut self) -> std::result::Result<Vec<Vec<f64>>, EngineError> {
            self.0.ask()
        }
        fn tell(&mut self, _: &[Vec<f64>], _: &[f64]) -> std::result::Result<(), EngineError> {
            Err(EngineError::Numerical("covariance collapsed".to_string()))
        }
        fn stop(&self) -> StopSet {
            self.0.stop()
        }
        fn result(&self) -> std::result::Result<fastuav_cmaes::EngineResult, EngineError> {
            self.0.result()
        }
    }

    #[tokio::test]
    async fn test_engine_error_aborts_run() {
        let err = OptimizationLoop::new(config(), problem(), model(), || {
            BrokenEngine(CmaEs::default())
        })
        .run()
        .await
        .unwrap_err();
        assert!(matches!(err, fastuav_common::SizingError::Engine(_)));
    }
}
