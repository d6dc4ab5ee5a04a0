//! Population evaluation over a fixed worker pool
//!
//! Results are index-aligned with the input whatever the completion order.
//! A model that panics is treated as a bug: the panic resumes on the caller
//! for one worker and for many alike.

mod batch;
mod pool;

use self::batch::BatchPlan;
use self::pool::WorkerPool;
use crate::fitness::{Evaluation, FitnessEvaluator};
use fastuav_common::{Result, SizingError};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Evaluates whole populations, sequentially or over `W` workers
pub struct PopulationBatchScheduler {
    evaluator: Arc<FitnessEvaluator>,
    pool: Option<WorkerPool>,
}

impl PopulationBatchScheduler {
    /// Build a scheduler over `workers` workers.
    ///
    /// With more than one worker the pool is spawned immediately, so this
    /// must run inside a Tokio runtime.
    pub fn spawn(evaluator: FitnessEvaluator, workers: usize) -> Self {
        let evaluator = Arc::new(evaluator);
        let pool = (workers > 1).then(|| WorkerPool::spawn(Arc::clone(&evaluator), workers));
        Self { evaluator, pool }
    }

    /// Number of concurrent evaluations
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map(WorkerPool::size).unwrap_or(1)
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    /// Evaluate a population; blocks until every candidate has a result
    #[instrument(skip_all, fields(candidates = candidates.len(), workers = self.workers()))]
    pub async fn evaluate(&self, candidates: &[Vec<f64>]) -> Result<Vec<Evaluation>> {
        match &self.pool {
            None => Ok(candidates
                .iter()
                .map(|x| self.evaluator.evaluate(x))
                .collect()),
            Some(pool) => self.evaluate_batched(pool, candidates).await,
        }
    }

    async fn evaluate_batched(
        &self,
        pool: &WorkerPool,
        candidates: &[Vec<f64>],
    ) -> Result<Vec<Evaluation>> {
        let plan = BatchPlan::new(candidates.len(), pool.size());
        let mut results = Vec::with_capacity(candidates.len());

        for (batch_index, batch) in plan.batches().enumerate() {
            let mut pending = Vec::with_capacity(batch.len());
            for (rank, padded) in batch.clone().enumerate() {
                let x = candidates[plan.source(padded)].clone();
                pending.push(pool.dispatch(rank, x).await?);
            }

            for (padded, reply) in batch.zip(join_all(pending).await) {
                let outcome = reply.map_err(|_| {
                    SizingError::Internal("worker dropped an evaluation reply".to_string())
                })?;
                let evaluation = match outcome {
                    Ok(evaluation) => evaluation,
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(err) => return Err(SizingError::Internal(err.to_string())),
                };
                if plan.is_real(padded) {
                    results.push(evaluation);
                }
            }
            debug!(batch = batch_index, "Batch evaluated");
        }

        Ok(results)
    }
}
