//! Fixed pool of long-lived evaluation workers

use crate::fitness::{Evaluation, FitnessEvaluator};
use fastuav_common::{Result, SizingError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinError;
use tracing::{debug, trace};

/// Reply to one job: the evaluation, or the join error of a panicked model run
pub(crate) type JobOutcome = std::result::Result<Evaluation, JoinError>;

struct Job {
    x: Vec<f64>,
    reply: oneshot::Sender<JobOutcome>,
}

/// `W` worker tasks, each fed through its own channel.
///
/// Dropping the pool closes every channel, which ends the worker loops.
pub(crate) struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
}

impl WorkerPool {
    /// Spawn the workers; must be called inside a Tokio runtime
    pub fn spawn(evaluator: Arc<FitnessEvaluator>, workers: usize) -> Self {
        let mut senders = Vec::with_capacity(workers);

        for rank in 0..workers {
            let (tx, rx) = mpsc::channel(1);
            let evaluator = Arc::clone(&evaluator);
            tokio::spawn(run_worker(rank, evaluator, rx));
            senders.push(tx);
        }

        debug!(workers, "Worker pool started");
        Self { senders }
    }

    pub fn size(&self) -> usize {
        self.senders.len()
    }

    /// Hand one design vector to worker `rank`
    pub async fn dispatch(&self, rank: usize, x: Vec<f64>) -> Result<oneshot::Receiver<JobOutcome>> {
        let sender = self
            .senders
            .get(rank)
            .ok_or_else(|| SizingError::Internal(format!("no worker with rank {rank}")))?;
        let (reply, rx) = oneshot::channel();
        sender
            .send(Job { x, reply })
            .await
            .map_err(|_| SizingError::Internal(format!("worker {rank} has shut down")))?;
        Ok(rx)
    }
}

async fn run_worker(rank: usize, evaluator: Arc<FitnessEvaluator>, mut jobs: mpsc::Receiver<Job>) {
    while let Some(Job { x, reply }) = jobs.recv().await {
        let evaluator = Arc::clone(&evaluator);
        let outcome = tokio::task::spawn_blocking(move || evaluator.evaluate(&x)).await;
        if reply.send(outcome).is_err() {
            debug!(rank, "Evaluation result dropped by caller");
        }
    }
    trace!(rank, "Worker stopped");
}
