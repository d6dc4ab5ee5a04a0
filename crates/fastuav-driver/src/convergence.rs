//! Collective stop decision across worker ranks
//!
//! Every rank submits its engine's stop-set once per generation; the
//! gathered sets are unioned and every rank receives the same decision.

use fastuav_cmaes::StopSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Barrier;

/// Outcome of one stop exchange, identical on every rank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDecision {
    pub stop: bool,
    /// Union of the criteria reported by all ranks
    pub criteria: StopSet,
    /// Ranks that reported at least one criterion
    pub reporters: Vec<usize>,
}

/// All-gather of per-rank stop-sets over a reusable barrier
pub struct ConvergenceCoordinator {
    ranks: usize,
    barrier: Barrier,
    ballots: Mutex<Vec<StopSet>>,
}

impl ConvergenceCoordinator {
    pub fn new(ranks: usize) -> Arc<Self> {
        let ranks = ranks.max(1);
        Arc::new(Self {
            ranks,
            barrier: Barrier::new(ranks),
            ballots: Mutex::new(vec![StopSet::new(); ranks]),
        })
    }

    /// One ballot per rank, in rank order
    pub fn ballots(self: &Arc<Self>) -> Vec<StopBallot> {
        (0..self.ranks)
            .map(|rank| StopBallot {
                rank,
                coordinator: Arc::clone(self),
            })
            .collect()
    }

    async fn exchange(&self, rank: usize, stop_set: StopSet) -> StopDecision {
        {
            let mut ballots = self.ballots.lock();
            ballots[rank] = stop_set;
        }

        // Phase 1: every ballot is in
        self.barrier.wait().await;

        let decision = {
            let ballots = self.ballots.lock();
            let mut decision = StopDecision::default();
            for (r, set) in ballots.iter().enumerate() {
                if !set.is_empty() {
                    decision.reporters.push(r);
                    decision.criteria.extend(set.iter().cloned());
                }
            }
            decision.stop = !decision.criteria.is_empty();
            decision
        };

        // Phase 2: every rank has read before the next round overwrites
        self.barrier.wait().await;

        decision
    }
}

/// A rank's handle on the coordinator
pub struct StopBallot {
    rank: usize,
    coordinator: Arc<ConvergenceCoordinator>,
}

impl StopBallot {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Submit this rank's stop-set and wait for the collective decision.
    ///
    /// Every rank must call this once per generation.
    pub async fn check_stop(&self, stop_set: StopSet) -> StopDecision {
        self.coordinator.exchange(self.rank, stop_set).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    fn set(criteria: &[&str]) -> StopSet {
        criteria.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_rank() {
        let coordinator = ConvergenceCoordinator::new(1);
        let ballots = coordinator.ballots();
        assert_eq!(ballots.len(), 1);

        let decision = ballots[0].check_stop(StopSet::new()).await;
        assert!(!decision.stop);

        let decision = ballots[0].check_stop(set(&["tolfun"])).await;
        assert!(decision.stop);
        assert_eq!(decision.reporters, vec![0]);
    }

    #[tokio::test]
    async fn test_union_of_stop_sets() {
        let coordinator = ConvergenceCoordinator::new(3);
        let ballots = coordinator.ballots();
        let sets = [set(&["tolx"]), StopSet::new(), set(&["tolx", "maxiter"])];

        let decisions = join_all(
            ballots
                .iter()
                .zip(sets.iter().cloned())
                .map(|(ballot, s)| ballot.check_stop(s)),
        )
        .await;

        for decision in &decisions {
            assert!(decision.stop);
            assert_eq!(decision.criteria, set(&["maxiter", "tolx"]));
            assert_eq!(decision.reporters, vec![0, 2]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_one_rank_stops_everyone_at_same_generation() {
        let coordinator = ConvergenceCoordinator::new(3);
        let handles: Vec<_> = coordinator
            .ballots()
            .into_iter()
            .map(|ballot| {
                tokio::spawn(async move {
                    for generation in 1..=20u64 {
                        let mine = if ballot.rank() == 1 && generation == 5 {
                            set(&["tolfun"])
                        } else {
                            StopSet::new()
                        };
                        let decision = ballot.check_stop(mine).await;
                        if decision.stop {
                            return (generation, decision);
                        }
                    }
                    (u64::MAX, StopDecision::default())
                })
            })
            .collect();

        for result in join_all(handles).await {
            let (generation, decision) = result.unwrap();
            assert_eq!(generation, 5);
            assert_eq!(decision.reporters, vec![1]);
            assert_eq!(decision.criteria, set(&["tolfun"]));
        }
    }
}
