//! Padding and batching of one population

use std::ops::Range;

/// Layout of a population over `W` worker slots.
///
/// The population is padded to a multiple of `W` by repeating its last
/// candidate; padded slots are evaluated and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchPlan {
    len: usize,
    workers: usize,
}

impl BatchPlan {
    pub fn new(len: usize, workers: usize) -> Self {
        Self {
            len,
            workers: workers.max(1),
        }
    }

    /// Population length rounded up to a multiple of the worker count
    pub fn padded_len(&self) -> usize {
        self.batch_count() * self.workers
    }

    /// `⌈N / W⌉`
    pub fn batch_count(&self) -> usize {
        self.len.div_ceil(self.workers)
    }

    /// Padded indices of each batch; slot `j` of a batch goes to worker `j`
    pub fn batches(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.batch_count()).map(move |b| b * self.workers..(b + 1) * self.workers)
    }

    /// Candidate evaluated at a padded index
    pub fn source(&self, padded: usize) -> usize {
        padded.min(self.len.saturating_sub(1))
    }

    /// Whether a padded index holds a real candidate
    pub fn is_real(&self, padded: usize) -> bool {
        padded < self.len
    }
}
