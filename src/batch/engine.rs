//! Payment Batcher Module
//!
//! Splits the run's ordered obligations into contiguous, bounded batches.
//! Each batch is numbered by its position in the run.

use crate::error::BatchError;
use crate::{Batch, PaymentObligation};
use std::num::NonZeroUsize;

/// Partitions obligations into fixed-size chunks
///
/// Order is preserved end to end so the manifest published for a given slice
/// of obligations is reproducible. Only the last batch may be short.
#[derive(Debug, Clone, Copy)]
pub struct PaymentBatcher {
    /// Maximum number of obligations per batch
    size: NonZeroUsize,
}

impl PaymentBatcher {
    /// Creates a new batcher
    ///
    /// # Arguments
    /// * `size` - Maximum obligations per batch
    ///
    /// # Returns
    /// `BatchError::ZeroSize` if `size` is zero
    pub fn new(size: usize) -> Result<Self, BatchError> {
        let size = NonZeroUsize::new(size).ok_or(BatchError::ZeroSize)?;
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Split obligations into batches
    ///
    /// Produces `ceil(N / size)` batches; an empty input produces none.
    /// Concatenating the batches in order gives back the input exactly.
    pub fn batch(&self, obligations: Vec<PaymentObligation>) -> Vec<Batch> {
        let size = self.size.get();
        let mut batches = Vec::with_capacity(obligations.len().div_ceil(size));
        let mut remaining = obligations.into_iter().peekable();

        while remaining.peek().is_some() {
            let chunk: Vec<PaymentObligation> = remaining.by_ref().take(size).collect();
            batches.push(Batch {
                index: batches.len(),
                obligations: chunk,
            });
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentStatus;
    use std::collections::BTreeMap;

    fn obligations(n: i64) -> Vec<PaymentObligation> {
        (1..=n)
            .map(|id| PaymentObligation {
                user_id: id,
                amount: id * 10,
                ledger_record_id: 100 + id,
                wallets: BTreeMap::new(),
                status: PaymentStatus::Pending,
            })
            .collect()
    }

    #[test]
    fn test_zero_size_is_a_configuration_error() {
        assert_eq!(PaymentBatcher::new(0).unwrap_err(), BatchError::ZeroSize);
    }

    #[test]
    fn test_batch_counts_and_sizes() {
        for (n, size) in [(1usize, 1usize), (5, 2), (6, 3), (7, 10), (10_001, 10_000)] {
            let batcher = PaymentBatcher::new(size).unwrap();
            let batches = batcher.batch(obligations(n as i64));

            assert_eq!(batches.len(), n.div_ceil(size), "n={n} size={size}");
            for batch in &batches[..batches.len() - 1] {
                assert_eq!(batch.len(), size);
            }
            let last = batches.last().unwrap();
            assert!(!last.is_empty() && last.len() <= size);
        }
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let input = obligations(7);
        let batches = PaymentBatcher::new(3).unwrap().batch(input.clone());

        let indices: Vec<usize> = batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let flattened: Vec<PaymentObligation> =
            batches.into_iter().flat_map(|b| b.obligations).collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_empty_input_produces_no_batches() {
        let batcher = PaymentBatcher::new(10).unwrap();

        assert!(batcher.batch(Vec::new()).is_empty());
    }
}
