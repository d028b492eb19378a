use std::collections::VecDeque;

use crate::sink::{BatchError, GraphSink, Operation, RejectedBatch};

/// Commit offset of a partially written operation list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    /// Operations committed so far.
    pub committed: usize,
    /// Batches committed so far.
    pub batches: u64,
}

/// A batch was rejected; `progress` still points at its first operation.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch: u64,
    /// Index of the offending operation within the whole list.
    pub operation_index: usize,
    pub error: BatchError,
}

/// Commit `pending` front to back in chunks of `batch_size`.
///
/// Committed operations leave the queue and move into the sink. On failure
/// the rejected batch goes back to the front and `progress` still counts
/// only committed work, so calling again resumes there.
pub fn commit_in_batches(
    sink: &mut dyn GraphSink,
    pending: &mut VecDeque<Operation>,
    batch_size: usize,
    progress: &mut BatchProgress,
) -> Result<(), BatchFailure> {
    let batch_size = batch_size.max(1);

    while !pending.is_empty() {
        let size = batch_size.min(pending.len());
        let batch: Vec<Operation> = pending.drain(..size).collect();
        if let Err(rejected) = sink.run_owned_batch(batch) {
            let RejectedBatch { error, operations } = rejected;
            for operation in operations.into_iter().rev() {
                pending.push_front(operation);
            }
            return Err(BatchFailure {
                batch: progress.batches,
                operation_index: progress.committed + error.index,
                error,
            });
        }
        progress.committed += size;
        progress.batches += 1;
    }

    Ok(())
}
